//! Network reachability monitoring.
//!
//! The monitor polls a [`ReachabilityProbe`] and watches for edges. One
//! unreachable-to-reachable transition triggers exactly one drain pass;
//! repeated reachable observations trigger nothing. Going unreachable
//! only updates the shared flag that the sampler consults before firing
//! immediate delivery hints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Probe answering "does the network currently reach the sink?".
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// One reachability check, bounded by the probe's own timeout.
    async fn check(&self) -> bool;
}

/// Probe that attempts a TCP connection to the sink's host and port.
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Derive the probe target from the sink base URL.
    ///
    /// Returns `None` when the URL has no recognizable host.
    pub fn from_base_url(base_url: &str, timeout: Duration) -> Option<Self> {
        let addr = probe_addr(base_url)?;
        Some(Self { addr, timeout })
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn check(&self) -> bool {
        matches!(
            tokio::time::timeout(self.timeout, tokio::net::TcpStream::connect(&self.addr)).await,
            Ok(Ok(_))
        )
    }
}

/// Extract `host:port` from an http(s) base URL, defaulting the port by
/// scheme.
fn probe_addr(base_url: &str) -> Option<String> {
    let (default_port, rest) = if let Some(rest) = base_url.strip_prefix("https://") {
        (443u16, rest)
    } else if let Some(rest) = base_url.strip_prefix("http://") {
        (80u16, rest)
    } else {
        return None;
    };

    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return None;
    }

    if host.contains(':') {
        Some(host.to_string())
    } else {
        Some(format!("{host}:{default_port}"))
    }
}

/// Edge detector over a stream of reachability observations.
#[derive(Debug)]
pub(crate) struct EdgeDetector {
    was_reachable: bool,
}

/// A reachability transition.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Edge {
    BecameReachable,
    BecameUnreachable,
}

impl EdgeDetector {
    /// Start from "unreachable" so the first reachable observation counts
    /// as an edge and resyncs whatever accumulated while the process was
    /// down.
    pub(crate) fn new() -> Self {
        Self {
            was_reachable: false,
        }
    }

    /// Feed one observation; returns the edge it completes, if any.
    pub(crate) fn observe(&mut self, reachable: bool) -> Option<Edge> {
        let edge = match (self.was_reachable, reachable) {
            (false, true) => Some(Edge::BecameReachable),
            (true, false) => Some(Edge::BecameUnreachable),
            _ => None,
        };
        self.was_reachable = reachable;
        edge
    }
}

/// Start the connectivity monitor for the configured sink, if any.
pub async fn start(state: Arc<AppState>) {
    let (base_url, probe_interval) = {
        let config = state.config.read().await;
        (
            config.tracking.base_url.clone(),
            Duration::from_secs(config.tracking.probe_interval),
        )
    };

    let Some(base_url) = base_url else {
        debug!("no base URL configured, connectivity monitor not started");
        return;
    };

    let Some(probe) = TcpProbe::from_base_url(&base_url, Duration::from_secs(3)) else {
        warn!("cannot derive probe target from base URL, connectivity monitor not started");
        return;
    };

    let stop_rx = state.tracker.subscribe_stop();
    tokio::spawn(run_monitor(state, Arc::new(probe), probe_interval, stop_rx));
}

pub(crate) async fn run_monitor(
    state: Arc<AppState>,
    probe: Arc<dyn ReachabilityProbe>,
    probe_interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    info!(
        interval_secs = probe_interval.as_secs(),
        "starting connectivity monitor"
    );

    let mut interval = tokio::time::interval(probe_interval);
    let mut edges = EdgeDetector::new();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let reachable = probe.check().await;
                state.sync.set_reachable(reachable);

                match edges.observe(reachable) {
                    Some(Edge::BecameReachable) => {
                        info!("network became reachable, draining unsynced events");
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            crate::sync::drain(&state).await;
                        });
                    }
                    Some(Edge::BecameUnreachable) => {
                        info!("network became unreachable");
                    }
                    None => {}
                }
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    debug!("connectivity monitor stopped");
}
