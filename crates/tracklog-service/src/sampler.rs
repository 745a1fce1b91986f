//! Periodic location capture.
//!
//! The capture loop runs on a fixed cadence. Each tick requests one fix
//! from the location provider (at most one request is ever outstanding),
//! resolves a place label best-effort, appends the sample to the store,
//! and then fires an immediate delivery attempt without waiting for it.
//! A tick without a fix is an absence, not an error; a storage fault is
//! logged and the loop keeps ticking.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use tracklog_types::{now_millis, LocationEvent, LocationSample};

use crate::providers::PLACE_NAME_ERROR;
use crate::state::AppState;

/// Background sampler that captures location on a schedule.
pub struct Sampler {
    state: Arc<AppState>,
}

impl Sampler {
    /// Create a new sampler.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Start the capture loop.
    ///
    /// Returns immediately; capturing happens in the background until the
    /// tracker's stop signal fires.
    pub async fn start(&self) {
        let (sample_interval, fix_timeout) = {
            let config = self.state.config.read().await;
            (
                Duration::from_secs(config.tracking.sample_interval),
                Duration::from_secs(config.tracking.fix_timeout),
            )
        };

        self.state.tracker.reset_stop();
        self.state.tracker.set_running(true);

        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            run_sampler(state, sample_interval, fix_timeout).await;
        });
    }
}

async fn run_sampler(state: Arc<AppState>, sample_interval: Duration, fix_timeout: Duration) {
    info!(
        interval_secs = sample_interval.as_secs(),
        "starting location sampler"
    );

    // First tick fires immediately; capture starts the moment tracking does
    let mut interval = tokio::time::interval(sample_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stop_rx = state.tracker.subscribe_stop();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = capture_once(&state, fix_timeout).await {
                    // Storage faults must not kill the cadence
                    warn!("failed to persist location sample: {e}");
                }
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    state.tracker.set_running(false);
    info!("location sampler stopped");
}

/// Capture a single sample: fix, label, append, delivery hint.
async fn capture_once(
    state: &Arc<AppState>,
    fix_timeout: Duration,
) -> Result<(), tracklog_store::Error> {
    let Some(fix) = state.provider.request_fix(fix_timeout).await else {
        debug!("no location fix within timeout, skipping tick");
        return Ok(());
    };

    let place_name = state
        .geocoder
        .resolve_place_name(fix.latitude, fix.longitude)
        .await
        .unwrap_or_else(|| PLACE_NAME_ERROR.to_string());

    let (subject_id, base_url) = {
        let config = state.config.read().await;
        (
            config.tracking.subject_id.clone(),
            config.tracking.base_url.clone(),
        )
    };

    let sample = LocationSample {
        subject_id,
        latitude: fix.latitude,
        longitude: fix.longitude,
        place_name,
        captured_at_millis: now_millis(),
        accuracy: fix.accuracy,
        battery_level: state.provider.battery_level().await,
        network_type: state.provider.network_type().await,
    };

    let id = {
        let store = state.store.lock().await;
        store.append(&sample)?
    };
    debug!(id, lat = sample.latitude, lon = sample.longitude, "saved location event");

    // Best-effort immediate delivery; anything that fails here is picked
    // up by the next drain pass
    if let Some(base_url) = base_url {
        if state.sync.is_reachable() {
            let event = LocationEvent::from_sample(id, sample);
            let state = Arc::clone(state);
            tokio::spawn(async move {
                crate::sync::deliver_one(&state, &base_url, &event).await;
            });
        }
    }

    Ok(())
}
