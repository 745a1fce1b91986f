//! Application state shared across background tasks and API handlers.
//!
//! The store is the only shared mutable resource; it sits behind a `Mutex`
//! so that appends, sync marks and retention purges are serialized at a
//! single point. Everything else is either read-only after construction
//! (providers, dispatcher) or small atomic flags.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::{watch, Mutex, RwLock};

use tracklog_store::Store;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::providers::{Geocoder, LocationProvider};
use crate::sync::SyncSummary;

/// Shared application state.
pub struct AppState {
    /// The event store (wrapped in Mutex for thread-safe access).
    pub store: Mutex<Store>,
    /// Configuration (RwLock for runtime updates).
    pub config: RwLock<Config>,
    /// Location provider behind the platform seam.
    pub provider: Arc<dyn LocationProvider>,
    /// Reverse geocoder behind the platform seam.
    pub geocoder: Arc<dyn Geocoder>,
    /// Delivery client for the remote sink.
    pub dispatcher: Dispatcher,
    /// Tracker control state.
    pub tracker: TrackerState,
    /// Sync engine state.
    pub sync: SyncState,
}

impl AppState {
    /// Create new application state.
    ///
    /// Builds the HTTP dispatcher from the configured timeout; everything
    /// downstream receives the store and providers through this handle
    /// rather than through globals.
    pub fn new(
        store: Store,
        config: Config,
        provider: Arc<dyn LocationProvider>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Result<Arc<Self>, reqwest::Error> {
        let dispatcher = Dispatcher::new(Duration::from_secs(config.tracking.http_timeout))?;
        Ok(Arc::new(Self {
            store: Mutex::new(store),
            config: RwLock::new(config),
            provider,
            geocoder,
            dispatcher,
            tracker: TrackerState::new(),
            sync: SyncState::new(),
        }))
    }
}

/// State for tracking and controlling the capture loop.
pub struct TrackerState {
    /// Whether tracking is currently running.
    running: AtomicBool,
    /// When tracking was started (Unix timestamp).
    started_at: AtomicU64,
    /// Channel to signal background tasks to stop.
    stop_tx: watch::Sender<bool>,
    /// Receiver for stop signal (cloned by background tasks).
    stop_rx: watch::Receiver<bool>,
}

impl TrackerState {
    /// Create a new tracker state.
    pub fn new() -> Self {
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            running: AtomicBool::new(false),
            started_at: AtomicU64::new(0),
            stop_tx,
            stop_rx,
        }
    }

    /// Check if tracking is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Mark tracking as started or stopped.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
        if running {
            let now = OffsetDateTime::now_utc().unix_timestamp() as u64;
            self.started_at.store(now, Ordering::SeqCst);
        }
    }

    /// Get the tracking start time.
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        let ts = self.started_at.load(Ordering::SeqCst);
        if ts == 0 {
            None
        } else {
            OffsetDateTime::from_unix_timestamp(ts as i64).ok()
        }
    }

    /// Get a receiver for the stop signal.
    pub fn subscribe_stop(&self) -> watch::Receiver<bool> {
        self.stop_rx.clone()
    }

    /// Signal all background tasks to stop.
    ///
    /// Soft cancellation: tasks check the signal between iterations, so an
    /// in-flight delivery attempt finishes before its loop exits.
    pub fn signal_stop(&self) {
        let _ = self.stop_tx.send(true);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Reset the stop signal (for restarting).
    pub fn reset_stop(&self) {
        let _ = self.stop_tx.send(false);
    }
}

impl Default for TrackerState {
    fn default() -> Self {
        Self::new()
    }
}

/// State owned by the sync engine.
pub struct SyncState {
    /// Guard ensuring only one drain pass runs at a time.
    draining: AtomicBool,
    /// Last observed network reachability.
    reachable: AtomicBool,
    /// Summary of the most recent drain pass.
    last_summary: RwLock<Option<SyncSummary>>,
}

impl SyncState {
    /// Create a new sync state.
    pub fn new() -> Self {
        Self {
            draining: AtomicBool::new(false),
            // Optimistic until the monitor reports otherwise, so immediate
            // delivery hints are not suppressed when no monitor is running.
            reachable: AtomicBool::new(true),
            last_summary: RwLock::new(None),
        }
    }

    /// Try to claim the drain guard. Returns false if a pass is in flight.
    pub fn try_begin_drain(&self) -> bool {
        self.draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Release the drain guard.
    pub fn end_drain(&self) {
        self.draining.store(false, Ordering::SeqCst);
    }

    /// Whether a drain pass is currently running.
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Update the reachability flag.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Last observed reachability. Best-effort short-circuit only; a send
    /// attempted while this is false simply fails.
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Record the summary of a finished drain pass.
    pub async fn record_summary(&self, summary: SyncSummary) {
        *self.last_summary.write().await = Some(summary);
    }

    /// Summary of the most recent drain pass, if any.
    pub async fn last_summary(&self) -> Option<SyncSummary> {
        self.last_summary.read().await.clone()
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self::new()
    }
}
