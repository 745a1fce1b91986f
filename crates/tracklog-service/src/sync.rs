//! Batch resynchronization of unsynced events.
//!
//! A drain pass delivers every currently unsynced event, most recent
//! first, pacing the attempts so a backlog does not hammer the sink.
//! Each acknowledged delivery is marked synced immediately, so a pass
//! interrupted at any point never loses acknowledged work - the next
//! trigger simply retries whatever is still unsynced.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use tracklog_types::LocationEvent;

use crate::state::AppState;

/// Outcome of one drain pass, surfaced to the UI layer.
#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    /// Delivery attempts made during the pass.
    pub attempted: usize,
    /// Attempts the sink acknowledged.
    pub succeeded: usize,
    /// Human-readable outcome.
    pub message: String,
}

impl SyncSummary {
    fn empty(message: impl Into<String>) -> Self {
        Self {
            attempted: 0,
            succeeded: 0,
            message: message.into(),
        }
    }
}

/// Drain every currently unsynced event in one sequential pass.
///
/// Only one pass runs at a time: a trigger arriving while a pass is in
/// flight is coalesced into it (dropped, not queued). The resulting
/// summary is recorded in [`AppState`] for the status endpoint.
pub async fn drain(state: &Arc<AppState>) -> SyncSummary {
    if !state.sync.try_begin_drain() {
        debug!("drain requested while a pass is in flight, coalescing");
        return SyncSummary::empty("sync already in progress");
    }

    let summary = run_pass(state).await;
    state.sync.end_drain();

    info!(
        attempted = summary.attempted,
        succeeded = summary.succeeded,
        "drain pass finished: {}",
        summary.message
    );
    state.sync.record_summary(summary.clone()).await;

    summary
}

async fn run_pass(state: &Arc<AppState>) -> SyncSummary {
    let (base_url, pace) = {
        let config = state.config.read().await;
        (
            config.tracking.base_url.clone(),
            Duration::from_millis(config.tracking.sync_pace_ms),
        )
    };

    let Some(base_url) = base_url else {
        return SyncSummary::empty("no base URL configured");
    };

    let events = {
        let store = state.store.lock().await;
        match store.list_unsynced() {
            Ok(events) => events,
            Err(e) => {
                warn!("failed to list unsynced events: {e}");
                return SyncSummary::empty(format!("storage error: {e}"));
            }
        }
    };

    if events.is_empty() {
        return SyncSummary::empty("no data to sync");
    }

    info!(count = events.len(), "draining unsynced location events");

    let stop_rx = state.tracker.subscribe_stop();
    let total = events.len();
    let mut attempted = 0usize;
    let mut succeeded = 0usize;

    for (i, event) in events.iter().enumerate() {
        // Soft cancellation: finish the current attempt, never start another
        if *stop_rx.borrow() {
            info!("stop requested, ending drain pass early");
            break;
        }

        attempted += 1;
        if deliver_one(state, &base_url, event).await {
            succeeded += 1;
        }

        if i + 1 < total {
            tokio::time::sleep(pace).await;
        }
    }

    SyncSummary {
        attempted,
        succeeded,
        message: format!("synced {succeeded} of {attempted} locations"),
    }
}

/// Deliver one event and mark it synced on acknowledgement.
///
/// Returns whether the event is now synced. Failures stay local: the row
/// remains unsynced and the next pass picks it up again.
pub(crate) async fn deliver_one(state: &Arc<AppState>, base_url: &str, event: &LocationEvent) -> bool {
    match state.dispatcher.deliver(base_url, event).await {
        Ok(()) => {
            let store = state.store.lock().await;
            match store.mark_synced(&[event.id]) {
                Ok(()) => {
                    debug!(id = event.id, "location event synced");
                    true
                }
                Err(e) => {
                    // Delivered but not recorded; the row will be re-sent and
                    // the sink is expected to deduplicate
                    warn!(id = event.id, "delivered but failed to mark synced: {e}");
                    false
                }
            }
        }
        Err(e) => {
            warn!(id = event.id, "delivery failed: {e}");
            false
        }
    }
}

/// Start the optional periodic sweep, if configured.
pub async fn start_sweep(state: Arc<AppState>) {
    let sweep_interval = state.config.read().await.tracking.sweep_interval;
    if sweep_interval == 0 {
        return;
    }

    info!(interval = sweep_interval, "starting periodic sync sweep");
    let stop_rx = state.tracker.subscribe_stop();
    tokio::spawn(run_sweep(state, Duration::from_secs(sweep_interval), stop_rx));
}

async fn run_sweep(
    state: Arc<AppState>,
    sweep_interval: Duration,
    mut stop_rx: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(sweep_interval);
    // The immediate first tick would race the startup drain
    interval.tick().await;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                drain(&state).await;
            }
            _ = stop_rx.changed() => {
                if *stop_rx.borrow() {
                    break;
                }
            }
        }
    }

    debug!("periodic sync sweep stopped");
}
