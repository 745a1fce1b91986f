//! Retention purge of synced events.
//!
//! Acknowledged events are kept for a bounded window and then deleted.
//! Unsynced events are never purged, whatever their age: losing data is
//! worse than growing the database.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use tracklog_types::now_millis;

use crate::state::AppState;

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// How often the purge runs after the startup pass.
const PURGE_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Start the retention task.
///
/// Runs once at startup and then periodically for the life of the
/// process; retention is tied to the process, not to the tracking
/// session.
pub fn start(state: Arc<AppState>) {
    tokio::spawn(run_retention(state));
}

async fn run_retention(state: Arc<AppState>) {
    let mut interval = tokio::time::interval(PURGE_INTERVAL);

    loop {
        interval.tick().await;
        purge_once(&state).await;
    }
}

/// Run one purge pass against the configured retention window.
pub(crate) async fn purge_once(state: &AppState) {
    let retention_days = state.config.read().await.tracking.retention_days;
    let cutoff = now_millis() - retention_days as i64 * MILLIS_PER_DAY;

    let store = state.store.lock().await;
    match store.purge_synced_older_than(cutoff) {
        Ok(0) => {}
        Ok(purged) => info!(purged, "removed synced events past the retention window"),
        Err(e) => warn!("retention purge failed: {e}"),
    }
}
