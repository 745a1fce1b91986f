//! Durable local outbox for tracklog location events.
//!
//! This crate provides SQLite-based storage for captured location samples.
//! Every sample is appended as an unsynced row; the background service
//! flips rows to synced once the remote sink acknowledges them, and a
//! retention purge eventually removes acknowledged rows. Unsynced rows are
//! never deleted: data loss is worse than storage growth.
//!
//! # Example
//!
//! ```no_run
//! use tracklog_store::Store;
//!
//! let store = Store::open_default()?;
//! let pending = store.count_unsynced()?;
//! println!("{pending} events waiting for delivery");
//! # Ok::<(), tracklog_store::Error>(())
//! ```

mod error;
mod schema;
mod store;

pub use error::{Error, Result};
pub use store::Store;

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/tracklog/events.db`
/// - macOS: `~/Library/Application Support/tracklog/events.db`
/// - Windows: `C:\Users\<user>\AppData\Local\tracklog\events.db`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("tracklog")
        .join("events.db")
}
