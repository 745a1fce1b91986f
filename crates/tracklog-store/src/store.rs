//! Main store implementation.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info};

use tracklog_types::{LocationEvent, LocationSample};

use crate::error::{Error, Result};
use crate::schema;

/// SQLite-based outbox for location events.
///
/// The store is the sole owner of event rows. Rows are inserted unsynced
/// by [`Store::append`], flipped to synced by [`Store::mark_synced`] once
/// the sink acknowledges them, and deleted only by
/// [`Store::purge_synced_older_than`]. Callers serialize access through a
/// single handle; each method is one SQL statement and therefore atomic.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        // WAL mode for concurrent reads while the writer is active
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        // Initialize schema
        schema::initialize(&conn)?;

        Ok(Self { conn })
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Insert a new unsynced event and return its row id.
    pub fn append(&self, sample: &LocationSample) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO locations (subject_id, latitude, longitude, place_name,
             captured_at, synced, accuracy, battery_level, network_type)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6, ?7, ?8)",
            rusqlite::params![
                sample.subject_id,
                sample.latitude,
                sample.longitude,
                sample.place_name,
                sample.captured_at_millis,
                sample.accuracy,
                sample.battery_level,
                sample.network_type,
            ],
        )?;

        Ok(self.conn.last_insert_rowid())
    }

    /// All unsynced events, most recent first.
    ///
    /// This ordering governs replay order during a drain pass.
    pub fn list_unsynced(&self) -> Result<Vec<LocationEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject_id, latitude, longitude, place_name, captured_at,
             synced, accuracy, battery_level, network_type
             FROM locations WHERE synced = 0 ORDER BY captured_at DESC",
        )?;

        let events = stmt
            .query_map([], event_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(events)
    }

    /// Number of unsynced events, read directly from the table.
    pub fn count_unsynced(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM locations WHERE synced = 0",
            [],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    /// Mark the given events as synced.
    ///
    /// Idempotent: ids that are already synced or unknown are skipped.
    /// Runs as a single statement, so a concurrent purge never observes a
    /// partially applied update.
    pub fn mark_synced(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "UPDATE locations SET synced = 1 WHERE synced = 0 AND id IN ({})",
            placeholders
        );

        let updated = self
            .conn
            .execute(&sql, rusqlite::params_from_iter(ids.iter()))?;
        debug!("Marked {} of {} event(s) as synced", updated, ids.len());

        Ok(())
    }

    /// Delete synced events captured before the cutoff.
    ///
    /// Unsynced rows are never touched, regardless of age. Returns the
    /// number of rows removed.
    pub fn purge_synced_older_than(&self, cutoff_millis: i64) -> Result<usize> {
        let deleted = self.conn.execute(
            "DELETE FROM locations WHERE synced = 1 AND captured_at < ?1",
            [cutoff_millis],
        )?;

        Ok(deleted)
    }

    /// Fetch a single event by id.
    pub fn get_event(&self, id: i64) -> Result<Option<LocationEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, subject_id, latitude, longitude, place_name, captured_at,
             synced, accuracy, battery_level, network_type
             FROM locations WHERE id = ?",
        )?;

        let event = stmt.query_row([id], event_from_row).optional()?;

        Ok(event)
    }
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<LocationEvent> {
    Ok(LocationEvent {
        id: row.get(0)?,
        subject_id: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        place_name: row.get(4)?,
        captured_at_millis: row.get(5)?,
        synced: row.get::<_, i64>(6)? != 0,
        accuracy: row.get(7)?,
        battery_level: row.get(8)?,
        network_type: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_at(millis: i64) -> LocationSample {
        LocationSample {
            subject_id: "7".to_string(),
            latitude: 23.81,
            longitude: 90.41,
            place_name: "Dhaka".to_string(),
            captured_at_millis: millis,
            accuracy: 10.0,
            battery_level: 80,
            network_type: "WIFI".to_string(),
        }
    }

    #[test]
    fn test_open_in_memory() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.count_unsynced().unwrap(), 0);
        assert!(store.list_unsynced().unwrap().is_empty());
    }

    #[test]
    fn test_open_on_disk() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("events.db");

        let store = Store::open(&path).unwrap();
        let id = store.append(&sample_at(1_000)).unwrap();
        drop(store);

        // Reopen and verify the row survived
        let store = Store::open(&path).unwrap();
        let event = store.get_event(id).unwrap().unwrap();
        assert_eq!(event.captured_at_millis, 1_000);
        assert!(!event.synced);
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let store = Store::open_in_memory().unwrap();

        let first = store.append(&sample_at(1_000)).unwrap();
        let second = store.append(&sample_at(2_000)).unwrap();

        assert!(second > first);
        assert_eq!(store.count_unsynced().unwrap(), 2);
    }

    #[test]
    fn test_list_unsynced_most_recent_first() {
        let store = Store::open_in_memory().unwrap();

        store.append(&sample_at(1_000)).unwrap();
        store.append(&sample_at(3_000)).unwrap();
        store.append(&sample_at(2_000)).unwrap();

        let events = store.list_unsynced().unwrap();
        let times: Vec<i64> = events.iter().map(|e| e.captured_at_millis).collect();
        assert_eq!(times, vec![3_000, 2_000, 1_000]);
    }

    #[test]
    fn test_mark_synced_removes_from_unsynced() {
        let store = Store::open_in_memory().unwrap();

        let a = store.append(&sample_at(1_000)).unwrap();
        let b = store.append(&sample_at(2_000)).unwrap();

        store.mark_synced(&[a]).unwrap();

        let events = store.list_unsynced().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, b);
        assert_eq!(store.count_unsynced().unwrap(), 1);

        let synced = store.get_event(a).unwrap().unwrap();
        assert!(synced.synced);
    }

    #[test]
    fn test_mark_synced_is_idempotent() {
        let store = Store::open_in_memory().unwrap();

        let id = store.append(&sample_at(1_000)).unwrap();

        store.mark_synced(&[id]).unwrap();
        let after_first = store.get_event(id).unwrap().unwrap();

        // Marking again (and marking an unknown id) is a no-op, not an error
        store.mark_synced(&[id, 9_999]).unwrap();
        let after_second = store.get_event(id).unwrap().unwrap();

        assert!(after_first.synced);
        assert!(after_second.synced);
        assert_eq!(store.count_unsynced().unwrap(), 0);
    }

    #[test]
    fn test_mark_synced_empty_set() {
        let store = Store::open_in_memory().unwrap();
        store.mark_synced(&[]).unwrap();
    }

    #[test]
    fn test_mark_synced_batch() {
        let store = Store::open_in_memory().unwrap();

        let ids: Vec<i64> = (0..5)
            .map(|i| store.append(&sample_at(1_000 + i)).unwrap())
            .collect();

        store.mark_synced(&ids).unwrap();
        assert_eq!(store.count_unsynced().unwrap(), 0);
    }

    #[test]
    fn test_purge_only_removes_old_synced_rows() {
        let store = Store::open_in_memory().unwrap();

        let old_synced = store.append(&sample_at(1_000)).unwrap();
        let old_unsynced = store.append(&sample_at(1_500)).unwrap();
        let recent_synced = store.append(&sample_at(10_000)).unwrap();

        store.mark_synced(&[old_synced, recent_synced]).unwrap();

        let purged = store.purge_synced_older_than(5_000).unwrap();
        assert_eq!(purged, 1);

        // The old unsynced row survives regardless of age
        assert!(store.get_event(old_unsynced).unwrap().is_some());
        assert!(store.get_event(recent_synced).unwrap().is_some());
        assert!(store.get_event(old_synced).unwrap().is_none());
    }

    #[test]
    fn test_purge_never_removes_unsynced() {
        let store = Store::open_in_memory().unwrap();

        for i in 0..4 {
            store.append(&sample_at(i)).unwrap();
        }

        let purged = store.purge_synced_older_than(i64::MAX).unwrap();
        assert_eq!(purged, 0);
        assert_eq!(store.count_unsynced().unwrap(), 4);
    }

    #[test]
    fn test_synced_flag_never_reverts() {
        let store = Store::open_in_memory().unwrap();

        let id = store.append(&sample_at(1_000)).unwrap();
        store.mark_synced(&[id]).unwrap();

        // Appends and further marks leave the flag set
        store.append(&sample_at(2_000)).unwrap();
        store.mark_synced(&[id]).unwrap();

        assert!(store.get_event(id).unwrap().unwrap().synced);
    }
}
