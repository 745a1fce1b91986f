//! Core data types for location tracking.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::TimeError;

/// A single fix from the underlying location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    /// Latitude in WGS84 degrees.
    pub latitude: f64,
    /// Longitude in WGS84 degrees.
    pub longitude: f64,
    /// Estimated horizontal accuracy in meters.
    pub accuracy: f64,
}

/// A captured location sample that has not yet been persisted.
///
/// The store assigns a row id on insert, turning this into a
/// [`LocationEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSample {
    /// Identifier of the tracked subject.
    pub subject_id: String,
    /// Latitude in WGS84 degrees.
    pub latitude: f64,
    /// Longitude in WGS84 degrees.
    pub longitude: f64,
    /// Best-effort reverse-geocoded label, or a sentinel on failure.
    pub place_name: String,
    /// Capture instant as epoch milliseconds (UTC).
    pub captured_at_millis: i64,
    /// Estimated horizontal accuracy in meters.
    pub accuracy: f64,
    /// Battery percentage at capture time, -1 when unknown.
    pub battery_level: i64,
    /// Network transport at capture time ("WIFI", "MOBILE", ...).
    pub network_type: String,
}

/// A location sample as stored in the local database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationEvent {
    /// Row id, assigned exactly once on insert and never reused.
    pub id: i64,
    /// Identifier of the tracked subject.
    pub subject_id: String,
    /// Latitude in WGS84 degrees.
    pub latitude: f64,
    /// Longitude in WGS84 degrees.
    pub longitude: f64,
    /// Best-effort reverse-geocoded label, or a sentinel on failure.
    pub place_name: String,
    /// Capture instant as epoch milliseconds (UTC).
    pub captured_at_millis: i64,
    /// Whether the remote sink has acknowledged this event.
    ///
    /// Transitions false to true exactly once; never back.
    pub synced: bool,
    /// Estimated horizontal accuracy in meters.
    pub accuracy: f64,
    /// Battery percentage at capture time, -1 when unknown.
    pub battery_level: i64,
    /// Network transport at capture time.
    pub network_type: String,
}

impl LocationEvent {
    /// Build the event for a sample that was just inserted under `id`.
    pub fn from_sample(id: i64, sample: LocationSample) -> Self {
        Self {
            id,
            subject_id: sample.subject_id,
            latitude: sample.latitude,
            longitude: sample.longitude,
            place_name: sample.place_name,
            captured_at_millis: sample.captured_at_millis,
            synced: false,
            accuracy: sample.accuracy,
            battery_level: sample.battery_level,
            network_type: sample.network_type,
        }
    }

    /// The capture instant as an [`OffsetDateTime`] (UTC).
    pub fn capture_time(&self) -> Result<OffsetDateTime, TimeError> {
        OffsetDateTime::from_unix_timestamp_nanos(self.captured_at_millis as i128 * 1_000_000)
            .map_err(|_| TimeError::OutOfRange(self.captured_at_millis))
    }

    /// Trip identifier: `yyyyMMddHHmmss` of the capture instant as an integer.
    ///
    /// Derived from UTC so two events with the same capture timestamp always
    /// produce the same identifier. This is a presentation field for the
    /// sink, not a queue identity.
    pub fn trip_id(&self) -> Result<i64, TimeError> {
        let t = self.capture_time()?;
        Ok(t.year() as i64 * 10_000_000_000
            + u8::from(t.month()) as i64 * 100_000_000
            + t.day() as i64 * 1_000_000
            + t.hour() as i64 * 10_000
            + t.minute() as i64 * 100
            + t.second() as i64)
    }

    /// The `YYYY-MM-DD` date component of the delivery payload.
    pub fn log_date(&self) -> Result<String, TimeError> {
        let t = self.capture_time()?;
        Ok(format!(
            "{:04}-{:02}-{:02}",
            t.year(),
            u8::from(t.month()),
            t.day()
        ))
    }

    /// The `HH:mm` time component of the delivery payload.
    pub fn log_time(&self) -> Result<String, TimeError> {
        let t = self.capture_time()?;
        Ok(format!("{:02}:{:02}", t.hour(), t.minute()))
    }
}

/// Current time as epoch milliseconds (UTC).
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_at(millis: i64) -> LocationEvent {
        LocationEvent {
            id: 1,
            subject_id: "7".to_string(),
            latitude: 23.81,
            longitude: 90.41,
            place_name: "Dhaka".to_string(),
            captured_at_millis: millis,
            synced: false,
            accuracy: 5.0,
            battery_level: 90,
            network_type: "WIFI".to_string(),
        }
    }

    #[test]
    fn test_trip_id_known_value() {
        // 2024-03-05T07:08:09Z
        let event = event_at(1_709_622_489_000);
        assert_eq!(event.trip_id().unwrap(), 20240305070809);
    }

    #[test]
    fn test_trip_id_is_fourteen_digits() {
        let event = event_at(now_millis());
        assert_eq!(event.trip_id().unwrap().to_string().len(), 14);

        // Epoch start still renders as 14 digits.
        let epoch = event_at(0);
        assert_eq!(epoch.trip_id().unwrap(), 19700101000000);
    }

    #[test]
    fn test_trip_id_deterministic() {
        let a = event_at(1_709_622_489_000);
        let mut b = event_at(1_709_622_489_000);
        b.id = 99;
        b.subject_id = "other".to_string();
        assert_eq!(a.trip_id().unwrap(), b.trip_id().unwrap());
    }

    #[test]
    fn test_trip_id_ignores_sub_second_precision() {
        let a = event_at(1_709_622_489_001);
        let b = event_at(1_709_622_489_999);
        assert_eq!(a.trip_id().unwrap(), b.trip_id().unwrap());
    }

    #[test]
    fn test_log_date_and_time() {
        let event = event_at(1_709_622_489_000);
        assert_eq!(event.log_date().unwrap(), "2024-03-05");
        assert_eq!(event.log_time().unwrap(), "07:08");
    }

    #[test]
    fn test_capture_time_out_of_range() {
        let event = event_at(i64::MAX);
        assert!(event.capture_time().is_err());
        assert!(event.trip_id().is_err());
    }

    #[test]
    fn test_from_sample() {
        let sample = LocationSample {
            subject_id: "42".to_string(),
            latitude: 1.0,
            longitude: 2.0,
            place_name: "Somewhere".to_string(),
            captured_at_millis: 1_700_000_000_000,
            accuracy: 8.5,
            battery_level: 55,
            network_type: "MOBILE".to_string(),
        };

        let event = LocationEvent::from_sample(17, sample);
        assert_eq!(event.id, 17);
        assert_eq!(event.subject_id, "42");
        assert!(!event.synced);
        assert_eq!(event.battery_level, 55);
    }

    #[test]
    fn test_event_serde_round_trip() {
        let event = event_at(1_700_000_000_000);
        let json = serde_json::to_string(&event).unwrap();
        let back: LocationEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert_eq!(back.captured_at_millis, event.captured_at_millis);
        assert_eq!(back.place_name, event.place_name);
    }
}
