//! Shared types for the tracklog location tracking service.
//!
//! This crate provides the core data types used by the store and the
//! background service:
//!
//! - [`LocationFix`] - a raw fix from the platform location provider
//! - [`LocationSample`] - a captured sample before it is persisted
//! - [`LocationEvent`] - a persisted sample with its row id and sync flag
//!
//! It also owns the derivation of the delivery payload fields (trip
//! identifier, date and time strings) so that they are computed the same
//! way everywhere.
//!
//! # Example
//!
//! ```
//! use tracklog_types::{LocationEvent, LocationSample};
//!
//! let sample = LocationSample {
//!     subject_id: "42".to_string(),
//!     latitude: 51.5,
//!     longitude: -0.12,
//!     place_name: "London".to_string(),
//!     captured_at_millis: 1_700_000_000_000,
//!     accuracy: 12.0,
//!     battery_level: 80,
//!     network_type: "WIFI".to_string(),
//! };
//! let event = LocationEvent::from_sample(1, sample);
//! assert_eq!(event.trip_id().unwrap().to_string().len(), 14);
//! ```

pub mod error;
pub mod types;

pub use error::TimeError;
pub use types::{now_millis, LocationEvent, LocationFix, LocationSample};
