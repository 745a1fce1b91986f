//! Background location tracker with an offline-first sync engine.
//!
//! This crate provides a service that:
//! - Captures a location sample on a fixed cadence
//! - Persists every sample in a local SQLite outbox before any network I/O
//! - Delivers samples to a remote HTTP sink, marking each one synced only
//!   after the sink acknowledges it
//! - Watches network reachability and drains the outbox when connectivity
//!   returns
//! - Purges acknowledged samples after a retention window
//! - Exposes a small HTTP control API for the UI layer
//!
//! # Control API Endpoints
//!
//! - `GET /api/health` - Service health check
//! - `GET /api/status` - Tracker state, pending count, last sync summary
//! - `POST /api/sync` - Run a drain pass now, returns the summary
//! - `POST /api/tracking/start` - Start the capture loop
//! - `POST /api/tracking/stop` - Stop the capture loop
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/tracklog/service.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8085"
//!
//! [storage]
//! path = "~/.local/share/tracklog/events.db"
//!
//! [tracking]
//! subject_id = "42"
//! base_url = "https://tracker.example.com"
//! sample_interval = 10
//! ```

pub mod api;
pub mod config;
pub mod dispatcher;
pub mod monitor;
pub mod providers;
pub mod retention;
pub mod sampler;
pub mod state;
pub mod sync;

pub use config::{Config, ConfigError, ServerConfig, StorageConfig, TrackingConfig};
pub use dispatcher::{DeliveryError, Dispatcher};
pub use providers::{Geocoder, LocationProvider};
pub use sampler::Sampler;
pub use state::AppState;
pub use sync::SyncSummary;
