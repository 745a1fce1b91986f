//! Provider seams for platform location and geocoding services.
//!
//! The capture loop treats both collaborators as blocking calls with
//! bounded timeouts; whatever callback machinery a platform uses stays
//! behind these traits. The [`mock`] module provides scripted
//! implementations for tests.

use std::time::Duration;

use async_trait::async_trait;

use tracklog_types::LocationFix;

/// Label used when the geocoder cannot resolve the coordinates.
pub const PLACE_NAME_UNRESOLVED: &str = "Unknown Address";
/// Label used when the geocoder itself fails.
pub const PLACE_NAME_ERROR: &str = "Location Error";

/// Source of location fixes.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Request a single fix, waiting at most `timeout`.
    ///
    /// `None` means no fix was available in time. That is an absence, not
    /// an error; the capture tick is skipped.
    async fn request_fix(&self, timeout: Duration) -> Option<LocationFix>;

    /// Battery percentage at capture time, -1 when the platform does not
    /// expose one.
    async fn battery_level(&self) -> i64 {
        -1
    }

    /// Network transport the device is currently using ("WIFI", "MOBILE", ...).
    async fn network_type(&self) -> String {
        "UNKNOWN".to_string()
    }
}

/// Best-effort reverse geocoding.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a human-readable label for the coordinates.
    ///
    /// `None` means the lookup failed; the caller substitutes a sentinel
    /// label rather than blocking or erroring.
    async fn resolve_place_name(&self, latitude: f64, longitude: f64) -> Option<String>;
}

/// Provider that always reports the same position.
///
/// Useful for stationary deployments where the device position is known
/// ahead of time and no live fix source exists.
pub struct FixedLocationProvider {
    fix: LocationFix,
}

impl FixedLocationProvider {
    /// Create a provider pinned to the given coordinates.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            fix: LocationFix {
                latitude,
                longitude,
                accuracy: 0.0,
            },
        }
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn request_fix(&self, _timeout: Duration) -> Option<LocationFix> {
        Some(self.fix)
    }
}

/// Provider that never produces a fix.
///
/// Every capture tick is skipped; the service still serves its API and
/// drains whatever the store already holds.
pub struct NullLocationProvider;

#[async_trait]
impl LocationProvider for NullLocationProvider {
    async fn request_fix(&self, _timeout: Duration) -> Option<LocationFix> {
        None
    }
}

/// Geocoder that never resolves anything.
pub struct NoopGeocoder;

#[async_trait]
impl Geocoder for NoopGeocoder {
    async fn resolve_place_name(&self, _latitude: f64, _longitude: f64) -> Option<String> {
        None
    }
}

/// Reverse geocoder backed by a Nominatim-style HTTP endpoint.
pub struct HttpGeocoder {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGeocoder {
    /// Create a geocoder for the given endpoint.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Geocoder for HttpGeocoder {
    async fn resolve_place_name(&self, latitude: f64, longitude: f64) -> Option<String> {
        let url = format!("{}/reverse", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", latitude.to_string()),
                ("lon", longitude.to_string()),
                ("format", "jsonv2".to_string()),
            ])
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            return None;
        }

        let body: serde_json::Value = response.json().await.ok()?;
        match body.get("display_name").and_then(|v| v.as_str()) {
            Some(name) if !name.is_empty() => Some(name.to_string()),
            // The endpoint answered but had no label for these coordinates
            _ => Some(PLACE_NAME_UNRESOLVED.to_string()),
        }
    }
}

/// Scripted providers for tests.
pub mod mock {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::sync::Mutex;

    use tracklog_types::LocationFix;

    use super::{Geocoder, LocationProvider};

    /// A location provider that replays a scripted sequence of fixes.
    ///
    /// Each `request_fix` call pops the next scripted entry; an empty
    /// script yields absence.
    pub struct MockLocationProvider {
        fixes: Mutex<VecDeque<Option<LocationFix>>>,
        request_count: AtomicU32,
        battery_level: i64,
        network_type: String,
    }

    impl MockLocationProvider {
        /// Create a provider with an empty script.
        pub fn new() -> Self {
            Self {
                fixes: Mutex::new(VecDeque::new()),
                request_count: AtomicU32::new(0),
                battery_level: 76,
                network_type: "WIFI".to_string(),
            }
        }

        /// Queue a fix to be returned by the next request.
        pub async fn push_fix(&self, latitude: f64, longitude: f64) {
            self.fixes.lock().await.push_back(Some(LocationFix {
                latitude,
                longitude,
                accuracy: 5.0,
            }));
        }

        /// Queue an absent fix (provider timeout).
        pub async fn push_absent(&self) {
            self.fixes.lock().await.push_back(None);
        }

        /// Number of fix requests made so far.
        pub fn request_count(&self) -> u32 {
            self.request_count.load(Ordering::SeqCst)
        }
    }

    impl Default for MockLocationProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl LocationProvider for MockLocationProvider {
        async fn request_fix(&self, _timeout: Duration) -> Option<LocationFix> {
            self.request_count.fetch_add(1, Ordering::SeqCst);
            self.fixes.lock().await.pop_front().flatten()
        }

        async fn battery_level(&self) -> i64 {
            self.battery_level
        }

        async fn network_type(&self) -> String {
            self.network_type.clone()
        }
    }

    /// A geocoder that returns a fixed label, or fails on demand.
    pub struct MockGeocoder {
        label: Option<String>,
        call_count: AtomicU32,
    }

    impl MockGeocoder {
        /// Geocoder that always resolves to `label`.
        pub fn with_label(label: &str) -> Self {
            Self {
                label: Some(label.to_string()),
                call_count: AtomicU32::new(0),
            }
        }

        /// Geocoder that always fails.
        pub fn failing() -> Self {
            Self {
                label: None,
                call_count: AtomicU32::new(0),
            }
        }

        /// Number of lookups made so far.
        pub fn call_count(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Geocoder for MockGeocoder {
        async fn resolve_place_name(&self, _latitude: f64, _longitude: f64) -> Option<String> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            self.label.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{MockGeocoder, MockLocationProvider};
    use super::*;

    #[tokio::test]
    async fn test_fixed_provider_returns_configured_fix() {
        let provider = FixedLocationProvider::new(51.5, -0.12);
        let fix = provider.request_fix(Duration::from_secs(1)).await.unwrap();
        assert_eq!(fix.latitude, 51.5);
        assert_eq!(fix.longitude, -0.12);
    }

    #[tokio::test]
    async fn test_null_provider_is_always_absent() {
        let provider = NullLocationProvider;
        assert!(provider.request_fix(Duration::from_secs(1)).await.is_none());
        // Diagnostics fall back to the trait defaults
        assert_eq!(provider.battery_level().await, -1);
        assert_eq!(provider.network_type().await, "UNKNOWN");
    }

    #[tokio::test]
    async fn test_mock_provider_replays_script() {
        let provider = MockLocationProvider::new();
        provider.push_fix(1.0, 2.0).await;
        provider.push_absent().await;

        let first = provider.request_fix(Duration::from_secs(1)).await;
        assert_eq!(first.unwrap().latitude, 1.0);

        assert!(provider.request_fix(Duration::from_secs(1)).await.is_none());
        // Script exhausted: further requests are absences
        assert!(provider.request_fix(Duration::from_secs(1)).await.is_none());
        assert_eq!(provider.request_count(), 3);
    }

    #[tokio::test]
    async fn test_mock_geocoder() {
        let geocoder = MockGeocoder::with_label("Springfield");
        assert_eq!(
            geocoder.resolve_place_name(1.0, 2.0).await.as_deref(),
            Some("Springfield")
        );

        let failing = MockGeocoder::failing();
        assert!(failing.resolve_place_name(1.0, 2.0).await.is_none());
        assert_eq!(failing.call_count(), 1);
    }
}
