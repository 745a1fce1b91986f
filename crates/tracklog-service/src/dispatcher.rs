//! Delivery of location events to the remote sink.
//!
//! One call delivers one event. The sink acknowledges an event only when
//! it answers with an HTTP 2xx status AND a body carrying the
//! application-level success marker; anything else leaves the event
//! unsynced. Retry is entirely the sync coordinator's job - there is no
//! inline backoff here.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use tracklog_types::{LocationEvent, TimeError};

/// Path of the ingestion endpoint, joined onto the configured base URL.
pub const SINK_PATH: &str = "api/livelocation";

/// HTTP client for the remote sink.
///
/// Holds no mutable state; the base URL is passed per call so a config
/// change takes effect on the next delivery.
pub struct Dispatcher {
    client: reqwest::Client,
}

impl Dispatcher {
    /// Create a dispatcher with the given connect/read timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Deliver one event. `Ok` means the sink acknowledged it.
    pub async fn deliver(
        &self,
        base_url: &str,
        event: &LocationEvent,
    ) -> Result<(), DeliveryError> {
        let url = endpoint_url(base_url);
        let payload = LivePayload::from_event(event)?;

        debug!(id = event.id, %url, "delivering location event");

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Request(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() && body_indicates_success(&body) {
            Ok(())
        } else {
            Err(DeliveryError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Join the base URL and the sink path with exactly one separator.
fn endpoint_url(base_url: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), SINK_PATH)
}

/// Check the body for the sink's success marker.
///
/// The sink does not guarantee a parseable structure, only that a
/// successful ingest mentions `"status":"success"` (some deployments emit
/// single quotes). Kept in one place so a structured contract can replace
/// it later.
pub(crate) fn body_indicates_success(body: &str) -> bool {
    body.contains(r#""status":"success""#) || body.contains("'status':'success'")
}

/// Wire payload for one location event.
///
/// Field names (including the misspelled `log_lattitude`) follow the
/// sink's contract. Coordinates are sent as strings, the trip id as a
/// bare integer.
#[derive(Debug, Serialize)]
struct LivePayload<'a> {
    staf_sl: &'a str,
    log_dt: String,
    log_time: String,
    log_longitude: String,
    log_lattitude: String,
    log_location: &'a str,
    trip_id: i64,
}

impl<'a> LivePayload<'a> {
    fn from_event(event: &'a LocationEvent) -> Result<Self, TimeError> {
        Ok(Self {
            staf_sl: &event.subject_id,
            log_dt: event.log_date()?,
            log_time: event.log_time()?,
            log_longitude: event.longitude.to_string(),
            log_lattitude: event.latitude.to_string(),
            log_location: &event.place_name,
            trip_id: event.trip_id()?,
        })
    }
}

/// Errors that can occur when delivering an event.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The event's timestamp cannot be rendered into the payload.
    #[error("payload error: {0}")]
    Payload(#[from] TimeError),
    /// Transport-level failure (connect error, timeout, DNS, ...).
    #[error("request failed: {0}")]
    Request(String),
    /// The sink answered but did not acknowledge the event.
    #[error("sink rejected delivery ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::Router;

    fn test_event() -> LocationEvent {
        LocationEvent {
            id: 1,
            subject_id: "7".to_string(),
            latitude: 23.81,
            longitude: 90.41,
            place_name: "Dhaka".to_string(),
            captured_at_millis: 1_709_622_489_000,
            synced: false,
            accuracy: 5.0,
            battery_level: 90,
            network_type: "WIFI".to_string(),
        }
    }

    /// Spin up a local sink that answers every POST with the given
    /// status and body. Returns its base URL.
    async fn spawn_sink(status: StatusCode, body: &'static str) -> String {
        let app = Router::new().route(
            "/api/livelocation",
            post(move || async move { (status, body) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[test]
    fn test_endpoint_url_normalizes_trailing_slash() {
        assert_eq!(
            endpoint_url("https://tracker.example.com"),
            "https://tracker.example.com/api/livelocation"
        );
        assert_eq!(
            endpoint_url("https://tracker.example.com/"),
            "https://tracker.example.com/api/livelocation"
        );
    }

    #[test]
    fn test_body_indicates_success_variants() {
        assert!(body_indicates_success(r#"{"status":"success","id":9}"#));
        assert!(body_indicates_success("{'status':'success'}"));
        assert!(!body_indicates_success(r#"{"status":"error"}"#));
        assert!(!body_indicates_success(r#"{"status": "success"}"#));
        assert!(!body_indicates_success(""));
    }

    #[test]
    fn test_payload_shape() {
        let event = test_event();
        let payload = LivePayload::from_event(&event).unwrap();
        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(json["staf_sl"], "7");
        assert_eq!(json["log_dt"], "2024-03-05");
        assert_eq!(json["log_time"], "07:08");
        // Coordinates travel as strings, the trip id as an integer
        assert_eq!(json["log_longitude"], "90.41");
        assert_eq!(json["log_lattitude"], "23.81");
        assert_eq!(json["log_location"], "Dhaka");
        assert_eq!(json["trip_id"], 20240305070809i64);
    }

    #[tokio::test]
    async fn test_deliver_acknowledged() {
        let base_url = spawn_sink(StatusCode::OK, r#"{"status":"success"}"#).await;
        let dispatcher = Dispatcher::new(Duration::from_secs(2)).unwrap();

        dispatcher.deliver(&base_url, &test_event()).await.unwrap();
    }

    #[tokio::test]
    async fn test_deliver_rejected_on_http_error() {
        let base_url =
            spawn_sink(StatusCode::INTERNAL_SERVER_ERROR, r#"{"status":"success"}"#).await;
        let dispatcher = Dispatcher::new(Duration::from_secs(2)).unwrap();

        match dispatcher.deliver(&base_url, &test_event()).await {
            Err(DeliveryError::Rejected { status, .. }) => assert_eq!(status, 500),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deliver_rejected_without_success_marker() {
        // 2xx alone is not enough; the body must carry the marker
        let base_url = spawn_sink(StatusCode::OK, r#"{"status":"error"}"#).await;
        let dispatcher = Dispatcher::new(Duration::from_secs(2)).unwrap();

        match dispatcher.deliver(&base_url, &test_event()).await {
            Err(DeliveryError::Rejected { status, body }) => {
                assert_eq!(status, 200);
                assert!(body.contains("error"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_deliver_transport_failure() {
        // Nothing listens on this port
        let dispatcher = Dispatcher::new(Duration::from_millis(500)).unwrap();

        match dispatcher
            .deliver("http://127.0.0.1:9", &test_event())
            .await
        {
            Err(DeliveryError::Request(_)) => {}
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
