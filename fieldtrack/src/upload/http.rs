//! HTTP backend using reqwest.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;

use crate::geo::LocationSample;
use crate::geofence::GeofenceEvent;
use crate::BoxFuture;

use super::backend::{TrackingBackend, UploadError};

const LOCATION_PATH: &str = "tracking/location";
const GEOFENCE_EVENT_PATH: &str = "tracking/geofence-event";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationPayload<'a> {
    worker_id: &'a str,
    #[serde(flatten)]
    sample: &'a LocationSample,
}

/// Backend posting JSON to `{base_url}/tracking/...`.
///
/// Authentication and token refresh are the host's concern; this client
/// only enforces the request timeout.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    /// Create a backend for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), UploadError> {
        let url = self.endpoint(path);
        let bytes = serde_json::to_vec(body).map_err(|e| UploadError::Encode(e.to_string()))?;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(bytes)
            .send()
            .await
            .map_err(|e| UploadError::Transport(format!("Request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                url,
            });
        }
        Ok(())
    }
}

impl TrackingBackend for HttpBackend {
    fn record_location<'a>(
        &'a self,
        worker_id: &'a str,
        sample: &'a LocationSample,
    ) -> BoxFuture<'a, Result<(), UploadError>> {
        Box::pin(async move {
            self.post_json(LOCATION_PATH, &LocationPayload { worker_id, sample })
                .await
        })
    }

    fn record_geofence_event<'a>(
        &'a self,
        event: &'a GeofenceEvent,
    ) -> BoxFuture<'a, Result<(), UploadError>> {
        Box::pin(async move { self.post_json(GEOFENCE_EVENT_PATH, event).await })
    }
}
