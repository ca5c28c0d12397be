//! [`VerdictClient`] – HTTP client for the image-classification service.
//!
//! The service contract is narrow: POST raw JPEG bytes to `/api/detect`,
//! receive `{"material": "<label>", "confidence": <number>}`.  Nothing in
//! this repository decodes images or cares how the service reaches its
//! verdict.
//!
//! # Example
//!
//! ```rust,no_run
//! use binos_classifier::service::VerdictClient;
//!
//! let client = VerdictClient::new("http://backend.local:8000");
//! // Requires a running service – exercised in integration, not unit tests.
//! // let verdict = client.classify(jpeg_bytes).await?;
//! ```

use serde::Deserialize;
use thiserror::Error;

/// Errors that can arise from a classification service call.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The HTTP request to the service failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status or an unparsable body.
    #[error("Unexpected response: {0}")]
    BadResponse(String),
}

/// Structured verdict returned by the service.
///
/// `material` is still a free-form string at this boundary; the node
/// converts it through [`Material::from_wire`][binos_types::Material] so
/// unrecognized labels collapse to `UNKNOWN` before touching the bus.
#[derive(Debug, Clone, Deserialize)]
pub struct Verdict {
    pub material: String,
    pub confidence: f32,
}

/// An async client for the classification service.
///
/// Construct once and reuse across requests.
pub struct VerdictClient {
    base_url: String,
    client: reqwest::Client,
}

impl VerdictClient {
    /// Create a client pointing at `base_url`
    /// (e.g. `"http://backend.local:8000"`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Full URL the frames are POSTed to.
    pub fn endpoint(&self) -> String {
        format!("{}/api/detect", self.base_url.trim_end_matches('/'))
    }

    /// Submit one JPEG frame and return the parsed verdict.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Http`] – the request never completed.
    /// - [`ServiceError::BadResponse`] – non-success status or a body that
    ///   does not match the verdict shape.
    pub async fn classify(&self, jpeg: Vec<u8>) -> Result<Verdict, ServiceError> {
        let response = self
            .client
            .post(self.endpoint())
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(jpeg)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::BadResponse(format!(
                "service answered {status}"
            )));
        }

        response
            .json::<Verdict>()
            .await
            .map_err(|e| ServiceError::BadResponse(format!("verdict body: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = VerdictClient::new("http://backend.local:8000/");
        assert_eq!(client.endpoint(), "http://backend.local:8000/api/detect");
    }

    #[test]
    fn verdict_deserializes_from_service_json() {
        let verdict: Verdict =
            serde_json::from_str(r#"{"material":"ORGANIC","confidence":0.75}"#).unwrap();
        assert_eq!(verdict.material, "ORGANIC");
        assert!((verdict.confidence - 0.75).abs() < f32::EPSILON);
    }

    #[test]
    fn verdict_tolerates_extra_fields() {
        // The service also reports hue/saturation diagnostics; they are
        // irrelevant here and must not break parsing.
        let verdict: Verdict = serde_json::from_str(
            r#"{"material":"NON_ORGANIC","confidence":0.7,"hue":101.2,"saturation":40.0}"#,
        )
        .unwrap();
        assert_eq!(verdict.material, "NON_ORGANIC");
    }

    #[tokio::test]
    async fn unreachable_service_returns_http_error() {
        // Port 1 is essentially never bound.
        let client = VerdictClient::new("http://127.0.0.1:1");
        let result = client.classify(vec![0xFF, 0xD8]).await;
        assert!(matches!(result, Err(ServiceError::Http(_))));
    }
}
