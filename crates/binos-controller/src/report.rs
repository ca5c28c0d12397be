//! Fire-and-forget backend fill reporting.
//!
//! One [`FillReport`] is emitted per close cycle.  The POST runs on a
//! spawned task so the control loop never waits on the network; a failed
//! report is logged at `warn` and discarded — the next natural close event
//! produces the next report, so there is no retry logic.

use binos_types::FillReport;
use tracing::{debug, warn};

/// Async client for the backend's bin-update endpoint.
///
/// Construct once and reuse across close cycles.
pub struct BackendReporter {
    client: reqwest::Client,
    base_url: String,
}

impl BackendReporter {
    /// Create a reporter pointing at `base_url`
    /// (e.g. `"http://backend.local:8000"`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Full URL the reports are POSTed to.
    pub fn endpoint(&self) -> String {
        format!("{}/api/bins/update", self.base_url.trim_end_matches('/'))
    }

    /// Dispatch `report` without blocking the caller.
    ///
    /// Requires a running Tokio runtime; outside one (e.g. in synchronous
    /// tests) the report is dropped with a warning, which is the same
    /// contract as a network failure.
    pub fn dispatch(&self, report: FillReport) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime; fill report dropped");
            return;
        };
        let client = self.client.clone();
        let url = self.endpoint();
        handle.spawn(async move {
            match client.post(&url).json(&report).send().await {
                Ok(resp) if resp.status().is_success() => {
                    debug!(report_id = %report.report_id, "fill report delivered");
                }
                Ok(resp) => {
                    warn!(status = %resp.status(), "backend rejected fill report; dropped");
                }
                Err(e) => {
                    warn!(error = %e, "fill report not delivered; dropped");
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binos_types::CompartmentId;
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_report() -> FillReport {
        FillReport {
            report_id: Uuid::new_v4(),
            bin_organic_id: CompartmentId::Organic.backend_id().to_string(),
            bin_non_organic_id: CompartmentId::NonOrganic.backend_id().to_string(),
            organic_weight: 3.0,
            non_organic_weight: 7.5,
            organic_full: false,
            non_organic_full: false,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let reporter = BackendReporter::new("http://backend.local:8000/");
        assert_eq!(reporter.endpoint(), "http://backend.local:8000/api/bins/update");
    }

    #[test]
    fn dispatch_outside_runtime_does_not_panic() {
        let reporter = BackendReporter::new("http://backend.local:8000");
        reporter.dispatch(sample_report());
    }

    #[tokio::test]
    async fn dispatch_to_unreachable_backend_does_not_panic() {
        // Port 1 is essentially never bound; the spawned task must swallow
        // the connection error.
        let reporter = BackendReporter::new("http://127.0.0.1:1");
        reporter.dispatch(sample_report());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
}
