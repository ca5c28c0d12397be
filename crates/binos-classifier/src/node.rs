//! [`ClassifierNode`] – the bus-facing request handler.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use binos_bus::BusEndpoint;
use binos_hal::Camera;
use binos_types::{BusFrame, Material};
use tracing::{debug, info, warn};

use crate::service::VerdictClient;

/// How long [`ClassifierNode::run`] waits between shutdown-flag checks when
/// the bus is quiet.
const IDLE_POLL: Duration = Duration::from_millis(250);

/// The classifier node: camera + verdict service behind a bus endpoint.
pub struct ClassifierNode {
    endpoint: BusEndpoint,
    camera: Box<dyn Camera>,
    service: VerdictClient,
    /// Advisory only; never shared with the controller.
    detecting: bool,
    last_verdict: Material,
}

impl ClassifierNode {
    /// Assemble a node from its bus endpoint, camera driver, and service
    /// client.
    pub fn new(endpoint: BusEndpoint, camera: Box<dyn Camera>, service: VerdictClient) -> Self {
        Self {
            endpoint,
            camera,
            service,
            detecting: false,
            last_verdict: Material::Unknown,
        }
    }

    /// `true` while a capture/classify round is in progress.
    pub fn is_detecting(&self) -> bool {
        self.detecting
    }

    /// The most recently resolved verdict (for the node's local status
    /// accessor).
    pub fn last_verdict(&self) -> Material {
        self.last_verdict
    }

    /// Process one bus frame.  Returns `true` when the frame was a
    /// classification request and a response was published.
    ///
    /// Frames on other identifiers — including this node's own response
    /// echoes on the shared medium — are ignored.
    pub async fn handle_frame(&mut self, frame: BusFrame) -> bool {
        if !frame.is_classify_request() {
            debug!(id = frame.id, "frame ignored");
            return false;
        }

        info!("material detection requested");
        self.detecting = true;
        let verdict = self.detect().await;
        self.detecting = false;
        self.last_verdict = verdict;

        if let Err(e) = self.endpoint.send(BusFrame::classify_response(verdict)) {
            warn!(error = %e, "response not sent; controller timeout will cover");
        }
        true
    }

    /// Capture one frame and resolve it to a verdict.  Every failure path
    /// resolves to `Unknown` — an answering node must always answer.
    async fn detect(&mut self) -> Material {
        let frame = match self.camera.capture() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "camera capture failed");
                return Material::Unknown;
            }
        };
        debug!(bytes = frame.data.len(), "frame captured");

        match self.service.classify(frame.data).await {
            Ok(verdict) => {
                info!(
                    material = %verdict.material,
                    confidence = verdict.confidence,
                    "verdict received"
                );
                Material::from_wire(&verdict.material)
            }
            Err(e) => {
                warn!(error = %e, "classification service failed");
                Material::Unknown
            }
        }
    }

    /// Serve requests until `shutdown` is set or the bus closes.
    pub async fn run(mut self, shutdown: Arc<AtomicBool>) {
        info!("classifier node running");
        while !shutdown.load(Ordering::Acquire) {
            let frame = tokio::select! {
                frame = self.endpoint.recv() => frame,
                _ = tokio::time::sleep(IDLE_POLL) => continue,
            };
            match frame {
                Some(frame) => {
                    self.handle_frame(frame).await;
                }
                None => break,
            }
        }
        info!("classifier node stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use binos_bus::MessageBus;
    use binos_hal::sim::SimCamera;
    use binos_hal::JpegFrame;
    use binos_types::{BinError, CLASSIFY_RESPONSE_ID};

    /// A camera whose capture always fails.
    struct DeadCamera;

    impl Camera for DeadCamera {
        fn id(&self) -> &str {
            "cam_chute"
        }

        fn capture(&mut self) -> Result<JpegFrame, BinError> {
            Err(BinError::HardwareFault {
                component: "cam_chute".to_string(),
                details: "no frame buffer".to_string(),
            })
        }
    }

    fn unreachable_service() -> VerdictClient {
        VerdictClient::new("http://127.0.0.1:1")
    }

    #[tokio::test]
    async fn request_always_gets_a_response_even_when_service_is_down() {
        let bus = MessageBus::default();
        let mut probe = bus.endpoint();
        let mut node = ClassifierNode::new(
            bus.endpoint(),
            SimCamera::new("cam_chute"),
            unreachable_service(),
        );

        let handled = node.handle_frame(BusFrame::classify_request()).await;
        assert!(handled);

        let mut response = None;
        while let Some(frame) = probe.try_recv() {
            if frame.id == CLASSIFY_RESPONSE_ID {
                response = Some(frame);
            }
        }
        let response = response.expect("a node that can answer must answer");
        assert_eq!(response.payload, "MATERIAL:UNKNOWN");
        assert_eq!(response.material(), Some(Material::Unknown));
    }

    #[tokio::test]
    async fn camera_failure_resolves_to_unknown() {
        let bus = MessageBus::default();
        let mut probe = bus.endpoint();
        let mut node =
            ClassifierNode::new(bus.endpoint(), Box::new(DeadCamera), unreachable_service());

        node.handle_frame(BusFrame::classify_request()).await;

        let mut payloads = Vec::new();
        while let Some(frame) = probe.try_recv() {
            if frame.id == CLASSIFY_RESPONSE_ID {
                payloads.push(frame.payload);
            }
        }
        assert_eq!(payloads, vec!["MATERIAL:UNKNOWN".to_string()]);
        assert_eq!(node.last_verdict(), Material::Unknown);
    }

    #[tokio::test]
    async fn non_request_frames_are_ignored() {
        let bus = MessageBus::default();
        let mut probe = bus.endpoint();
        let mut node = ClassifierNode::new(
            bus.endpoint(),
            SimCamera::new("cam_chute"),
            unreachable_service(),
        );

        // A response frame (e.g. this node's own echo) must not trigger a
        // detection round.
        let handled = node
            .handle_frame(BusFrame::classify_response(Material::Organic))
            .await;
        assert!(!handled);

        // A foreign identifier must not either.
        let handled = node
            .handle_frame(BusFrame {
                id: 0x300,
                payload: "DETECT_MATERIAL".to_string(),
            })
            .await;
        assert!(!handled);

        assert_eq!(probe.try_recv(), None, "no response published");
    }

    #[tokio::test]
    async fn detecting_flag_is_clear_between_requests() {
        let bus = MessageBus::default();
        let _probe = bus.endpoint();
        let mut node = ClassifierNode::new(
            bus.endpoint(),
            SimCamera::new("cam_chute"),
            unreachable_service(),
        );

        assert!(!node.is_detecting());
        node.handle_frame(BusFrame::classify_request()).await;
        assert!(!node.is_detecting());
    }
}
