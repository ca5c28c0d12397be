//! In-process addressed-message bus between the controller and classifier
//! nodes.
//!
//! Uses [`tokio::sync::broadcast`] under the hood: the bus is a shared
//! medium, so every [`BusEndpoint`] observes every frame — including frames
//! it sent itself.  Nodes filter by frame identifier (`0x100` requests,
//! `0x200` responses), which is the same discipline an addressed CAN-style
//! link imposes.
//!
//! Delivery contract: at-least-once with bounded (but not guaranteed)
//! latency.  A slow endpoint whose buffer overflows loses the oldest frames
//! and logs a warning; consumers must treat the bus as lossy-under-pressure
//! and rely on their own timeouts, which is exactly what the controller's
//! classification protocol does.

use binos_types::{BinError, BusFrame};
use tokio::sync::broadcast;
use tracing::warn;

/// Default frame buffer per endpoint before the oldest frames are dropped.
const DEFAULT_CAPACITY: usize = 64;

/// Shared message bus.  Clone it cheaply — all clones share the same
/// underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct MessageBus {
    sender: broadcast::Sender<BusFrame>,
}

impl MessageBus {
    /// Create a new bus whose endpoints buffer up to `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Attach a new endpoint.  The endpoint only observes frames sent after
    /// this call.
    pub fn endpoint(&self) -> BusEndpoint {
        BusEndpoint {
            sender: self.sender.clone(),
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish a frame without holding an endpoint (tooling/tests).
    ///
    /// # Errors
    ///
    /// Returns [`BinError::Channel`] when no endpoint is attached to receive
    /// the frame.
    pub fn publish(&self, frame: BusFrame) -> Result<usize, BinError> {
        self.sender
            .send(frame)
            .map_err(|e| BinError::Channel(format!("no endpoints attached: {e}")))
    }
}

impl Default for MessageBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// One node's attachment to the bus: a sender plus a private receive buffer.
pub struct BusEndpoint {
    sender: broadcast::Sender<BusFrame>,
    receiver: broadcast::Receiver<BusFrame>,
}

impl BusEndpoint {
    /// Put a frame on the bus.
    ///
    /// # Errors
    ///
    /// Returns [`BinError::Channel`] when the bus has shut down.  Callers on
    /// the control path treat this as a degraded send and fall back to their
    /// timeout, never as a distinct recovery branch.
    pub fn send(&self, frame: BusFrame) -> Result<(), BinError> {
        self.sender
            .send(frame)
            .map(|_| ())
            .map_err(|e| BinError::Channel(format!("bus send failed: {e}")))
    }

    /// Non-blocking poll for the next pending frame.
    ///
    /// Returns `None` when the buffer is empty or the bus has shut down.
    /// A lag (buffer overflow) is logged and skipped so the newest frames
    /// remain reachable.
    pub fn try_recv(&mut self) -> Option<BusFrame> {
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "bus endpoint lagged; oldest frames dropped");
                    continue;
                }
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
            }
        }
    }

    /// Wait for the next frame.  Returns `None` once the bus has shut down.
    pub async fn recv(&mut self) -> Option<BusFrame> {
        loop {
            match self.receiver.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "bus endpoint lagged; oldest frames dropped");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
