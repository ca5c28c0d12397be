//! Generic `Camera` trait for the classifier node's image capture.

use binos_types::BinError;

/// A JPEG-encoded frame as produced by the camera module.
///
/// The classifier forwards `data` verbatim to the classification service;
/// nothing in this repository decodes it.
#[derive(Debug, Clone)]
pub struct JpegFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// JPEG-compressed image bytes.
    pub data: Vec<u8>,
}

/// An image-capture device.
pub trait Camera: Send + Sync {
    /// Stable identifier, e.g. `"cam_chute"`.
    fn id(&self) -> &str;

    /// Capture and return one frame.
    ///
    /// # Errors
    ///
    /// Returns [`BinError::HardwareFault`] if no frame buffer is available.
    fn capture(&mut self) -> Result<JpegFrame, BinError>;
}
