//! `binos-classifier` – the camera-equipped companion node.
//!
//! Listens on the bus for `DETECT_MATERIAL` requests.  For each request it
//! captures one frame, forwards the JPEG bytes to the classification
//! service, and publishes the verdict as a `MATERIAL:<label>` response.
//!
//! A node that can answer always answers: any failure along the way (frame
//! capture, network, malformed service reply, unrecognized label) publishes
//! `MATERIAL:UNKNOWN` rather than withholding a response.  The controller's
//! timeout exists as a backstop only, not as the primary recovery path.
//!
//! The node is stateless between requests except for an advisory
//! `detecting` flag and the last resolved verdict, both local.

pub mod node;
pub mod service;

pub use node::ClassifierNode;
pub use service::{ServiceError, Verdict, VerdictClient};
