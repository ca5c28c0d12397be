//! `binos-controller` – the bin-controller node.
//!
//! Owns the decision loop of the bin: motion sensing, the classification
//! exchange with the camera node, actuator sequencing, fullness interlocks,
//! level monitoring, and backend reporting.
//!
//! # Modules
//!
//! - [`machine`] – [`BinController`][machine::BinController]: the state
//!   machine and tick loop; exclusive owner of all mutable bin state.
//! - [`protocol`] – [`ClassificationClient`][protocol::ClassificationClient]:
//!   the single-outstanding request/response exchange over the bus.
//! - [`level`] – [`LevelEstimator`][level::LevelEstimator]: distance/weight
//!   samples to fill fractions and full flags.
//! - [`report`] – [`BackendReporter`][report::BackendReporter]:
//!   fire-and-forget fill reports on each close cycle.
//! - [`telemetry`] – tracing subscriber + optional OTLP export setup.

pub mod level;
pub mod machine;
pub mod protocol;
pub mod report;
pub mod telemetry;

pub use level::{LevelConfig, LevelEstimator};
pub use machine::{BinController, CommandRequest, ControllerConfig, ControllerHandle};
pub use protocol::ClassificationClient;
pub use report::BackendReporter;
