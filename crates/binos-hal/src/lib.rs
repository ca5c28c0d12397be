//! `binos-hal` – hardware abstraction for the bin nodes.
//!
//! The controller and classifier only ever talk to the traits in this crate,
//! so drivers can be swapped (GPIO servos, I2C time-of-flight modules, the
//! in-process simulators) without touching control logic.
//!
//! # Modules
//!
//! - [`lid`] – [`Lid`][lid::Lid]: position-commanded compartment lid.
//! - [`sensors`] – [`MotionSensor`][sensors::MotionSensor],
//!   [`RangeSensor`][sensors::RangeSensor],
//!   [`WeightSensor`][sensors::WeightSensor]: the controller's inputs.
//! - [`buzzer`] – [`Buzzer`][buzzer::Buzzer]: discrete on/off sounder.
//! - [`camera`] – [`Camera`][camera::Camera]: JPEG frame capture for the
//!   classifier node.
//! - [`hardware`] – [`BinHardware`][hardware::BinHardware]: the full driver
//!   bundle a controller owns.
//! - [`sim`] – simulated drivers with shared-state handles for headless
//!   tests and CI.

pub mod buzzer;
pub mod camera;
pub mod hardware;
pub mod lid;
pub mod sensors;
pub mod sim;

pub use buzzer::Buzzer;
pub use camera::{Camera, JpegFrame};
pub use hardware::{BinHardware, CompartmentHardware};
pub use lid::Lid;
pub use sensors::{MotionSensor, RangeSensor, WeightSensor};
pub use sim::{SimBench, SimHandles};
