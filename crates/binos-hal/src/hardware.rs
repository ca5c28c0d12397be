//! [`BinHardware`] – the complete driver bundle a controller owns.
//!
//! The controller takes exclusive ownership of every driver; external
//! components never receive a handle into this bundle.  Per-compartment
//! sensing is independent: each compartment carries its own range sensor
//! (and optionally its own load cell).

use crate::buzzer::Buzzer;
use crate::lid::Lid;
use crate::sensors::{MotionSensor, RangeSensor, WeightSensor};

/// Drivers belonging to a single compartment.
pub struct CompartmentHardware {
    /// The servo-driven lid.
    pub lid: Box<dyn Lid>,
    /// Time-of-flight sensor looking down into the compartment.
    pub range: Box<dyn RangeSensor>,
    /// Optional load cell under the compartment.
    pub weight: Option<Box<dyn WeightSensor>>,
}

/// Every driver the bin controller commands or samples.
pub struct BinHardware {
    pub organic: CompartmentHardware,
    pub non_organic: CompartmentHardware,
    /// Presence detector covering the deposit chute.
    pub motion: Box<dyn MotionSensor>,
    /// Audible alert sounder.
    pub buzzer: Box<dyn Buzzer>,
}
