//! Generic `Lid` trait for the servo-driven compartment lids.
//!
//! Drivers implement this trait and are bundled into a
//! [`BinHardware`][crate::hardware::BinHardware].  The controller only ever
//! talks to the trait, so a bench simulator and a real servo driver are
//! interchangeable.

use binos_types::{BinError, LidPosition};

/// A position-commanded compartment lid.
pub trait Lid: Send + Sync {
    /// Stable identifier for this lid, e.g. `"lid_organic"`.
    fn id(&self) -> &str;

    /// Command the lid to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`BinError::HardwareFault`] if the command cannot be applied
    /// (e.g. the servo driver reports a stall).
    fn set_position(&mut self, target: LidPosition) -> Result<(), BinError>;

    /// The last commanded position.
    fn position(&self) -> LidPosition;
}
