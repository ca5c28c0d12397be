//! Sensor traits: the controller's inputs.
//!
//! Range and weight reads can fail (a time-of-flight echo can time out, a
//! load-cell amplifier can be mid-conversion).  A failed read is surfaced as
//! [`BinError::SensorUnavailable`] and treated by the level monitor as "no
//! new sample" — never fatal.

use binos_types::BinError;

/// A passive-infrared style presence detector.
///
/// A digital level read; it cannot meaningfully fail, so the sample is
/// returned directly.
pub trait MotionSensor: Send + Sync {
    /// Stable identifier, e.g. `"pir_front"`.
    fn id(&self) -> &str;

    /// `true` while the sensor currently reports presence.
    fn active(&mut self) -> bool;
}

/// A time-of-flight distance sensor looking down into one compartment.
pub trait RangeSensor: Send + Sync {
    /// Stable identifier, e.g. `"range_organic"`.
    fn id(&self) -> &str;

    /// Measured distance to the waste surface in centimetres.
    ///
    /// # Errors
    ///
    /// Returns [`BinError::SensorUnavailable`] when no echo was received
    /// within the module's timeout.
    fn distance_cm(&mut self) -> Result<f32, BinError>;
}

/// A load-cell weight sensor under one compartment.
pub trait WeightSensor: Send + Sync {
    /// Stable identifier, e.g. `"scale_organic"`.
    fn id(&self) -> &str;

    /// Measured net weight in kilograms.
    ///
    /// # Errors
    ///
    /// Returns [`BinError::SensorUnavailable`] when the amplifier has no
    /// sample ready.
    fn weight_kg(&mut self) -> Result<f32, BinError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockRange {
        id: String,
        reading: Option<f32>,
    }

    impl RangeSensor for MockRange {
        fn id(&self) -> &str {
            &self.id
        }

        fn distance_cm(&mut self) -> Result<f32, BinError> {
            self.reading.ok_or_else(|| BinError::SensorUnavailable {
                sensor: self.id.clone(),
                details: "echo timeout".to_string(),
            })
        }
    }

    #[test]
    fn mock_range_returns_reading() {
        let mut r = MockRange {
            id: "range_organic".to_string(),
            reading: Some(42.0),
        };
        assert!((r.distance_cm().unwrap() - 42.0).abs() < f32::EPSILON);
    }

    #[test]
    fn mock_range_surfaces_unavailable() {
        let mut r = MockRange {
            id: "range_organic".to_string(),
            reading: None,
        };
        assert!(matches!(
            r.distance_cm(),
            Err(BinError::SensorUnavailable { .. })
        ));
    }
}
