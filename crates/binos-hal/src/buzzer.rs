//! Generic `Buzzer` trait for the audible alert sounder.
//!
//! The controller never sleeps while the buzzer is energized: pulse
//! durations (acknowledgment chirp, full alert) are deadlines checked on
//! later control-loop ticks.

use binos_types::BinError;

/// A discrete on/off sounder.
pub trait Buzzer: Send + Sync {
    /// Stable identifier, e.g. `"buzzer_front"`.
    fn id(&self) -> &str;

    /// Drive the sounder (`true` = energized).
    ///
    /// # Errors
    ///
    /// Returns [`BinError::HardwareFault`] if the command cannot be applied.
    fn set_state(&mut self, active: bool) -> Result<(), BinError>;

    /// Current state (`true` = energized).
    fn state(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockBuzzer {
        id: String,
        state: bool,
    }

    impl Buzzer for MockBuzzer {
        fn id(&self) -> &str {
            &self.id
        }

        fn set_state(&mut self, active: bool) -> Result<(), BinError> {
            self.state = active;
            Ok(())
        }

        fn state(&self) -> bool {
            self.state
        }
    }

    #[test]
    fn mock_buzzer_toggle() {
        let mut b = MockBuzzer {
            id: "buzzer_front".to_string(),
            state: false,
        };
        assert_eq!(b.id(), "buzzer_front");
        assert!(!b.state());

        b.set_state(true).unwrap();
        assert!(b.state());

        b.set_state(false).unwrap();
        assert!(!b.state());
    }
}
