//! Compartment fill estimation.
//!
//! Converts raw sensor samples into a normalized fill fraction:
//!
//! - **Distance** – time-of-flight reading mapped linearly between the
//!   configured "empty" and "full" distances, clamped to `[0, 1]`.
//! - **Weight** – load-cell reading divided by the rated capacity.
//!
//! The two sources are fused by simple substitution: whichever sample is
//! applied last drives the estimate (the controller applies weight first,
//! then distance, so distance is authoritative when both are available).
//! They are deliberately not combined.
//!
//! Full/not-full is a hard threshold on the fill fraction with no hysteresis
//! band; oscillation across the threshold is tolerated by the controller.
//!
//! # Example
//!
//! ```rust
//! use binos_controller::level::{LevelConfig, LevelEstimator};
//!
//! let mut level = LevelEstimator::new(LevelConfig::default());
//! level.update_distance(5.0); // waste surface right under the sensor
//! assert!(level.is_full());
//! ```

use serde::{Deserialize, Serialize};

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Calibration for one compartment's fill estimate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelConfig {
    /// Distance reading of an empty compartment (centimetres).
    pub empty_cm: f32,
    /// Distance reading of a full compartment (centimetres).
    pub full_cm: f32,
    /// Rated capacity used to normalize weight samples (kilograms).
    pub capacity_kg: f32,
    /// Fill fraction at or above which the compartment counts as full.
    pub full_threshold: f32,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            empty_cm: 50.0,
            full_cm: 5.0,
            capacity_kg: 10.0,
            full_threshold: 0.9,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LevelEstimator
// ────────────────────────────────────────────────────────────────────────────

/// Per-compartment fill estimator.
///
/// Feed samples via [`update_distance`][Self::update_distance] and
/// [`update_weight`][Self::update_weight]; a failed sensor read is simply
/// not fed in, and the last estimate is retained.
#[derive(Debug, Clone)]
pub struct LevelEstimator {
    config: LevelConfig,
    fill: f32,
}

impl LevelEstimator {
    /// Create an estimator reading empty.
    pub fn new(config: LevelConfig) -> Self {
        Self { config, fill: 0.0 }
    }

    /// Map a distance reading to a fill fraction without mutating state.
    pub fn fill_from_distance(&self, distance_cm: f32) -> f32 {
        let span = self.config.empty_cm - self.config.full_cm;
        if span <= 0.0 {
            return 0.0;
        }
        ((self.config.empty_cm - distance_cm) / span).clamp(0.0, 1.0)
    }

    /// Apply a distance sample; becomes the current estimate.
    pub fn update_distance(&mut self, distance_cm: f32) {
        self.fill = self.fill_from_distance(distance_cm);
    }

    /// Apply a weight sample; becomes the current estimate until the next
    /// sample (of either kind) replaces it.
    pub fn update_weight(&mut self, weight_kg: f32) {
        if self.config.capacity_kg <= 0.0 {
            return;
        }
        self.fill = (weight_kg / self.config.capacity_kg).clamp(0.0, 1.0);
    }

    /// Current fill fraction in `[0, 1]`.
    pub fn fill(&self) -> f32 {
        self.fill
    }

    /// Hard-threshold full flag.
    pub fn is_full(&self) -> bool {
        self.fill >= self.config.full_threshold
    }

    /// Current estimate expressed as weight against the rated capacity, used
    /// in backend fill reports.
    pub fn weight_kg(&self) -> f32 {
        self.fill * self.config.capacity_kg
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
