//! In-process simulated drivers for headless tests and CI.
//!
//! Each simulated driver shares its state through a cheap cloneable handle,
//! so a test can keep scripting sensor inputs (and probing actuator outputs)
//! after the controller has taken exclusive ownership of the driver boxes.
//!
//! [`SimBench`] assembles a complete [`BinHardware`] bundle plus the
//! matching [`SimHandles`], letting the full stack run without any GPIO.
//!
//! # Example
//!
//! ```rust
//! use binos_hal::SimBench;
//!
//! let bench = SimBench::new();
//! bench.handles.motion.set_active(true);
//! // bench.hardware is handed to the controller.
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use binos_types::{BinError, LidPosition};

use crate::buzzer::Buzzer;
use crate::camera::{Camera, JpegFrame};
use crate::hardware::{BinHardware, CompartmentHardware};
use crate::lid::Lid;
use crate::sensors::{MotionSensor, RangeSensor, WeightSensor};

/// Distance reported by a fresh sim range sensor (an empty compartment).
const DEFAULT_DISTANCE_CM: f32 = 55.0;

// ---------------------------------------------------------------------------
// Lid
// ---------------------------------------------------------------------------

/// Simulated lid that records the most recent commanded position.
pub struct SimLid {
    id: String,
    position: Arc<Mutex<LidPosition>>,
}

/// Read-side probe for a [`SimLid`].
#[derive(Clone)]
pub struct LidProbe(Arc<Mutex<LidPosition>>);

impl LidProbe {
    /// The last position commanded through the owning driver.
    pub fn position(&self) -> LidPosition {
        *self.0.lock().expect("sim lid lock")
    }
}

impl SimLid {
    /// Create a simulated lid (starting closed) and its probe.
    pub fn new(id: impl Into<String>) -> (Box<Self>, LidProbe) {
        let position = Arc::new(Mutex::new(LidPosition::Closed));
        let probe = LidProbe(Arc::clone(&position));
        (
            Box::new(Self {
                id: id.into(),
                position,
            }),
            probe,
        )
    }
}

impl Lid for SimLid {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_position(&mut self, target: LidPosition) -> Result<(), BinError> {
        *self.position.lock().expect("sim lid lock") = target;
        Ok(())
    }

    fn position(&self) -> LidPosition {
        *self.position.lock().expect("sim lid lock")
    }
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// Simulated presence detector driven by a [`MotionHandle`].
pub struct SimMotionSensor {
    id: String,
    level: Arc<AtomicBool>,
}

/// Write-side handle scripting a [`SimMotionSensor`].
#[derive(Clone)]
pub struct MotionHandle(Arc<AtomicBool>);

impl MotionHandle {
    /// Set the simulated presence level.
    pub fn set_active(&self, active: bool) {
        self.0.store(active, Ordering::Release);
    }
}

impl SimMotionSensor {
    /// Create a simulated motion sensor (initially inactive) and its handle.
    pub fn new(id: impl Into<String>) -> (Box<Self>, MotionHandle) {
        let level = Arc::new(AtomicBool::new(false));
        let handle = MotionHandle(Arc::clone(&level));
        (
            Box::new(Self {
                id: id.into(),
                level,
            }),
            handle,
        )
    }
}

impl MotionSensor for SimMotionSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn active(&mut self) -> bool {
        self.level.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Range
// ---------------------------------------------------------------------------

struct RangeState {
    distance_cm: f32,
    failing: bool,
}

/// Simulated time-of-flight sensor driven by a [`RangeHandle`].
pub struct SimRangeSensor {
    id: String,
    state: Arc<Mutex<RangeState>>,
}

/// Write-side handle scripting a [`SimRangeSensor`].
#[derive(Clone)]
pub struct RangeHandle(Arc<Mutex<RangeState>>);

impl RangeHandle {
    /// Set the simulated distance reading.
    pub fn set_distance_cm(&self, distance_cm: f32) {
        self.0.lock().expect("sim range lock").distance_cm = distance_cm;
    }

    /// Make subsequent reads fail with [`BinError::SensorUnavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.0.lock().expect("sim range lock").failing = failing;
    }
}

impl SimRangeSensor {
    /// Create a simulated range sensor (reading "empty") and its handle.
    pub fn new(id: impl Into<String>) -> (Box<Self>, RangeHandle) {
        let state = Arc::new(Mutex::new(RangeState {
            distance_cm: DEFAULT_DISTANCE_CM,
            failing: false,
        }));
        let handle = RangeHandle(Arc::clone(&state));
        (
            Box::new(Self {
                id: id.into(),
                state,
            }),
            handle,
        )
    }
}

impl RangeSensor for SimRangeSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn distance_cm(&mut self) -> Result<f32, BinError> {
        let state = self.state.lock().expect("sim range lock");
        if state.failing {
            return Err(BinError::SensorUnavailable {
                sensor: self.id.clone(),
                details: "echo timeout (simulated)".to_string(),
            });
        }
        Ok(state.distance_cm)
    }
}

// ---------------------------------------------------------------------------
// Weight
// ---------------------------------------------------------------------------

/// Simulated load cell driven by a [`WeightHandle`].
pub struct SimWeightSensor {
    id: String,
    weight_kg: Arc<Mutex<f32>>,
}

/// Write-side handle scripting a [`SimWeightSensor`].
#[derive(Clone)]
pub struct WeightHandle(Arc<Mutex<f32>>);

impl WeightHandle {
    /// Set the simulated net weight.
    pub fn set_weight_kg(&self, weight_kg: f32) {
        *self.0.lock().expect("sim weight lock") = weight_kg;
    }
}

impl SimWeightSensor {
    /// Create a simulated load cell (reading zero) and its handle.
    pub fn new(id: impl Into<String>) -> (Box<Self>, WeightHandle) {
        let weight_kg = Arc::new(Mutex::new(0.0));
        let handle = WeightHandle(Arc::clone(&weight_kg));
        (
            Box::new(Self {
                id: id.into(),
                weight_kg,
            }),
            handle,
        )
    }
}

impl WeightSensor for SimWeightSensor {
    fn id(&self) -> &str {
        &self.id
    }

    fn weight_kg(&mut self) -> Result<f32, BinError> {
        Ok(*self.weight_kg.lock().expect("sim weight lock"))
    }
}

// ---------------------------------------------------------------------------
// Buzzer
// ---------------------------------------------------------------------------

/// Simulated sounder that records its energized state.
pub struct SimBuzzer {
    id: String,
    state: Arc<AtomicBool>,
}

/// Read-side probe for a [`SimBuzzer`].
#[derive(Clone)]
pub struct BuzzerProbe(Arc<AtomicBool>);

impl BuzzerProbe {
    /// `true` while the sounder is energized.
    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl SimBuzzer {
    /// Create a simulated buzzer (silent) and its probe.
    pub fn new(id: impl Into<String>) -> (Box<Self>, BuzzerProbe) {
        let state = Arc::new(AtomicBool::new(false));
        let probe = BuzzerProbe(Arc::clone(&state));
        (
            Box::new(Self {
                id: id.into(),
                state,
            }),
            probe,
        )
    }
}

impl Buzzer for SimBuzzer {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_state(&mut self, active: bool) -> Result<(), BinError> {
        self.state.store(active, Ordering::Release);
        Ok(())
    }

    fn state(&self) -> bool {
        self.state.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Simulated camera returning a fixed minimal JPEG byte sequence.
pub struct SimCamera {
    id: String,
}

impl SimCamera {
    /// Create a simulated camera with the given identifier.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self { id: id.into() })
    }
}

impl Camera for SimCamera {
    fn id(&self) -> &str {
        &self.id
    }

    fn capture(&mut self) -> Result<JpegFrame, BinError> {
        // SOI + EOI markers only; the service contract never decodes here.
        Ok(JpegFrame {
            width: 640,
            height: 480,
            data: vec![0xFF, 0xD8, 0xFF, 0xD9],
        })
    }
}

// ---------------------------------------------------------------------------
// SimBench
// ---------------------------------------------------------------------------

/// Script/probe handles paired with a simulated [`BinHardware`].
#[derive(Clone)]
pub struct SimHandles {
    pub motion: MotionHandle,
    pub organic_lid: LidProbe,
    pub non_organic_lid: LidProbe,
    pub organic_range: RangeHandle,
    pub non_organic_range: RangeHandle,
    pub organic_weight: WeightHandle,
    pub non_organic_weight: WeightHandle,
    pub buzzer: BuzzerProbe,
}

/// A fully simulated bin: hardware bundle for the controller, handles for
/// the test or bring-up harness.
pub struct SimBench {
    pub hardware: BinHardware,
    pub handles: SimHandles,
}

impl SimBench {
    /// Build a complete simulated bench: both compartments with lids, range
    /// sensors and load cells, one motion sensor, one buzzer.
    pub fn new() -> Self {
        let (organic_lid, organic_lid_probe) = SimLid::new("lid_organic");
        let (non_organic_lid, non_organic_lid_probe) = SimLid::new("lid_non_organic");
        let (organic_range, organic_range_handle) = SimRangeSensor::new("range_organic");
        let (non_organic_range, non_organic_range_handle) =
            SimRangeSensor::new("range_non_organic");
        let (organic_weight, organic_weight_handle) = SimWeightSensor::new("scale_organic");
        let (non_organic_weight, non_organic_weight_handle) =
            SimWeightSensor::new("scale_non_organic");
        let (motion, motion_handle) = SimMotionSensor::new("pir_front");
        let (buzzer, buzzer_probe) = SimBuzzer::new("buzzer_front");

        let hardware = BinHardware {
            organic: CompartmentHardware {
                lid: organic_lid,
                range: organic_range,
                weight: Some(organic_weight),
            },
            non_organic: CompartmentHardware {
                lid: non_organic_lid,
                range: non_organic_range,
                weight: Some(non_organic_weight),
            },
            motion,
            buzzer,
        };

        let handles = SimHandles {
            motion: motion_handle,
            organic_lid: organic_lid_probe,
            non_organic_lid: non_organic_lid_probe,
            organic_range: organic_range_handle,
            non_organic_range: non_organic_range_handle,
            organic_weight: organic_weight_handle,
            non_organic_weight: non_organic_weight_handle,
            buzzer: buzzer_probe,
        };

        Self { hardware, handles }
    }
}

impl Default for SimBench {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_lid_probe_tracks_commands() {
        let (mut lid, probe) = SimLid::new("lid_organic");
        assert_eq!(probe.position(), LidPosition::Closed);
        lid.set_position(LidPosition::Open).unwrap();
        assert_eq!(probe.position(), LidPosition::Open);
    }

    #[test]
    fn sim_motion_handle_drives_sensor() {
        let (mut sensor, handle) = SimMotionSensor::new("pir_front");
        assert!(!sensor.active());
        handle.set_active(true);
        assert!(sensor.active());
        handle.set_active(false);
        assert!(!sensor.active());
    }

    #[test]
    fn sim_range_reads_scripted_distance() {
        let (mut sensor, handle) = SimRangeSensor::new("range_organic");
        handle.set_distance_cm(12.5);
        assert!((sensor.distance_cm().unwrap() - 12.5).abs() < f32::EPSILON);
    }

    #[test]
    fn sim_range_failure_surfaces_sensor_unavailable() {
        let (mut sensor, handle) = SimRangeSensor::new("range_organic");
        handle.set_failing(true);
        assert!(matches!(
            sensor.distance_cm(),
            Err(BinError::SensorUnavailable { .. })
        ));
        handle.set_failing(false);
        assert!(sensor.distance_cm().is_ok());
    }

    #[test]
    fn sim_weight_reads_scripted_value() {
        let (mut sensor, handle) = SimWeightSensor::new("scale_organic");
        handle.set_weight_kg(4.2);
        assert!((sensor.weight_kg().unwrap() - 4.2).abs() < f32::EPSILON);
    }

    #[test]
    fn sim_buzzer_probe_tracks_state() {
        let (mut buzzer, probe) = SimBuzzer::new("buzzer_front");
        assert!(!probe.is_on());
        buzzer.set_state(true).unwrap();
        assert!(probe.is_on());
    }

    #[test]
    fn sim_camera_returns_jpeg_markers() {
        let mut cam = SimCamera::new("cam_chute");
        let frame = cam.capture().unwrap();
        assert!(frame.data.starts_with(&[0xFF, 0xD8]));
        assert!(frame.data.ends_with(&[0xFF, 0xD9]));
    }

    #[test]
    fn sim_bench_builds_complete_hardware() {
        let bench = SimBench::new();
        // Both compartments carry independent sensing.
        assert!(bench.hardware.organic.weight.is_some());
        assert!(bench.hardware.non_organic.weight.is_some());
        assert_eq!(bench.handles.organic_lid.position(), LidPosition::Closed);
        assert!(!bench.handles.buzzer.is_on());
    }
}
