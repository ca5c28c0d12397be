use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Controller state machine states.  Exactly one holds at any instant; only
/// the controller's transition function mutates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BinState {
    Idle,
    DetectingMotion,
    AnalyzingMaterial,
    OpeningBin,
    BinOpen,
    ClosingBin,
    BinFull,
    Maintenance,
}

/// Waste material verdict.  Closed variant validated at the protocol
/// boundary: any unrecognized wire label converts to `Unknown` rather than
/// propagating a free-form string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Material {
    Organic,
    NonOrganic,
    Unknown,
}

impl Material {
    /// Wire label used in bus payloads and the classification service JSON.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Material::Organic => "ORGANIC",
            Material::NonOrganic => "NON_ORGANIC",
            Material::Unknown => "UNKNOWN",
        }
    }

    /// Parse a wire label.  Unrecognized labels resolve to `Unknown`.
    pub fn from_wire(label: &str) -> Self {
        match label {
            "ORGANIC" => Material::Organic,
            "NON_ORGANIC" => Material::NonOrganic,
            _ => Material::Unknown,
        }
    }
}

/// Identity of one of the two compartments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum CompartmentId {
    Organic,
    NonOrganic,
}

impl CompartmentId {
    /// Backend identifier inherited from the deployed fleet ("0x001" organic,
    /// "0x002" non-organic).
    pub fn backend_id(&self) -> &'static str {
        match self {
            CompartmentId::Organic => "0x001",
            CompartmentId::NonOrganic => "0x002",
        }
    }

    /// Lowercase label used in API parameters and log fields.
    pub fn label(&self) -> &'static str {
        match self {
            CompartmentId::Organic => "organic",
            CompartmentId::NonOrganic => "non_organic",
        }
    }

    /// The other compartment.
    pub fn other(&self) -> Self {
        match self {
            CompartmentId::Organic => CompartmentId::NonOrganic,
            CompartmentId::NonOrganic => CompartmentId::Organic,
        }
    }
}

/// Commanded lid position.  Always reflects the last command issued through
/// the controller; there is no direct actuator access bypassing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LidPosition {
    Closed,
    Open,
}

// ---------------------------------------------------------------------------
// Bus frames
// ---------------------------------------------------------------------------

/// Frame identifier reserved for classification requests.
pub const CLASSIFY_REQUEST_ID: u32 = 0x100;
/// Frame identifier reserved for classification responses.
pub const CLASSIFY_RESPONSE_ID: u32 = 0x200;
/// Fixed command payload of a classification request.
pub const DETECT_MATERIAL: &str = "DETECT_MATERIAL";
/// Payload prefix of a classification response.
pub const MATERIAL_PREFIX: &str = "MATERIAL:";

/// An addressed message on the inter-node bus: identifier + ASCII payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusFrame {
    pub id: u32,
    pub payload: String,
}

impl BusFrame {
    /// Build the `DETECT_MATERIAL` request frame.
    pub fn classify_request() -> Self {
        Self {
            id: CLASSIFY_REQUEST_ID,
            payload: DETECT_MATERIAL.to_string(),
        }
    }

    /// Build a `MATERIAL:<label>` response frame for `material`.
    pub fn classify_response(material: Material) -> Self {
        Self {
            id: CLASSIFY_RESPONSE_ID,
            payload: format!("{MATERIAL_PREFIX}{}", material.as_wire()),
        }
    }

    /// `true` if this frame is a classification request addressed to the
    /// classifier node.
    pub fn is_classify_request(&self) -> bool {
        self.id == CLASSIFY_REQUEST_ID && self.payload == DETECT_MATERIAL
    }

    /// Extract the material verdict carried by a response frame.
    ///
    /// Returns `None` when the identifier is not the response channel or the
    /// payload lacks the `MATERIAL:` prefix.  A well-formed response with an
    /// unrecognized label yields `Some(Material::Unknown)`.
    pub fn material(&self) -> Option<Material> {
        if self.id != CLASSIFY_RESPONSE_ID {
            return None;
        }
        self.payload
            .strip_prefix(MATERIAL_PREFIX)
            .map(Material::from_wire)
    }
}

// ---------------------------------------------------------------------------
// Snapshots and reports
// ---------------------------------------------------------------------------

/// Immutable status copy handed to external readers (status surface, logs).
/// Never exposes a mutable handle into the controller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusSnapshot {
    pub state: BinState,
    pub organic_fill: f32,
    pub organic_full: bool,
    pub non_organic_fill: f32,
    pub non_organic_full: bool,
}

/// Fill report POSTed to the backend once per close cycle.  Fire-and-forget:
/// a failed report is logged and discarded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FillReport {
    pub report_id: Uuid,
    pub bin_organic_id: String,
    pub bin_non_organic_id: String,
    pub organic_weight: f32,
    pub non_organic_weight: f32,
    pub organic_full: bool,
    pub non_organic_full: bool,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Manual commands
// ---------------------------------------------------------------------------

/// Operator command delivered through the status surface.  Validated against
/// the current full/interlock state before being honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", content = "compartment", rename_all = "snake_case")]
pub enum ManualCommand {
    Open(CompartmentId),
    Close(CompartmentId),
    ToggleMaintenance,
}

/// Why a manual command was refused.  Returned to the caller; never a silent
/// no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Target compartment is at or above the full threshold.
    CompartmentFull,
    /// Target lid is already open.
    AlreadyOpen,
    /// Target lid is not open.
    NotOpen,
    /// The automatic cycle owns the lids this tick.
    CycleActive,
}

impl RejectReason {
    /// Stable reason code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::CompartmentFull => "compartment_full",
            RejectReason::AlreadyOpen => "already_open",
            RejectReason::NotOpen => "not_open",
            RejectReason::CycleActive => "cycle_active",
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Global error type spanning sensor faults, bus faults, service failures,
/// and command rejections.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum BinError {
    #[error("Sensor unavailable: {sensor}: {details}")]
    SensorUnavailable { sensor: String, details: String },

    #[error("Hardware fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Bus channel error: {0}")]
    Channel(String),

    #[error("Classification service error: {0}")]
    Service(String),

    #[error("Command rejected: {0}")]
    Rejected(RejectReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn material_wire_roundtrip() {
        for m in [Material::Organic, Material::NonOrganic, Material::Unknown] {
            assert_eq!(Material::from_wire(m.as_wire()), m);
        }
    }

    #[test]
    fn unrecognized_label_converts_to_unknown() {
        assert_eq!(Material::from_wire("PLASTIC"), Material::Unknown);
        assert_eq!(Material::from_wire(""), Material::Unknown);
        assert_eq!(Material::from_wire("organic"), Material::Unknown);
    }

    #[test]
    fn request_frame_shape() {
        let frame = BusFrame::classify_request();
        assert_eq!(frame.id, 0x100);
        assert_eq!(frame.payload, "DETECT_MATERIAL");
        assert!(frame.is_classify_request());
    }

    #[test]
    fn response_frame_carries_material() {
        let frame = BusFrame::classify_response(Material::NonOrganic);
        assert_eq!(frame.id, 0x200);
        assert_eq!(frame.payload, "MATERIAL:NON_ORGANIC");
        assert_eq!(frame.material(), Some(Material::NonOrganic));
    }

    #[test]
    fn material_ignores_foreign_identifier() {
        let frame = BusFrame {
            id: 0x300,
            payload: "MATERIAL:ORGANIC".to_string(),
        };
        assert_eq!(frame.material(), None);
    }

    #[test]
    fn material_ignores_missing_prefix() {
        let frame = BusFrame {
            id: CLASSIFY_RESPONSE_ID,
            payload: "ORGANIC".to_string(),
        };
        assert_eq!(frame.material(), None);
    }

    #[test]
    fn malformed_label_resolves_to_unknown() {
        let frame = BusFrame {
            id: CLASSIFY_RESPONSE_ID,
            payload: "MATERIAL:styrofoam".to_string(),
        };
        assert_eq!(frame.material(), Some(Material::Unknown));
    }

    #[test]
    fn snapshot_serializes_with_expected_fields() {
        let snapshot = StatusSnapshot {
            state: BinState::BinOpen,
            organic_fill: 0.25,
            organic_full: false,
            non_organic_fill: 0.9,
            non_organic_full: true,
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"state\":\"bin_open\""));
        assert!(json.contains("\"non_organic_full\":true"));
        let back: StatusSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn fill_report_roundtrip() {
        let report = FillReport {
            report_id: Uuid::new_v4(),
            bin_organic_id: CompartmentId::Organic.backend_id().to_string(),
            bin_non_organic_id: CompartmentId::NonOrganic.backend_id().to_string(),
            organic_weight: 4.2,
            non_organic_weight: 9.1,
            organic_full: false,
            non_organic_full: true,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: FillReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.report_id, report.report_id);
        assert_eq!(back.bin_organic_id, "0x001");
        assert_eq!(back.bin_non_organic_id, "0x002");
    }

    #[test]
    fn manual_command_roundtrip() {
        let cmd = ManualCommand::Open(CompartmentId::NonOrganic);
        let json = serde_json::to_string(&cmd).unwrap();
        let back: ManualCommand = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cmd);
    }

    #[test]
    fn reject_reason_codes_are_stable() {
        assert_eq!(RejectReason::CompartmentFull.code(), "compartment_full");
        assert_eq!(RejectReason::NotOpen.code(), "not_open");
    }

    #[test]
    fn bin_error_display() {
        let err = BinError::Rejected(RejectReason::CompartmentFull);
        assert!(err.to_string().contains("compartment_full"));

        let err2 = BinError::SensorUnavailable {
            sensor: "range_organic".to_string(),
            details: "echo timeout".to_string(),
        };
        assert!(err2.to_string().contains("range_organic"));
    }
}
