//! Records shared by the analyzer, calculator, and sessions.

use serde::{Deserialize, Serialize};

pub type InputId = i64;
pub type LeverConfigId = i64;

/// Physical input address on the serial bridge.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PinRef {
    pub port: String,
    pub pin: u8,
}

impl PinRef {
    pub fn new(port: impl Into<String>, pin: u8) -> Self {
        Self {
            port: port.into(),
            pin,
        }
    }
}

impl std::fmt::Display for PinRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.port, self.pin)
    }
}

/// One ADC reading delivered by the serial collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    pub port: String,
    pub pin: u8,
    pub value: i32,
}

impl RawSample {
    pub fn new(pin: &PinRef, value: i32) -> Self {
        Self {
            port: pin.port.clone(),
            pin: pin.pin,
            value,
        }
    }

    #[inline]
    pub fn is_for(&self, pin: &PinRef) -> bool {
        self.pin == pin.pin && self.port == pin.port
    }
}

/// Per-input record translating raw ADC codes into `0..=total_travel`.
///
/// `min_value`/`max_value` are stored after inversion; with rollover,
/// `max_value` may exceed `max_hardware_value` so that the wrapped segment is
/// reachable from `min_value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calibration {
    pub input_id: InputId,
    pub min_value: i32,
    pub max_value: i32,
    pub max_hardware_value: i32,
    pub is_inverted: bool,
    pub has_rollover: bool,
}

impl Calibration {
    /// Width of the calibrated domain; zero for degenerate records.
    #[inline]
    pub fn total_travel(&self) -> i32 {
        self.max_value.saturating_sub(self.min_value).max(0)
    }
}

/// How the simulator treats a notch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NotchKind {
    /// Fixed detent with one canonical value.
    Gate { value: f64 },
    /// Continuous segment reflecting back what was written.
    Linear { min_value: f64, max_value: f64 },
}

impl NotchKind {
    pub fn name(&self) -> &'static str {
        match self {
            NotchKind::Gate { .. } => "gate",
            NotchKind::Linear { .. } => "linear",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notch {
    pub index: usize,
    #[serde(flatten)]
    pub kind: NotchKind,
    /// Fraction of input travel selecting this notch, once mapped.
    pub input_min: Option<f64>,
    pub input_max: Option<f64>,
}

impl Notch {
    pub fn new(index: usize, kind: NotchKind) -> Self {
        Self {
            index,
            kind,
            input_min: None,
            input_max: None,
        }
    }
}

/// Simulator endpoint paths for one lever.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverEndpoints {
    pub value: String,
    pub min_value: String,
    pub max_value: String,
    pub notch_count: String,
    pub notch_index: String,
}

impl LeverEndpoints {
    /// Endpoints following the `<base>.InputValue` naming of simulator levers.
    pub fn from_base(base: &str) -> Self {
        Self {
            value: format!("{base}.InputValue"),
            min_value: format!("{base}.MinInput"),
            max_value: format!("{base}.MaxInput"),
            notch_count: format!("{base}.NotchCount"),
            notch_index: format!("{base}.CurrentNotch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeverConfig {
    pub id: LeverConfigId,
    pub endpoints: LeverEndpoints,
    /// Ordered by `index`.
    pub notches: Vec<Notch>,
}

/// Input slice learned for one notch by the mapping wizard.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NotchInputRange {
    pub notch_index: usize,
    pub input_min: f64,
    pub input_max: f64,
}
