//! `From` implementations bridging `notch_config` types to `notch_core` types.

use std::time::Duration;

use crate::config::{HardwareParams, LeverParams, MappingParams};
use crate::types::Calibration;

// ── HardwareParams ───────────────────────────────────────────────────────────

impl From<&notch_config::Hardware> for HardwareParams {
    fn from(c: &notch_config::Hardware) -> Self {
        Self {
            max_hardware_value: c.max_hardware_value,
            min_samples: c.min_samples,
            min_distinct: c.min_distinct,
            sweep_min_samples: c.sweep_min_samples,
        }
    }
}

// ── LeverParams ──────────────────────────────────────────────────────────────

impl From<&notch_config::LeverCfg> for LeverParams {
    fn from(c: &notch_config::LeverCfg) -> Self {
        Self {
            step_fraction: c.step_fraction,
            step_delay: Duration::from_millis(c.step_delay_ms),
            tolerance: c.tolerance,
        }
    }
}

// ── MappingParams ────────────────────────────────────────────────────────────

impl From<&notch_config::MappingCfg> for MappingParams {
    fn from(c: &notch_config::MappingCfg) -> Self {
        Self {
            min_samples: c.min_samples,
            decimals: c.decimals,
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl Calibration {
    /// Build from a persisted record; `default_max_hardware_value` fills in
    /// the ADC ceiling when the record omits it.
    pub fn from_persisted(
        c: &notch_config::PersistedCalibration,
        default_max_hardware_value: i32,
    ) -> Self {
        Self {
            input_id: c.input_id,
            min_value: c.min_value,
            max_value: c.max_value,
            max_hardware_value: c.max_hardware_value.unwrap_or(default_max_hardware_value),
            is_inverted: c.is_inverted,
            has_rollover: c.has_rollover,
        }
    }

    /// The config's `[calibration]` record, if present.
    pub fn from_config(c: &notch_config::Config) -> Option<Self> {
        c.calibration
            .as_ref()
            .map(|p| Self::from_persisted(p, c.hardware.max_hardware_value))
    }
}
