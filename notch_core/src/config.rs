//! Runtime parameters for the calibration sessions.
//!
//! These are the structs the sessions consume. They are separate from the
//! TOML-deserialized config in `notch_config`; see `conversions`.

use std::time::Duration;

/// Guards for the hardware calibration wizard.
#[derive(Debug, Clone)]
pub struct HardwareParams {
    /// Highest code the ADC can produce (1023 for 10-bit).
    pub max_hardware_value: i32,
    /// Samples required before leaving a collecting phase.
    pub min_samples: usize,
    /// Distinct values required before leaving a collecting phase.
    pub min_distinct: usize,
    /// Samples required before leaving the sweep.
    pub sweep_min_samples: usize,
}

impl Default for HardwareParams {
    fn default() -> Self {
        Self {
            max_hardware_value: 1023,
            min_samples: 10,
            min_distinct: 3,
            sweep_min_samples: 10,
        }
    }
}

/// Sweep parameters for autonomous lever calibration.
#[derive(Debug, Clone)]
pub struct LeverParams {
    /// Step size as a fraction of the lever range.
    pub step_fraction: f64,
    /// Pause between steps; the engine's only rate limit on the simulator.
    pub step_delay: Duration,
    /// Float comparison tolerance in the simulator domain.
    pub tolerance: f64,
}

impl Default for LeverParams {
    fn default() -> Self {
        Self {
            step_fraction: 0.01,
            step_delay: Duration::from_millis(10),
            tolerance: 0.001,
        }
    }
}

/// Capture guards for notch mapping.
#[derive(Debug, Clone)]
pub struct MappingParams {
    /// Samples required before a capture may commit.
    pub min_samples: usize,
    /// Decimal places kept in the saved input fractions.
    pub decimals: u32,
}

impl Default for MappingParams {
    fn default() -> Self {
        Self {
            min_samples: 10,
            decimals: 4,
        }
    }
}
