//! Maps `Box<dyn Error>` from the simulator boundary to typed `CalibrationError`.
//!
//! `notch_traits::Simulator` returns `Box<dyn Error + Send + Sync>` so any
//! client can implement it; this module converts those to our typed error enum,
//! with an optional feature-gated path for `notch_hardware::SimError` downcasting.

use crate::error::CalibrationError;

/// Map a simulator-boundary error to a typed `CalibrationError`.
///
/// Attempts to downcast known simulator error types first, then falls back
/// to string-based heuristics.
pub fn map_sim_error(e: &(dyn std::error::Error + 'static)) -> CalibrationError {
    #[cfg(feature = "sim-errors")]
    {
        if let Some(sim) = e.downcast_ref::<notch_hardware::SimError>() {
            return match sim {
                notch_hardware::SimError::Timeout => CalibrationError::SimulatorTimeout,
                other => CalibrationError::Simulator(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    if s.to_lowercase().contains("timeout") {
        CalibrationError::SimulatorTimeout
    } else {
        CalibrationError::Simulator(s)
    }
}
