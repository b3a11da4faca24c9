//! Raw sample → calibrated value.

use crate::types::Calibration;

/// Map a raw ADC reading into `0..=calibration.total_travel()`.
///
/// Order matters: inversion runs before the wrap correction because the stored
/// bounds are already inverted.
pub fn normalize(raw: i32, calibration: &Calibration) -> i32 {
    let mut value = if calibration.is_inverted {
        calibration.max_hardware_value - raw
    } else {
        raw
    };

    if calibration.has_rollover && value < calibration.min_value {
        value = value.saturating_add(calibration.max_hardware_value + 1);
    }

    let lo = calibration.min_value;
    let hi = calibration.max_value.max(lo);
    value.clamp(lo, hi) - lo
}

/// Width of the calibrated domain.
#[inline]
pub fn total_travel(calibration: &Calibration) -> i32 {
    calibration.total_travel()
}

/// Calibrated value as a fraction of travel; zero-travel records map to 0.0.
pub fn fraction(value: i32, calibration: &Calibration) -> f64 {
    let travel = calibration.total_travel();
    if travel == 0 {
        return 0.0;
    }
    (f64::from(value) / f64::from(travel)).clamp(0.0, 1.0)
}
