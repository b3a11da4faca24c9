//! Sweep characterization: polarity, wrap-around, and robust range bounds.
//!
//! All functions are pure. Bounds are returned in the inverted convention the
//! calculator expects, so the same `max_hardware_value - raw` transform applies
//! to every incoming sample.

use serde::{Deserialize, Serialize};

use crate::stats::{deltas, median};

/// Deltas smaller than this are never treated as a wrap, whatever the median.
const MIN_ROLLOVER_JUMP: i32 = 10;
/// A wrap jump is at least this many times the typical step.
const ROLLOVER_MEDIAN_FACTOR: i32 = 3;
/// A wrap jump spans at least this share of the ADC range.
const ROLLOVER_SCALE_FRACTION: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SweepAnalysis {
    pub inverted: bool,
    pub rollover: bool,
}

/// Characterize a chronological full-range sweep.
///
/// Inversion uses the median delta so jitter reversals do not flip it. A
/// rollover is an abrupt jump far larger than the typical step and close to
/// full scale; only a wrap produces that. Fewer than two samples yield the
/// default (not inverted, no rollover).
pub fn analyze_sweep(samples: &[i32], max_hardware_value: i32) -> SweepAnalysis {
    if samples.len() < 2 {
        return SweepAnalysis::default();
    }

    let d = deltas(samples);
    let inverted = median(&d).is_some_and(|m| m < 0);

    let abs: Vec<i32> = d.iter().map(|x| x.saturating_abs()).collect();
    let median_delta = median(&abs).unwrap_or(0);
    let max_delta = abs.iter().copied().max().unwrap_or(0);

    let jump_threshold = median_delta
        .saturating_mul(ROLLOVER_MEDIAN_FACTOR)
        .max(MIN_ROLLOVER_JUMP);
    let rollover = max_delta > jump_threshold
        && f64::from(max_delta) > ROLLOVER_SCALE_FRACTION * f64::from(max_hardware_value);

    tracing::debug!(
        samples = samples.len(),
        median_delta,
        max_delta,
        inverted,
        rollover,
        "sweep analyzed"
    );

    SweepAnalysis { inverted, rollover }
}

#[inline]
fn apply_inversion(value: i32, max_hardware_value: i32, inverted: bool) -> i32 {
    if inverted {
        max_hardware_value - value
    } else {
        value
    }
}

/// Robust lower bound from the samples collected at the physical minimum.
pub fn calculate_min(min_samples: &[i32], max_hardware_value: i32, inverted: bool) -> Option<i32> {
    median(min_samples).map(|m| apply_inversion(m, max_hardware_value, inverted))
}

/// Robust upper bound from the resting samples at both ends.
///
/// With rollover, the path from minimum to maximum crosses the wrap: when the
/// effective maximum lands below the effective minimum it is lifted by one full
/// ADC cycle, so the stored range covers the `max_hardware_value - min + 1`
/// codes before the wrap plus the codes after it.
pub fn calculate_max(
    min_samples: &[i32],
    max_samples: &[i32],
    max_hardware_value: i32,
    analysis: SweepAnalysis,
) -> Option<i32> {
    let effective_min = calculate_min(min_samples, max_hardware_value, analysis.inverted)?;
    let effective_max =
        median(max_samples).map(|m| apply_inversion(m, max_hardware_value, analysis.inverted))?;

    if analysis.rollover && effective_max < effective_min {
        let wrapped_segment = max_hardware_value - effective_min + 1;
        Some(effective_min + wrapped_segment + effective_max)
    } else {
        Some(effective_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increasing_sweep_is_plain() {
        let s: Vec<i32> = (0..100).map(|i| 50 + i * 8).collect();
        assert_eq!(analyze_sweep(&s, 1023), SweepAnalysis::default());
    }

    #[test]
    fn decreasing_sweep_is_inverted() {
        let s: Vec<i32> = (0..100).map(|i| 900 - i * 8).collect();
        let a = analyze_sweep(&s, 1023);
        assert!(a.inverted);
        assert!(!a.rollover);
    }

    #[test]
    fn wrap_jump_is_rollover() {
        let s = [1000, 1005, 1010, 1015, 1020, 1022, 1023, 0, 5, 10, 15];
        let a = analyze_sweep(&s, 1023);
        assert!(a.rollover);
        assert!(!a.inverted);
    }

    #[test]
    fn short_sweeps_default() {
        assert_eq!(analyze_sweep(&[], 1023), SweepAnalysis::default());
        assert_eq!(analyze_sweep(&[1023], 1023), SweepAnalysis::default());
    }

    #[test]
    fn large_but_not_full_scale_jump_is_not_rollover() {
        // 600-code jump is abrupt but below 80% of full scale.
        let s = [100, 110, 120, 720, 730, 740];
        assert!(!analyze_sweep(&s, 1023).rollover);
    }

    #[test]
    fn jitter_does_not_flip_polarity() {
        let s = [100, 120, 118, 140, 160, 158, 180, 200];
        assert!(!analyze_sweep(&s, 1023).inverted);
    }

    #[test]
    fn min_and_max_follow_inversion() {
        let min = [900, 901, 899, 900, 902];
        let max = [100, 99, 101, 100, 100];
        let a = SweepAnalysis {
            inverted: true,
            rollover: false,
        };
        assert_eq!(calculate_min(&min, 1023, true), Some(123));
        assert_eq!(calculate_max(&min, &max, 1023, a), Some(923));
    }

    #[test]
    fn rollover_lifts_max_past_the_wrap() {
        let min = [1000, 1000, 1001];
        let max = [20, 21, 20];
        let a = SweepAnalysis {
            inverted: false,
            rollover: true,
        };
        let lo = calculate_min(&min, 1023, false).unwrap();
        let hi = calculate_max(&min, &max, 1023, a).unwrap();
        assert_eq!(lo, 1000);
        assert_eq!(hi, 20 + 1024);
        // 24 codes before the wrap plus 20 after it.
        assert_eq!(hi - lo, 44);
    }

    #[test]
    fn empty_phases_have_no_bounds() {
        assert_eq!(calculate_min(&[], 1023, false), None);
        assert_eq!(
            calculate_max(&[1, 2], &[], 1023, SweepAnalysis::default()),
            None
        );
    }
}
