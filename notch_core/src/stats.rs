//! Integer statistics over raw ADC samples.
//!
//! Everything stays in integer ADC codes; medians use 64-bit intermediates so
//! no combination of `i32` inputs can overflow.

/// Average of two i32 values, rounded to nearest with ties away from zero.
/// Uses 64-bit intermediates; cannot overflow.
#[inline]
pub fn avg2_round_nearest_i32(a: i32, b: i32) -> i32 {
    let s = i64::from(a) + i64::from(b);
    let avg = if s >= 0 { (s + 1) / 2 } else { (s - 1) / 2 };
    // |avg| <= max(|a|, |b|) so the narrowing is lossless.
    i32::try_from(avg).unwrap_or(if avg < 0 { i32::MIN } else { i32::MAX })
}

/// Median of `values`, or `None` when empty.
///
/// Odd lengths return the middle element; even lengths average the two middle
/// elements with [`avg2_round_nearest_i32`].
pub fn median(values: &[i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted.get(mid).copied()
    } else {
        let lo = sorted.get(mid - 1).copied()?;
        let hi = sorted.get(mid).copied()?;
        Some(avg2_round_nearest_i32(lo, hi))
    }
}

/// Consecutive differences `values[i+1] - values[i]`.
pub fn deltas(values: &[i32]) -> Vec<i32> {
    values
        .windows(2)
        .map(|w| w[1].saturating_sub(w[0]))
        .collect()
}

/// Number of distinct values in `values`.
pub fn distinct_count(values: &[i32]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

/// Round `x` to `decimals` places, half away from zero.
#[inline]
pub fn round_to(x: f64, decimals: u32) -> f64 {
    let scale = 10f64.powi(i32::try_from(decimals).unwrap_or(i32::MAX));
    (x * scale).round() / scale
}
