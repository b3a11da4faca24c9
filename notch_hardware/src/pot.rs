//! Simulated potentiometer behind a 10-bit ADC.
//!
//! Produces the three sample phases a hardware calibration expects: resting at
//! the minimum, a slow sweep, resting at the maximum. Wiring polarity, a
//! mechanical offset that makes the ADC wrap, and jitter are configurable.

/// Deterministic xorshift jitter source; keeps simulated runs reproducible.
#[derive(Debug, Clone)]
struct Jitter {
    state: u32,
    amplitude: i32,
}

impl Jitter {
    fn next(&mut self) -> i32 {
        if self.amplitude == 0 {
            return 0;
        }
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        let span = u32::try_from(self.amplitude * 2 + 1).unwrap_or(1);
        i32::try_from(x % span).unwrap_or(0) - self.amplitude
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedPot {
    max_hardware_value: i32,
    /// Raw code read at the physical minimum.
    start: i32,
    /// Codes covered between physical minimum and maximum.
    travel: i32,
    inverted: bool,
    jitter: Jitter,
}

impl SimulatedPot {
    pub fn new(max_hardware_value: i32, start: i32, travel: i32) -> Self {
        Self {
            max_hardware_value,
            start,
            travel,
            inverted: false,
            jitter: Jitter {
                state: 0x9E37_79B9,
                amplitude: 0,
            },
        }
    }

    /// Wired backwards: raw codes fall as the control moves toward maximum.
    pub fn inverted(mut self) -> Self {
        self.inverted = true;
        self
    }

    /// Add up to `amplitude` codes of noise to every reading.
    pub fn with_jitter(mut self, amplitude: i32, seed: u32) -> Self {
        self.jitter = Jitter {
            state: seed.max(1),
            amplitude: amplitude.max(0),
        };
        self
    }

    /// Raw reading at `position` in `[0.0, 1.0]` of physical travel.
    pub fn raw_at(&mut self, position: f64) -> i32 {
        let offset = (position.clamp(0.0, 1.0) * f64::from(self.travel)).round() as i32;
        let noisy = offset + self.jitter.next();
        let raw = if self.inverted {
            self.start - noisy
        } else {
            self.start + noisy
        };
        raw.rem_euclid(self.max_hardware_value + 1)
    }

    /// `n` readings with the control resting at its minimum.
    pub fn min_phase(&mut self, n: usize) -> Vec<i32> {
        (0..n).map(|_| self.raw_at(0.0)).collect()
    }

    /// `n` readings with the control resting at its maximum.
    pub fn max_phase(&mut self, n: usize) -> Vec<i32> {
        (0..n).map(|_| self.raw_at(1.0)).collect()
    }

    /// `n` readings evenly spaced across a full min-to-max sweep.
    pub fn sweep(&mut self, n: usize) -> Vec<i32> {
        let last = n.saturating_sub(1).max(1) as f64;
        (0..n).map(|i| self.raw_at(i as f64 / last)).collect()
    }

    /// `n` readings while resting at `position`.
    pub fn hold(&mut self, position: f64, n: usize) -> Vec<i32> {
        (0..n).map(|_| self.raw_at(position)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn sweep_is_monotonic_without_jitter() {
        let mut pot = SimulatedPot::new(1023, 100, 800);
        let s = pot.sweep(50);
        assert!(s.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(s.first(), Some(&100));
        assert_eq!(s.last(), Some(&900));
    }

    #[test]
    fn offset_start_wraps_through_zero() {
        let mut pot = SimulatedPot::new(1023, 900, 300);
        let s = pot.sweep(31);
        assert!(s.windows(2).any(|w| w[0] > 1000 && w[1] < 100));
        assert_eq!(s.last(), Some(&176));
    }

    #[rstest]
    #[case(0)]
    #[case(1)]
    #[case(3)]
    fn readings_stay_in_adc_domain(#[case] amplitude: i32) {
        let mut pot = SimulatedPot::new(1023, 1020, 600)
            .inverted()
            .with_jitter(amplitude, 7);
        for v in pot.sweep(200) {
            assert!((0..=1023).contains(&v));
        }
    }

    #[test]
    fn jitter_produces_distinct_resting_values() {
        let mut pot = SimulatedPot::new(1023, 100, 800).with_jitter(2, 42);
        let mut values = pot.min_phase(30);
        values.sort_unstable();
        values.dedup();
        assert!(values.len() >= 3);
    }
}
