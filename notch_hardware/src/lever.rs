//! Simulated train-simulator lever.
//!
//! A lever is a list of segments covering `[min, max]` of the simulator's input
//! domain. The segment a written value falls into is the reported notch index;
//! its behavior decides what the simulator reflects back.

use notch_traits::{BoxError, Simulator};

use crate::error::SimError;

/// Endpoint suffixes appended to a lever's base path.
pub const VALUE_SUFFIX: &str = "InputValue";
pub const MIN_SUFFIX: &str = "MinInput";
pub const MAX_SUFFIX: &str = "MaxInput";
pub const NOTCH_COUNT_SUFFIX: &str = "NotchCount";
pub const NOTCH_INDEX_SUFFIX: &str = "CurrentNotch";

/// Build the full endpoint path for `suffix` under `base`.
pub fn endpoint(base: &str, suffix: &str) -> String {
    format!("{base}.{suffix}")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behavior {
    /// Continuous range: reads back exactly what was written.
    Echo,
    /// Detent: any write inside the segment snaps to this value.
    Snap(f64),
}

/// Segment of lever travel ending (exclusive) at `until`. The last segment
/// also includes the lever maximum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub until: f64,
    pub behavior: Behavior,
}

/// In-process simulator exposing one lever.
#[derive(Debug, Clone)]
pub struct SimulatedLever {
    base: String,
    min: f64,
    max: f64,
    segments: Vec<Segment>,
    /// Overrides the reported notch count (defaults to the segment count).
    reported_count: Option<i64>,
    value: f64,
    writes: usize,
    fail_after_writes: Option<usize>,
}

impl SimulatedLever {
    pub const DEFAULT_BASE: &'static str = "CurrentDrivableActor/Throttle(Lever)";

    pub fn new(min: f64, max: f64, segments: Vec<Segment>) -> Self {
        Self {
            base: Self::DEFAULT_BASE.to_string(),
            min,
            max,
            segments,
            reported_count: None,
            value: min,
            writes: 0,
            fail_after_writes: None,
        }
    }

    /// `count` equal linear notches over `[0.0, 1.0]`.
    pub fn echo(count: usize) -> Self {
        let count = count.max(1);
        let segments = (1..=count)
            .map(|i| Segment {
                until: i as f64 / count as f64,
                behavior: Behavior::Echo,
            })
            .collect();
        Self::new(0.0, 1.0, segments)
    }

    /// One detent per value, each owning an equal share of `[0.0, 1.0]`.
    pub fn gates(values: &[f64]) -> Self {
        let count = values.len().max(1);
        let segments = values
            .iter()
            .enumerate()
            .map(|(i, v)| Segment {
                until: (i + 1) as f64 / count as f64,
                behavior: Behavior::Snap(*v),
            })
            .collect();
        Self::new(0.0, 1.0, segments)
    }

    /// Typical locomotive brake: emergency detent, continuous service range,
    /// release detent.
    pub fn mixed() -> Self {
        Self::new(
            0.0,
            1.0,
            vec![
                Segment {
                    until: 0.2,
                    behavior: Behavior::Snap(0.0),
                },
                Segment {
                    until: 0.8,
                    behavior: Behavior::Echo,
                },
                Segment {
                    until: 1.0,
                    behavior: Behavior::Snap(1.0),
                },
            ],
        )
    }

    /// Lever that reports a single notch; used for plain throttles.
    pub fn single() -> Self {
        Self::echo(1)
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = base.into();
        self
    }

    pub fn with_reported_count(mut self, count: i64) -> Self {
        self.reported_count = Some(count);
        self
    }

    /// Fail every call after `n` successful writes, as a dropped connection would.
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after_writes = Some(n);
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn writes(&self) -> usize {
        self.writes
    }

    fn segment_for(&self, v: f64) -> (usize, Segment) {
        let fallback = self.segments.len().saturating_sub(1);
        let idx = self
            .segments
            .iter()
            .position(|s| v < s.until)
            .unwrap_or(fallback);
        let seg = self.segments.get(idx).copied().unwrap_or(Segment {
            until: self.max,
            behavior: Behavior::Echo,
        });
        (idx, seg)
    }

    fn check_link(&self) -> Result<(), SimError> {
        match self.fail_after_writes {
            Some(n) if self.writes >= n => Err(SimError::Unreachable(format!(
                "connection dropped after {n} writes"
            ))),
            _ => Ok(()),
        }
    }

    fn suffix<'a>(&self, path: &'a str) -> Result<&'a str, SimError> {
        path.strip_prefix(self.base.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or_else(|| SimError::UnknownPath(path.to_string()))
    }
}

impl Simulator for SimulatedLever {
    fn get_float(&mut self, path: &str) -> Result<f64, BoxError> {
        self.check_link()?;
        match self.suffix(path)? {
            VALUE_SUFFIX => Ok(self.value),
            MIN_SUFFIX => Ok(self.min),
            MAX_SUFFIX => Ok(self.max),
            _ => Err(Box::new(SimError::UnknownPath(path.to_string()))),
        }
    }

    fn get_int(&mut self, path: &str) -> Result<i64, BoxError> {
        self.check_link()?;
        match self.suffix(path)? {
            NOTCH_COUNT_SUFFIX => Ok(self
                .reported_count
                .unwrap_or(i64::try_from(self.segments.len()).unwrap_or(i64::MAX))),
            NOTCH_INDEX_SUFFIX => {
                let (idx, _) = self.segment_for(self.value);
                Ok(i64::try_from(idx).unwrap_or(i64::MAX))
            }
            _ => Err(Box::new(SimError::UnknownPath(path.to_string()))),
        }
    }

    fn set(&mut self, path: &str, value: f64) -> Result<(), BoxError> {
        self.check_link()?;
        if self.suffix(path)? != VALUE_SUFFIX {
            return Err(Box::new(SimError::Rejected {
                path: path.to_string(),
                reason: "endpoint is read-only".to_string(),
            }));
        }
        if !value.is_finite() {
            return Err(Box::new(SimError::Rejected {
                path: path.to_string(),
                reason: format!("non-finite value {value}"),
            }));
        }
        let clamped = value.clamp(self.min, self.max);
        let (_, seg) = self.segment_for(clamped);
        self.value = match seg.behavior {
            Behavior::Echo => clamped,
            Behavior::Snap(v) => v,
        };
        self.writes += 1;
        tracing::trace!(written = value, readback = self.value, "simulated lever write");
        Ok(())
    }
}
