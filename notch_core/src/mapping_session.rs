//! Guided wizard teaching which input slice selects each lever notch.
//!
//! ready → mapping_notch(i) … → preview → saving → complete
//!
//! While positioning, the live calibrated value is shown but not recorded.
//! During a capture every sample for the bound pin is normalized and folded
//! into a running min/max/count. Committed ranges survive revisits; only the
//! in-progress capture of the revisited notch is cleared.

use serde::Serialize;

use crate::calculator::{fraction, normalize};
use crate::config::MappingParams;
use crate::error::{CalibrationError, Result};
use crate::stats::round_to;
use crate::store::CalibrationStore;
use crate::types::{Calibration, LeverConfig, LeverConfigId, NotchInputRange, PinRef, RawSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum MappingStep {
    Ready,
    MappingNotch { index: usize },
    Preview,
    Saving,
    Complete,
    Error,
}

impl MappingStep {
    pub fn name(self) -> &'static str {
        match self {
            MappingStep::Ready => "ready",
            MappingStep::MappingNotch { .. } => "mapping_notch",
            MappingStep::Preview => "preview",
            MappingStep::Saving => "saving",
            MappingStep::Complete => "complete",
            MappingStep::Error => "error",
        }
    }
}

/// Committed calibrated-value range of one notch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CapturedRange {
    pub min: i32,
    pub max: i32,
}

#[derive(Debug, Clone, Copy, Default)]
struct Capture {
    min: i32,
    max: i32,
    count: usize,
}

impl Capture {
    fn fold(&mut self, value: i32) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingProgress {
    pub lever_id: LeverConfigId,
    pub pin: PinRef,
    pub step: MappingStep,
    pub notch_count: usize,
    pub current_raw: Option<i32>,
    pub current_value: Option<i32>,
    pub capturing: bool,
    pub capture_samples: usize,
    pub capture_min: Option<i32>,
    pub capture_max: Option<i32>,
    pub captured: Vec<Option<CapturedRange>>,
}

#[derive(Debug)]
pub struct NotchMapping {
    lever: LeverConfig,
    pin: PinRef,
    calibration: Calibration,
    params: MappingParams,
    step: MappingStep,
    capturing: bool,
    capture: Capture,
    current_raw: Option<i32>,
    current_value: Option<i32>,
    captured: Vec<Option<CapturedRange>>,
}

impl NotchMapping {
    pub fn new(
        lever: LeverConfig,
        pin: PinRef,
        calibration: Calibration,
        params: MappingParams,
    ) -> Self {
        let captured = vec![None; lever.notches.len()];
        Self {
            lever,
            pin,
            calibration,
            params,
            step: MappingStep::Ready,
            capturing: false,
            capture: Capture::default(),
            current_raw: None,
            current_value: None,
            captured,
        }
    }

    pub fn lever_id(&self) -> LeverConfigId {
        self.lever.id
    }

    pub fn pin(&self) -> &PinRef {
        &self.pin
    }

    pub fn step(&self) -> MappingStep {
        self.step
    }

    pub fn is_capturing(&self) -> bool {
        self.capturing
    }

    pub fn notch_count(&self) -> usize {
        self.captured.len()
    }

    pub fn captured(&self) -> &[Option<CapturedRange>] {
        &self.captured
    }

    fn invalid(&self, action: &'static str) -> eyre::Report {
        CalibrationError::InvalidStep {
            step: self.step.name().to_string(),
            action,
        }
        .into()
    }

    fn mapping_index(&self, action: &'static str) -> Result<usize> {
        match self.step {
            MappingStep::MappingNotch { index } => Ok(index),
            _ => Err(self.invalid(action)),
        }
    }

    fn enter(&mut self, step: MappingStep) {
        tracing::info!(
            lever_id = self.lever.id,
            from = self.step.name(),
            to = step.name(),
            "notch mapping step"
        );
        self.step = step;
        self.capturing = false;
        self.capture = Capture::default();
    }

    pub fn start_mapping(&mut self) -> Result<MappingStep> {
        if self.step != MappingStep::Ready {
            return Err(self.invalid("start mapping"));
        }
        if self.captured.is_empty() {
            return Err(CalibrationError::InvalidNotchIndex { index: 0, count: 0 }.into());
        }
        self.enter(MappingStep::MappingNotch { index: 0 });
        Ok(self.step)
    }

    /// Feed a raw reading. Returns `false` for other pins.
    ///
    /// The live value always updates; it is folded into the capture only while
    /// capturing.
    pub fn on_sample(&mut self, sample: &RawSample) -> bool {
        if !sample.is_for(&self.pin) {
            return false;
        }
        let value = normalize(sample.value, &self.calibration);
        self.current_raw = Some(sample.value);
        self.current_value = Some(value);
        if self.capturing {
            self.capture.fold(value);
        }
        true
    }

    /// Begin (or restart) recording samples for the current notch.
    pub fn start_capture(&mut self) -> Result<()> {
        let index = self.mapping_index("start capture")?;
        self.capture = Capture::default();
        self.capturing = true;
        tracing::debug!(lever_id = self.lever.id, index, "capture started");
        Ok(())
    }

    /// Pause recording; the samples folded so far are kept.
    pub fn stop_capture(&mut self) -> Result<()> {
        let index = self.mapping_index("stop capture")?;
        self.capturing = false;
        tracing::debug!(
            lever_id = self.lever.id,
            index,
            samples = self.capture.count,
            "capture stopped"
        );
        Ok(())
    }

    /// Commit the capture of the current notch and move on.
    ///
    /// Rejections leave the capture untouched so the operator can keep going.
    pub fn capture_range(&mut self) -> Result<MappingStep> {
        let index = self.mapping_index("capture range")?;
        if self.capture.count < self.params.min_samples {
            return Err(CalibrationError::InsufficientSamples {
                needed: self.params.min_samples,
                got: self.capture.count,
            }
            .into());
        }
        if self.capture.min == self.capture.max {
            return Err(CalibrationError::NoRangeDetected.into());
        }

        let range = CapturedRange {
            min: self.capture.min,
            max: self.capture.max,
        };
        if let Some(slot) = self.captured.get_mut(index) {
            *slot = Some(range);
        }
        tracing::info!(
            lever_id = self.lever.id,
            index,
            min = range.min,
            max = range.max,
            "notch range captured"
        );

        let next = self.next_uncaptured(index);
        self.enter(match next {
            Some(i) => MappingStep::MappingNotch { index: i },
            None => MappingStep::Preview,
        });
        Ok(self.step)
    }

    fn next_uncaptured(&self, from: usize) -> Option<usize> {
        let n = self.captured.len();
        (1..=n)
            .map(|offset| (from + offset) % n)
            .find(|&i| self.captured.get(i).is_some_and(Option::is_none))
    }

    /// Revisit any notch; only its in-progress capture is cleared.
    pub fn go_to_notch(&mut self, index: usize) -> Result<MappingStep> {
        if !matches!(
            self.step,
            MappingStep::MappingNotch { .. } | MappingStep::Preview
        ) {
            return Err(self.invalid("go to notch"));
        }
        if index >= self.captured.len() {
            return Err(CalibrationError::InvalidNotchIndex {
                index,
                count: self.captured.len(),
            }
            .into());
        }
        self.enter(MappingStep::MappingNotch { index });
        Ok(self.step)
    }

    /// Input fractions for every captured notch, in notch order.
    pub fn ranges(&self) -> Vec<NotchInputRange> {
        self.lever
            .notches
            .iter()
            .zip(&self.captured)
            .filter_map(|(notch, captured)| {
                captured.map(|r| NotchInputRange {
                    notch_index: notch.index,
                    input_min: round_to(fraction(r.min, &self.calibration), self.params.decimals),
                    input_max: round_to(fraction(r.max, &self.calibration), self.params.decimals),
                })
            })
            .collect()
    }

    /// Persist all ranges in one batch; ends in `Complete` or `Error`.
    pub fn save(&mut self, store: &dyn CalibrationStore) -> Result<Vec<NotchInputRange>> {
        if self.step != MappingStep::Preview {
            return Err(self.invalid("save"));
        }
        self.enter(MappingStep::Saving);
        let ranges = self.ranges();
        match store.update_notch_ranges(self.lever.id, &ranges) {
            Ok(()) => {
                self.enter(MappingStep::Complete);
                Ok(ranges)
            }
            Err(e) => {
                self.enter(MappingStep::Error);
                Err(CalibrationError::Persistence(e.to_string()).into())
            }
        }
    }

    pub fn progress(&self) -> MappingProgress {
        let has_capture = self.capture.count > 0;
        MappingProgress {
            lever_id: self.lever.id,
            pin: self.pin.clone(),
            step: self.step,
            notch_count: self.captured.len(),
            current_raw: self.current_raw,
            current_value: self.current_value,
            capturing: self.capturing,
            capture_samples: self.capture.count,
            capture_min: has_capture.then_some(self.capture.min),
            capture_max: has_capture.then_some(self.capture.max),
            captured: self.captured.clone(),
        }
    }
}
