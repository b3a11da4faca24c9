//! Hardware calibration wizard for one analog input.
//!
//! collecting_min → sweeping → collecting_max → analyzing → complete | error
//!
//! The operator advances the first three steps; analyzing runs as soon as it
//! is entered. Collecting steps refuse to advance on stuck or disconnected
//! inputs (too few samples or too few distinct values).

use std::collections::HashSet;

use serde::Serialize;

use crate::analyzer::{analyze_sweep, calculate_max, calculate_min};
use crate::config::HardwareParams;
use crate::error::{CalibrationError, Result, as_calibration_error};
use crate::store::CalibrationStore;
use crate::types::{Calibration, InputId, PinRef, RawSample};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HardwareStep {
    CollectingMin,
    Sweeping,
    CollectingMax,
    Analyzing,
    Complete,
    Error,
}

impl HardwareStep {
    pub fn name(self) -> &'static str {
        match self {
            HardwareStep::CollectingMin => "collecting_min",
            HardwareStep::Sweeping => "sweeping",
            HardwareStep::CollectingMax => "collecting_max",
            HardwareStep::Analyzing => "analyzing",
            HardwareStep::Complete => "complete",
            HardwareStep::Error => "error",
        }
    }

    fn collects(self) -> bool {
        matches!(
            self,
            HardwareStep::CollectingMin | HardwareStep::Sweeping | HardwareStep::CollectingMax
        )
    }
}

/// Snapshot published with every transition and accepted sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareProgress {
    pub input_id: InputId,
    pub pin: PinRef,
    pub step: HardwareStep,
    pub current_value: Option<i32>,
    pub min_samples: usize,
    pub min_distinct: usize,
    pub sweep_samples: usize,
    pub max_samples: usize,
    pub max_distinct: usize,
}

#[derive(Debug)]
pub struct HardwareCalibration {
    input_id: InputId,
    pin: PinRef,
    params: HardwareParams,
    step: HardwareStep,
    current_value: Option<i32>,
    min_samples: Vec<i32>,
    sweep_samples: Vec<i32>,
    max_samples: Vec<i32>,
    min_seen: HashSet<i32>,
    max_seen: HashSet<i32>,
}

impl HardwareCalibration {
    pub fn new(input_id: InputId, pin: PinRef, params: HardwareParams) -> Self {
        Self {
            input_id,
            pin,
            params,
            step: HardwareStep::CollectingMin,
            current_value: None,
            min_samples: Vec::new(),
            sweep_samples: Vec::new(),
            max_samples: Vec::new(),
            min_seen: HashSet::new(),
            max_seen: HashSet::new(),
        }
    }

    pub fn input_id(&self) -> InputId {
        self.input_id
    }

    pub fn pin(&self) -> &PinRef {
        &self.pin
    }

    pub fn step(&self) -> HardwareStep {
        self.step
    }

    /// Buffer a reading for the current phase.
    ///
    /// Returns `false` when the sample is for another pin or the wizard is no
    /// longer collecting; nothing changes in that case.
    pub fn record(&mut self, sample: &RawSample) -> bool {
        if !sample.is_for(&self.pin) || !self.step.collects() {
            return false;
        }
        match self.step {
            HardwareStep::CollectingMin => {
                self.min_samples.push(sample.value);
                self.min_seen.insert(sample.value);
            }
            HardwareStep::Sweeping => self.sweep_samples.push(sample.value),
            _ => {
                self.max_samples.push(sample.value);
                self.max_seen.insert(sample.value);
            }
        }
        self.current_value = Some(sample.value);
        true
    }

    fn check_resting_phase(&self, samples: &[i32], seen: &HashSet<i32>) -> Result<()> {
        if samples.len() < self.params.min_samples {
            return Err(CalibrationError::InsufficientSamples {
                needed: self.params.min_samples,
                got: samples.len(),
            }
            .into());
        }
        let distinct = seen.len();
        if distinct < self.params.min_distinct {
            return Err(CalibrationError::NoDistinctValues {
                needed: self.params.min_distinct,
                got: distinct,
            }
            .into());
        }
        Ok(())
    }

    /// Operator action: leave the current collecting step.
    ///
    /// Validation failures leave the wizard where it was.
    pub fn advance(&mut self) -> Result<HardwareStep> {
        let next = match self.step {
            HardwareStep::CollectingMin => {
                self.check_resting_phase(&self.min_samples, &self.min_seen)?;
                HardwareStep::Sweeping
            }
            HardwareStep::Sweeping => {
                if self.sweep_samples.len() < self.params.sweep_min_samples {
                    return Err(CalibrationError::InsufficientSamples {
                        needed: self.params.sweep_min_samples,
                        got: self.sweep_samples.len(),
                    }
                    .into());
                }
                HardwareStep::CollectingMax
            }
            HardwareStep::CollectingMax => {
                self.check_resting_phase(&self.max_samples, &self.max_seen)?;
                HardwareStep::Analyzing
            }
            step @ (HardwareStep::Analyzing | HardwareStep::Complete | HardwareStep::Error) => {
                return Err(CalibrationError::InvalidStep {
                    step: step.name().to_string(),
                    action: "advance",
                }
                .into());
            }
        };
        tracing::info!(
            input_id = self.input_id,
            from = self.step.name(),
            to = next.name(),
            "hardware calibration advanced"
        );
        self.step = next;
        self.current_value = None;
        Ok(next)
    }

    /// Derive the calibration from the buffered phases.
    pub fn analyze(&self) -> Result<Calibration> {
        if self.step != HardwareStep::Analyzing {
            return Err(CalibrationError::InvalidStep {
                step: self.step.name().to_string(),
                action: "analyze",
            }
            .into());
        }
        let max_hw = self.params.max_hardware_value;
        let analysis = analyze_sweep(&self.sweep_samples, max_hw);
        let min_value = calculate_min(&self.min_samples, max_hw, analysis.inverted).ok_or(
            CalibrationError::InsufficientSamples {
                needed: self.params.min_samples,
                got: 0,
            },
        )?;
        let max_value = calculate_max(&self.min_samples, &self.max_samples, max_hw, analysis)
            .ok_or(CalibrationError::InsufficientSamples {
                needed: self.params.min_samples,
                got: 0,
            })?;
        if max_value <= min_value {
            return Err(CalibrationError::NoRangeDetected.into());
        }
        Ok(Calibration {
            input_id: self.input_id,
            min_value,
            max_value,
            max_hardware_value: max_hw,
            is_inverted: analysis.inverted,
            has_rollover: analysis.rollover,
        })
    }

    /// Analyze and persist; ends in `Complete` or `Error`.
    ///
    /// Both outcomes are terminal, so an analysis rejection comes back as
    /// [`CalibrationError::AnalysisFailed`] rather than a retryable variant.
    pub fn finish(&mut self, store: &dyn CalibrationStore) -> Result<Calibration> {
        let analyzed = self.analyze().map_err(|e| match as_calibration_error(&e) {
            Some(ce) => CalibrationError::AnalysisFailed(Box::new(ce.clone())).into(),
            None => e,
        });
        let result = analyzed.and_then(|cal| {
            store
                .upsert_calibration(&cal)
                .map_err(|e| CalibrationError::Persistence(e.to_string()))?;
            Ok(cal)
        });
        self.step = if result.is_ok() {
            HardwareStep::Complete
        } else {
            HardwareStep::Error
        };
        result
    }

    pub fn progress(&self) -> HardwareProgress {
        HardwareProgress {
            input_id: self.input_id,
            pin: self.pin.clone(),
            step: self.step,
            current_value: self.current_value,
            min_samples: self.min_samples.len(),
            min_distinct: self.min_seen.len(),
            sweep_samples: self.sweep_samples.len(),
            max_samples: self.max_samples.len(),
            max_distinct: self.max_seen.len(),
        }
    }
}
