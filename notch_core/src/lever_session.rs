//! Autonomous notch discovery for one simulator lever.
//!
//! initializing → calibrating → saving → complete | error
//!
//! The lever is swept from its minimum to its maximum in fixed steps. After
//! every write the simulator's read-back value and notch index are compared
//! with what was written:
//! - index changed: the previous notch ends and a new one starts here;
//! - read-back differs from the write: the notch is a gate (sticky);
//! - read-back matches: the notch is linear unless already seen as a gate.
//!
//! Any simulator error aborts the run; nothing is persisted until the whole
//! sweep succeeded.

use eyre::WrapErr;
use notch_traits::Simulator;
use serde::Serialize;

use crate::config::LeverParams;
use crate::error::{CalibrationError, Result};
use crate::sim_error::map_sim_error;
use crate::store::CalibrationStore;
use crate::types::{LeverConfigId, LeverEndpoints, Notch, NotchKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeverStep {
    Initializing,
    Calibrating,
    Saving,
    Complete,
    Error,
}

impl LeverStep {
    pub fn name(self) -> &'static str {
        match self {
            LeverStep::Initializing => "initializing",
            LeverStep::Calibrating => "calibrating",
            LeverStep::Saving => "saving",
            LeverStep::Complete => "complete",
            LeverStep::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeverProgress {
    pub lever_id: LeverConfigId,
    pub step: LeverStep,
    pub current_value: f64,
    pub simulator_notch: Option<i64>,
    pub notches_found: usize,
    /// Share of the lever range swept so far.
    pub swept: f64,
}

/// Result of one sweep step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepStatus {
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Classification {
    Unobserved,
    Gate(f64),
    Linear,
}

#[derive(Debug, Clone)]
struct OpenNotch {
    simulator_index: i64,
    start: f64,
    last_written: f64,
    last_readback: f64,
    class: Classification,
}

impl OpenNotch {
    fn observe(&mut self, written: f64, readback: f64, tolerance: f64) {
        self.last_written = written;
        self.last_readback = readback;
        if (written - readback).abs() >= tolerance {
            self.class = Classification::Gate(readback);
        } else if !matches!(self.class, Classification::Gate(_)) {
            self.class = Classification::Linear;
        }
    }

    fn close(&self, index: usize, end: f64) -> Notch {
        let kind = match self.class {
            Classification::Gate(value) => NotchKind::Gate { value },
            Classification::Linear => NotchKind::Linear {
                min_value: self.start,
                max_value: end,
            },
            Classification::Unobserved => NotchKind::Gate {
                value: self.last_readback,
            },
        };
        Notch::new(index, kind)
    }
}

fn get_float<S: Simulator>(sim: &mut S, path: &str) -> Result<f64> {
    sim.get_float(path)
        .map_err(|e| map_sim_error(&*e))
        .wrap_err_with(|| format!("read {path}"))
}

fn get_int<S: Simulator>(sim: &mut S, path: &str) -> Result<i64> {
    sim.get_int(path)
        .map_err(|e| map_sim_error(&*e))
        .wrap_err_with(|| format!("read {path}"))
}

fn set<S: Simulator>(sim: &mut S, path: &str, value: f64) -> Result<()> {
    sim.set(path, value)
        .map_err(|e| map_sim_error(&*e))
        .wrap_err_with(|| format!("write {value} to {path}"))
}

pub struct LeverCalibrator<S: Simulator> {
    lever_id: LeverConfigId,
    endpoints: LeverEndpoints,
    params: LeverParams,
    sim: S,
    step: LeverStep,
    min: f64,
    max: f64,
    step_size: f64,
    steps_taken: u64,
    current: f64,
    open: Option<OpenNotch>,
    notches: Vec<Notch>,
}

impl<S: Simulator> core::fmt::Debug for LeverCalibrator<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LeverCalibrator")
            .field("lever_id", &self.lever_id)
            .field("step", &self.step)
            .field("current", &self.current)
            .field("notches", &self.notches.len())
            .finish()
    }
}

impl<S: Simulator> LeverCalibrator<S> {
    pub fn new(
        lever_id: LeverConfigId,
        endpoints: LeverEndpoints,
        params: LeverParams,
        sim: S,
    ) -> Self {
        Self {
            lever_id,
            endpoints,
            params,
            sim,
            step: LeverStep::Initializing,
            min: 0.0,
            max: 0.0,
            step_size: 0.0,
            steps_taken: 0,
            current: 0.0,
            open: None,
            notches: Vec::new(),
        }
    }

    pub fn lever_id(&self) -> LeverConfigId {
        self.lever_id
    }

    pub fn step(&self) -> LeverStep {
        self.step
    }

    pub fn params(&self) -> &LeverParams {
        &self.params
    }

    /// Notches closed so far, in sweep order.
    pub fn notches(&self) -> &[Notch] {
        &self.notches
    }

    fn expect_step(&self, expected: LeverStep, action: &'static str) -> Result<()> {
        if self.step == expected {
            Ok(())
        } else {
            Err(CalibrationError::InvalidStep {
                step: self.step.name().to_string(),
                action,
            }
            .into())
        }
    }

    fn guard<T>(&mut self, r: Result<T>) -> Result<T> {
        if r.is_err() {
            self.step = LeverStep::Error;
        }
        r
    }

    /// Read the lever's range and notch count and position it at its minimum.
    ///
    /// Single-notch levers are recorded as one linear notch over the whole
    /// range and go straight to saving.
    pub fn initialize(&mut self) -> Result<LeverStep> {
        self.expect_step(LeverStep::Initializing, "initialize")?;
        let r = self.initialize_inner();
        self.guard(r)
    }

    fn initialize_inner(&mut self) -> Result<LeverStep> {
        let min = get_float(&mut self.sim, &self.endpoints.min_value)?;
        let max = get_float(&mut self.sim, &self.endpoints.max_value)?;
        let count = get_int(&mut self.sim, &self.endpoints.notch_count)?;
        tracing::info!(lever_id = self.lever_id, min, max, count, "lever range read");

        if !(max - min > self.params.tolerance) {
            return Err(CalibrationError::NoRangeDetected)
                .wrap_err_with(|| format!("lever range [{min}, {max}]"));
        }
        if count < 1 {
            return Err(CalibrationError::Simulator(format!(
                "lever reports {count} notches"
            ))
            .into());
        }

        self.min = min;
        self.max = max;
        self.current = min;

        if count == 1 {
            self.notches = vec![Notch::new(
                0,
                NotchKind::Linear {
                    min_value: min,
                    max_value: max,
                },
            )];
            self.step = LeverStep::Saving;
            return Ok(self.step);
        }

        self.step_size = (max - min) * self.params.step_fraction;
        if !(self.step_size > 0.0) {
            return Err(CalibrationError::Config(format!(
                "step fraction {} yields no progress",
                self.params.step_fraction
            ))
            .into());
        }

        set(&mut self.sim, &self.endpoints.value, min)?;
        let index = get_int(&mut self.sim, &self.endpoints.notch_index)?;
        self.open = Some(OpenNotch {
            simulator_index: index,
            start: min,
            last_written: min,
            last_readback: min,
            class: Classification::Unobserved,
        });
        self.step = LeverStep::Calibrating;
        Ok(self.step)
    }

    /// Advance the sweep by one step.
    pub fn step_once(&mut self) -> Result<SweepStatus> {
        self.expect_step(LeverStep::Calibrating, "step")?;
        let r = self.step_inner();
        self.guard(r)
    }

    fn step_inner(&mut self) -> Result<SweepStatus> {
        let k = self.steps_taken + 1;
        let next = self.min + (k as f64) * self.step_size;
        if self.current >= self.max || next > self.max + self.params.tolerance {
            self.finalize();
            return Ok(SweepStatus::Finished);
        }

        let target = next.min(self.max);
        set(&mut self.sim, &self.endpoints.value, target)?;
        let readback = get_float(&mut self.sim, &self.endpoints.value)?;
        let index = get_int(&mut self.sim, &self.endpoints.notch_index)?;
        self.steps_taken = k;
        self.current = target;

        let tolerance = self.params.tolerance;
        match self.open.as_mut() {
            Some(open) if open.simulator_index == index => {
                open.observe(target, readback, tolerance);
            }
            _ => {
                if let Some(prev) = self.open.take() {
                    let notch = prev.close(self.notches.len(), prev.last_written);
                    tracing::debug!(
                        lever_id = self.lever_id,
                        index = notch.index,
                        kind = notch.kind.name(),
                        boundary = target,
                        "notch boundary"
                    );
                    self.notches.push(notch);
                }
                self.open = Some(OpenNotch {
                    simulator_index: index,
                    start: target,
                    last_written: target,
                    last_readback: readback,
                    class: Classification::Unobserved,
                });
            }
        }
        Ok(SweepStatus::Running)
    }

    fn finalize(&mut self) {
        if let Some(last) = self.open.take() {
            let notch = last.close(self.notches.len(), self.max);
            self.notches.push(notch);
        }
        tracing::info!(
            lever_id = self.lever_id,
            notches = self.notches.len(),
            steps = self.steps_taken,
            "lever sweep finished"
        );
        self.step = LeverStep::Saving;
    }

    /// Replace the lever's notch set in one batch.
    pub fn save(&mut self, store: &dyn CalibrationStore) -> Result<Vec<Notch>> {
        self.expect_step(LeverStep::Saving, "save")?;
        let r = store
            .replace_notches(self.lever_id, &self.notches)
            .map_err(|e| eyre::Report::new(CalibrationError::Persistence(e.to_string())));
        self.guard(r)?;
        self.step = LeverStep::Complete;
        Ok(self.notches.clone())
    }

    pub fn progress(&self) -> LeverProgress {
        let range = self.max - self.min;
        let swept = if range > 0.0 {
            ((self.current - self.min) / range).clamp(0.0, 1.0)
        } else {
            0.0
        };
        LeverProgress {
            lever_id: self.lever_id,
            step: self.step,
            current_value: self.current,
            simulator_notch: self.open.as_ref().map(|o| o.simulator_index),
            notches_found: self.notches.len(),
            swept,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::as_calibration_error;
    use crate::store::MemoryStore;
    use notch_hardware::SimulatedLever;

    fn calibrator(lever: SimulatedLever) -> LeverCalibrator<SimulatedLever> {
        let endpoints = LeverEndpoints::from_base(lever.base());
        LeverCalibrator::new(1, endpoints, LeverParams::default(), lever)
    }

    fn sweep(c: &mut LeverCalibrator<SimulatedLever>) {
        if c.initialize().unwrap() == LeverStep::Calibrating {
            while c.step_once().unwrap() == SweepStatus::Running {}
        }
        assert_eq!(c.step(), LeverStep::Saving);
    }

    #[test]
    fn single_notch_skips_the_sweep() {
        let mut c = calibrator(SimulatedLever::single());
        assert_eq!(c.initialize().unwrap(), LeverStep::Saving);
        assert_eq!(
            c.notches(),
            &[Notch::new(
                0,
                NotchKind::Linear {
                    min_value: 0.0,
                    max_value: 1.0
                }
            )]
        );
    }

    #[test]
    fn stepping_before_initialize_is_rejected() {
        let mut c = calibrator(SimulatedLever::echo(2));
        let err = c.step_once().unwrap_err();
        assert!(matches!(
            as_calibration_error(&err),
            Some(CalibrationError::InvalidStep { .. })
        ));
    }

    #[test]
    fn mixed_lever_yields_gate_linear_gate() {
        let mut c = calibrator(SimulatedLever::mixed());
        sweep(&mut c);
        let kinds: Vec<_> = c.notches().iter().map(|n| n.kind.name()).collect();
        assert_eq!(kinds, ["gate", "linear", "gate"]);
        match c.notches()[1].kind {
            NotchKind::Linear {
                min_value,
                max_value,
            } => {
                assert!((min_value - 0.2).abs() < 0.011);
                assert!((max_value - 0.79).abs() < 0.011);
            }
            other => panic!("expected linear, got {other:?}"),
        }
    }

    #[test]
    fn link_loss_mid_sweep_is_fatal_and_saves_nothing() {
        let store = MemoryStore::new();
        let mut c = calibrator(SimulatedLever::gates(&[0.0, 1.0]).failing_after(30));
        c.initialize().unwrap();
        let err = loop {
            match c.step_once() {
                Ok(SweepStatus::Running) => continue,
                Ok(SweepStatus::Finished) => panic!("sweep should not finish"),
                Err(e) => break e,
            }
        };
        assert!(matches!(
            as_calibration_error(&err),
            Some(CalibrationError::Simulator(_))
        ));
        assert_eq!(c.step(), LeverStep::Error);
        assert!(c.save(&store).is_err());
        assert!(store.notches(1).is_empty());
    }

    #[test]
    fn flat_lever_range_is_rejected() {
        let mut c = calibrator(SimulatedLever::new(0.5, 0.5, Vec::new()));
        let err = c.initialize().unwrap_err();
        assert_eq!(
            as_calibration_error(&err),
            Some(&CalibrationError::NoRangeDetected)
        );
        assert_eq!(c.step(), LeverStep::Error);
    }

    #[test]
    fn save_replaces_notch_set() {
        let store = MemoryStore::new();
        let mut c = calibrator(SimulatedLever::gates(&[0.0, 0.5, 1.0]));
        sweep(&mut c);
        let saved = c.save(&store).unwrap();
        assert_eq!(c.step(), LeverStep::Complete);
        assert_eq!(store.notches(1), saved);
        assert!((c.progress().swept - 1.0).abs() < 1e-9);
    }
}
