//! Persistence boundary for calibration and notch records.
//!
//! Every write is all-or-nothing: an implementation must leave the previous
//! state intact when it returns an error.

use std::collections::HashMap;
use std::sync::Mutex;

use notch_traits::BoxError;

use crate::types::{Calibration, InputId, LeverConfigId, Notch, NotchInputRange};

pub trait CalibrationStore: Send + Sync {
    /// Insert or replace the calibration for `calibration.input_id`.
    fn upsert_calibration(&self, calibration: &Calibration) -> Result<(), BoxError>;

    /// Replace the full notch set of a lever (delete-all-then-insert).
    fn replace_notches(&self, lever_id: LeverConfigId, notches: &[Notch]) -> Result<(), BoxError>;

    /// Set `input_min`/`input_max` on existing notches of a lever.
    fn update_notch_ranges(
        &self,
        lever_id: LeverConfigId,
        ranges: &[NotchInputRange],
    ) -> Result<(), BoxError>;
}

#[derive(Debug, thiserror::Error)]
pub enum MemoryStoreError {
    #[error("lever {0} has no notches")]
    UnknownLever(LeverConfigId),
    #[error("lever {lever_id} has no notch {index}")]
    UnknownNotch {
        lever_id: LeverConfigId,
        index: usize,
    },
    #[error("store lock poisoned")]
    Poisoned,
}

/// In-process store; also the reference for the transactional contract.
#[derive(Debug, Default)]
pub struct MemoryStore {
    calibrations: Mutex<HashMap<InputId, Calibration>>,
    notches: Mutex<HashMap<LeverConfigId, Vec<Notch>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calibration(&self, input_id: InputId) -> Option<Calibration> {
        self.calibrations
            .lock()
            .ok()
            .and_then(|m| m.get(&input_id).cloned())
    }

    pub fn calibration_count(&self) -> usize {
        self.calibrations.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn notches(&self, lever_id: LeverConfigId) -> Vec<Notch> {
        self.notches
            .lock()
            .ok()
            .and_then(|m| m.get(&lever_id).cloned())
            .unwrap_or_default()
    }
}

impl CalibrationStore for MemoryStore {
    fn upsert_calibration(&self, calibration: &Calibration) -> Result<(), BoxError> {
        let mut map = self
            .calibrations
            .lock()
            .map_err(|_| MemoryStoreError::Poisoned)?;
        map.insert(calibration.input_id, calibration.clone());
        Ok(())
    }

    fn replace_notches(&self, lever_id: LeverConfigId, notches: &[Notch]) -> Result<(), BoxError> {
        let mut map = self.notches.lock().map_err(|_| MemoryStoreError::Poisoned)?;
        map.insert(lever_id, notches.to_vec());
        Ok(())
    }

    fn update_notch_ranges(
        &self,
        lever_id: LeverConfigId,
        ranges: &[NotchInputRange],
    ) -> Result<(), BoxError> {
        let mut map = self.notches.lock().map_err(|_| MemoryStoreError::Poisoned)?;
        let existing = map
            .get(&lever_id)
            .ok_or(MemoryStoreError::UnknownLever(lever_id))?;

        // Stage on a copy so a missing notch leaves the stored set untouched.
        let mut staged = existing.clone();
        for range in ranges {
            let notch = staged
                .iter_mut()
                .find(|n| n.index == range.notch_index)
                .ok_or(MemoryStoreError::UnknownNotch {
                    lever_id,
                    index: range.notch_index,
                })?;
            notch.input_min = Some(range.input_min);
            notch.input_max = Some(range.input_max);
        }
        map.insert(lever_id, staged);
        Ok(())
    }
}
