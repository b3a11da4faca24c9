//! Test and helper collaborators for notch_core

use notch_traits::BoxError;

use crate::store::CalibrationStore;
use crate::types::{Calibration, LeverConfigId, Notch, NotchInputRange};

/// A store that rejects every write; useful for exercising the fatal
/// persistence path of each session.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingStore;

impl FailingStore {
    fn refuse(what: &str) -> BoxError {
        Box::new(std::io::Error::other(format!("{what}: storage offline")))
    }
}

impl CalibrationStore for FailingStore {
    fn upsert_calibration(&self, _calibration: &Calibration) -> Result<(), BoxError> {
        Err(Self::refuse("upsert calibration"))
    }

    fn replace_notches(&self, _lever_id: LeverConfigId, _notches: &[Notch]) -> Result<(), BoxError> {
        Err(Self::refuse("replace notches"))
    }

    fn update_notch_ranges(
        &self,
        _lever_id: LeverConfigId,
        _ranges: &[NotchInputRange],
    ) -> Result<(), BoxError> {
        Err(Self::refuse("update notch ranges"))
    }
}
