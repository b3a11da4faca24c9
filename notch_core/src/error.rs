use thiserror::Error;

/// Errors raised by the calibration engine.
///
/// Validation variants are recoverable: the session stays alive and the
/// operator may retry. `AnalysisFailed`, `Simulator` and `Persistence` are
/// fatal to the session that hit them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("insufficient samples: need at least {needed}, got {got}")]
    InsufficientSamples { needed: usize, got: usize },
    #[error("input not moving: need at least {needed} distinct values, got {got}")]
    NoDistinctValues { needed: usize, got: usize },
    #[error("no range detected")]
    NoRangeDetected,
    /// The wizard reached analyzing and was rejected there; it is finished.
    #[error("analysis failed: {0}")]
    AnalysisFailed(#[source] Box<CalibrationError>),
    #[error("invalid step: cannot {action} while {step}")]
    InvalidStep { step: String, action: &'static str },
    #[error("invalid notch index {index} (lever has {count} notches)")]
    InvalidNotchIndex { index: usize, count: usize },
    #[error("simulator error: {0}")]
    Simulator(String),
    #[error("simulator timeout")]
    SimulatorTimeout,
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("session already running: {0}")]
    AlreadyRunning(String),
    #[error("session cancelled")]
    Cancelled,
    #[error("session terminated")]
    SessionGone,
    #[error("configuration error: {0}")]
    Config(String),
}

impl CalibrationError {
    /// True for errors the operator can recover from without restarting the session.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CalibrationError::InsufficientSamples { .. }
                | CalibrationError::NoDistinctValues { .. }
                | CalibrationError::NoRangeDetected
                | CalibrationError::InvalidStep { .. }
                | CalibrationError::InvalidNotchIndex { .. }
        )
    }
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;

/// Find the typed engine error inside a report, if there is one.
pub fn as_calibration_error(report: &Report) -> Option<&CalibrationError> {
    report.downcast_ref::<CalibrationError>()
}
