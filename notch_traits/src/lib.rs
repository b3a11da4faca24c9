//! Collaborator seams for the calibration engine.
//!
//! Kept dependency-free so simulated and real backends can implement them
//! without pulling in the engine.

pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Error type used at the collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Synchronous capability surface of the train simulator.
///
/// Paths are opaque endpoint strings taken from a lever config. Every call may
/// fail with a transport or protocol error; callers treat that as fatal for
/// the session that issued it.
pub trait Simulator {
    fn get_float(&mut self, path: &str) -> Result<f64, BoxError>;
    fn get_int(&mut self, path: &str) -> Result<i64, BoxError>;
    fn set(&mut self, path: &str, value: f64) -> Result<(), BoxError>;
}

impl<T: Simulator + ?Sized> Simulator for Box<T> {
    fn get_float(&mut self, path: &str) -> Result<f64, BoxError> {
        (**self).get_float(path)
    }
    fn get_int(&mut self, path: &str) -> Result<i64, BoxError> {
        (**self).get_int(path)
    }
    fn set(&mut self, path: &str, value: f64) -> Result<(), BoxError> {
        (**self).set(path, value)
    }
}
