//! Simulated collaborators for the calibration engine.
//!
//! - `SimulatedLever` implements `notch_traits::Simulator` for one lever.
//! - `SimulatedPot` generates raw ADC samples for hardware calibration runs.
pub mod error;
pub mod lever;
pub mod pot;

pub use error::SimError;
pub use lever::{Behavior, Segment, SimulatedLever};
pub use pot::SimulatedPot;
