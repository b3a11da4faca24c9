#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Calibration and notch-mapping engine (simulator- and transport-agnostic).
//!
//! All simulator interaction goes through `notch_traits::Simulator`; raw
//! samples arrive through the [`SampleBus`]; records are written through a
//! [`CalibrationStore`].
//!
//! ## Architecture
//!
//! - **Analyzer**: sweep polarity/rollover detection and robust bounds (`analyzer`)
//! - **Calculator**: raw sample → calibrated value (`calculator`)
//! - **Sessions**: owned state machines for hardware calibration, lever
//!   calibration and notch mapping (`hardware_session`, `lever_session`,
//!   `mapping_session`)
//! - **Actors**: one thread per running session (`runner`)
//! - **Pool**: one session per input / lever config (`pool`)
//! - **Events**: topic-scoped progress with exactly one terminal result (`events`)
//!
//! ## Integer domain
//!
//! Raw samples and calibrated values stay in integer ADC codes. Only the
//! saved notch ranges become `0.0..=1.0` fractions of input travel.

pub mod analyzer;
pub mod calculator;
pub mod config;
pub mod conversions;
pub mod error;
pub mod events;
pub mod hardware_session;
pub mod lever_session;
pub mod mapping_session;
pub mod mocks;
pub mod pool;
pub mod runner;
pub mod samples;
pub mod sim_error;
pub mod stats;
pub mod store;
pub mod types;

pub use analyzer::{SweepAnalysis, analyze_sweep, calculate_max, calculate_min};
pub use calculator::{fraction, normalize, total_travel};
pub use config::{HardwareParams, LeverParams, MappingParams};
pub use error::{CalibrationError, Report, Result, as_calibration_error};
pub use events::{EventBus, Outcome, Progress, Publisher, SessionEvent, Topic};
pub use hardware_session::{HardwareCalibration, HardwareProgress, HardwareStep};
pub use lever_session::{LeverCalibrator, LeverProgress, LeverStep, SweepStatus};
pub use mapping_session::{CapturedRange, MappingProgress, MappingStep, NotchMapping};
pub use pool::{SessionKey, SessionPool};
pub use runner::{HardwareHandle, LeverHandle, MappingHandle};
pub use samples::SampleBus;
pub use sim_error::map_sim_error;
pub use store::{CalibrationStore, MemoryStore};
pub use types::{
    Calibration, InputId, LeverConfig, LeverConfigId, LeverEndpoints, Notch, NotchInputRange,
    NotchKind, PinRef, RawSample,
};

/// Run the offline part of a hardware calibration on recorded phases.
///
/// Applies the same guards as the interactive wizard and returns the
/// calibration without persisting it.
pub fn calibrate_recorded(
    input_id: InputId,
    params: &HardwareParams,
    min_samples: &[i32],
    sweep: &[i32],
    max_samples: &[i32],
) -> Result<Calibration> {
    let pin = PinRef::new("recorded", 0);
    let mut session = HardwareCalibration::new(input_id, pin.clone(), params.clone());
    for phase in [min_samples, sweep, max_samples] {
        for &v in phase {
            session.record(&RawSample::new(&pin, v));
        }
        session.advance()?;
    }
    session.analyze()
}
