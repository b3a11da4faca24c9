#![no_main]
use libfuzzer_sys::fuzz_target;
use notch_core::{Calibration, HardwareParams, LeverParams, MappingParams};

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = toml::from_str::<notch_config::Config>(data) {
        if cfg.validate().is_err() {
            return;
        }
        let _ = HardwareParams::from(&cfg.hardware);
        let _ = LeverParams::from(&cfg.lever);
        let _ = MappingParams::from(&cfg.mapping);
        if let Some(cal) = Calibration::from_config(&cfg) {
            assert_eq!(Some(cal.max_hardware_value), cfg.calibration_max_hardware_value());
        }
    }
});
