use notch_config::load_toml;
use rstest::rstest;

#[test]
fn empty_config_uses_engine_defaults() {
    let cfg = load_toml("").expect("parse TOML");
    cfg.validate().expect("defaults should pass");
    assert_eq!(cfg.hardware.max_hardware_value, 1023);
    assert_eq!(cfg.hardware.min_samples, 10);
    assert_eq!(cfg.hardware.min_distinct, 3);
    assert_eq!(cfg.lever.step_delay_ms, 10);
    assert!((cfg.lever.step_fraction - 0.01).abs() < f64::EPSILON);
    assert!((cfg.lever.tolerance - 0.001).abs() < f64::EPSILON);
    assert_eq!(cfg.mapping.decimals, 4);
    assert!(cfg.calibration.is_none());
}

#[test]
fn accepts_full_config() {
    let toml = r#"
[hardware]
max_hardware_value = 4095
min_samples = 20
min_distinct = 4
sweep_min_samples = 30

[lever]
step_fraction = 0.005
step_delay_ms = 25
tolerance = 0.0005

[mapping]
min_samples = 15
decimals = 3

[logging]
level = "debug"
rotation = "daily"

[calibration]
input_id = 7
min_value = 1000
max_value = 1044
max_hardware_value = 1023
has_rollover = true
"#;

    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.hardware.max_hardware_value, 4095);
    assert_eq!(cfg.calibration_max_hardware_value(), Some(1023));
    let cal = cfg.calibration.unwrap();
    assert!(cal.has_rollover);
    assert!(!cal.is_inverted);
}

#[test]
fn calibration_inherits_hardware_ceiling() {
    let toml = r#"
[hardware]
max_hardware_value = 4095

[calibration]
min_value = 10
max_value = 4000
"#;
    let cfg = load_toml(toml).expect("parse TOML");
    cfg.validate().expect("valid");
    assert_eq!(cfg.calibration_max_hardware_value(), Some(4095));
}

#[rstest]
#[case("[hardware]\nmax_hardware_value = 0", "hardware.max_hardware_value must be > 0")]
#[case("[hardware]\nmin_samples = 0", "hardware.min_samples must be >= 1")]
#[case("[hardware]\nmin_distinct = 11", "must not exceed hardware.min_samples")]
#[case("[hardware]\nsweep_min_samples = 1", "hardware.sweep_min_samples must be >= 2")]
#[case("[lever]\nstep_fraction = 0.0", "lever.step_fraction must be in (0.0, 1.0]")]
#[case("[lever]\nstep_fraction = 1.5", "lever.step_fraction must be in (0.0, 1.0]")]
#[case("[lever]\ntolerance = -0.1", "lever.tolerance must be > 0.0")]
#[case("[lever]\nstep_delay_ms = 60000", "unreasonably large")]
#[case("[mapping]\nmin_samples = 0", "mapping.min_samples must be >= 1")]
#[case("[mapping]\ndecimals = 12", "mapping.decimals must be <= 10")]
#[case("[logging]\nrotation = \"weekly\"", "logging.rotation must be one of")]
#[case(
    "[calibration]\nmin_value = 500\nmax_value = 100",
    "calibration.max_value must be >= calibration.min_value"
)]
#[case(
    "[calibration]\nmin_value = 1000\nmax_value = 1044",
    "exceeds max_hardware_value without has_rollover"
)]
fn rejects_invalid_values(#[case] toml: &str, #[case] expected: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    let msg = format!("{err}");
    assert!(msg.contains(expected), "unexpected message: {msg}");
}

#[test]
fn calibration_requires_bounds() {
    let err = load_toml("[calibration]\nmin_value = 3").expect_err("missing max_value");
    assert!(err.to_string().contains("max_value"));
}
