#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use notch_core::{Calibration, normalize};

#[derive(Debug, Arbitrary)]
struct Input {
    raw: u16,
    min_value: u16,
    max_value: u16,
    inverted: bool,
    rollover: bool,
}

fuzz_target!(|input: Input| {
    let max_hw = 1023;
    let cal = Calibration {
        input_id: 0,
        min_value: i32::from(input.min_value % 1024),
        max_value: i32::from(input.max_value % 2048),
        max_hardware_value: max_hw,
        is_inverted: input.inverted,
        has_rollover: input.rollover,
    };
    let v = normalize(i32::from(input.raw % 1024), &cal);
    assert!((0..=cal.total_travel()).contains(&v));
});
