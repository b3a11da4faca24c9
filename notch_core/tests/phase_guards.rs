//! The resting-phase guards decide every collecting_min and collecting_max exit.

use notch_core::stats::distinct_count;
use notch_core::{HardwareCalibration, HardwareParams, HardwareStep, PinRef, RawSample};
use proptest::prelude::*;

fn pin() -> PinRef {
    PinRef::new("ttyACM0", 2)
}

fn feed(s: &mut HardwareCalibration, values: &[i32]) {
    for v in values {
        assert!(s.record(&RawSample::new(&pin(), *v)));
    }
}

fn accepts(params: &HardwareParams, values: &[i32]) -> bool {
    values.len() >= params.min_samples && distinct_count(values) >= params.min_distinct
}

proptest! {
    #[test]
    fn collecting_min_exits_only_past_both_guards(
        values in prop::collection::vec(495i32..505, 0..30),
    ) {
        let params = HardwareParams::default();
        let mut s = HardwareCalibration::new(1, pin(), params.clone());
        feed(&mut s, &values);
        let advanced = s.advance().is_ok();
        prop_assert_eq!(advanced, accepts(&params, &values));
        let expected = if advanced { HardwareStep::Sweeping } else { HardwareStep::CollectingMin };
        prop_assert_eq!(s.step(), expected);
    }

    #[test]
    fn collecting_max_exits_only_past_both_guards(
        values in prop::collection::vec(895i32..905, 0..30),
    ) {
        let params = HardwareParams::default();
        let mut s = HardwareCalibration::new(1, pin(), params.clone());
        feed(&mut s, &(0..12).map(|i| 100 + i % 3).collect::<Vec<_>>());
        s.advance().unwrap();
        feed(&mut s, &(0..20).map(|i| 100 + i * 40).collect::<Vec<_>>());
        s.advance().unwrap();

        feed(&mut s, &values);
        let advanced = s.advance().is_ok();
        prop_assert_eq!(advanced, accepts(&params, &values));
        let expected = if advanced { HardwareStep::Analyzing } else { HardwareStep::CollectingMax };
        prop_assert_eq!(s.step(), expected);
        prop_assert_eq!(s.progress().max_distinct, distinct_count(&values));
    }
}
