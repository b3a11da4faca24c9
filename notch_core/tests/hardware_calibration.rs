//! Hardware calibration wizard driven through the pool with simulated pots.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use notch_core::mocks::FailingStore;
use notch_core::{
    CalibrationError, CalibrationStore, HardwareStep, MemoryStore, Outcome, PinRef, Progress,
    RawSample, SessionEvent, SessionPool, Topic, as_calibration_error, normalize,
};
use notch_hardware::SimulatedPot;

const INPUT: i64 = 3;
const DEADLINE: Duration = Duration::from_secs(2);

fn pin() -> PinRef {
    PinRef::new("ttyACM0", 4)
}

struct Rig {
    pool: SessionPool,
    events: crossbeam_channel::Receiver<SessionEvent>,
}

impl Rig {
    fn new(store: Arc<dyn CalibrationStore>) -> Self {
        let pool = SessionPool::new(store);
        let events = pool.events().subscribe(Topic::Input(INPUT));
        Self { pool, events }
    }

    fn feed(&self, values: Vec<i32>) {
        self.pool.samples().publish_all(&pin(), values);
    }
}

#[test]
fn full_wizard_persists_a_calibration() {
    let store = Arc::new(MemoryStore::new());
    let rig = Rig::new(store.clone());
    let mut pot = SimulatedPot::new(1023, 150, 700).with_jitter(2, 99);
    let handle = rig.pool.start_hardware_calibration(INPUT, pin()).unwrap();

    rig.feed(pot.min_phase(20));
    assert_eq!(handle.advance().unwrap(), HardwareStep::Sweeping);
    rig.feed(pot.sweep(60));
    assert_eq!(handle.advance().unwrap(), HardwareStep::CollectingMax);
    rig.feed(pot.max_phase(20));
    assert_eq!(handle.advance().unwrap(), HardwareStep::Complete);
    handle.join();

    let cal = store.calibration(INPUT).unwrap();
    assert!(!cal.is_inverted);
    assert!(!cal.has_rollover);
    assert!((148..=152).contains(&cal.min_value));
    assert!((848..=852).contains(&cal.max_value));
    assert_eq!(normalize(0, &cal), 0);
    assert_eq!(normalize(1023, &cal), cal.total_travel());

    let events: Vec<SessionEvent> = rig.events.try_iter().collect();
    assert!(matches!(events.first(), Some(SessionEvent::Started(_))));
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Finished(Outcome::Calibrated(cal)))
    );
}

#[test]
fn guard_failures_keep_the_session_alive() {
    let store = Arc::new(MemoryStore::new());
    let rig = Rig::new(store.clone());
    let handle = rig.pool.start_hardware_calibration(INPUT, pin()).unwrap();

    rig.feed(vec![512; 15]);
    let err = handle.advance().unwrap_err();
    assert_eq!(
        as_calibration_error(&err),
        Some(&CalibrationError::NoDistinctValues { needed: 3, got: 1 })
    );
    let p = handle.progress().unwrap();
    assert_eq!(p.step, HardwareStep::CollectingMin);
    assert_eq!(p.min_samples, 15);
    assert_eq!(p.current_value, Some(512));

    rig.feed(vec![511, 513]);
    assert_eq!(handle.advance().unwrap(), HardwareStep::Sweeping);
    handle.cancel();
    handle.join();
}

#[test]
fn samples_for_other_pins_are_not_collected() {
    let rig = Rig::new(Arc::new(MemoryStore::new()));
    let handle = rig.pool.start_hardware_calibration(INPUT, pin()).unwrap();
    rig.pool
        .samples()
        .publish_all(&PinRef::new("ttyACM0", 5), 0..50);
    rig.feed(vec![1, 2, 3]);
    assert_eq!(handle.progress().unwrap().min_samples, 3);
    handle.cancel();
    handle.join();
}

#[test]
fn cancel_discards_without_persisting() {
    let store = Arc::new(MemoryStore::new());
    let rig = Rig::new(store.clone());
    let mut pot = SimulatedPot::new(1023, 100, 800).with_jitter(2, 3);
    let handle = rig.pool.start_hardware_calibration(INPUT, pin()).unwrap();
    rig.feed(pot.min_phase(20));
    handle.advance().unwrap();
    handle.cancel();
    handle.join();

    assert_eq!(store.calibration_count(), 0);
    let events: Vec<SessionEvent> = rig.events.try_iter().collect();
    assert_eq!(
        events.last(),
        Some(&SessionEvent::Finished(Outcome::Cancelled))
    );
    assert!(
        rig.pool
            .start_hardware_calibration(INPUT, pin())
            .is_ok()
    );
}

#[test]
fn dropping_the_handle_cancels() {
    let store = Arc::new(MemoryStore::new());
    let rig = Rig::new(store.clone());
    drop(rig.pool.start_hardware_calibration(INPUT, pin()).unwrap());
    let terminal = rig
        .events
        .iter()
        .find(SessionEvent::is_terminal)
        .unwrap();
    assert_eq!(terminal, SessionEvent::Finished(Outcome::Cancelled));
}

#[test]
fn storage_failure_is_reported_as_terminal_failure() {
    let rig = Rig::new(Arc::new(FailingStore));
    let mut pot = SimulatedPot::new(1023, 100, 800).with_jitter(2, 8);
    let handle = rig.pool.start_hardware_calibration(INPUT, pin()).unwrap();
    rig.feed(pot.min_phase(20));
    handle.advance().unwrap();
    rig.feed(pot.sweep(40));
    handle.advance().unwrap();
    rig.feed(pot.max_phase(20));
    let err = handle.advance().unwrap_err();
    assert!(matches!(
        as_calibration_error(&err),
        Some(CalibrationError::Persistence(_))
    ));
    handle.join();

    let events: Vec<SessionEvent> = rig.events.try_iter().collect();
    assert!(events.iter().any(|e| matches!(
        e,
        SessionEvent::StepChanged(Progress::Hardware(p)) if p.step == HardwareStep::Error
    )));
    assert!(matches!(
        events.last(),
        Some(SessionEvent::Finished(Outcome::Failed { .. }))
    ));
}

#[test]
fn failed_analysis_ends_the_session_with_a_fatal_error() {
    let store = Arc::new(MemoryStore::new());
    let rig = Rig::new(store.clone());
    let handle = rig.pool.start_hardware_calibration(INPUT, pin()).unwrap();
    let resting: Vec<i32> = (0..12).map(|i| 500 + i % 3).collect();
    rig.feed(resting.clone());
    handle.advance().unwrap();
    rig.feed(resting.clone());
    handle.advance().unwrap();
    rig.feed(resting);

    let err = handle.advance().unwrap_err();
    let ce = as_calibration_error(&err).unwrap();
    assert_eq!(
        ce,
        &CalibrationError::AnalysisFailed(Box::new(CalibrationError::NoRangeDetected))
    );
    assert!(!ce.is_recoverable());
    handle.join();
    assert_eq!(store.calibration_count(), 0);
    let events: Vec<SessionEvent> = rig.events.try_iter().collect();
    assert!(matches!(
        events.last(),
        Some(SessionEvent::Finished(Outcome::Failed { .. }))
    ));
}

#[test]
fn commands_are_served_while_samples_keep_arriving() {
    let rig = Rig::new(Arc::new(MemoryStore::new()));
    let handle = rig.pool.start_hardware_calibration(INPUT, pin()).unwrap();
    let stop = Arc::new(AtomicBool::new(false));
    let producer = {
        let bus = Arc::clone(rig.pool.samples());
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            let mut n = 0;
            while !stop.load(Ordering::Relaxed) {
                bus.publish(RawSample::new(&pin(), 500 + n % 7));
                n += 1;
            }
        })
    };
    thread::sleep(Duration::from_millis(200));

    let asked = Instant::now();
    let p = handle.progress().unwrap();
    assert!(asked.elapsed() < DEADLINE, "progress took {:?}", asked.elapsed());
    assert!(!producer.is_finished());
    assert_eq!(p.step, HardwareStep::CollectingMin);
    assert!(p.min_samples > 0);
    assert!(p.min_distinct <= 7);

    let asked = Instant::now();
    handle.cancel();
    while !handle.is_finished() {
        assert!(asked.elapsed() < DEADLINE, "cancel not served while flooded");
        thread::sleep(Duration::from_millis(5));
    }
    stop.store(true, Ordering::Relaxed);
    producer.join().unwrap();
    handle.join();
}
