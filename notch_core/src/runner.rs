//! Session actors.
//!
//! Each session runs on its own thread and owns its state machine. Operator
//! commands and raw samples arrive on crossbeam channels and are handled one
//! at a time; commands carry a bounded(1) reply channel so validation errors
//! reach the caller while the session stays alive.
//!
//! Every actor publishes `Started` first and exactly one `Finished` last.
//! Dropping a handle without joining cancels its session.

use std::thread::JoinHandle;

use crossbeam_channel as xch;
use notch_traits::{Clock, Simulator};
use std::sync::Arc;

use crate::error::{CalibrationError, Report, Result, as_calibration_error};
use crate::events::{Outcome, Progress, Publisher, SessionEvent};
use crate::hardware_session::{HardwareCalibration, HardwareProgress, HardwareStep};
use crate::lever_session::{LeverCalibrator, LeverProgress, LeverStep, SweepStatus};
use crate::mapping_session::{MappingProgress, MappingStep, NotchMapping};
use crate::store::CalibrationStore;
use crate::types::RawSample;

type Reply<T> = xch::Sender<Result<T>>;

fn request<C, T>(tx: &xch::Sender<C>, make: impl FnOnce(Reply<T>) -> C) -> Result<T> {
    let (reply_tx, reply_rx) = xch::bounded(1);
    tx.send(make(reply_tx))
        .map_err(|_| Report::new(CalibrationError::SessionGone))?;
    reply_rx
        .recv()
        .map_err(|_| Report::new(CalibrationError::SessionGone))?
}

fn failed(e: &Report) -> Outcome {
    tracing::error!(error = %format!("{e:#}"), "session failed");
    Outcome::Failed {
        reason: format!("{e:#}"),
    }
}

fn log_rejection(e: &Report, action: &'static str) {
    match as_calibration_error(e) {
        Some(ce) if ce.is_recoverable() => tracing::warn!(error = %ce, action, "command rejected"),
        _ => tracing::error!(error = %e, action, "command failed"),
    }
}

/// Thread plus command channel shared by all session handles.
#[derive(Debug)]
struct Actor<C> {
    tx: xch::Sender<C>,
    join: Option<JoinHandle<()>>,
}

impl<C> Actor<C> {
    fn is_finished(&self) -> bool {
        self.join.as_ref().is_none_or(JoinHandle::is_finished)
    }

    fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            if let Err(e) = handle.join() {
                tracing::warn!(?e, "session thread panicked");
            }
        }
    }
}

// ── Hardware calibration ─────────────────────────────────────────────────────

#[derive(Debug)]
pub enum HardwareCommand {
    Advance(Reply<HardwareStep>),
    Progress(Reply<HardwareProgress>),
    Cancel,
}

#[derive(Debug)]
pub struct HardwareHandle {
    actor: Actor<HardwareCommand>,
}

impl HardwareHandle {
    /// Leave the current collecting step. Entering analyzing runs the
    /// analysis and persists the result before this returns.
    ///
    /// A reply from analyzing ends the session either way; its errors
    /// (`AnalysisFailed`, `Persistence`) are never recoverable.
    pub fn advance(&self) -> Result<HardwareStep> {
        request(&self.actor.tx, HardwareCommand::Advance)
    }

    pub fn progress(&self) -> Result<HardwareProgress> {
        request(&self.actor.tx, HardwareCommand::Progress)
    }

    /// Discard the session without persisting anything.
    pub fn cancel(&self) {
        let _ = self.actor.tx.send(HardwareCommand::Cancel);
    }

    pub fn is_finished(&self) -> bool {
        self.actor.is_finished()
    }

    /// Wait for the session thread to exit.
    pub fn join(mut self) {
        self.actor.join();
    }
}

pub(crate) fn spawn_hardware(
    session: HardwareCalibration,
    samples: xch::Receiver<RawSample>,
    store: Arc<dyn CalibrationStore>,
    publisher: Publisher,
    on_exit: impl FnOnce() + Send + 'static,
) -> HardwareHandle {
    let (tx, rx) = xch::unbounded();
    let join = std::thread::spawn(move || {
        run_hardware(session, &samples, &rx, store.as_ref(), publisher);
        on_exit();
    });
    HardwareHandle {
        actor: Actor {
            tx,
            join: Some(join),
        },
    }
}

/// One message taken off a session's inputs.
enum Inbox<C> {
    Sample(RawSample),
    SamplesClosed,
    Command(C),
    CommandsClosed,
}

/// Fair multiplexer over a session's sample and command channels.
///
/// Samples queued when a command is received are handed out before that
/// command, so a command sees every sample published ahead of it. The drain
/// is bounded by the queue length at that moment; a producer that never stops
/// cannot hold a command back.
struct Mailbox<'a, C> {
    samples: &'a xch::Receiver<RawSample>,
    commands: &'a xch::Receiver<C>,
    pending: Option<C>,
    backlog: usize,
}

impl<'a, C> Mailbox<'a, C> {
    fn new(samples: &'a xch::Receiver<RawSample>, commands: &'a xch::Receiver<C>) -> Self {
        Self {
            samples,
            commands,
            pending: None,
            backlog: 0,
        }
    }

    fn next(&mut self) -> Inbox<C> {
        if self.pending.is_none() {
            let received = xch::select! {
                recv(self.samples) -> msg => msg.map_or(Inbox::SamplesClosed, Inbox::Sample),
                recv(self.commands) -> msg => msg.map_or(Inbox::CommandsClosed, Inbox::Command),
            };
            match received {
                Inbox::Command(command) => {
                    self.backlog = self.samples.len();
                    self.pending = Some(command);
                }
                other => return other,
            }
        }
        if self.backlog > 0 {
            self.backlog -= 1;
            if let Ok(sample) = self.samples.try_recv() {
                return Inbox::Sample(sample);
            }
            self.backlog = 0;
        }
        self.pending.take().map_or(Inbox::CommandsClosed, Inbox::Command)
    }
}

fn run_hardware(
    mut session: HardwareCalibration,
    samples: &xch::Receiver<RawSample>,
    commands: &xch::Receiver<HardwareCommand>,
    store: &dyn CalibrationStore,
    mut publisher: Publisher,
) {
    let _span = tracing::info_span!("hardware", input_id = session.input_id()).entered();
    tracing::info!(pin = %session.pin(), "hardware calibration started");
    publisher.emit(SessionEvent::Started(Progress::Hardware(session.progress())));
    let emit = |publisher: &Publisher, session: &HardwareCalibration, kind: fn(Progress) -> SessionEvent| {
        publisher.emit(kind(Progress::Hardware(session.progress())));
    };

    let mut inbox = Mailbox::new(samples, commands);
    loop {
        match inbox.next() {
            Inbox::Sample(sample) => {
                if session.record(&sample) {
                    emit(&publisher, &session, SessionEvent::SampleUpdated);
                }
            }
            Inbox::SamplesClosed => {
                publisher.finish(Outcome::Failed {
                    reason: "sample stream closed".into(),
                });
                return;
            }
            Inbox::Command(HardwareCommand::Advance(reply)) => match session.advance() {
                Ok(HardwareStep::Analyzing) => {
                    emit(&publisher, &session, SessionEvent::StepChanged);
                    let result = session.finish(store);
                    emit(&publisher, &session, SessionEvent::StepChanged);
                    match &result {
                        Ok(cal) => {
                            tracing::info!(
                                min = cal.min_value,
                                max = cal.max_value,
                                inverted = cal.is_inverted,
                                rollover = cal.has_rollover,
                                "calibration saved"
                            );
                            publisher.finish(Outcome::Calibrated(cal.clone()));
                        }
                        Err(e) => publisher.finish(failed(e)),
                    }
                    let _ = reply.send(result.map(|_| session.step()));
                    return;
                }
                Ok(step) => {
                    emit(&publisher, &session, SessionEvent::StepChanged);
                    let _ = reply.send(Ok(step));
                }
                Err(e) => {
                    log_rejection(&e, "advance");
                    let _ = reply.send(Err(e));
                }
            },
            Inbox::Command(HardwareCommand::Progress(reply)) => {
                let _ = reply.send(Ok(session.progress()));
            }
            Inbox::Command(HardwareCommand::Cancel) | Inbox::CommandsClosed => {
                tracing::info!("hardware calibration cancelled");
                publisher.finish(Outcome::Cancelled);
                return;
            }
        }
    }
}

// ── Lever calibration ────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum LeverCommand {
    Progress(Reply<LeverProgress>),
    Cancel,
}

#[derive(Debug)]
pub struct LeverHandle {
    actor: Actor<LeverCommand>,
}

impl LeverHandle {
    pub fn progress(&self) -> Result<LeverProgress> {
        request(&self.actor.tx, LeverCommand::Progress)
    }

    /// Stop the sweep before its next step; nothing is persisted.
    pub fn cancel(&self) {
        let _ = self.actor.tx.send(LeverCommand::Cancel);
    }

    pub fn is_finished(&self) -> bool {
        self.actor.is_finished()
    }

    pub fn join(mut self) {
        self.actor.join();
    }
}

pub(crate) fn spawn_lever<S, C>(
    calibrator: LeverCalibrator<S>,
    clock: C,
    store: Arc<dyn CalibrationStore>,
    publisher: Publisher,
    on_exit: impl FnOnce() + Send + 'static,
) -> LeverHandle
where
    S: Simulator + Send + 'static,
    C: Clock + Send + 'static,
{
    let (tx, rx) = xch::unbounded();
    let join = std::thread::spawn(move || {
        run_lever(calibrator, &clock, &rx, store.as_ref(), publisher);
        on_exit();
    });
    LeverHandle {
        actor: Actor {
            tx,
            join: Some(join),
        },
    }
}

fn run_lever<S: Simulator, C: Clock>(
    mut calibrator: LeverCalibrator<S>,
    clock: &C,
    commands: &xch::Receiver<LeverCommand>,
    store: &dyn CalibrationStore,
    mut publisher: Publisher,
) {
    let _span = tracing::info_span!("lever", lever_id = calibrator.lever_id()).entered();
    tracing::info!("lever calibration started");
    publisher.emit(SessionEvent::Started(Progress::Lever(calibrator.progress())));
    let outcome = drive_lever(&mut calibrator, clock, commands, store, &publisher);
    if matches!(outcome, Outcome::Cancelled) {
        tracing::info!("lever calibration cancelled");
    }
    publisher.finish(outcome);
}

fn drive_lever<S: Simulator, C: Clock>(
    calibrator: &mut LeverCalibrator<S>,
    clock: &C,
    commands: &xch::Receiver<LeverCommand>,
    store: &dyn CalibrationStore,
    publisher: &Publisher,
) -> Outcome {
    let step_changed = |c: &LeverCalibrator<S>| {
        publisher.emit(SessionEvent::StepChanged(Progress::Lever(c.progress())));
    };

    if let Err(e) = calibrator.initialize() {
        return failed(&e);
    }
    step_changed(calibrator);

    let delay = calibrator.params().step_delay;
    let started = clock.now();
    while calibrator.step() == LeverStep::Calibrating {
        loop {
            match commands.try_recv() {
                Ok(LeverCommand::Progress(reply)) => {
                    let _ = reply.send(Ok(calibrator.progress()));
                }
                Ok(LeverCommand::Cancel) | Err(xch::TryRecvError::Disconnected) => {
                    return Outcome::Cancelled;
                }
                Err(xch::TryRecvError::Empty) => break,
            }
        }
        match calibrator.step_once() {
            Ok(SweepStatus::Running) => {
                publisher.emit(SessionEvent::SampleUpdated(Progress::Lever(
                    calibrator.progress(),
                )));
                clock.sleep(delay);
            }
            Ok(SweepStatus::Finished) => step_changed(calibrator),
            Err(e) => return failed(&e),
        }
    }

    match calibrator.save(store) {
        Ok(notches) => {
            step_changed(calibrator);
            let took = clock.now().saturating_duration_since(started);
            tracing::info!(
                notches = notches.len(),
                sweep_ms = u64::try_from(took.as_millis()).unwrap_or(u64::MAX),
                "notches saved"
            );
            Outcome::NotchesSaved {
                lever_id: calibrator.lever_id(),
                notches,
            }
        }
        Err(e) => failed(&e),
    }
}

// ── Notch mapping ────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum MappingCommand {
    StartMapping(Reply<MappingStep>),
    StartCapture(Reply<MappingStep>),
    StopCapture(Reply<MappingStep>),
    CaptureRange(Reply<MappingStep>),
    GoToNotch(usize, Reply<MappingStep>),
    Save(Reply<MappingStep>),
    Progress(Reply<MappingProgress>),
    Cancel,
}

#[derive(Debug)]
pub struct MappingHandle {
    actor: Actor<MappingCommand>,
}

impl MappingHandle {
    pub fn start_mapping(&self) -> Result<MappingStep> {
        request(&self.actor.tx, MappingCommand::StartMapping)
    }

    pub fn start_capture(&self) -> Result<MappingStep> {
        request(&self.actor.tx, MappingCommand::StartCapture)
    }

    pub fn stop_capture(&self) -> Result<MappingStep> {
        request(&self.actor.tx, MappingCommand::StopCapture)
    }

    pub fn capture_range(&self) -> Result<MappingStep> {
        request(&self.actor.tx, MappingCommand::CaptureRange)
    }

    pub fn go_to_notch(&self, index: usize) -> Result<MappingStep> {
        request(&self.actor.tx, |r| MappingCommand::GoToNotch(index, r))
    }

    /// Persist every captured range; the session ends either way.
    pub fn save(&self) -> Result<MappingStep> {
        request(&self.actor.tx, MappingCommand::Save)
    }

    pub fn progress(&self) -> Result<MappingProgress> {
        request(&self.actor.tx, MappingCommand::Progress)
    }

    pub fn cancel(&self) {
        let _ = self.actor.tx.send(MappingCommand::Cancel);
    }

    pub fn is_finished(&self) -> bool {
        self.actor.is_finished()
    }

    pub fn join(mut self) {
        self.actor.join();
    }
}

pub(crate) fn spawn_mapping(
    session: NotchMapping,
    samples: xch::Receiver<RawSample>,
    store: Arc<dyn CalibrationStore>,
    publisher: Publisher,
    on_exit: impl FnOnce() + Send + 'static,
) -> MappingHandle {
    let (tx, rx) = xch::unbounded();
    let join = std::thread::spawn(move || {
        run_mapping(session, &samples, &rx, store.as_ref(), publisher);
        on_exit();
    });
    MappingHandle {
        actor: Actor {
            tx,
            join: Some(join),
        },
    }
}

fn run_mapping(
    mut session: NotchMapping,
    samples: &xch::Receiver<RawSample>,
    commands: &xch::Receiver<MappingCommand>,
    store: &dyn CalibrationStore,
    mut publisher: Publisher,
) {
    let _span = tracing::info_span!("mapping", lever_id = session.lever_id()).entered();
    tracing::info!(pin = %session.pin(), notches = session.notch_count(), "notch mapping started");
    publisher.emit(SessionEvent::Started(Progress::Mapping(session.progress())));
    let emit = |publisher: &Publisher, session: &NotchMapping, kind: fn(Progress) -> SessionEvent| {
        publisher.emit(kind(Progress::Mapping(session.progress())));
    };

    let mut inbox = Mailbox::new(samples, commands);
    loop {
        let command = match inbox.next() {
            Inbox::Sample(sample) => {
                if session.on_sample(&sample) {
                    emit(&publisher, &session, SessionEvent::SampleUpdated);
                }
                continue;
            }
            Inbox::SamplesClosed => {
                publisher.finish(Outcome::Failed {
                    reason: "sample stream closed".into(),
                });
                return;
            }
            Inbox::Command(command) => command,
            Inbox::CommandsClosed => MappingCommand::Cancel,
        };

        let (action, result, reply, kind): (_, _, _, fn(Progress) -> SessionEvent) = match command {
            MappingCommand::StartMapping(reply) => (
                "start mapping",
                session.start_mapping(),
                reply,
                SessionEvent::StepChanged,
            ),
            MappingCommand::StartCapture(reply) => (
                "start capture",
                session.start_capture().map(|()| session.step()),
                reply,
                SessionEvent::CaptureChanged,
            ),
            MappingCommand::StopCapture(reply) => (
                "stop capture",
                session.stop_capture().map(|()| session.step()),
                reply,
                SessionEvent::CaptureChanged,
            ),
            MappingCommand::CaptureRange(reply) => (
                "capture range",
                session.capture_range(),
                reply,
                SessionEvent::StepChanged,
            ),
            MappingCommand::GoToNotch(index, reply) => (
                "go to notch",
                session.go_to_notch(index),
                reply,
                SessionEvent::StepChanged,
            ),
            MappingCommand::Save(reply) => {
                finish_mapping(&mut session, store, &mut publisher, reply);
                if publisher.is_finished() {
                    return;
                }
                continue;
            }
            MappingCommand::Progress(reply) => {
                let _ = reply.send(Ok(session.progress()));
                continue;
            }
            MappingCommand::Cancel => {
                tracing::info!("notch mapping cancelled");
                publisher.finish(Outcome::Cancelled);
                return;
            }
        };

        match result {
            Ok(step) => {
                emit(&publisher, &session, kind);
                let _ = reply.send(Ok(step));
            }
            Err(e) => {
                log_rejection(&e, action);
                let _ = reply.send(Err(e));
            }
        }
    }
}

fn finish_mapping(
    session: &mut NotchMapping,
    store: &dyn CalibrationStore,
    publisher: &mut Publisher,
    reply: Reply<MappingStep>,
) {
    if session.step() != MappingStep::Preview {
        // Wrong step is a validation error; the session stays alive.
        let r = session.save(store);
        if let Err(e) = &r {
            log_rejection(e, "save");
        }
        let _ = reply.send(r.map(|_| session.step()));
        return;
    }
    let result = session.save(store);
    publisher.emit(SessionEvent::StepChanged(Progress::Mapping(session.progress())));
    match &result {
        Ok(ranges) => {
            tracing::info!(ranges = ranges.len(), "notch ranges saved");
            publisher.finish(Outcome::RangesSaved {
                lever_id: session.lever_id(),
                ranges: ranges.clone(),
            });
        }
        Err(e) => publisher.finish(failed(e)),
    }
    let _ = reply.send(result.map(|_| session.step()));
}
