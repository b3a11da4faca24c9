//! Subcommand implementations: config mapping, simulator assembly and output.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use notch_config::Config;
use notch_core::events::{Outcome, Progress, SessionEvent, Topic};
use notch_core::{
    Calibration, CalibrationError, HardwareParams, InputId, LeverConfigId, LeverEndpoints,
    LeverParams, MemoryStore, Notch, NotchKind, SessionPool, analyze_sweep, calibrate_recorded,
    fraction, normalize, total_travel,
};
use notch_hardware::{SimulatedLever, SimulatedPot};
use notch_traits::MonotonicClock;
use serde_json::json;

use crate::cli::Profile;

/// Poll interval while waiting for lever events; lets us notice a dead session.
const EVENT_POLL: Duration = Duration::from_millis(200);

pub fn analyze(
    cfg: &Config,
    sweep: &Path,
    min: &Path,
    max: &Path,
    input_id: InputId,
    json: bool,
) -> eyre::Result<()> {
    let min_samples = notch_config::load_samples_csv(min)?;
    let sweep_samples = notch_config::load_samples_csv(sweep)?;
    let max_samples = notch_config::load_samples_csv(max)?;
    tracing::info!(
        min = min_samples.len(),
        sweep = sweep_samples.len(),
        max = max_samples.len(),
        "recorded phases loaded"
    );

    let params = HardwareParams::from(&cfg.hardware);
    let analysis = analyze_sweep(&sweep_samples, params.max_hardware_value);
    let cal = calibrate_recorded(input_id, &params, &min_samples, &sweep_samples, &max_samples)
        .wrap_err("calibration from recorded phases failed")?;

    if json {
        println!(
            "{}",
            json!({
                "calibration": cal,
                "analysis": analysis,
                "total_travel": total_travel(&cal),
            })
        );
    } else {
        print_calibration(&cal);
    }
    Ok(())
}

pub fn normalize_raw(cfg: &Config, raw: i32, json: bool) -> eyre::Result<()> {
    let cal = Calibration::from_config(cfg).ok_or_else(|| {
        CalibrationError::Config("no [calibration] section in config".to_string())
    })?;
    let value = normalize(raw, &cal);
    let travel = total_travel(&cal);
    let share = fraction(value, &cal);
    tracing::debug!(raw, value, travel, "normalized");

    if json {
        println!(
            "{}",
            json!({ "raw": raw, "value": value, "total_travel": travel, "fraction": share })
        );
    } else {
        println!("raw {raw} -> {value} of {travel} ({share:.4})");
    }
    Ok(())
}

fn simulated_lever(profile: Profile, notches: u16) -> SimulatedLever {
    match profile {
        Profile::Echo => SimulatedLever::echo(usize::from(notches)),
        Profile::Gates => SimulatedLever::gates(&[0.0, 0.5, 1.0]),
        Profile::Mixed => SimulatedLever::mixed(),
    }
}

pub fn lever_sim(
    cfg: &Config,
    profile: Profile,
    notches: u16,
    lever_id: LeverConfigId,
    json: bool,
) -> eyre::Result<()> {
    let sim = simulated_lever(profile, notches);
    let endpoints = LeverEndpoints::from_base(sim.base());
    let pool = SessionPool::new(Arc::new(MemoryStore::new()))
        .with_lever_params(LeverParams::from(&cfg.lever));

    // Subscribe first so the Started event is not missed.
    let events = pool.events().subscribe(Topic::Lever(lever_id));
    let handle = pool.start_lever_calibration(lever_id, endpoints, sim, MonotonicClock::new())?;
    tracing::info!(lever_id, ?profile, "lever sweep started");

    let outcome = loop {
        match events.recv_timeout(EVENT_POLL) {
            Ok(event) => {
                if json {
                    println!("{}", serde_json::to_string(&event)?);
                } else {
                    print_event(&event);
                }
                if let SessionEvent::Finished(outcome) = event {
                    break outcome;
                }
            }
            // Everything a finished session published is already queued.
            Err(e) if e.is_timeout() => {
                if handle.is_finished() && events.is_empty() {
                    return Err(CalibrationError::SessionGone.into());
                }
            }
            Err(_) => return Err(CalibrationError::SessionGone.into()),
        }
    };
    handle.join();

    match outcome {
        Outcome::NotchesSaved { lever_id, notches } => {
            if !json {
                print_notches(lever_id, &notches);
            }
            Ok(())
        }
        Outcome::Cancelled => Err(CalibrationError::Cancelled.into()),
        Outcome::Failed { reason } => Err(eyre::eyre!(reason).wrap_err("lever calibration failed")),
        other => Err(eyre::eyre!("unexpected lever outcome: {other:?}")),
    }
}

/// Calibrate a generated rollover sweep with the configured guards.
pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let params = HardwareParams::from(&cfg.hardware);
    let max_hw = params.max_hardware_value;
    let travel = max_hw / 2;
    let start = max_hw - max_hw / 8;
    // Jitter wide enough to satisfy min_distinct.
    let amplitude = i32::try_from(params.min_distinct).unwrap_or(i32::MAX / 4).max(1);
    let mut pot = SimulatedPot::new(max_hw, start, travel).with_jitter(amplitude, 0x5EED);

    let hold = params
        .min_samples
        .max(params.min_distinct.saturating_mul(4))
        .saturating_mul(2);
    let sweep_len = params.sweep_min_samples.max(200);
    let min_phase = pot.min_phase(hold);
    let sweep = pot.sweep(sweep_len);
    let max_phase = pot.max_phase(hold);

    let cal = calibrate_recorded(0, &params, &min_phase, &sweep, &max_phase)
        .wrap_err("self-check calibration failed")?;
    let tolerance = amplitude * 2 + 1;
    if !cal.has_rollover || (total_travel(&cal) - travel).abs() > tolerance {
        eyre::bail!(
            "self-check failed: expected rollover travel {travel} (±{tolerance}), got {:?}",
            cal
        );
    }
    tracing::info!(travel = total_travel(&cal), "self-check passed");

    if json {
        println!(
            "{}",
            json!({
                "ok": true,
                "calibration_configured": cfg.calibration.is_some(),
                "calibration": cal,
            })
        );
    } else {
        println!("self-check ok");
        print_calibration(&cal);
    }
    Ok(())
}

fn print_calibration(cal: &Calibration) {
    println!("input {}", cal.input_id);
    println!("  min_value          {}", cal.min_value);
    println!("  max_value          {}", cal.max_value);
    println!("  max_hardware_value {}", cal.max_hardware_value);
    println!("  inverted           {}", cal.is_inverted);
    println!("  rollover           {}", cal.has_rollover);
    println!("  total_travel       {}", total_travel(cal));
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Started(Progress::Lever(p)) | SessionEvent::StepChanged(Progress::Lever(p)) => {
            println!("lever {}: {}", p.lever_id, p.step.name());
        }
        SessionEvent::SampleUpdated(Progress::Lever(p)) => {
            tracing::debug!(
                value = p.current_value,
                notch = ?p.simulator_notch,
                found = p.notches_found,
                swept = p.swept,
                "sweep step"
            );
        }
        SessionEvent::Finished(outcome) if !outcome.is_success() => {
            println!("session ended: {outcome:?}");
        }
        _ => {}
    }
}

fn print_notches(lever_id: LeverConfigId, notches: &[Notch]) {
    println!("lever {lever_id}: {} notches", notches.len());
    for n in notches {
        match n.kind {
            NotchKind::Gate { value } => println!("  #{} gate   {value:.3}", n.index),
            NotchKind::Linear {
                min_value,
                max_value,
            } => println!("  #{} linear {min_value:.3}..{max_value:.3}", n.index),
        }
    }
}
