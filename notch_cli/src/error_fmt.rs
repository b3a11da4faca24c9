//! Human-readable error descriptions and structured JSON error formatting.

use notch_core::CalibrationError;
use notch_core::as_calibration_error;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ce) = as_calibration_error(err) {
        return match ce {
            CalibrationError::InsufficientSamples { needed, got } => format!(
                "What happened: Not enough samples ({got} of {needed}).\nLikely causes: The recording stopped early or the CSV is truncated.\nHow to fix: Record longer, or lower hardware.min_samples / hardware.sweep_min_samples in the config."
            ),
            CalibrationError::NoDistinctValues { needed, got } => format!(
                "What happened: The input did not move ({got} distinct values, need {needed}).\nLikely causes: Disconnected potentiometer, wrong pin, or a recording made with the control untouched.\nHow to fix: Check wiring, wiggle the control slightly while recording, or lower hardware.min_distinct."
            ),
            CalibrationError::NoRangeDetected => {
                "What happened: No usable range was detected.\nLikely causes: Minimum and maximum recordings are identical, or the lever reports an empty range.\nHow to fix: Record the minimum and maximum with the control at opposite ends.".to_string()
            }
            CalibrationError::AnalysisFailed(cause) => format!(
                "What happened: Analysis of the recorded phases failed ({cause}).\nLikely causes: Minimum and maximum were recorded at the same position, or the sweep never moved.\nHow to fix: Start a new calibration and move the control end to end during the sweep."
            ),
            CalibrationError::Simulator(msg) => format!(
                "What happened: The simulator reported an error ({msg}).\nLikely causes: Simulator not running, or the lever endpoints do not exist.\nHow to fix: Start the simulator and check the lever paths, then retry."
            ),
            CalibrationError::SimulatorTimeout => {
                "What happened: The simulator did not answer in time.\nLikely causes: Simulator busy or paused.\nHow to fix: Unpause the simulator and retry; raise lever.step_delay_ms if it keeps happening.".to_string()
            }
            CalibrationError::Persistence(msg) => format!(
                "What happened: Saving the result failed ({msg}).\nLikely causes: Storage unavailable.\nHow to fix: Check the storage backend and rerun the calibration."
            ),
            CalibrationError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from config or CSV loading
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("sample csv must have header") {
        return "Invalid headers in sample CSV. Expected 'raw'.".to_string();
    }

    if lower.contains("invalid csv row") {
        return format!(
            "What happened: A sample CSV row could not be parsed.\nLikely causes: Non-integer value or an extra column.\nHow to fix: Keep one integer ADC code per line under the 'raw' header. Original: {msg}"
        );
    }

    if lower.contains("open sample csv") || lower.contains("read config") {
        return format!(
            "What happened: A file could not be opened.\nLikely causes: Wrong path or missing permissions.\nHow to fix: Check the path and try again. Original: {msg}"
        );
    }

    if lower.contains("invalid configuration") {
        return format!(
            "What happened: Configuration is invalid.\nLikely causes: Unknown keys, wrong types, or out-of-range values.\nHow to fix: Edit the TOML config and try again. Original: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable variant name for JSON output.
pub fn error_reason_name(err: &eyre::Report) -> &'static str {
    match as_calibration_error(err) {
        Some(CalibrationError::InsufficientSamples { .. }) => "InsufficientSamples",
        Some(CalibrationError::NoDistinctValues { .. }) => "NoDistinctValues",
        Some(CalibrationError::NoRangeDetected) => "NoRangeDetected",
        Some(CalibrationError::AnalysisFailed(_)) => "AnalysisFailed",
        Some(CalibrationError::InvalidStep { .. }) => "InvalidStep",
        Some(CalibrationError::InvalidNotchIndex { .. }) => "InvalidNotchIndex",
        Some(CalibrationError::Simulator(_)) => "Simulator",
        Some(CalibrationError::SimulatorTimeout) => "SimulatorTimeout",
        Some(CalibrationError::Persistence(_)) => "Persistence",
        Some(CalibrationError::AlreadyRunning(_)) => "AlreadyRunning",
        Some(CalibrationError::Cancelled) => "Cancelled",
        Some(CalibrationError::SessionGone) => "SessionGone",
        Some(CalibrationError::Config(_)) => "Config",
        None => "Error",
    }
}

/// Stable exit codes per error family; untyped errors return 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match as_calibration_error(err) {
        Some(
            CalibrationError::InsufficientSamples { .. }
            | CalibrationError::NoDistinctValues { .. }
            | CalibrationError::NoRangeDetected
            | CalibrationError::AnalysisFailed(_)
            | CalibrationError::InvalidStep { .. }
            | CalibrationError::InvalidNotchIndex { .. },
        ) => 3,
        Some(CalibrationError::Simulator(_) | CalibrationError::SimulatorTimeout) => 4,
        Some(CalibrationError::Persistence(_)) => 5,
        Some(CalibrationError::Cancelled | CalibrationError::SessionGone) => 6,
        Some(CalibrationError::AlreadyRunning(_)) => 7,
        Some(CalibrationError::Config(_)) | None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = error_reason_name(err);
    let message = humanize(err);
    let details = match as_calibration_error(err) {
        Some(
            CalibrationError::InsufficientSamples { needed, got }
            | CalibrationError::NoDistinctValues { needed, got },
        ) => Some(json!({ "needed": needed, "got": got })),
        Some(CalibrationError::InvalidNotchIndex { index, count }) => {
            Some(json!({ "index": index, "count": count }))
        }
        _ => None,
    };

    let obj = if let Some(d) = details {
        json!({ "reason": reason, "details": d, "message": message })
    } else {
        json!({ "reason": reason, "message": message })
    };
    obj.to_string()
}
