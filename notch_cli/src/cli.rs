//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(
    name = "notchctl",
    version,
    about = "Offline tools for input calibration and lever notch detection"
)]
pub struct Cli {
    /// Path to config TOML (built-in defaults when omitted)
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Print results and errors as JSON lines
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Built-in lever shapes for `lever-sim`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Profile {
    /// Equal continuous notches
    Echo,
    /// Detents at 0.0, 0.5 and 1.0
    Gates,
    /// Gate, linear range, gate
    Mixed,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute a calibration from recorded min, sweep and max phases
    Analyze {
        /// CSV of the sweep (header `raw`, chronological)
        #[arg(long, value_name = "FILE")]
        sweep: PathBuf,
        /// CSV recorded at the physical minimum
        #[arg(long, value_name = "FILE")]
        min: PathBuf,
        /// CSV recorded at the physical maximum
        #[arg(long, value_name = "FILE")]
        max: PathBuf,
        /// Input id stamped on the result
        #[arg(long, value_name = "ID", default_value_t = 1)]
        input_id: i64,
    },
    /// Translate a raw ADC code with the config's [calibration]
    Normalize {
        /// Raw ADC code
        #[arg(long, allow_negative_numbers = true)]
        raw: i32,
    },
    /// Sweep a simulated lever and print the detected notches
    LeverSim {
        #[arg(long, value_enum, default_value_t = Profile::Echo)]
        profile: Profile,
        /// Notch count for the echo profile
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..=64))]
        notches: u16,
        /// Lever config id used for the session
        #[arg(long, value_name = "ID", default_value_t = 1)]
        lever_id: i64,
    },
    /// Validate the config and calibrate a generated rollover sweep
    SelfCheck,
}
