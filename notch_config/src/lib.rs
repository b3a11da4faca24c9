#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and recorded-sample parsing for the calibration engine.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//!   Every section is optional; defaults match the engine's fixed parameters.
//! - The sample CSV loader enforces its header and rejects malformed rows
//!   with their line number.
use serde::Deserialize;

/// Recorded-sample CSV schema.
///
/// Expected header:
/// raw
///
/// Example:
/// raw
/// 101
/// 124
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SampleRow {
    pub raw: i32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Highest ADC code (1023 for a 10-bit converter).
    pub max_hardware_value: i32,
    /// Samples required before leaving collecting_min/collecting_max.
    pub min_samples: usize,
    /// Distinct values required before leaving collecting_min/collecting_max.
    pub min_distinct: usize,
    /// Samples required before leaving the sweep.
    pub sweep_min_samples: usize,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            max_hardware_value: 1023,
            min_samples: 10,
            min_distinct: 3,
            sweep_min_samples: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LeverCfg {
    /// Sweep step as a fraction of the lever range, in (0.0, 1.0].
    pub step_fraction: f64,
    /// Pause between sweep steps (ms).
    pub step_delay_ms: u64,
    /// Float tolerance when comparing written and read-back values.
    pub tolerance: f64,
}

impl Default for LeverCfg {
    fn default() -> Self {
        Self {
            step_fraction: 0.01,
            step_delay_ms: 10,
            tolerance: 0.001,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct MappingCfg {
    /// Samples required before a capture may commit.
    pub min_samples: usize,
    /// Decimal places kept in saved input fractions.
    pub decimals: u32,
}

impl Default for MappingCfg {
    fn default() -> Self {
        Self {
            min_samples: 10,
            decimals: 4,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// A calibration record kept in the config for offline normalization.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PersistedCalibration {
    #[serde(default)]
    pub input_id: i64,
    pub min_value: i32,
    pub max_value: i32,
    /// Defaults to `[hardware].max_hardware_value` when absent.
    #[serde(default)]
    pub max_hardware_value: Option<i32>,
    #[serde(default)]
    pub is_inverted: bool,
    #[serde(default)]
    pub has_rollover: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub hardware: Hardware,
    pub lever: LeverCfg,
    pub mapping: MappingCfg,
    pub logging: Logging,
    /// Optional persisted calibration used by offline tools.
    pub calibration: Option<PersistedCalibration>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Load one column of raw ADC samples, in file order.
pub fn load_samples_csv(path: &std::path::Path) -> eyre::Result<Vec<i32>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open sample CSV {:?}: {}", path, e))?;

    // Enforce exact header
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<String> = headers.iter().map(ToString::to_string).collect();
    if actual != ["raw"] {
        eyre::bail!(
            "sample CSV must have header 'raw', got: {}",
            actual.join(",")
        );
    }

    let mut samples = Vec::new();
    for (idx, rec) in rdr.deserialize::<SampleRow>().enumerate() {
        match rec {
            Ok(row) => samples.push(row.raw),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    Ok(samples)
}

impl Config {
    /// Effective ADC ceiling of the persisted calibration, if any.
    pub fn calibration_max_hardware_value(&self) -> Option<i32> {
        self.calibration.map(|c| {
            c.max_hardware_value
                .unwrap_or(self.hardware.max_hardware_value)
        })
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Hardware
        if self.hardware.max_hardware_value <= 0 {
            eyre::bail!("hardware.max_hardware_value must be > 0");
        }
        if self.hardware.min_samples == 0 {
            eyre::bail!("hardware.min_samples must be >= 1");
        }
        if self.hardware.min_distinct == 0 {
            eyre::bail!("hardware.min_distinct must be >= 1");
        }
        if self.hardware.min_distinct > self.hardware.min_samples {
            eyre::bail!("hardware.min_distinct must not exceed hardware.min_samples");
        }
        if self.hardware.sweep_min_samples < 2 {
            eyre::bail!("hardware.sweep_min_samples must be >= 2");
        }

        // Lever
        if !(self.lever.step_fraction > 0.0 && self.lever.step_fraction <= 1.0) {
            eyre::bail!("lever.step_fraction must be in (0.0, 1.0]");
        }
        if self.lever.step_delay_ms > 10_000 {
            eyre::bail!("lever.step_delay_ms is unreasonably large (>10s)");
        }
        if !(self.lever.tolerance > 0.0 && self.lever.tolerance.is_finite()) {
            eyre::bail!("lever.tolerance must be > 0.0");
        }

        // Mapping
        if self.mapping.min_samples == 0 {
            eyre::bail!("mapping.min_samples must be >= 1");
        }
        if self.mapping.decimals > 10 {
            eyre::bail!("mapping.decimals must be <= 10");
        }

        // Logging
        if let Some(rotation) = self.logging.rotation.as_deref()
            && !matches!(rotation, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never, daily, hourly");
        }

        // Calibration
        if let Some(cal) = &self.calibration {
            let max_hw = cal
                .max_hardware_value
                .unwrap_or(self.hardware.max_hardware_value);
            if max_hw <= 0 {
                eyre::bail!("calibration.max_hardware_value must be > 0");
            }
            if cal.max_value < cal.min_value {
                eyre::bail!("calibration.max_value must be >= calibration.min_value");
            }
            if !cal.has_rollover && cal.max_value > max_hw {
                eyre::bail!(
                    "calibration.max_value exceeds max_hardware_value without has_rollover"
                );
            }
        }

        Ok(())
    }
}
