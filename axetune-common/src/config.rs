//! Tuning configuration
//!
//! All sweep, benchmark and safety parameters live in [`TuningConfig`]. Every
//! field has a built-in default, so a TOML file only needs the keys it wants
//! to override:
//!
//! ```toml
//! [safety]
//! max_temp_c = 65.0
//!
//! [benchmark]
//! duration_ms = 900000
//! ```
//!
//! # Config file priority
//!
//! 1. Command-line `--config <path>`
//! 2. `AXETUNE_CONFIG` environment variable
//! 3. No file: built-in defaults

use crate::model::Candidate;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming a TOML config file
pub const CONFIG_ENV_VAR: &str = "AXETUNE_CONFIG";

/// Complete tuning configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub search: SearchConfig,
    pub bounds: Bounds,
    pub benchmark: BenchmarkConfig,
    pub safety: SafetyLimits,
    pub http: HttpConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

/// Step sizes for the coarse sweep and the fine-tune grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Coarse sweep voltage step (mV)
    pub voltage_increment: u32,

    /// Coarse sweep frequency step (MHz)
    pub frequency_increment: u32,

    /// Fine-tune grid voltage offset (mV)
    pub fine_tune_voltage_step: u32,

    /// Fine-tune grid frequency offset (MHz)
    pub fine_tune_frequency_step: u32,

    /// Number of top performers fine-tune searches around
    pub fine_tune_top_k: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            voltage_increment: 10,
            frequency_increment: 20,
            fine_tune_voltage_step: 5,
            fine_tune_frequency_step: 10,
            fine_tune_top_k: 8,
        }
    }
}

/// Allowed operating envelope for candidates (inclusive)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Bounds {
    pub min_voltage_mv: u32,
    pub max_voltage_mv: u32,
    pub min_frequency_mhz: u32,
    pub max_frequency_mhz: u32,
}

impl Default for Bounds {
    fn default() -> Self {
        Self {
            min_voltage_mv: 1120,
            max_voltage_mv: 1200,
            min_frequency_mhz: 500,
            max_frequency_mhz: 750,
        }
    }
}

impl Bounds {
    /// True if the candidate lies inside the envelope
    pub fn contains(&self, candidate: Candidate) -> bool {
        (self.min_voltage_mv..=self.max_voltage_mv).contains(&candidate.core_voltage)
            && (self.min_frequency_mhz..=self.max_frequency_mhz).contains(&candidate.frequency)
    }
}

/// Sampling window and reduction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkConfig {
    /// Length of one trial's sampling window
    pub duration_ms: u64,

    /// Time between telemetry samples
    pub sample_interval_ms: u64,

    /// Wait after a restart before trusting telemetry
    pub settle_ms: u64,

    /// Pause between PATCHing settings and requesting the restart
    pub apply_pause_ms: u64,

    /// Hashrate samples dropped from each end before averaging
    pub hashrate_trim: usize,

    /// Lowest temperature samples dropped (warm-up) before averaging
    pub temperature_trim: usize,

    /// Fraction of the expected hashrate a trial must reach
    pub tolerance: f64,

    /// Minimum samples per trial accepted by validation
    pub min_samples: u64,
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            duration_ms: 1_200_000,
            sample_interval_ms: 15_000,
            settle_ms: 600_000,
            apply_pause_ms: 2_000,
            hashrate_trim: 3,
            temperature_trim: 6,
            tolerance: 0.90,
            min_samples: 7,
        }
    }
}

impl BenchmarkConfig {
    /// Samples taken per trial (`duration / interval`)
    pub fn total_samples(&self) -> u64 {
        if self.sample_interval_ms == 0 {
            0
        } else {
            self.duration_ms / self.sample_interval_ms
        }
    }
}

/// Per-sample safety envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyLimits {
    /// Chip temperature abort threshold (°C, inclusive)
    pub max_temp_c: f64,

    /// VR temperature abort threshold (°C, inclusive)
    pub max_vr_temp_c: f64,

    /// Readings below this are treated as a broken sensor (°C)
    pub min_plausible_temp_c: f64,

    pub min_input_voltage_mv: f64,
    pub max_input_voltage_mv: f64,

    /// Power abort threshold (W, exclusive)
    pub max_power_w: f64,
}

impl Default for SafetyLimits {
    fn default() -> Self {
        Self {
            max_temp_c: 68.0,
            max_vr_temp_c: 85.0,
            min_plausible_temp_c: 5.0,
            min_input_voltage_mv: 11_600.0,
            max_input_voltage_mv: 12_000.0,
            max_power_w: 100.0,
        }
    }
}

/// Device HTTP client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub request_timeout_ms: u64,

    /// Attempts for a telemetry read before giving up
    pub read_retries: u32,

    pub retry_delay_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            read_retries: 3,
            retry_delay_ms: 5_000,
        }
    }
}

/// Results file location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub results_file_prefix: String,
    pub results_dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            results_file_prefix: "nerdqaxe_benchmark_results".to_string(),
            results_dir: PathBuf::from("."),
        }
    }
}

impl OutputConfig {
    /// `<results_dir>/<prefix>_<host>.json`
    ///
    /// `address` may be a bare host or an `http(s)://` URL; both name the
    /// same file.
    pub fn results_path(&self, address: &str) -> PathBuf {
        self.results_dir
            .join(format!("{}_{}.json", self.results_file_prefix, file_safe_host(address)))
    }
}

/// Host part of a device address, usable inside a file name
fn file_safe_host(address: &str) -> String {
    let trimmed = address.trim();
    let host = trimmed
        .strip_prefix("http://")
        .or_else(|| trimmed.strip_prefix("https://"))
        .unwrap_or(trimmed)
        .trim_end_matches('/');
    host.replace(['/', ':', '\\'], "_")
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins if set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl TuningConfig {
    /// Parse a TOML document; missing keys take their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load from a TOML file, or return defaults when `path` is `None`
    ///
    /// A path that was given but cannot be read or parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
                })?;
                let config = Self::from_toml_str(&content)?;
                info!("Loaded tuning config from {}", path.display());
                Ok(config)
            }
            None => {
                debug!("No config file given, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check the configuration and the start candidate before touching the
    /// device
    pub fn validate(&self, start: Candidate) -> Result<()> {
        let b = &self.bounds;
        if b.min_voltage_mv > b.max_voltage_mv {
            return Err(Error::Config(format!(
                "min voltage {}mV exceeds max voltage {}mV",
                b.min_voltage_mv, b.max_voltage_mv
            )));
        }
        if b.min_frequency_mhz > b.max_frequency_mhz {
            return Err(Error::Config(format!(
                "min frequency {}MHz exceeds max frequency {}MHz",
                b.min_frequency_mhz, b.max_frequency_mhz
            )));
        }

        if start.core_voltage > b.max_voltage_mv {
            return Err(Error::InvalidInput(format!(
                "Initial voltage exceeds the maximum allowed value of {}mV",
                b.max_voltage_mv
            )));
        }
        if start.frequency > b.max_frequency_mhz {
            return Err(Error::InvalidInput(format!(
                "Initial frequency exceeds the maximum allowed value of {}MHz",
                b.max_frequency_mhz
            )));
        }
        if start.core_voltage < b.min_voltage_mv {
            return Err(Error::InvalidInput(format!(
                "Initial voltage is below the minimum allowed value of {}mV",
                b.min_voltage_mv
            )));
        }
        if start.frequency < b.min_frequency_mhz {
            return Err(Error::InvalidInput(format!(
                "Initial frequency is below the minimum allowed value of {}MHz",
                b.min_frequency_mhz
            )));
        }

        let bench = &self.benchmark;
        if bench.sample_interval_ms == 0 {
            return Err(Error::Config("sample interval must be non-zero".to_string()));
        }
        let samples = bench.total_samples();
        if samples < bench.min_samples {
            return Err(Error::Config(format!(
                "Benchmark time is too short: {} samples, at least {} are required",
                samples, bench.min_samples
            )));
        }
        let samples = samples as usize;
        if samples <= 2 * bench.hashrate_trim || samples <= bench.temperature_trim {
            return Err(Error::Config(format!(
                "{} samples leave nothing to average after trimming",
                samples
            )));
        }
        if !(bench.tolerance > 0.0 && bench.tolerance <= 1.0) {
            return Err(Error::Config(format!(
                "tolerance {} must be in (0, 1]",
                bench.tolerance
            )));
        }

        Ok(())
    }
}

/// Resolve the config file path: CLI argument first, then environment
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    match std::env::var(env_var_name) {
        Ok(path) if !path.is_empty() => Some(PathBuf::from(path)),
        _ => None,
    }
}
