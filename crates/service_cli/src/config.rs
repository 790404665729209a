//! CLI configuration management
//!
//! Handles loading configuration from a TOML file, `SNOOP_*` environment
//! variables and command-line flags.

use serde::Deserialize;
use snoop_kernel::{Execution, SimulationConfig, SimulationError, StreamLayout, Threshold};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Configuration file read when `--config` is not given, if present.
pub const DEFAULT_CONFIG_FILE: &str = "snoop.toml";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid output format: {0}. Must be one of: table, json, csv")]
    InvalidFormat(String),

    #[error("Invalid stream layout: {0}. Must be one of: shared, split")]
    InvalidLayout(String),

    #[error("Configuration file error: {0}")]
    FileError(String),

    #[error("Environment variable error: {0}")]
    EnvError(String),

    #[error("Invalid simulation settings: {0}")]
    Simulation(#[from] SimulationError),
}

/// Log levels accepted by `SNOOP_LOG_LEVEL` and the config file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::InvalidLogLevel(s.to_string())),
        }
    }
}

impl LogLevel {
    /// Convert log level to tracing filter string
    pub fn as_filter_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

/// How reports are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Csv,
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Csv => write!(f, "csv"),
        }
    }
}

fn parse_layout(s: &str) -> Result<StreamLayout, ConfigError> {
    StreamLayout::from_str(s).map_err(|_| ConfigError::InvalidLayout(s.to_string()))
}

/// Simulation and output settings
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SnoopConfig {
    /// Log level
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    /// Run seed
    pub seed: u64,
    /// Number of trials per run
    pub trials: usize,
    /// Threshold given directly; takes precedence over `confidence`
    pub crit: Option<f64>,
    /// One-sided confidence level used when `crit` is unset
    pub confidence: f64,
    /// Earliest step at which the rule may fire
    pub nmin: u64,
    /// Hard cap on observations per trial
    pub nmax: u64,
    /// Stream layout
    #[serde(deserialize_with = "deserialize_layout")]
    pub layout: StreamLayout,
    /// Run split-stream trials on the rayon pool
    pub parallel: bool,
    /// Output format
    #[serde(deserialize_with = "deserialize_format")]
    pub format: OutputFormat,
    /// Wall-clock budget after which the run is cancelled
    pub time_limit_secs: Option<u64>,
    /// Number of `(z, n)` rows shown in table output
    pub rows: usize,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    LogLevel::from_str(&s).map_err(serde::de::Error::custom)
}

fn deserialize_layout<'de, D>(deserializer: D) -> Result<StreamLayout, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_layout(&s).map_err(serde::de::Error::custom)
}

fn deserialize_format<'de, D>(deserializer: D) -> Result<OutputFormat, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    OutputFormat::from_str(&s).map_err(serde::de::Error::custom)
}

impl Default for SnoopConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            seed: 42,
            trials: 1_000,
            crit: None,
            confidence: 0.95,
            nmin: 100,
            nmax: 100_000,
            layout: StreamLayout::Shared,
            parallel: false,
            format: OutputFormat::Table,
            time_limit_secs: None,
            rows: 20,
        }
    }
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::EnvError(format!("{}={} could not be parsed", name, value)))
}

impl SnoopConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::FileError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::FileError(format!("Failed to parse TOML: {}", e)))
    }

    /// Apply `SNOOP_*` overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply `SNOOP_*` overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("SNOOP_LOG_LEVEL") {
            self.log_level = LogLevel::from_str(&v)?;
        }
        if let Some(v) = lookup("SNOOP_SEED") {
            self.seed = parse_env("SNOOP_SEED", &v)?;
        }
        if let Some(v) = lookup("SNOOP_TRIALS") {
            self.trials = parse_env("SNOOP_TRIALS", &v)?;
        }
        if let Some(v) = lookup("SNOOP_CRIT") {
            self.crit = Some(parse_env("SNOOP_CRIT", &v)?);
        }
        if let Some(v) = lookup("SNOOP_CONFIDENCE") {
            self.confidence = parse_env("SNOOP_CONFIDENCE", &v)?;
        }
        if let Some(v) = lookup("SNOOP_NMIN") {
            self.nmin = parse_env("SNOOP_NMIN", &v)?;
        }
        if let Some(v) = lookup("SNOOP_NMAX") {
            self.nmax = parse_env("SNOOP_NMAX", &v)?;
        }
        if let Some(v) = lookup("SNOOP_LAYOUT") {
            self.layout = parse_layout(&v)?;
        }
        if let Some(v) = lookup("SNOOP_PARALLEL") {
            self.parallel = parse_env("SNOOP_PARALLEL", &v.to_ascii_lowercase())?;
        }
        if let Some(v) = lookup("SNOOP_FORMAT") {
            self.format = OutputFormat::from_str(&v)?;
        }
        if let Some(v) = lookup("SNOOP_TIME_LIMIT_SECS") {
            self.time_limit_secs = Some(parse_env("SNOOP_TIME_LIMIT_SECS", &v)?);
        }
        if let Some(v) = lookup("SNOOP_ROWS") {
            self.rows = parse_env("SNOOP_ROWS", &v)?;
        }
        Ok(())
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&mut self, cli: &CliArgs) -> Result<(), ConfigError> {
        if cli.verbose {
            self.log_level = LogLevel::Debug;
        }
        if let Some(seed) = cli.seed {
            self.seed = seed;
        }
        if let Some(trials) = cli.trials {
            self.trials = trials;
        }
        if let Some(crit) = cli.crit {
            self.crit = Some(crit);
        }
        if let Some(confidence) = cli.confidence {
            // An explicit confidence level replaces a threshold from lower layers
            self.confidence = confidence;
            self.crit = None;
        }
        if let Some(nmin) = cli.nmin {
            self.nmin = nmin;
        }
        if let Some(nmax) = cli.nmax {
            self.nmax = nmax;
        }
        if let Some(layout) = &cli.layout {
            self.layout = parse_layout(layout)?;
        }
        if cli.parallel {
            self.parallel = true;
        }
        if let Some(format) = &cli.format {
            self.format = OutputFormat::from_str(format)?;
        }
        if let Some(secs) = cli.time_limit_secs {
            self.time_limit_secs = Some(secs);
        }
        if let Some(rows) = cli.rows {
            self.rows = rows;
        }
        Ok(())
    }

    /// Threshold as configured
    pub fn threshold(&self) -> Threshold {
        match self.crit {
            Some(crit) => Threshold::Crit(crit),
            None => Threshold::Confidence(self.confidence),
        }
    }

    /// Build the validated kernel configuration
    pub fn simulation_config(&self) -> Result<SimulationConfig, ConfigError> {
        let execution = if self.parallel {
            Execution::Parallel
        } else {
            Execution::Sequential
        };

        Ok(SimulationConfig::builder()
            .seed(self.seed)
            .trial_count(self.trials)
            .threshold(self.threshold())
            .nmin(self.nmin)
            .nmax(self.nmax)
            .layout(self.layout)
            .execution(execution)
            .build()?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation_config().map(|_| ())
    }
}

/// CLI arguments structure
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Config file path
    pub config_file: Option<PathBuf>,
    /// Force debug logging
    pub verbose: bool,
    /// Seed override
    pub seed: Option<u64>,
    /// Trial count override
    pub trials: Option<usize>,
    /// Threshold override
    pub crit: Option<f64>,
    /// Confidence level override; clears any inherited `crit`
    pub confidence: Option<f64>,
    pub nmin: Option<u64>,
    pub nmax: Option<u64>,
    /// Stream layout override (shared, split)
    pub layout: Option<String>,
    /// Enable parallel execution
    pub parallel: bool,
    /// Output format override (table, json, csv)
    pub format: Option<String>,
    pub time_limit_secs: Option<u64>,
    /// Table row count override
    pub rows: Option<usize>,
}

/// Load configuration from all sources without validating batch settings
///
/// Priority (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables
/// 3. Config file
/// 4. Default values
///
/// A missing `snoop.toml` is ignored; a missing file named by `--config` is
/// an error. The single-trial command uses this directly, since it only reads
/// the log level, seed and time limit.
pub fn load_config(cli: &CliArgs) -> Result<SnoopConfig, ConfigError> {
    load_config_with(cli, |name| std::env::var(name).ok())
}

fn load_config_with<F>(cli: &CliArgs, lookup: F) -> Result<SnoopConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match &cli.config_file {
        Some(path) => SnoopConfig::from_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                SnoopConfig::from_file(default_path)?
            } else {
                SnoopConfig::default()
            }
        }
    };

    config.apply_env_from(lookup)?;
    config.merge_with_cli(cli)?;
    Ok(config)
}

/// Build and validate the configuration for a batch run
pub fn build_config(cli: &CliArgs) -> Result<SnoopConfig, ConfigError> {
    let config = load_config(cli)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = SnoopConfig::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.seed, 42);
        assert_eq!(config.trials, 1_000);
        assert_eq!(config.crit, None);
        assert_eq!(config.threshold(), Threshold::Confidence(0.95));
        assert_eq!(config.layout, StreamLayout::Shared);
        assert_eq!(config.format, OutputFormat::Table);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("trace").unwrap(), LogLevel::Trace);
        assert_eq!(LogLevel::from_str("DEBUG").unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::from_str("Warn").unwrap(), LogLevel::Warn);
        assert!(LogLevel::from_str("loud").is_err());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!(OutputFormat::from_str("JSON").unwrap(), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str("csv").unwrap(), OutputFormat::Csv);
        assert!(matches!(
            OutputFormat::from_str("xml"),
            Err(ConfigError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_toml_parsing() {
        let config: SnoopConfig = toml::from_str(
            r#"
            log_level = "warn"
            seed = 7
            trials = 250
            crit = 2.0
            nmin = 10
            nmax = 5000
            layout = "split"
            parallel = true
            format = "csv"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.seed, 7);
        assert_eq!(config.trials, 250);
        assert_eq!(config.threshold(), Threshold::Crit(2.0));
        assert_eq!(config.layout, StreamLayout::Split);
        assert!(config.parallel);
        assert_eq!(config.format, OutputFormat::Csv);
        // Unset keys keep their defaults
        assert_eq!(config.rows, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_rejects_unknown_layout() {
        let result: Result<SnoopConfig, _> = toml::from_str(r#"layout = "diagonal""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = SnoopConfig::default();
        config
            .apply_env_from(env(&[
                ("SNOOP_SEED", "99"),
                ("SNOOP_NMAX", "1000000000"),
                ("SNOOP_CONFIDENCE", "0.99"),
                ("SNOOP_LAYOUT", "split"),
                ("SNOOP_PARALLEL", "TRUE"),
            ]))
            .unwrap();

        assert_eq!(config.seed, 99);
        assert_eq!(config.nmax, 1_000_000_000);
        assert_abs_diff_eq!(config.confidence, 0.99);
        assert_eq!(config.layout, StreamLayout::Split);
        assert!(config.parallel);
    }

    #[test]
    fn test_env_parallel_and_rows() {
        let mut config = SnoopConfig::default();
        config
            .apply_env_from(env(&[("SNOOP_PARALLEL", "false"), ("SNOOP_ROWS", "0")]))
            .unwrap();
        assert!(!config.parallel);
        assert_eq!(config.rows, 0);

        for (name, value) in [("SNOOP_PARALLEL", "yes"), ("SNOOP_ROWS", "many")] {
            let err = SnoopConfig::default()
                .apply_env_from(env(&[(name, value)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::EnvError(ref m) if m.starts_with(name)));
        }
    }

    #[test]
    fn test_load_skips_batch_validation() {
        let config = load_config_with(
            &CliArgs::default(),
            env(&[("SNOOP_NMIN", "0"), ("SNOOP_SEED", "5"), ("SNOOP_LOG_LEVEL", "warn")]),
        )
        .unwrap();
        assert_eq!(config.seed, 5);
        assert_eq!(config.log_level, LogLevel::Warn);
        // The batch commands still reject it
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_parse_error() {
        let mut config = SnoopConfig::default();
        let err = config
            .apply_env_from(env(&[("SNOOP_NMIN", "ten")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::EnvError(_)));
    }

    #[test]
    fn test_cli_takes_precedence() {
        let mut config = SnoopConfig::default();
        config
            .apply_env_from(env(&[("SNOOP_SEED", "99"), ("SNOOP_CRIT", "2.5")]))
            .unwrap();

        let cli = CliArgs {
            seed: Some(1),
            confidence: Some(0.9),
            verbose: true,
            format: Some("json".to_string()),
            ..Default::default()
        };
        config.merge_with_cli(&cli).unwrap();

        assert_eq!(config.seed, 1);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.format, OutputFormat::Json);
        // --confidence clears a crit inherited from the environment
        assert_eq!(config.threshold(), Threshold::Confidence(0.9));
    }

    #[test]
    fn test_simulation_config_validation() {
        let config = SnoopConfig {
            nmin: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Simulation(_))));

        // Parallel execution needs split streams
        let config = SnoopConfig {
            parallel: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = SnoopConfig {
            parallel: true,
            layout: StreamLayout::Split,
            ..Default::default()
        };
        let sim = config.simulation_config().unwrap();
        assert_eq!(sim.execution(), Execution::Parallel);
        assert_abs_diff_eq!(sim.params().crit(), 1.6448536, epsilon = 1e-6);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let cli = CliArgs {
            config_file: Some(PathBuf::from("/nonexistent/snoop.toml")),
            ..Default::default()
        };
        assert!(matches!(build_config(&cli), Err(ConfigError::FileError(_))));
    }
}
