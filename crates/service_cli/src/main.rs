//! Snoop CLI - Optional-Stopping Simulations from the Command Line
//!
//! Runs the data-snooping experiment: sample standard normals until a
//! one-sided test looks significant or a cap is reached, and measure how
//! often the snooper "finds" an effect that is not there.
//!
//! # Commands
//!
//! - `snoop trial --crit <f> --nmin <n> --nmax <n>` - Run a single trial
//! - `snoop simulate` - Run a batch of trials and summarise it
//! - `snoop sweep --vary nmin|nmax --values 1,10,100` - Summarise across values
//!
//! # Configuration
//!
//! Settings come from `snoop.toml` (or `--config`), then `SNOOP_*`
//! environment variables, then command-line flags.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
mod config;
mod error;
mod output;

pub use error::{CliError, Result};

use config::{build_config, load_config, CliArgs};

/// Optional-stopping (data snooping) simulator
#[derive(Parser)]
#[command(name = "snoop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path (defaults to snoop.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single trial and print `sum n z reason`
    Trial {
        /// Snooping threshold
        #[arg(long)]
        crit: f64,

        /// Earliest step at which the rule may fire
        #[arg(long)]
        nmin: f64,

        /// Hard cap on observations (accepts e.g. 1e9)
        #[arg(long)]
        nmax: f64,

        /// Random seed (defaults to the configured seed)
        #[arg(long)]
        seed: Option<u64>,

        /// Cancel the trial after this many seconds
        #[arg(long)]
        time_limit_secs: Option<u64>,
    },

    /// Run a batch of trials and report the summary
    Simulate {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Re-run the batch across values of nmin or nmax
    Sweep {
        /// Parameter to vary (nmin, nmax)
        #[arg(long)]
        vary: String,

        /// Comma-separated values, e.g. 10,100,1e4
        #[arg(long, value_delimiter = ',', required = true, value_parser = parse_count)]
        values: Vec<u64>,

        #[command(flatten)]
        run: RunArgs,
    },
}

/// Batch settings shared by `simulate` and `sweep`
#[derive(Args)]
struct RunArgs {
    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Number of trials
    #[arg(long)]
    trials: Option<usize>,

    /// Snooping threshold
    #[arg(long, conflicts_with = "confidence")]
    crit: Option<f64>,

    /// One-sided confidence level; crit is its normal quantile
    #[arg(long)]
    confidence: Option<f64>,

    /// Earliest step at which the rule may fire
    #[arg(long, value_parser = parse_count)]
    nmin: Option<u64>,

    /// Hard cap on observations per trial
    #[arg(long, value_parser = parse_count)]
    nmax: Option<u64>,

    /// Stream layout (shared, split)
    #[arg(long)]
    layout: Option<String>,

    /// Run split-stream trials in parallel
    #[arg(long)]
    parallel: bool,

    /// Output format (table, json, csv)
    #[arg(short, long)]
    format: Option<String>,

    /// Cancel the run after this many seconds and report what completed
    #[arg(long)]
    time_limit_secs: Option<u64>,

    /// Number of (z, n) rows shown in table output
    #[arg(long)]
    rows: Option<usize>,
}

impl RunArgs {
    fn overrides(&self, verbose: bool, config_file: Option<PathBuf>) -> CliArgs {
        CliArgs {
            config_file,
            verbose,
            seed: self.seed,
            trials: self.trials,
            crit: self.crit,
            confidence: self.confidence,
            nmin: self.nmin,
            nmax: self.nmax,
            layout: self.layout.clone(),
            parallel: self.parallel,
            format: self.format.clone(),
            time_limit_secs: self.time_limit_secs,
            rows: self.rows,
        }
    }
}

/// Parse a positive whole count, accepting scientific notation such as `1e9`.
fn parse_count(s: &str) -> std::result::Result<u64, String> {
    if let Ok(n) = s.parse::<u64>() {
        return Ok(n);
    }
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value < u64::MAX as f64 {
        Ok(value as u64)
    } else {
        Err(format!("'{}' is not a whole number representable as u64", s))
    }
}

fn init_tracing(verbose: bool, level: config::LogLevel) {
    // RUST_LOG wins unless --verbose was given
    let filter = if verbose {
        EnvFilter::new(level.as_filter_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()))
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // A single trial takes its parameters from flags, so batch settings are
    // loaded but not validated
    let config = match &cli.command {
        Commands::Trial { .. } => load_config(&CliArgs {
            config_file: cli.config.clone(),
            verbose: cli.verbose,
            ..Default::default()
        })?,
        Commands::Simulate { run } | Commands::Sweep { run, .. } => {
            build_config(&run.overrides(cli.verbose, cli.config.clone()))?
        }
    };

    init_tracing(cli.verbose, config.log_level);

    if cli.verbose {
        info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Trial {
            crit,
            nmin,
            nmax,
            seed,
            time_limit_secs,
        } => commands::trial::run(
            crit,
            nmin,
            nmax,
            seed.unwrap_or(config.seed),
            time_limit_secs.or(config.time_limit_secs),
        ),
        Commands::Simulate { .. } => commands::simulate::run(&config),
        Commands::Sweep { vary, values, .. } => commands::sweep::run(&config, &vary, &values),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("100").unwrap(), 100);
        assert_eq!(parse_count("1e9").unwrap(), 1_000_000_000);
        assert!(parse_count("2.5").is_err());
        assert!(parse_count("-3").is_err());
        assert!(parse_count("lots").is_err());
    }

    #[test]
    fn test_simulate_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "snoop",
            "simulate",
            "--trials",
            "30",
            "--nmax",
            "1e9",
            "--layout",
            "split",
            "--parallel",
            "--format",
            "json",
        ])
        .unwrap();

        let Commands::Simulate { run } = cli.command else {
            panic!("expected simulate");
        };
        let args = run.overrides(false, None);
        assert_eq!(args.trials, Some(30));
        assert_eq!(args.nmax, Some(1_000_000_000));
        assert_eq!(args.layout.as_deref(), Some("split"));
        assert!(args.parallel);
    }

    #[test]
    fn test_crit_conflicts_with_confidence() {
        let result = Cli::try_parse_from([
            "snoop",
            "simulate",
            "--crit",
            "1.64",
            "--confidence",
            "0.95",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_sweep_values_are_comma_separated() {
        let cli = Cli::try_parse_from([
            "snoop", "sweep", "--vary", "nmax", "--values", "100,1e3,10000",
        ])
        .unwrap();
        let Commands::Sweep { vary, values, .. } = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!(vary, "nmax");
        assert_eq!(values, vec![100, 1_000, 10_000]);
    }
}
