//! CLI error types

use snoop_kernel::SimulationError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced by `snoop` commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Rejected simulation parameters or a cancellation with nothing to report.
    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    /// Configuration could not be loaded or merged.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed command-line argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result alias for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;
