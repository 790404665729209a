//! Sweep command implementation
//!
//! Re-runs the configured batch once per value of `nmin` or `nmax` and
//! prints one summary row per value.

use std::io;
use std::str::FromStr;

use snoop_kernel::{RunStatus, Simulation};
use tracing::{info, warn};

use crate::commands::time_limited_token;
use crate::config::SnoopConfig;
use crate::output;
use crate::{CliError, Result};

/// Parameter varied across a sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepAxis {
    Nmin,
    Nmax,
}

impl FromStr for SweepAxis {
    type Err = CliError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nmin" => Ok(SweepAxis::Nmin),
            "nmax" => Ok(SweepAxis::Nmax),
            other => Err(CliError::InvalidArgument(format!(
                "Unknown sweep parameter: {}. Supported: nmin, nmax",
                other
            ))),
        }
    }
}

/// Run the sweep command
pub fn run(config: &SnoopConfig, vary: &str, values: &[u64]) -> Result<()> {
    let axis = SweepAxis::from_str(vary)?;
    let simulation = Simulation::new(config.simulation_config()?);

    info!("Starting sweep...");
    info!("  Varying: {:?} over {:?}", axis, values);
    info!("  Trials per point: {}", config.trials);

    let token = time_limited_token(config.time_limit_secs);
    let points = match axis {
        SweepAxis::Nmin => simulation.sweep_nmin(values, &token)?,
        SweepAxis::Nmax => simulation.sweep_nmax(values, &token)?,
    };

    if points.len() < values.len() || points.iter().any(|p| p.status == RunStatus::Partial) {
        warn!(
            "Time limit reached: {} of {} sweep points reported",
            points.len(),
            values.len()
        );
    }

    output::write_sweep(&mut io::stdout().lock(), &points, config.format)?;

    info!("Sweep complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_parsing() {
        assert_eq!(SweepAxis::from_str("nmin").unwrap(), SweepAxis::Nmin);
        assert_eq!(SweepAxis::from_str("NMAX").unwrap(), SweepAxis::Nmax);
        assert!(matches!(
            SweepAxis::from_str("crit"),
            Err(CliError::InvalidArgument(_))
        ));
    }
}
