//! Simulate command implementation
//!
//! Runs a batch of trials and reports the `(z, n)` table and the proportion
//! of trials not truncated by the cap.

use std::io;

use snoop_kernel::Simulation;
use tracing::{info, warn};

use crate::commands::time_limited_token;
use crate::config::SnoopConfig;
use crate::output;
use crate::Result;

/// Run the simulate command
pub fn run(config: &SnoopConfig) -> Result<()> {
    let simulation = Simulation::new(config.simulation_config()?);

    info!("Starting simulation...");
    info!("  Trials: {}", config.trials);
    info!("  Layout: {}", config.layout);
    info!("  Output format: {}", config.format);

    let token = time_limited_token(config.time_limit_secs);
    let report = simulation.run(&token)?;

    if report.is_partial() {
        warn!(
            "Time limit reached: reporting {} of {} trials",
            report.rows.len(),
            report.requested
        );
    }

    output::write_report(&mut io::stdout().lock(), &report, config.format, config.rows)?;

    info!("Simulation complete");
    Ok(())
}
