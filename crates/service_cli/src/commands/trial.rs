//! Trial command implementation
//!
//! Runs a single trial and prints `sum n z reason`.

use std::io;

use snoop_kernel::{SequentialSampler, SnoopRng, TrialParameters};
use tracing::info;

use crate::commands::time_limited_token;
use crate::output;
use crate::Result;

/// Run the trial command
pub fn run(crit: f64, nmin: f64, nmax: f64, seed: u64, time_limit_secs: Option<u64>) -> Result<()> {
    let params = TrialParameters::from_scalars(crit, nmin, nmax)?;

    info!("Starting trial...");
    info!("  crit: {}", params.crit());
    info!("  nmin: {}", params.nmin());
    info!("  nmax: {}", params.nmax());
    info!("  seed: {}", seed);

    let token = time_limited_token(time_limit_secs);
    let mut rng = SnoopRng::from_seed(seed);
    let result = SequentialSampler::new(params).run(&mut rng, &token)?;

    output::write_trial(&mut io::stdout().lock(), &result)?;

    info!("Trial complete after {} draws", rng.draws());
    Ok(())
}
