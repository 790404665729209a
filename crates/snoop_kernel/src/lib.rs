//! # Snoop Kernel
//!
//! Monte Carlo engine for the optional-stopping ("data snooping") problem.
//!
//! A researcher who keeps sampling until a one-sided test looks significant
//! will, under a true null, eventually succeed with probability one. This
//! crate simulates that procedure: each trial draws standard-normal
//! observations until `S_n/√n > crit` (after a warm-up of `nmin` draws) or a
//! hard cap `nmax` is hit, and many trials are summarised into the
//! proportion that "found" an effect before the cap.
//!
//! ## Module Structure
//!
//! - [`rng`]: seeded standard-normal sources with per-trial substreams
//! - [`sampler`]: one trial of the stopping rule
//! - [`runner`]: many trials on a shared stream or on split substreams
//! - [`summary`]: proportion not capped, its standard error, `z` statistics
//! - [`quantile`]: confidence level to threshold
//! - [`simulation`]: validated configuration, batch runs and sweeps
//! - [`cancel`]: cooperative cancellation
//!
//! ## Usage Example
//!
//! ```rust
//! use snoop_kernel::{run_many, summarize, CancellationToken, SnoopRng, TrialParameters};
//!
//! let params = TrialParameters::new(1.6448536, 10, 10_000).unwrap();
//! let mut rng = SnoopRng::from_seed(2024);
//! let trials = run_many(&params, &mut rng, 100, &CancellationToken::new()).unwrap();
//!
//! let est = summarize(trials.results(), params.nmax()).unwrap();
//! assert!(est.proportion_not_capped >= 0.0 && est.proportion_not_capped <= 1.0);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod cancel;
pub mod error;
pub mod quantile;
pub mod rng;
pub mod runner;
pub mod sampler;
pub mod simulation;
pub mod summary;

pub use cancel::CancellationToken;
pub use error::{Result, SimulationError};
pub use quantile::{critical_value, normal_quantile};
pub use rng::{NormalSource, SnoopRng};
pub use runner::{run_many, Execution, RunStatus, TrialRunner, TrialSet};
pub use sampler::{simulate_trial, SequentialSampler, StopReason, TrialParameters, TrialResult};
pub use simulation::{
    Simulation, SimulationConfig, SimulationConfigBuilder, SimulationReport, StreamLayout,
    SweepPoint, Threshold,
};
pub use summary::{
    normalize, normalize_all, normalize_set, summarize, z_statistics, NormalizedTrial,
    SummaryEstimate, ZStatistics,
};
