//! Batch driver: configuration, one-shot runs and parameter sweeps.
//!
//! A [`Simulation`] turns a [`SimulationConfig`] into a
//! [`SimulationReport`]: the `(z, n)` table, the proportion of trials not
//! truncated by the cap with its standard error, and the distribution of `z`.
//!
//! ```rust
//! use snoop_kernel::cancel::CancellationToken;
//! use snoop_kernel::simulation::{Simulation, SimulationConfig, Threshold};
//!
//! let config = SimulationConfig::builder()
//!     .seed(42)
//!     .trial_count(50)
//!     .threshold(Threshold::Confidence(0.95))
//!     .nmin(10)
//!     .nmax(1_000)
//!     .build()
//!     .unwrap();
//!
//! let report = Simulation::new(config).run(&CancellationToken::new()).unwrap();
//! assert_eq!(report.rows.len(), 50);
//! println!(
//!     "not capped: {:.3} ± {:.3}",
//!     report.summary.proportion_not_capped, report.summary.standard_error
//! );
//! ```

use std::fmt;
use std::str::FromStr;

use tracing::info;

use crate::cancel::CancellationToken;
use crate::error::{Result, SimulationError};
use crate::quantile::critical_value;
use crate::rng::SnoopRng;
use crate::runner::{Execution, RunStatus, TrialRunner, TrialSet};
use crate::sampler::TrialParameters;
use crate::summary::{
    normalize_set, summarize, z_statistics, NormalizedTrial, SummaryEstimate, ZStatistics,
};

/// Maximum number of trials in one run.
pub const MAX_TRIALS: usize = 100_000_000;

/// How the snooping threshold is specified.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Threshold {
    /// Threshold given directly.
    Crit(f64),
    /// One-sided confidence level; `crit` is its standard-normal quantile.
    Confidence(f64),
}

/// How trials draw their variates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum StreamLayout {
    /// One stream consumed by all trials in order.
    #[default]
    Shared,
    /// One substream per trial, derived from the seed and trial index.
    Split,
}

impl FromStr for StreamLayout {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "shared" => Ok(StreamLayout::Shared),
            "split" => Ok(StreamLayout::Split),
            other => Err(SimulationError::invalid(
                "layout",
                format!("unknown stream layout '{}', expected shared or split", other),
            )),
        }
    }
}

impl fmt::Display for StreamLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamLayout::Shared => write!(f, "shared"),
            StreamLayout::Split => write!(f, "split"),
        }
    }
}

/// Validated batch configuration.
///
/// Use [`SimulationConfigBuilder`] to construct instances.
#[derive(Clone, Debug)]
pub struct SimulationConfig {
    seed: u64,
    trial_count: usize,
    params: TrialParameters,
    confidence: Option<f64>,
    layout: StreamLayout,
    execution: Execution,
}

impl SimulationConfig {
    /// Creates a new configuration builder.
    #[inline]
    pub fn builder() -> SimulationConfigBuilder {
        SimulationConfigBuilder::default()
    }

    /// Returns the run seed.
    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the number of trials.
    #[inline]
    pub fn trial_count(&self) -> usize {
        self.trial_count
    }

    /// Returns the validated trial parameters.
    #[inline]
    pub fn params(&self) -> &TrialParameters {
        &self.params
    }

    /// Returns the confidence level `crit` was derived from, if any.
    #[inline]
    pub fn confidence(&self) -> Option<f64> {
        self.confidence
    }

    /// Returns the stream layout.
    #[inline]
    pub fn layout(&self) -> StreamLayout {
        self.layout
    }

    /// Returns how split-stream trials are scheduled.
    #[inline]
    pub fn execution(&self) -> Execution {
        self.execution
    }
}

/// Builder for [`SimulationConfig`].
///
/// `trial_count`, `threshold`, `nmin` and `nmax` must be set; the seed
/// defaults to 0, the layout to [`StreamLayout::Shared`] and execution to
/// [`Execution::Sequential`].
#[derive(Clone, Debug, Default)]
pub struct SimulationConfigBuilder {
    seed: u64,
    trial_count: Option<usize>,
    threshold: Option<Threshold>,
    nmin: Option<u64>,
    nmax: Option<u64>,
    layout: StreamLayout,
    execution: Execution,
}

impl SimulationConfigBuilder {
    /// Sets the run seed.
    #[inline]
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the number of trials, in [1, 100_000_000].
    #[inline]
    pub fn trial_count(mut self, trial_count: usize) -> Self {
        self.trial_count = Some(trial_count);
        self
    }

    /// Sets the snooping threshold.
    #[inline]
    pub fn threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// Sets the earliest step at which the rule may fire.
    #[inline]
    pub fn nmin(mut self, nmin: u64) -> Self {
        self.nmin = Some(nmin);
        self
    }

    /// Sets the hard cap on observations per trial.
    #[inline]
    pub fn nmax(mut self, nmax: u64) -> Self {
        self.nmax = Some(nmax);
        self
    }

    /// Sets the stream layout.
    #[inline]
    pub fn layout(mut self, layout: StreamLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets how split-stream trials are scheduled.
    #[inline]
    pub fn execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a required field is missing, the trial
    /// count is out of range, the threshold or bounds are invalid, or
    /// parallel execution is requested on the shared layout.
    pub fn build(self) -> Result<SimulationConfig> {
        let trial_count = self
            .trial_count
            .ok_or_else(|| SimulationError::invalid("trial_count", "must be specified"))?;
        let threshold = self
            .threshold
            .ok_or_else(|| SimulationError::invalid("crit", "must be specified"))?;
        let nmin = self
            .nmin
            .ok_or_else(|| SimulationError::invalid("nmin", "must be specified"))?;
        let nmax = self
            .nmax
            .ok_or_else(|| SimulationError::invalid("nmax", "must be specified"))?;

        if trial_count == 0 || trial_count > MAX_TRIALS {
            return Err(SimulationError::invalid(
                "trial_count",
                format!("{} must be in range [1, {}]", trial_count, MAX_TRIALS),
            ));
        }

        let (crit, confidence) = match threshold {
            Threshold::Crit(crit) => (crit, None),
            Threshold::Confidence(level) => (critical_value(level)?, Some(level)),
        };
        let params = TrialParameters::new(crit, nmin, nmax)?;

        if self.layout == StreamLayout::Shared && self.execution == Execution::Parallel {
            return Err(SimulationError::invalid(
                "execution",
                "parallel execution requires the split stream layout",
            ));
        }

        Ok(SimulationConfig {
            seed: self.seed,
            trial_count,
            params,
            confidence,
            layout: self.layout,
            execution: self.execution,
        })
    }
}

/// Output of one batch run.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SimulationReport {
    /// Seed that regenerates this run.
    pub seed: u64,
    /// Parameters every trial used.
    pub params: TrialParameters,
    /// Confidence level `crit` was derived from, if any.
    pub confidence: Option<f64>,
    /// Stream layout used.
    pub layout: StreamLayout,
    /// Number of trials requested.
    pub requested: usize,
    /// Whether every requested trial completed.
    pub status: RunStatus,
    /// One `(trial, z, n)` row per completed trial, in trial order.
    ///
    /// Rows of a partial split run can skip trial indices.
    pub rows: Vec<NormalizedTrial>,
    /// Proportion of completed trials not truncated by the cap.
    pub summary: SummaryEstimate,
    /// Distribution of `z` over completed trials.
    pub z_stats: ZStatistics,
}

impl SimulationReport {
    /// Returns `true` if the run was cut short by cancellation.
    #[inline]
    pub fn is_partial(&self) -> bool {
        self.status == RunStatus::Partial
    }
}

/// One row of a parameter sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SweepPoint {
    /// `nmin` used for this point.
    pub nmin: u64,
    /// `nmax` used for this point.
    pub nmax: u64,
    /// Proportion not capped at this point.
    pub summary: SummaryEstimate,
    /// Whether the point ran to completion.
    pub status: RunStatus,
}

/// Batch driver.
#[derive(Clone, Debug)]
pub struct Simulation {
    config: SimulationConfig,
}

impl Simulation {
    /// Creates a driver for a validated configuration.
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Runs the configured batch and summarises it.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Cancelled`] if cancellation arrives before
    /// any trial completes. A run cancelled later yields a partial report.
    pub fn run(&self, cancel: &CancellationToken) -> Result<SimulationReport> {
        let params = self.config.params;
        let trials = self.run_trials(params, cancel)?;
        self.report(params, trials)
    }

    /// Re-runs the batch once per `nmin` value, holding everything else fixed.
    ///
    /// Each point starts from the configured seed. A cancelled point is
    /// reported as partial and ends the sweep.
    pub fn sweep_nmin(
        &self,
        values: &[u64],
        cancel: &CancellationToken,
    ) -> Result<Vec<SweepPoint>> {
        let params = values
            .iter()
            .map(|&nmin| self.config.params.with_nmin(nmin))
            .collect::<Result<Vec<_>>>()?;
        self.sweep(params, cancel)
    }

    /// Re-runs the batch once per `nmax` value, holding everything else fixed.
    pub fn sweep_nmax(
        &self,
        values: &[u64],
        cancel: &CancellationToken,
    ) -> Result<Vec<SweepPoint>> {
        let params = values
            .iter()
            .map(|&nmax| self.config.params.with_nmax(nmax))
            .collect::<Result<Vec<_>>>()?;
        self.sweep(params, cancel)
    }

    fn sweep(
        &self,
        points: Vec<TrialParameters>,
        cancel: &CancellationToken,
    ) -> Result<Vec<SweepPoint>> {
        if points.is_empty() {
            return Err(SimulationError::invalid("values", "sweep needs at least one value"));
        }

        let mut rows = Vec::with_capacity(points.len());
        for params in points {
            let trials = match self.run_trials(params, cancel) {
                Ok(trials) => trials,
                Err(SimulationError::Cancelled) if !rows.is_empty() => break,
                Err(e) => return Err(e),
            };
            let summary = summarize(trials.results(), params.nmax())?;
            info!(
                nmin = params.nmin(),
                nmax = params.nmax(),
                proportion = summary.proportion_not_capped,
                "sweep point complete"
            );
            let status = trials.status();
            rows.push(SweepPoint {
                nmin: params.nmin(),
                nmax: params.nmax(),
                summary,
                status,
            });
            if status == RunStatus::Partial {
                break;
            }
        }
        Ok(rows)
    }

    fn run_trials(&self, params: TrialParameters, cancel: &CancellationToken) -> Result<TrialSet> {
        let runner = TrialRunner::new(params, self.config.trial_count)?;
        let trials = match self.config.layout {
            StreamLayout::Shared => {
                let mut rng = SnoopRng::from_seed(self.config.seed);
                runner.run_shared(&mut rng, cancel)?
            }
            StreamLayout::Split => {
                runner.run_split(self.config.seed, self.config.execution, cancel)?
            }
        };

        if trials.is_empty() {
            return Err(SimulationError::Cancelled);
        }
        Ok(trials)
    }

    fn report(&self, params: TrialParameters, trials: TrialSet) -> Result<SimulationReport> {
        let summary = summarize(trials.results(), params.nmax())?;
        let z_stats = z_statistics(trials.results(), params.crit())?;

        info!(
            completed = trials.len(),
            requested = trials.requested(),
            proportion = summary.proportion_not_capped,
            std_error = summary.standard_error,
            exceedance = z_stats.exceedance_rate,
            "simulation complete"
        );

        Ok(SimulationReport {
            seed: self.config.seed,
            params,
            confidence: self.config.confidence,
            layout: self.config.layout,
            requested: trials.requested(),
            status: trials.status(),
            rows: normalize_set(&trials),
            summary,
            z_stats,
        })
    }
}
