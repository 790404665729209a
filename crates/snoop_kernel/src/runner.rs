//! Replication driver: runs many trials with shared parameters.
//!
//! Two stream layouts are supported:
//!
//! - **Shared** ([`TrialRunner::run_shared`], [`run_many`]): every trial draws
//!   from one ongoing stream, in trial order. This is the reference model and
//!   the one whose output is pinned by a single seed.
//! - **Split** ([`TrialRunner::run_split`]): trial `i` draws from substream
//!   `i` of the seed. The result does not depend on scheduling, so the split
//!   layout can run on the rayon pool and still match its sequential run bit
//!   for bit.
//!
//! Cancellation never discards completed trials: the runner returns them in a
//! [`TrialSet`] marked [`RunStatus::Partial`].

use rayon::prelude::*;
use tracing::{debug, info, trace, warn};

use crate::cancel::CancellationToken;
use crate::error::{Result, SimulationError};
use crate::rng::{NormalSource, SnoopRng};
use crate::sampler::{SequentialSampler, TrialParameters, TrialResult};

/// Whether a run finished all requested trials.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum RunStatus {
    /// Every requested trial completed.
    Complete,
    /// Cancellation stopped the run; only completed trials are present.
    Partial,
}

/// How split-stream trials are scheduled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Execution {
    /// One trial after another on the calling thread.
    #[default]
    Sequential,
    /// Trials spread over the rayon thread pool.
    Parallel,
}

/// Ordered trial results of one run.
///
/// Insertion order is trial order and every result keeps its trial index.
/// A partial set from a shared-stream run is a prefix of the complete run; a
/// partial set from a parallel split run may have gaps, so its indices are
/// strictly increasing but not necessarily contiguous.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrialSet {
    results: Vec<TrialResult>,
    indices: Vec<usize>,
    requested: usize,
    status: RunStatus,
}

impl TrialSet {
    /// Creates a trial set from results of trials `0..results.len()`.
    pub fn new(results: Vec<TrialResult>, requested: usize, status: RunStatus) -> Self {
        let indices = (0..results.len()).collect();
        Self {
            results,
            indices,
            requested,
            status,
        }
    }

    /// Creates a trial set whose `k`-th result came from trial `indices[k]`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument("indices")` if the lengths differ, or if the
    /// indices are not strictly increasing and below `requested`.
    pub fn with_indices(
        results: Vec<TrialResult>,
        indices: Vec<usize>,
        requested: usize,
        status: RunStatus,
    ) -> Result<Self> {
        if indices.len() != results.len() {
            return Err(SimulationError::invalid(
                "indices",
                format!("{} indices for {} results", indices.len(), results.len()),
            ));
        }
        let ordered = indices.windows(2).all(|w| w[0] < w[1]);
        if !ordered || indices.last().is_some_and(|&last| last >= requested) {
            return Err(SimulationError::invalid(
                "indices",
                "must be strictly increasing and below the requested count",
            ));
        }
        Ok(Self {
            results,
            indices,
            requested,
            status,
        })
    }

    /// Returns the collected results.
    #[inline]
    pub fn results(&self) -> &[TrialResult] {
        &self.results
    }

    /// Trial index of each result, parallel to [`results`](Self::results).
    #[inline]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Iterates over `(trial index, result)` pairs.
    pub fn indexed(&self) -> impl Iterator<Item = (usize, &TrialResult)> + '_ {
        self.indices.iter().copied().zip(self.results.iter())
    }

    /// Number of completed trials.
    #[inline]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns `true` if no trial completed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of trials that were requested.
    #[inline]
    pub fn requested(&self) -> usize {
        self.requested
    }

    /// Completion status.
    #[inline]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Returns `true` if the run was cut short by cancellation.
    #[inline]
    pub fn is_partial(&self) -> bool {
        self.status == RunStatus::Partial
    }

    /// Iterates over results in trial order.
    pub fn iter(&self) -> std::slice::Iter<'_, TrialResult> {
        self.results.iter()
    }

    /// Consumes the set, returning the results.
    pub fn into_results(self) -> Vec<TrialResult> {
        self.results
    }
}

impl<'a> IntoIterator for &'a TrialSet {
    type Item = &'a TrialResult;
    type IntoIter = std::slice::Iter<'a, TrialResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Runs a fixed number of trials with shared parameters.
///
/// # Examples
///
/// ```rust
/// use snoop_kernel::cancel::CancellationToken;
/// use snoop_kernel::rng::SnoopRng;
/// use snoop_kernel::runner::TrialRunner;
/// use snoop_kernel::sampler::TrialParameters;
///
/// let params = TrialParameters::new(1.6448536, 10, 1_000).unwrap();
/// let runner = TrialRunner::new(params, 25).unwrap();
///
/// let mut rng = SnoopRng::from_seed(42);
/// let trials = runner.run_shared(&mut rng, &CancellationToken::new()).unwrap();
/// assert_eq!(trials.len(), 25);
/// assert!(!trials.is_partial());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct TrialRunner {
    sampler: SequentialSampler,
    trial_count: usize,
}

impl TrialRunner {
    /// Creates a runner for `trial_count` trials.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument("trial_count")` if `trial_count` is zero.
    pub fn new(params: TrialParameters, trial_count: usize) -> Result<Self> {
        if trial_count == 0 {
            return Err(SimulationError::invalid(
                "trial_count",
                "must be at least 1, got 0",
            ));
        }
        Ok(Self {
            sampler: SequentialSampler::new(params),
            trial_count,
        })
    }

    /// Returns the trial parameters.
    #[inline]
    pub fn params(&self) -> &TrialParameters {
        self.sampler.params()
    }

    /// Returns the number of trials per run.
    #[inline]
    pub fn trial_count(&self) -> usize {
        self.trial_count
    }

    /// Runs all trials on one shared stream, in order.
    pub fn run_shared<S>(&self, rng: &mut S, cancel: &CancellationToken) -> Result<TrialSet>
    where
        S: NormalSource + ?Sized,
    {
        let params = self.params();
        info!(
            trials = self.trial_count,
            crit = params.crit(),
            nmin = params.nmin(),
            nmax = params.nmax(),
            "starting shared-stream run"
        );

        let mut results = Vec::with_capacity(self.trial_count);
        for trial in 0..self.trial_count {
            match self.sampler.run(&mut *rng, cancel) {
                Ok(result) => {
                    trace!(trial, n = result.n, sum = result.sum, reason = %result.stop_reason);
                    results.push(result);
                }
                Err(SimulationError::Cancelled) => {
                    warn!(
                        completed = results.len(),
                        requested = self.trial_count,
                        "run cancelled, returning completed trials"
                    );
                    return Ok(TrialSet::new(results, self.trial_count, RunStatus::Partial));
                }
                Err(e) => return Err(e),
            }
        }

        debug!(completed = results.len(), "shared-stream run complete");
        Ok(TrialSet::new(results, self.trial_count, RunStatus::Complete))
    }

    /// Runs trial `i` on substream `i` of `seed`.
    ///
    /// Sequential and parallel execution produce identical sets.
    pub fn run_split(
        &self,
        seed: u64,
        execution: Execution,
        cancel: &CancellationToken,
    ) -> Result<TrialSet> {
        let params = self.params();
        info!(
            trials = self.trial_count,
            crit = params.crit(),
            nmin = params.nmin(),
            nmax = params.nmax(),
            seed,
            ?execution,
            "starting split-stream run"
        );

        let run_one = |trial: usize| {
            let mut rng = SnoopRng::substream(seed, trial);
            self.sampler.run(&mut rng, cancel)
        };

        let outcomes: Vec<Result<TrialResult>> = match execution {
            Execution::Sequential => {
                let mut outcomes = Vec::with_capacity(self.trial_count);
                for trial in 0..self.trial_count {
                    let outcome = run_one(trial);
                    let stop = matches!(outcome, Err(SimulationError::Cancelled));
                    outcomes.push(outcome);
                    if stop {
                        break;
                    }
                }
                outcomes
            }
            Execution::Parallel => (0..self.trial_count).into_par_iter().map(run_one).collect(),
        };

        // outcomes[i] belongs to trial i in both modes
        let mut results = Vec::with_capacity(outcomes.len());
        let mut indices = Vec::with_capacity(outcomes.len());
        let mut status = RunStatus::Complete;
        for (trial, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(result) => {
                    results.push(result);
                    indices.push(trial);
                }
                Err(SimulationError::Cancelled) => status = RunStatus::Partial,
                Err(e) => return Err(e),
            }
        }

        if status == RunStatus::Partial {
            warn!(
                completed = results.len(),
                requested = self.trial_count,
                "run cancelled, returning completed trials"
            );
        } else {
            debug!(completed = results.len(), "split-stream run complete");
        }
        TrialSet::with_indices(results, indices, self.trial_count, status)
    }
}

/// Runs `trial_count` trials on one shared stream.
///
/// Validation errors are returned before any trial runs.
pub fn run_many<S>(
    params: &TrialParameters,
    rng: &mut S,
    trial_count: usize,
    cancel: &CancellationToken,
) -> Result<TrialSet>
where
    S: NormalSource + ?Sized,
{
    TrialRunner::new(*params, trial_count)?.run_shared(rng, cancel)
}
