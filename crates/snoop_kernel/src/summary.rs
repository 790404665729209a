//! Summary statistics over a set of trials.
//!
//! - [`summarize`]: proportion of trials not truncated by the cap, with its
//!   binomial standard error.
//! - [`normalize`] / [`normalize_all`]: the per-trial statistic `z = sum/√n`.
//! - [`z_statistics`]: location, spread and the share of trials whose `z`
//!   exceeds the threshold.

use crate::error::{Result, SimulationError};
use crate::runner::TrialSet;
use crate::sampler::TrialResult;

/// Normalised statistic of one trial.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NormalizedTrial {
    /// Index of the trial within its run (its substream for split runs).
    pub trial: usize,
    /// `sum / √n`.
    pub z: f64,
    /// Number of observations drawn.
    pub n: u64,
}

/// Proportion of trials stopped before the cap.
///
/// # Examples
///
/// ```rust
/// use snoop_kernel::summary::SummaryEstimate;
///
/// let est = SummaryEstimate::from_counts(30, 100);
/// assert!((est.proportion_not_capped - 0.3).abs() < 1e-12);
/// println!("{:.3} ± {:.3}", est.proportion_not_capped, est.confidence_95());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SummaryEstimate {
    /// Fraction of trials with `n ≠ nmax`.
    pub proportion_not_capped: f64,
    /// Binomial standard error `√(p(1−p)/trials)`.
    pub standard_error: f64,
    /// Number of trials the estimate was computed from.
    pub trials: usize,
}

impl SummaryEstimate {
    /// Builds the estimate from a count of uncapped trials out of `trials`.
    ///
    /// `trials` must be non-zero; [`summarize`] checks this.
    pub fn from_counts(not_capped: usize, trials: usize) -> Self {
        let total = trials as f64;
        let p = not_capped as f64 / total;
        Self {
            proportion_not_capped: p,
            standard_error: (p * (1.0 - p) / total).sqrt(),
            trials,
        }
    }

    /// Returns the 95% confidence interval half-width.
    #[inline]
    pub fn confidence_95(&self) -> f64 {
        1.96 * self.standard_error
    }
}

/// Location and spread of the normalised statistics.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ZStatistics {
    /// Mean of `z` across trials.
    pub mean: f64,
    /// Sample standard deviation of `z` (0 for a single trial).
    pub std_dev: f64,
    /// Fraction of trials with `z > crit`.
    pub exceedance_rate: f64,
}

/// Computes the proportion of trials not truncated by `nmax`.
///
/// # Errors
///
/// Returns `InvalidArgument("trials")` for an empty slice.
pub fn summarize(trials: &[TrialResult], nmax: u64) -> Result<SummaryEstimate> {
    if trials.is_empty() {
        return Err(SimulationError::invalid(
            "trials",
            "cannot summarise an empty trial set",
        ));
    }
    let not_capped = trials.iter().filter(|t| t.n != nmax).count();
    Ok(SummaryEstimate::from_counts(not_capped, trials.len()))
}

/// Normalises trial number `trial`.
#[inline]
pub fn normalize(trial: usize, result: &TrialResult) -> NormalizedTrial {
    NormalizedTrial {
        trial,
        z: result.z(),
        n: result.n,
    }
}

/// Normalises every trial, preserving order and numbering by position.
pub fn normalize_all(trials: &[TrialResult]) -> Vec<NormalizedTrial> {
    trials
        .iter()
        .enumerate()
        .map(|(trial, result)| normalize(trial, result))
        .collect()
}

/// Normalises a trial set, keeping each result's trial index.
pub fn normalize_set(trials: &TrialSet) -> Vec<NormalizedTrial> {
    trials
        .indexed()
        .map(|(trial, result)| normalize(trial, result))
        .collect()
}

/// Computes mean, spread and exceedance of `z` against `crit`.
///
/// # Errors
///
/// Returns `InvalidArgument("trials")` for an empty slice.
pub fn z_statistics(trials: &[TrialResult], crit: f64) -> Result<ZStatistics> {
    if trials.is_empty() {
        return Err(SimulationError::invalid(
            "trials",
            "cannot summarise an empty trial set",
        ));
    }

    let count = trials.len() as f64;
    let mean = trials.iter().map(TrialResult::z).sum::<f64>() / count;
    let std_dev = if trials.len() > 1 {
        let ss: f64 = trials.iter().map(|t| (t.z() - mean).powi(2)).sum();
        (ss / (count - 1.0)).sqrt()
    } else {
        0.0
    };
    let exceeding = trials.iter().filter(|t| t.z() > crit).count();

    Ok(ZStatistics {
        mean,
        std_dev,
        exceedance_rate: exceeding as f64 / count,
    })
}
