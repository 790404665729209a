//! Sequential sampler with a data-dependent stopping rule.
//!
//! One trial draws standard-normal observations one at a time and keeps a
//! running sum `S_n`. After each draw it stops if
//!
//! ```text
//! n ≥ nmin  and  S_n > 0  and  S_n² > crit² · n      (RuleTriggered)
//! ```
//!
//! or, failing that, if `n ≥ nmax` (MaxReached). The rule is the one-sided
//! test `S_n / √n > crit` written without the square root; only positive
//! sums are eligible, so the procedure hunts for an effect in one direction.
//!
//! The law of the iterated logarithm guarantees the rule fires eventually
//! with probability one, but possibly after an enormous number of draws,
//! hence the hard cap `nmax`.

use tracing::warn;

use crate::cancel::CancellationToken;
use crate::error::{Result, SimulationError};
use crate::rng::NormalSource;

/// 2^64 as `f64`; counts at or above it do not fit in a `u64`.
const U64_LIMIT_F64: f64 = 18_446_744_073_709_551_616.0;

/// Why a trial stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum StopReason {
    /// The stopping rule fired: `n ≥ nmin`, `sum > 0` and `sum² > crit²·n`.
    RuleTriggered,
    /// The hard cap was hit before the rule fired: `n = nmax`.
    MaxReached,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::RuleTriggered => write!(f, "rule"),
            StopReason::MaxReached => write!(f, "max"),
        }
    }
}

/// Validated parameters shared by every trial of a run.
///
/// Construction is the single validation point: a `TrialParameters` value
/// always satisfies `crit > 0`, `crit²` finite, `nmin ≥ 1` and `nmax ≥ 1`.
///
/// # Examples
///
/// ```rust
/// use snoop_kernel::sampler::TrialParameters;
///
/// let params = TrialParameters::new(1.6448536, 100, 1_000_000).unwrap();
/// assert_eq!(params.nmin(), 100);
///
/// assert!(TrialParameters::new(0.0, 10, 100).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TrialParameters {
    crit: f64,
    nmin: u64,
    nmax: u64,
}

impl TrialParameters {
    /// Creates validated trial parameters.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` naming the first offending field if `crit`
    /// is not a positive finite number (or its square overflows), or if
    /// `nmin` or `nmax` is zero.
    pub fn new(crit: f64, nmin: u64, nmax: u64) -> Result<Self> {
        validate_crit(crit)?;
        if nmin == 0 {
            return Err(SimulationError::invalid("nmin", "must be at least 1, got 0"));
        }
        if nmax == 0 {
            return Err(SimulationError::invalid("nmax", "must be at least 1, got 0"));
        }
        if nmax < nmin {
            warn!(nmin, nmax, "nmax < nmin: every trial will stop at nmax");
        }
        Ok(Self { crit, nmin, nmax })
    }

    /// Creates parameters from loosely-typed numeric scalars.
    ///
    /// `nmin` and `nmax` arrive as floating-point values and must be finite,
    /// positive whole numbers representable as `u64`.
    ///
    /// ```rust
    /// use snoop_kernel::sampler::TrialParameters;
    ///
    /// let params = TrialParameters::from_scalars(1.0, 10.0, 1e9).unwrap();
    /// assert_eq!(params.nmax(), 1_000_000_000);
    ///
    /// assert!(TrialParameters::from_scalars(1.0, 2.5, 100.0).is_err());
    /// ```
    pub fn from_scalars(crit: f64, nmin: f64, nmax: f64) -> Result<Self> {
        validate_crit(crit)?;
        let nmin = whole_count("nmin", nmin)?;
        let nmax = whole_count("nmax", nmax)?;
        Self::new(crit, nmin, nmax)
    }

    /// Returns the snooping threshold.
    #[inline]
    pub fn crit(&self) -> f64 {
        self.crit
    }

    /// Returns the earliest step at which the rule may fire.
    #[inline]
    pub fn nmin(&self) -> u64 {
        self.nmin
    }

    /// Returns the hard cap on the number of observations.
    #[inline]
    pub fn nmax(&self) -> u64 {
        self.nmax
    }

    /// Returns a copy with a different `nmin`.
    pub fn with_nmin(&self, nmin: u64) -> Result<Self> {
        Self::new(self.crit, nmin, self.nmax)
    }

    /// Returns a copy with a different `nmax`.
    pub fn with_nmax(&self, nmax: u64) -> Result<Self> {
        Self::new(self.crit, self.nmin, nmax)
    }
}

fn validate_crit(crit: f64) -> Result<()> {
    if !crit.is_finite() || crit <= 0.0 {
        return Err(SimulationError::invalid(
            "crit",
            format!("must be a positive finite number, got {}", crit),
        ));
    }
    if !(crit * crit).is_finite() {
        return Err(SimulationError::invalid(
            "crit",
            format!("{} is too large: crit² overflows", crit),
        ));
    }
    Ok(())
}

fn whole_count(field: &'static str, value: f64) -> Result<u64> {
    if !value.is_finite() {
        return Err(SimulationError::invalid(
            field,
            format!("expected a finite whole number, got {}", value),
        ));
    }
    if value <= 0.0 {
        return Err(SimulationError::invalid(
            field,
            format!("must be positive, got {}", value),
        ));
    }
    if value.fract() != 0.0 {
        return Err(SimulationError::invalid(
            field,
            format!("expected a whole number, got {}", value),
        ));
    }
    if value >= U64_LIMIT_F64 {
        return Err(SimulationError::invalid(
            field,
            format!("{} exceeds the largest supported count", value),
        ));
    }
    Ok(value as u64)
}

/// Terminal state of one trial.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrialResult {
    /// Running sum of the observations at stopping.
    pub sum: f64,
    /// Number of observations drawn.
    pub n: u64,
    /// Which terminal state the trial reached.
    pub stop_reason: StopReason,
}

impl TrialResult {
    /// Normalised statistic `sum / √n`.
    #[inline]
    pub fn z(&self) -> f64 {
        self.sum / (self.n as f64).sqrt()
    }

    /// Returns `true` if the trial was truncated by the cap.
    #[inline]
    pub fn is_capped(&self) -> bool {
        self.stop_reason == StopReason::MaxReached
    }
}

/// Per-trial state machine: `Accumulating → {RuleTriggered, MaxReached}`.
///
/// The sampler itself is immutable; running state lives on the stack of
/// [`SequentialSampler::run`] for the duration of one trial, so one sampler
/// can be shared across threads.
#[derive(Clone, Copy, Debug)]
pub struct SequentialSampler {
    params: TrialParameters,
    crit_squared: f64,
}

impl SequentialSampler {
    /// Creates a sampler for validated parameters.
    pub fn new(params: TrialParameters) -> Self {
        Self {
            params,
            crit_squared: params.crit * params.crit,
        }
    }

    /// Returns the parameters this sampler was built with.
    #[inline]
    pub fn params(&self) -> &TrialParameters {
        &self.params
    }

    /// Runs one trial to a terminal state.
    ///
    /// Draws exactly `n` variates from `rng`, where `n` is the returned
    /// count. The token is polled before every draw.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Cancelled`] if cancellation is observed;
    /// the partial running state is discarded.
    pub fn run<S>(&self, rng: &mut S, cancel: &CancellationToken) -> Result<TrialResult>
    where
        S: NormalSource + ?Sized,
    {
        let nmin = self.params.nmin;
        let nmax = self.params.nmax;
        let crit_squared = self.crit_squared;

        let mut sum = 0.0_f64;
        let mut n: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(SimulationError::Cancelled);
            }

            sum += rng.next_normal();
            n += 1;

            if n >= nmin && sum > 0.0 && sum * sum > crit_squared * n as f64 {
                return Ok(TrialResult {
                    sum,
                    n,
                    stop_reason: StopReason::RuleTriggered,
                });
            }
            if n >= nmax {
                return Ok(TrialResult {
                    sum,
                    n,
                    stop_reason: StopReason::MaxReached,
                });
            }
        }
    }
}

/// Runs a single trial from loosely-typed scalar inputs.
///
/// Validates `crit`, `nmin` and `nmax` before drawing anything and returns
/// the pair `(sum, n)`; callers divide `sum` by `√n` for the normalised
/// statistic.
///
/// # Examples
///
/// ```rust
/// use snoop_kernel::cancel::CancellationToken;
/// use snoop_kernel::rng::SnoopRng;
/// use snoop_kernel::sampler::simulate_trial;
///
/// let mut rng = SnoopRng::from_seed(1);
/// let (sum, n) = simulate_trial(1.6448536, 10.0, 1000.0, &mut rng, &CancellationToken::new()).unwrap();
/// assert!(n >= 1.0 && n <= 1000.0);
/// assert!(sum.is_finite());
///
/// assert!(simulate_trial(0.0, 10.0, 100.0, &mut rng, &CancellationToken::new()).is_err());
/// ```
pub fn simulate_trial<S>(
    crit: f64,
    nmin: f64,
    nmax: f64,
    rng: &mut S,
    cancel: &CancellationToken,
) -> Result<(f64, f64)>
where
    S: NormalSource + ?Sized,
{
    let params = TrialParameters::from_scalars(crit, nmin, nmax)?;
    let result = SequentialSampler::new(params).run(rng, cancel)?;
    Ok((result.sum, result.n as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SnoopRng;
    use proptest::prelude::*;

    /// Replays a fixed sequence of observations.
    struct Replay {
        values: Vec<f64>,
        pos: usize,
    }

    impl Replay {
        fn new(values: &[f64]) -> Self {
            Self {
                values: values.to_vec(),
                pos: 0,
            }
        }
    }

    impl NormalSource for Replay {
        fn next_normal(&mut self) -> f64 {
            let x = self.values[self.pos];
            self.pos += 1;
            x
        }
    }

    fn run_replay(crit: f64, nmin: u64, nmax: u64, values: &[f64]) -> (TrialResult, usize) {
        let params = TrialParameters::new(crit, nmin, nmax).unwrap();
        let mut source = Replay::new(values);
        let result = SequentialSampler::new(params)
            .run(&mut source, &CancellationToken::new())
            .unwrap();
        (result, source.pos)
    }

    #[test]
    fn test_validation_rejects_non_positive() {
        let mut rng = SnoopRng::from_seed(0);
        let token = CancellationToken::new();

        let err = simulate_trial(0.0, 10.0, 100.0, &mut rng, &token).unwrap_err();
        assert_eq!(err.field(), Some("crit"));

        let err = simulate_trial(1.0, 0.0, 100.0, &mut rng, &token).unwrap_err();
        assert_eq!(err.field(), Some("nmin"));

        let err = simulate_trial(1.0, 10.0, 0.0, &mut rng, &token).unwrap_err();
        assert_eq!(err.field(), Some("nmax"));

        // Validation happens before any draw
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_validation_rejects_bad_scalars() {
        assert!(TrialParameters::from_scalars(-1.0, 10.0, 100.0).is_err());
        assert!(TrialParameters::from_scalars(f64::NAN, 10.0, 100.0).is_err());
        assert!(TrialParameters::from_scalars(f64::INFINITY, 10.0, 100.0).is_err());
        assert!(TrialParameters::from_scalars(1e200, 10.0, 100.0).is_err());

        let err = TrialParameters::from_scalars(1.0, 2.5, 100.0).unwrap_err();
        assert_eq!(err.field(), Some("nmin"));
        let err = TrialParameters::from_scalars(1.0, 10.0, f64::INFINITY).unwrap_err();
        assert_eq!(err.field(), Some("nmax"));
        let err = TrialParameters::from_scalars(1.0, 10.0, -5.0).unwrap_err();
        assert_eq!(err.field(), Some("nmax"));
        let err = TrialParameters::from_scalars(1.0, 10.0, 1e30).unwrap_err();
        assert_eq!(err.field(), Some("nmax"));
    }

    #[test]
    fn test_large_caps_accepted() {
        let params = TrialParameters::from_scalars(1.6448536, 100.0, 1e11).unwrap();
        assert_eq!(params.nmax(), 100_000_000_000);
    }

    #[test]
    fn test_rule_waits_for_nmin() {
        // At n=2 the rule condition holds but n < nmin
        let (result, drawn) = run_replay(1.0, 3, 10, &[1.0, 1.0, 1.0, 1.0]);
        assert_eq!(result.stop_reason, StopReason::RuleTriggered);
        assert_eq!(result.n, 3);
        assert_eq!(result.sum, 3.0);
        assert_eq!(drawn, 3);
    }

    #[test]
    fn test_negative_sums_never_trigger() {
        let (result, _) = run_replay(0.5, 1, 3, &[-5.0, -5.0, -5.0]);
        assert_eq!(result.stop_reason, StopReason::MaxReached);
        assert_eq!(result.n, 3);
        assert_eq!(result.sum, -15.0);
    }

    #[test]
    fn test_boundary_is_strict() {
        // sum² == crit²·n is not enough
        let (result, _) = run_replay(1.0, 1, 1, &[1.0]);
        assert_eq!(result.stop_reason, StopReason::MaxReached);
        assert_eq!(result.n, 1);
    }

    #[test]
    fn test_degenerate_nmin_equals_nmax() {
        let (result, _) = run_replay(1.0, 2, 2, &[2.0, 2.0]);
        assert_eq!(result.stop_reason, StopReason::RuleTriggered);
        assert_eq!(result.n, 2);

        let (result, _) = run_replay(1.0, 2, 2, &[0.1, 0.1]);
        assert_eq!(result.stop_reason, StopReason::MaxReached);
        assert_eq!(result.n, 2);
    }

    #[test]
    fn test_nmax_below_nmin_always_caps() {
        let (result, drawn) = run_replay(0.1, 10, 3, &[5.0, 5.0, 5.0, 5.0]);
        assert_eq!(result.stop_reason, StopReason::MaxReached);
        assert_eq!(result.n, 3);
        assert_eq!(drawn, 3);
    }

    #[test]
    fn test_cancelled_before_first_draw() {
        let params = TrialParameters::new(1.0, 1, 1_000).unwrap();
        let mut rng = SnoopRng::from_seed(3);
        let token = CancellationToken::new();
        token.cancel();

        let err = SequentialSampler::new(params).run(&mut rng, &token).unwrap_err();
        assert_eq!(err, SimulationError::Cancelled);
        assert_eq!(rng.draws(), 0);
    }

    #[test]
    fn test_draws_equal_n() {
        let params = TrialParameters::new(1.6448536, 5, 500).unwrap();
        let sampler = SequentialSampler::new(params);
        let mut rng = SnoopRng::from_seed(17);
        let token = CancellationToken::new();

        let mut total = 0;
        for _ in 0..20 {
            let before = rng.draws();
            let result = sampler.run(&mut rng, &token).unwrap();
            assert_eq!(rng.draws() - before, result.n);
            total += result.n;
        }
        assert_eq!(rng.draws(), total);
    }

    #[test]
    fn test_z_and_capped() {
        let result = TrialResult {
            sum: 6.0,
            n: 4,
            stop_reason: StopReason::MaxReached,
        };
        assert_eq!(result.z(), 3.0);
        assert!(result.is_capped());
        assert_eq!(StopReason::RuleTriggered.to_string(), "rule");
    }

    proptest! {
        #[test]
        fn prop_terminal_invariants(
            seed in any::<u64>(),
            crit in 0.1_f64..3.0,
            nmin in 1_u64..50,
            nmax in 1_u64..300,
        ) {
            let params = TrialParameters::new(crit, nmin, nmax).unwrap();
            let mut rng = SnoopRng::from_seed(seed);
            let r = SequentialSampler::new(params)
                .run(&mut rng, &CancellationToken::new())
                .unwrap();

            prop_assert!(r.n >= 1 && r.n <= nmax);
            prop_assert_eq!(rng.draws(), r.n);
            match r.stop_reason {
                StopReason::RuleTriggered => {
                    prop_assert!(r.n >= nmin);
                    prop_assert!(r.sum > 0.0);
                    prop_assert!(r.sum * r.sum > crit * crit * r.n as f64);
                }
                StopReason::MaxReached => prop_assert_eq!(r.n, nmax),
            }
        }
    }
}
