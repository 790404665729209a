//! Standard normal quantile function.
//!
//! Used only to turn a confidence level into the snooping threshold `crit`.
//! Implements the Beasley-Springer-Moro rational approximation: a rational
//! function on the central region `|p − ½| ≤ 0.42` and a polynomial in
//! `ln(−ln r)` on the tails.
//!
//! # References
//!
//! - Moro, B. (1995). "The Full Monte". Risk 8(2).

use crate::error::{Result, SimulationError};

const A: [f64; 4] = [
    2.50662823884,
    -18.61500062529,
    41.39119773534,
    -25.44106049637,
];

const B: [f64; 4] = [
    -8.47351093090,
    23.08336743743,
    -21.06224101826,
    3.13082909833,
];

const C: [f64; 9] = [
    0.3374754822726147,
    0.9761690190917186,
    0.1607979714918209,
    0.0276438810333863,
    0.0038405729373609,
    0.0003951896511919,
    0.0000321767881768,
    0.0000002888167364,
    0.0000003960315187,
];

/// Central-region half-width around `p = 0.5`.
const CENTRAL: f64 = 0.42;

/// Inverse CDF of the standard normal distribution.
///
/// # Errors
///
/// Returns `InvalidArgument("p")` unless `0 < p < 1`.
///
/// # Examples
///
/// ```rust
/// use snoop_kernel::quantile::normal_quantile;
///
/// let z = normal_quantile(0.975).unwrap();
/// assert!((z - 1.959964).abs() < 1e-6);
/// ```
pub fn normal_quantile(p: f64) -> Result<f64> {
    if !(p > 0.0 && p < 1.0) {
        return Err(SimulationError::invalid(
            "p",
            format!("probability must lie strictly between 0 and 1, got {}", p),
        ));
    }

    let y = p - 0.5;
    if y.abs() <= CENTRAL {
        let r = y * y;
        let numer = y * (((A[3] * r + A[2]) * r + A[1]) * r + A[0]);
        let denom = (((B[3] * r + B[2]) * r + B[1]) * r + B[0]) * r + 1.0;
        return Ok(numer / denom);
    }

    let r = if y < 0.0 { p } else { 1.0 - p };
    let s = (-r.ln()).ln();
    let tail = C
        .iter()
        .rev()
        .fold(0.0, |acc, &coefficient| acc * s + coefficient);

    Ok(if y < 0.0 { -tail } else { tail })
}

/// One-sided critical value for a confidence level.
///
/// `critical_value(0.95)` is the 95th percentile of the standard normal,
/// about 1.6448536: a fixed-n one-sided test at that level rejects a true
/// null 5% of the time.
///
/// # Errors
///
/// Returns `InvalidArgument("confidence")` unless `0.5 < confidence < 1`;
/// lower levels would give a non-positive threshold.
pub fn critical_value(confidence: f64) -> Result<f64> {
    if !(confidence > 0.5 && confidence < 1.0) {
        return Err(SimulationError::invalid(
            "confidence",
            format!("must lie strictly between 0.5 and 1, got {}", confidence),
        ));
    }
    normal_quantile(confidence)
}
