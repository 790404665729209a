//! Error types for the sequential sampling engine.
//!
//! Two outcomes leave the engine without a result:
//!
//! - [`SimulationError::InvalidArgument`]: a parameter failed validation. Always
//!   raised before any variate is drawn and never worth retrying.
//! - [`SimulationError::Cancelled`]: the caller signalled the cancellation token
//!   while a trial was in flight. This is a control outcome rather than a
//!   domain failure; use [`SimulationError::is_cancelled`] to tell it apart.

use thiserror::Error;

/// Errors raised by the sampler, runner and summary statistics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    /// Invalid parameter value with the offending field named.
    #[error("Invalid argument '{field}': {reason}")]
    InvalidArgument {
        /// Name of the offending parameter.
        field: &'static str,
        /// Description of the expected value.
        reason: String,
    },

    /// The in-flight trial was abandoned because cancellation was requested.
    #[error("Simulation cancelled")]
    Cancelled,
}

impl SimulationError {
    /// Creates an [`SimulationError::InvalidArgument`] for `field`.
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a cancellation outcome.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns the offending field for validation errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidArgument { field, .. } => Some(*field),
            Self::Cancelled => None,
        }
    }
}

/// Result alias used throughout the kernel.
pub type Result<T> = std::result::Result<T, SimulationError>;
