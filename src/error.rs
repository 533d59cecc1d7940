//! Fatal integration errors.
//!
//! Recoverable root-solver failures live in [`crate::roots::RootError`] and
//! are absorbed inside the event schedule; everything here aborts the
//! integration call. Each variant carries the time last reached so callers
//! can diagnose where the run stopped.

use thiserror::Error;

/// Errors that abort an integration call.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Invalid solver or solver-component configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the invalid configuration
        message: String,
    },

    /// Invalid input parameters to an integration call.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// Description of the invalid input
        message: String,
    },

    /// The step size required to meet the tolerance fell below the minimum.
    #[error("step size {h} underflowed minimum at t = {t}")]
    StepUnderflow {
        /// Time at which the step size underflowed
        t: f64,
        /// Step size that was required
        h: f64,
    },

    /// The derivative-evaluation budget was exhausted.
    #[error("evaluation budget of {max} exhausted at t = {t}")]
    EvaluationBudget {
        /// Configured maximum number of evaluations
        max: u64,
        /// Time last reached before exhaustion
        t: f64,
    },

    /// Maximum number of integration steps exceeded.
    #[error("maximum number of integration steps exceeded at t = {t}")]
    MaxStepsExceeded {
        /// Time last reached
        t: f64,
    },

    /// A state component became NaN or infinite.
    #[error("non-finite state detected at t = {t}")]
    NonFiniteState {
        /// Time at which the non-finite state was detected
        t: f64,
    },
}
