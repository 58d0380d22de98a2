//! Reasons a satisfiability check came back unknown.

use thiserror::Error;

/// Why [`crate::Solver::check_sat`] returned
/// [`crate::SolverResult::Unknown`].
///
/// These are the recoverable failures: the solver is left in a
/// consistent state and can be resumed, popped or reconfigured.
/// Contract violations (mixing widths, out-of-range variable or bit
/// indices) are not represented here; they panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SolverError {
    /// The external cancellation flag was raised.
    #[error("cancelled by external request")]
    Cancelled,
    /// The configured conflict budget was exhausted.
    #[error("conflict budget of {0} exhausted")]
    ConflictLimit(u64),
    /// The configured decision budget was exhausted.
    #[error("decision budget of {0} exhausted")]
    DecisionLimit(u64),
}
