//! Error taxonomy.
//!
//! Only conditions that abort a run are errors. Structurally invalid moves
//! are filtered by the neighborhood and never surface; solver time-outs
//! are a [`SolveStatus`](crate::solver::SolveStatus), not an error.

use thiserror::Error;

/// Errors raised by model validation, configuration and the hybrid layer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdmissionError {
    /// No assignment can satisfy the hard constraints.
    #[error("infeasible instance: {reason}")]
    InfeasibleInstance { reason: String },

    /// Instance data is malformed (wrong vector lengths, inverted windows).
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Configuration rejected before any search state was created.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// An assignment list could not be decoded into a solution.
    #[error("invalid assignment for patient {patient}: {reason}")]
    InvalidAssignment { patient: usize, reason: String },

    /// The exact solver answered in a way its contract rules out.
    #[error("exact solver contract violation: {0}")]
    SolverContractViolation(String),
}

impl AdmissionError {
    pub(crate) fn infeasible(reason: impl Into<String>) -> Self {
        AdmissionError::InfeasibleInstance {
            reason: reason.into(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, AdmissionError>;
