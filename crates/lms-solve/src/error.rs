//! Error types for solving models.

use crate::backend::SolverKind;
use good_lp::ResolutionError;
use lms_core::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolveError {
    /// The model could not be expanded.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Unknown solver: {0}")]
    UnknownSolver(String),

    /// The backend exists but its cargo feature is disabled.
    #[error("Solver {0} is not compiled in. Enable the `{feature}` feature", feature = .0.feature())]
    SolverUnavailable(SolverKind),

    #[error("{solver} does not support integer variables ({count} found). Set `relax_integrality`, fix them, or use a MIP solver")]
    IntegerVariablesUnsupported { solver: SolverKind, count: usize },

    #[error("Problem is infeasible: {0}")]
    Infeasible(String),

    #[error("Problem is unbounded")]
    Unbounded,

    /// Backend failure.
    #[error("Solver failed: {0}")]
    Solver(String),

    #[error("Invalid solver configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ResolutionError> for SolveError {
    fn from(err: ResolutionError) -> Self {
        match err {
            ResolutionError::Infeasible => SolveError::Infeasible("reported by solver".into()),
            ResolutionError::Unbounded => SolveError::Unbounded,
            other => SolveError::Solver(other.to_string()),
        }
    }
}

pub type SolveResult<T> = Result<T, SolveError>;
