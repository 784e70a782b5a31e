//! Solver backends reachable through `good_lp`.

use crate::error::SolveError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Linear solver used for a model.
///
/// Every variant always exists so configurations parse the same way on
/// every build; [`SolverKind::is_available`] tells whether the backend was
/// compiled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    /// Clarabel - interior-point conic solver (pure Rust). Continuous only.
    #[default]
    Clarabel,
    /// HiGHS - dual simplex for LP, branch-and-cut for MIP.
    Highs,
}

impl SolverKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            SolverKind::Clarabel => "Clarabel",
            SolverKind::Highs => "HiGHS",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            SolverKind::Clarabel => "Interior-point LP/conic solver (pure Rust)",
            SolverKind::Highs => "High-performance LP/MIP solver",
        }
    }

    /// Cargo feature enabling this backend.
    pub fn feature(&self) -> &'static str {
        match self {
            SolverKind::Clarabel => "solver-clarabel",
            SolverKind::Highs => "solver-highs",
        }
    }

    pub fn supports_integers(&self) -> bool {
        matches!(self, SolverKind::Highs)
    }

    pub fn is_available(&self) -> bool {
        match self {
            SolverKind::Clarabel => cfg!(feature = "solver-clarabel"),
            SolverKind::Highs => cfg!(feature = "solver-highs"),
        }
    }

    pub fn all() -> &'static [SolverKind] {
        &[SolverKind::Clarabel, SolverKind::Highs]
    }

    /// Backends compiled into this build.
    pub fn available() -> Vec<SolverKind> {
        Self::all()
            .iter()
            .copied()
            .filter(SolverKind::is_available)
            .collect()
    }
}

impl fmt::Display for SolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for SolverKind {
    type Err = SolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clarabel" => Ok(SolverKind::Clarabel),
            "highs" => Ok(SolverKind::Highs),
            _ => Err(SolveError::UnknownSolver(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_solver_kind() {
        assert_eq!("Clarabel".parse::<SolverKind>().unwrap(), SolverKind::Clarabel);
        assert_eq!(" highs ".parse::<SolverKind>().unwrap(), SolverKind::Highs);
        assert!(matches!(
            "cplex".parse::<SolverKind>(),
            Err(SolveError::UnknownSolver(name)) if name == "cplex"
        ));
    }

    #[test]
    fn test_capabilities() {
        assert!(!SolverKind::Clarabel.supports_integers());
        assert!(SolverKind::Highs.supports_integers());
        assert_eq!(SolverKind::default(), SolverKind::Clarabel);
        assert_eq!(SolverKind::Highs.to_string(), "HiGHS");
    }

    #[cfg(feature = "solver-clarabel")]
    #[test]
    fn test_clarabel_available_by_default() {
        assert!(SolverKind::available().contains(&SolverKind::Clarabel));
    }
}
