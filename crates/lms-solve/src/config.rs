//! Solver configuration, readable from TOML or JSON.
//!
//! ```toml
//! solver = "highs"
//! relax_integrality = false
//! tolerance = 1e-6
//! ```

use crate::backend::SolverKind;
use crate::error::{SolveError, SolveResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default)]
    pub solver: SolverKind,
    /// Solve binary and integer variables as continuous ones.
    #[serde(default)]
    pub relax_integrality: bool,
    /// Largest constraint violation accepted when the solution is checked.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Re-evaluate every row at the solution and warn on violations.
    #[serde(default = "default_check_solution")]
    pub check_solution: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver: SolverKind::default(),
            relax_integrality: false,
            tolerance: default_tolerance(),
            check_solution: default_check_solution(),
        }
    }
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_check_solution() -> bool {
    true
}

impl SolverConfig {
    pub fn with_solver(solver: SolverKind) -> Self {
        Self {
            solver,
            ..Self::default()
        }
    }

    pub fn relaxed(mut self) -> Self {
        self.relax_integrality = true;
        self
    }

    pub fn from_toml_str(text: &str) -> SolveResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| SolveError::Config(e.to_string()))?;
        config.validate()
    }

    pub fn from_json_str(text: &str) -> SolveResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| SolveError::Config(e.to_string()))?;
        config.validate()
    }

    /// Load from a `.toml` or `.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> SolveResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&contents),
            Some("json") => Self::from_json_str(&contents),
            _ => Err(SolveError::Config(format!(
                "unsupported config format: {}",
                path.display()
            ))),
        }
    }

    pub fn to_toml_string(&self) -> SolveResult<String> {
        toml::to_string_pretty(self).map_err(|e| SolveError::Config(e.to_string()))
    }

    fn validate(self) -> SolveResult<Self> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(SolveError::Config(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = SolverConfig::from_toml_str("solver = \"highs\"").unwrap();
        assert_eq!(config.solver, SolverKind::Highs);
        assert_eq!(config.tolerance, 1e-6);
        assert!(config.check_solution);
        assert!(!config.relax_integrality);
    }

    #[test]
    fn test_json_and_invalid_values() {
        let config = SolverConfig::from_json_str(r#"{"relax_integrality": true}"#).unwrap();
        assert!(config.relax_integrality);
        assert!(SolverConfig::from_json_str(r#"{"tolerance": -1.0}"#).is_err());
        assert!(SolverConfig::from_toml_str("solver = \"gurobi\"").is_err());
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solver.toml");
        let config = SolverConfig::with_solver(SolverKind::Highs).relaxed();
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(SolverConfig::from_path(&path).unwrap(), config);

        let other = dir.path().join("solver.yaml");
        std::fs::write(&other, "solver: highs").unwrap();
        assert!(matches!(
            SolverConfig::from_path(&other),
            Err(SolveError::Config(_))
        ));
    }
}
