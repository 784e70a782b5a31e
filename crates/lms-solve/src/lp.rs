//! Translation of an expanded model into a `good_lp` problem.
//!
//! Every decision quantity becomes one solver variable per time point (one
//! for scalars), every active constraint family is expanded into rows at
//! the current points, and the objective is expanded with trapezoidal
//! integration. Parameters are folded into constants during expansion.

use crate::backend::SolverKind;
use crate::config::SolverConfig;
use crate::error::{SolveError, SolveResult};
use good_lp::{
    constraint, variable, Constraint, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel, Variable,
};
use lms_core::{
    AffineForm, Integrality, LinearRow, Model, ModelError, Objective, ObjectiveSense, Relation,
    VarKey,
};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Rows whose coefficients all cancel are checked against this tolerance.
const CONSTANT_ROW_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SolveStatus {
    Optimal,
    /// Optimal for the problem with integrality dropped.
    Relaxed,
}

/// Solution of one solve, keyed by quantity name.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub solver: SolverKind,
    pub objective_value: f64,
    /// One value per time point, or a single value for scalars.
    pub values: BTreeMap<String, Vec<f64>>,
    pub solve_time_ms: f64,
    /// Largest row violation at the solution, when checked.
    pub max_violation: Option<f64>,
    assignments: Vec<(VarKey, f64)>,
}

impl SolveOutcome {
    pub fn value(&self, quantity: &str, point: usize) -> Option<f64> {
        self.values.get(quantity).and_then(|v| v.get(point)).copied()
    }

    pub fn series(&self, quantity: &str) -> Option<&[f64]> {
        self.values.get(quantity).map(Vec::as_slice)
    }

    /// Write the solution into the model's quantity values.
    pub fn load_into(&self, model: &mut Model) -> Result<(), ModelError> {
        for (key, value) in &self.assignments {
            model.set_value(key.quantity, key.point, *value)?;
        }
        Ok(())
    }
}

/// Builds and solves models with the configured backend.
#[derive(Debug, Clone, Default)]
pub struct Solver {
    config: SolverConfig,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn with_kind(kind: SolverKind) -> Self {
        Self::new(SolverConfig::with_solver(kind))
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn solve(&self, model: &Model, objective: &Objective) -> SolveResult<SolveOutcome> {
        let start = Instant::now();
        let kind = self.config.solver;
        if !kind.is_available() {
            return Err(SolveError::SolverUnavailable(kind));
        }

        let keys = model.decision_keys();
        let integral = self.count_integral(model, &keys)?;
        let relaxed = integral > 0 && self.config.relax_integrality;
        if integral > 0 && !relaxed && !kind.supports_integers() {
            return Err(SolveError::IntegerVariablesUnsupported {
                solver: kind,
                count: integral,
            });
        }

        let mut vars = ProblemVariables::new();
        let mut columns: HashMap<VarKey, Variable> = HashMap::with_capacity(keys.len());
        let mut ordered = Vec::with_capacity(keys.len());
        for key in &keys {
            let var = vars.add(self.definition(model, *key)?);
            columns.insert(*key, var);
            ordered.push(var);
        }

        let form = model.expand_objective(objective)?;
        let objective_expr = to_expression(&form, &columns)?;

        let rows = model.expand_all()?;
        let mut constraints = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(c) = row_constraint(row, &columns)? {
                constraints.push(c);
            }
        }
        info!(
            model = model.name(),
            solver = %kind,
            variables = keys.len(),
            rows = constraints.len(),
            integral,
            relaxed,
            "solving model"
        );

        let unsolved = match objective.sense {
            ObjectiveSense::Minimize => vars.minimise(objective_expr),
            ObjectiveSense::Maximize => vars.maximise(objective_expr),
        };
        let solved = match kind {
            #[cfg(feature = "solver-clarabel")]
            SolverKind::Clarabel => run(
                unsolved.using(good_lp::solvers::clarabel::clarabel),
                constraints,
                &ordered,
            )?,
            #[cfg(feature = "solver-highs")]
            SolverKind::Highs => run(
                unsolved.using(good_lp::solvers::highs::highs),
                constraints,
                &ordered,
            )?,
            #[allow(unreachable_patterns)]
            other => return Err(SolveError::SolverUnavailable(other)),
        };

        let assignments: Vec<(VarKey, f64)> = keys.iter().copied().zip(solved).collect();
        let lookup: HashMap<VarKey, f64> = assignments.iter().copied().collect();
        let objective_value = form
            .evaluate(|k| lookup.get(&k).copied())
            .unwrap_or(form.constant);

        let max_violation = if self.config.check_solution {
            let worst = max_violation(&rows, &lookup);
            if worst > self.config.tolerance {
                warn!(
                    model = model.name(),
                    violation = worst,
                    tolerance = self.config.tolerance,
                    "solution violates constraints beyond tolerance"
                );
            }
            Some(worst)
        } else {
            None
        };

        let mut values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (key, value) in &assignments {
            let name = model.quantity(key.quantity)?.name().to_string();
            values.entry(name).or_default().push(*value);
        }

        let solve_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        info!(
            model = model.name(),
            objective = objective_value,
            solve_time_ms,
            "solve finished"
        );
        Ok(SolveOutcome {
            status: if relaxed {
                SolveStatus::Relaxed
            } else {
                SolveStatus::Optimal
            },
            solver: kind,
            objective_value,
            values,
            solve_time_ms,
            max_violation,
            assignments,
        })
    }

    /// Solve, then write the solution back into the model.
    pub fn solve_and_load(
        &self,
        model: &mut Model,
        objective: &Objective,
    ) -> SolveResult<SolveOutcome> {
        let outcome = self.solve(model, objective)?;
        outcome.load_into(model)?;
        Ok(outcome)
    }

    /// Integral variables left free; fixed ones are plain bounds.
    fn count_integral(&self, model: &Model, keys: &[VarKey]) -> SolveResult<usize> {
        let mut count = 0;
        for key in keys {
            let quantity = model.quantity(key.quantity)?;
            let integral = quantity.domain().is_some_and(|d| d.is_integral());
            if integral && !quantity.is_fixed() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn definition(&self, model: &Model, key: VarKey) -> SolveResult<good_lp::VariableDefinition> {
        let quantity = model.quantity(key.quantity)?;
        let mut definition = variable().name(match key.point {
            Some(i) => format!("{}[{i}]", quantity.name()),
            None => quantity.name().to_string(),
        });
        if quantity.is_fixed() {
            let value = quantity.value(key.point.unwrap_or(0)).ok_or_else(|| {
                ModelError::MissingValue {
                    quantity: quantity.name().to_string(),
                    time: model.time_of(key).unwrap_or(0.0),
                }
            })?;
            return Ok(definition.min(value).max(value));
        }
        if let Some(domain) = quantity.domain() {
            if let Some(lower) = domain.lower {
                definition = definition.min(lower);
            }
            if let Some(upper) = domain.upper {
                definition = definition.max(upper);
            }
            if !self.config.relax_integrality {
                definition = match domain.integrality {
                    Integrality::Continuous => definition,
                    Integrality::Integer => definition.integer(),
                    Integrality::Binary => definition.binary(),
                };
            }
        }
        debug!(variable = %quantity.name(), point = ?key.point, "declared solver variable");
        Ok(definition)
    }
}

/// Solver constraint for a row; rows whose coefficients cancel are checked
/// directly and dropped.
fn row_constraint(
    row: &LinearRow,
    columns: &HashMap<VarKey, Variable>,
) -> SolveResult<Option<Constraint>> {
    if row.form.coeffs.is_empty() {
        let residual = row.form.constant;
        if !row.holds(residual, CONSTANT_ROW_TOLERANCE) {
            return Err(SolveError::Infeasible(format!(
                "{} at t = {} reduces to {residual} {} 0",
                row.name,
                row.time.unwrap_or(0.0),
                row.relation
            )));
        }
        debug!(row = %row.name, time = ?row.time, "dropped constant row");
        return Ok(None);
    }
    let lhs = to_expression(&row.form, columns)?;
    Ok(Some(match row.relation {
        Relation::Eq => constraint!(lhs == 0.0),
        Relation::Le => constraint!(lhs <= 0.0),
        Relation::Ge => constraint!(lhs >= 0.0),
    }))
}

fn to_expression(form: &AffineForm, columns: &HashMap<VarKey, Variable>) -> SolveResult<Expression> {
    let mut expr = Expression::from(form.constant);
    for (key, coeff) in &form.coeffs {
        let var = columns.get(key).ok_or_else(|| {
            SolveError::Model(ModelError::UnknownQuantity(format!(
                "no solver variable for quantity {} at point {:?}",
                key.quantity.value(),
                key.point
            )))
        })?;
        expr += *coeff * *var;
    }
    Ok(expr)
}

fn run<M>(mut problem: M, constraints: Vec<Constraint>, ordered: &[Variable]) -> SolveResult<Vec<f64>>
where
    M: SolverModel<Error = ResolutionError>,
{
    for c in constraints {
        problem = problem.with(c);
    }
    let solution = problem.solve()?;
    Ok(ordered.iter().map(|v| solution.value(*v)).collect())
}

fn max_violation(rows: &[LinearRow], values: &HashMap<VarKey, f64>) -> f64 {
    rows.iter()
        .filter_map(|row| {
            let residual = row.form.evaluate(|k| values.get(&k).copied())?;
            Some(match row.relation {
                Relation::Eq => residual.abs(),
                Relation::Le => residual.max(0.0),
                Relation::Ge => (-residual).max(0.0),
            })
        })
        .fold(0.0, f64::max)
}
