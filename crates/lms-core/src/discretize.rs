//! Time discretisation of continuous sets.
//!
//! Discretising a continuous set replaces its bounds with a finite grid,
//! re-sizes every quantity indexed by it and adds one finite-difference
//! equation family per derivative. Rules declared before discretisation are
//! expanded against the new points afterwards.

use crate::error::{ModelError, ModelResult};
use crate::expr::{Applies, Coeff, ConstraintOrigin, ConstraintRule, LinExpr, Relation, StepSpan, TimeRef};
use crate::model::Model;
use crate::quantity::{ParamValue, QuantityId, QuantityKind};
use crate::time::TimeSetId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::info;

pub const DISCRETIZATION_PREFIX: &str = "_disc_eq_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    #[default]
    Backward,
    Forward,
    Central,
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scheme::Backward => "backward",
            Scheme::Forward => "forward",
            Scheme::Central => "central",
        })
    }
}

impl FromStr for Scheme {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backward" => Ok(Scheme::Backward),
            "forward" => Ok(Scheme::Forward),
            "central" => Ok(Scheme::Central),
            other => Err(ModelError::Discretization(format!(
                "unknown finite difference scheme '{other}'"
            ))),
        }
    }
}

/// A way of turning a continuous domain into points and derivative equations.
pub trait Discretization {
    /// Short identifier used in logs.
    fn id(&self) -> String;

    /// Points covering `[start, end]`, both ends included.
    fn grid(&self, start: f64, end: f64) -> ModelResult<Vec<f64>>;

    /// Equation family linking `derivative` to `state` on `index`.
    fn derivative_rule(
        &self,
        name: String,
        derivative: QuantityId,
        state: QuantityId,
        index: TimeSetId,
    ) -> ConstraintRule;
}

/// Uniform finite differences with `nfe` elements.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FiniteDifference {
    pub nfe: usize,
    #[serde(default)]
    pub scheme: Scheme,
}

impl FiniteDifference {
    pub fn new(nfe: usize, scheme: Scheme) -> Self {
        Self { nfe, scheme }
    }

    pub fn backward(nfe: usize) -> Self {
        Self::new(nfe, Scheme::Backward)
    }

    pub fn forward(nfe: usize) -> Self {
        Self::new(nfe, Scheme::Forward)
    }

    pub fn central(nfe: usize) -> Self {
        Self::new(nfe, Scheme::Central)
    }
}

impl Discretization for FiniteDifference {
    fn id(&self) -> String {
        format!("finite_difference/{}", self.scheme)
    }

    fn grid(&self, start: f64, end: f64) -> ModelResult<Vec<f64>> {
        if self.nfe == 0 {
            return Err(ModelError::Discretization(
                "number of finite elements must be positive".into(),
            ));
        }
        if self.scheme == Scheme::Central && self.nfe < 2 {
            return Err(ModelError::Discretization(
                "central differences need at least two elements".into(),
            ));
        }
        let step = (end - start) / self.nfe as f64;
        let mut points: Vec<f64> = (0..self.nfe).map(|i| start + step * i as f64).collect();
        points.push(end);
        Ok(points)
    }

    fn derivative_rule(
        &self,
        name: String,
        derivative: QuantityId,
        state: QuantityId,
        index: TimeSetId,
    ) -> ConstraintRule {
        let step = |scale, span| Coeff::Step { scale, span };
        let (lhs, applies) = match self.scheme {
            // dx[t] = (x[t] - x[t-1]) / h
            Scheme::Backward => (
                LinExpr::of(derivative)
                    .with_coeff(step(-1.0, StepSpan::Backward), state, TimeRef::Current)
                    .with_coeff(step(1.0, StepSpan::Backward), state, TimeRef::Offset(-1)),
                Applies::AllButFirst,
            ),
            // dx[t] = (x[t+1] - x[t]) / h
            Scheme::Forward => (
                LinExpr::of(derivative)
                    .with_coeff(step(-1.0, StepSpan::Forward), state, TimeRef::Offset(1))
                    .with_coeff(step(1.0, StepSpan::Forward), state, TimeRef::Current),
                Applies::AllButLast,
            ),
            // dx[t] = (x[t+1] - x[t-1]) / 2h
            Scheme::Central => (
                LinExpr::of(derivative)
                    .with_coeff(step(-1.0, StepSpan::Central), state, TimeRef::Offset(1))
                    .with_coeff(step(1.0, StepSpan::Central), state, TimeRef::Offset(-1)),
                Applies::Interior,
            ),
        };
        ConstraintRule::new(name, lhs, Relation::Eq, LinExpr::new())
            .indexed(index)
            .applies(applies)
            .origin(ConstraintOrigin::Discretization)
    }
}

impl Model {
    /// Discretise a continuous time set in place.
    pub fn discretize(&mut self, set: TimeSetId, method: &dyn Discretization) -> ModelResult<()> {
        let time_set = self.time_set(set)?;
        if !time_set.is_continuous() {
            return Err(ModelError::Discretization(format!(
                "time set '{}' is not an undiscretised continuous set",
                time_set.name()
            )));
        }
        let points = method.grid(time_set.start(), time_set.end())?;
        let per_point = self.quantities().find(|(_, q)| {
            q.index() == Some(set)
                && matches!(q.kind(), QuantityKind::Parameter(ParamValue::Points(_)))
        });
        if let Some((_, param)) = per_point {
            return Err(ModelError::Discretization(format!(
                "parameter '{}' holds per-point values for '{}'; use a profile instead",
                param.name(),
                time_set.name()
            )));
        }

        let mut rules = Vec::new();
        for (id, quantity) in self.quantities() {
            if quantity.index() != Some(set) {
                continue;
            }
            if let QuantityKind::Derivative { state, .. } = quantity.kind() {
                let name = format!(
                    "{DISCRETIZATION_PREFIX}{}",
                    quantity.name().replace('.', "_")
                );
                rules.push(method.derivative_rule(name, id, *state, set));
            }
        }
        self.check_rules(&rules)?;

        let len = points.len();
        self.time_sets[set.value()].replace_points(points);
        for quantity in self.quantities.iter_mut() {
            if quantity.index == Some(set) {
                quantity.values = vec![None; len];
            }
        }
        let derivatives = rules.len();
        self.insert_rules(rules)?;
        info!(
            set = %self.time_sets[set.value()].name(),
            method = %method.id(),
            points = len,
            derivatives,
            "discretized time set"
        );
        Ok(())
    }
}
