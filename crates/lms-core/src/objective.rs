//! Tagged expressions and objectives.
//!
//! Units register instantaneous expressions tagged with what they measure
//! (cost rate, power, emission rate). An objective integrates them over
//! their time set with the trapezoidal rule.

use crate::error::{ModelError, ModelResult};
use crate::expr::{AffineForm, LinExpr, LinearRow, Relation};
use crate::model::Model;
use crate::time::TimeSetId;
use crate::unit::UnitId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveSense {
    #[default]
    Minimize,
    Maximize,
}

/// What a tagged expression measures once integrated over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionTag {
    Cost,
    Energy,
    Co2,
    Prosumption,
}

impl ExpressionTag {
    pub fn unit(self) -> &'static str {
        match self {
            ExpressionTag::Cost => "€",
            ExpressionTag::Energy | ExpressionTag::Prosumption => "W.h",
            ExpressionTag::Co2 => "kg eq",
        }
    }

    pub fn default_sense(self) -> ObjectiveSense {
        match self {
            ExpressionTag::Prosumption => ObjectiveSense::Maximize,
            _ => ObjectiveSense::Minimize,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExpressionTag::Cost => "cost",
            ExpressionTag::Energy => "energy",
            ExpressionTag::Co2 => "co2",
            ExpressionTag::Prosumption => "prosumption",
        }
    }
}

impl fmt::Display for ExpressionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpressionTag {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cost" => Ok(ExpressionTag::Cost),
            "energy" => Ok(ExpressionTag::Energy),
            "co2" => Ok(ExpressionTag::Co2),
            "prosumption" => Ok(ExpressionTag::Prosumption),
            other => Err(ModelError::Validation(format!(
                "unknown expression tag '{other}'"
            ))),
        }
    }
}

/// Instantaneous expression over a time set, tagged for objective building.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaggedExpression {
    pub name: String,
    pub owner: Option<UnitId>,
    pub tag: ExpressionTag,
    pub index: TimeSetId,
    pub expr: LinExpr,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ObjectiveTerm {
    Scalar(LinExpr),
    /// Trapezoidal integral of `expr` over the points of `index`.
    Integral { expr: LinExpr, index: TimeSetId },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Objective {
    pub sense: ObjectiveSense,
    pub terms: Vec<ObjectiveTerm>,
}

impl Objective {
    pub fn new(sense: ObjectiveSense) -> Self {
        Self {
            sense,
            terms: Vec::new(),
        }
    }

    pub fn minimize() -> Self {
        Self::new(ObjectiveSense::Minimize)
    }

    pub fn maximize() -> Self {
        Self::new(ObjectiveSense::Maximize)
    }

    pub fn with_scalar(mut self, expr: LinExpr) -> Self {
        self.terms.push(ObjectiveTerm::Scalar(expr));
        self
    }

    pub fn with_integral(mut self, expr: LinExpr, index: TimeSetId) -> Self {
        self.terms.push(ObjectiveTerm::Integral { expr, index });
        self
    }

    /// Sum of the integrals of `exprs` over `index`.
    pub fn integral_of(sense: ObjectiveSense, index: TimeSetId, exprs: Vec<LinExpr>) -> Self {
        exprs
            .into_iter()
            .fold(Self::new(sense), |obj, expr| obj.with_integral(expr, index))
    }
}

impl Model {
    pub fn add_expression(&mut self, expression: TaggedExpression) -> ModelResult<()> {
        if self.expressions.iter().any(|e| e.name == expression.name) {
            return Err(ModelError::DuplicateComponent(expression.name));
        }
        self.time_set(expression.index)?;
        self.check_expr(&expression.name, &expression.expr, Some(expression.index))?;
        debug!(expression = %expression.name, tag = %expression.tag, "registered expression");
        self.expressions.push(expression);
        Ok(())
    }

    pub fn expressions(&self) -> &[TaggedExpression] {
        &self.expressions
    }

    pub fn expressions_tagged(&self, tag: ExpressionTag) -> impl Iterator<Item = &TaggedExpression> {
        self.expressions.iter().filter(move |e| e.tag == tag)
    }

    /// Integrate every expression carrying `tag`, in the tag's default sense.
    pub fn objective_from_tag(&self, tag: ExpressionTag) -> ModelResult<Objective> {
        let objective = self
            .expressions_tagged(tag)
            .fold(Objective::new(tag.default_sense()), |obj, e| {
                obj.with_integral(e.expr.clone(), e.index)
            });
        if objective.terms.is_empty() {
            return Err(ModelError::Validation(format!(
                "no expression tagged '{tag}' in model '{}'",
                self.name()
            )));
        }
        Ok(objective)
    }

    /// Expand an objective into a single affine form at the current points.
    pub fn expand_objective(&self, objective: &Objective) -> ModelResult<AffineForm> {
        let mut form = AffineForm::default();
        for term in &objective.terms {
            match term {
                ObjectiveTerm::Scalar(expr) => {
                    self.check_expr("objective", expr, None)?;
                    self.accumulate(&mut form, expr, None, 1.0)?;
                }
                ObjectiveTerm::Integral { expr, index } => {
                    self.check_expr("objective", expr, Some(*index))?;
                    let points = self.time_set(*index)?.points();
                    for (i, w) in points.windows(2).enumerate() {
                        let half = 0.5 * (w[1] - w[0]);
                        self.accumulate(&mut form, expr, Some((*index, i)), half)?;
                        self.accumulate(&mut form, expr, Some((*index, i + 1)), half)?;
                    }
                }
            }
        }
        form.prune();
        Ok(form)
    }

    /// Value of the objective at the current quantity values.
    pub fn evaluate_objective(&self, objective: &Objective) -> ModelResult<f64> {
        let form = self.expand_objective(objective)?;
        let row = LinearRow {
            name: "objective".into(),
            time: None,
            form,
            relation: Relation::Eq,
        };
        self.row_residual(&row)
    }
}
