//! Linear expression templates.
//!
//! Constraints are declared once as [`ConstraintRule`]s over time-relative
//! [`Term`]s and expanded into concrete [`LinearRow`]s against the current
//! points of their time set. Rules therefore stay valid when discretisation
//! replaces those points.

use crate::quantity::QuantityId;
use crate::time::TimeSetId;
use crate::unit::UnitId;
use serde::Serialize;
use std::fmt;

/// Which neighbouring points define the step of a finite difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepSpan {
    /// `t[i] - t[i-1]`
    Backward,
    /// `t[i+1] - t[i]`
    Forward,
    /// `t[i+1] - t[i-1]`
    Central,
}

/// Coefficient of a term, resolved at each expansion point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Coeff {
    Const(f64),
    /// `scale * param[t]`
    Param { param: QuantityId, scale: f64 },
    /// `scale / param[t]`
    InverseParam { param: QuantityId, scale: f64 },
    /// `scale / step`, where the step is measured around the current point.
    Step { scale: f64, span: StepSpan },
}

impl From<f64> for Coeff {
    fn from(value: f64) -> Self {
        Coeff::Const(value)
    }
}

/// Point of the time set a term reads, relative to the expansion point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeRef {
    Current,
    Offset(isize),
    First,
    Last,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Term {
    pub coeff: Coeff,
    pub quantity: QuantityId,
    pub at: TimeRef,
}

/// Affine combination of terms plus a constant.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinExpr {
    pub terms: Vec<Term>,
    pub constant: f64,
}

impl LinExpr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Single quantity with unit coefficient.
    pub fn of(quantity: QuantityId) -> Self {
        Self::new().with(1.0, quantity)
    }

    pub fn with(self, coeff: f64, quantity: QuantityId) -> Self {
        self.with_coeff(Coeff::Const(coeff), quantity, TimeRef::Current)
    }

    pub fn with_at(self, coeff: f64, quantity: QuantityId, at: TimeRef) -> Self {
        self.with_coeff(Coeff::Const(coeff), quantity, at)
    }

    pub fn with_coeff(mut self, coeff: Coeff, quantity: QuantityId, at: TimeRef) -> Self {
        self.terms.push(Term {
            coeff,
            quantity,
            at,
        });
        self
    }

    /// `scale * param[t] * quantity[t]`
    pub fn with_param_product(self, scale: f64, param: QuantityId, quantity: QuantityId) -> Self {
        self.with_coeff(Coeff::Param { param, scale }, quantity, TimeRef::Current)
    }

    pub fn with_constant(mut self, constant: f64) -> Self {
        self.constant += constant;
        self
    }

    pub fn extend(mut self, other: LinExpr) -> Self {
        self.terms.extend(other.terms);
        self.constant += other.constant;
        self
    }

    pub fn scaled(mut self, factor: f64) -> Self {
        for term in &mut self.terms {
            term.coeff = match term.coeff {
                Coeff::Const(c) => Coeff::Const(c * factor),
                Coeff::Param { param, scale } => Coeff::Param {
                    param,
                    scale: scale * factor,
                },
                Coeff::InverseParam { param, scale } => Coeff::InverseParam {
                    param,
                    scale: scale * factor,
                },
                Coeff::Step { scale, span } => Coeff::Step {
                    scale: scale * factor,
                    span,
                },
            };
        }
        self.constant *= factor;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty() && self.constant == 0.0
    }

    /// Every quantity referenced, including coefficient parameters.
    pub fn quantities(&self) -> impl Iterator<Item = QuantityId> + '_ {
        self.terms.iter().flat_map(|term| {
            let param = match term.coeff {
                Coeff::Param { param, .. } | Coeff::InverseParam { param, .. } => Some(param),
                _ => None,
            };
            std::iter::once(term.quantity).chain(param)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    Eq,
    Le,
    Ge,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Relation::Eq => "==",
            Relation::Le => "<=",
            Relation::Ge => ">=",
        })
    }
}

/// Points of the time set a rule is expanded at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Applies {
    #[default]
    All,
    First,
    Last,
    AllButFirst,
    AllButLast,
    /// Every point except both ends.
    Interior,
}

impl Applies {
    pub fn indices(self, len: usize) -> Vec<usize> {
        if len == 0 {
            return Vec::new();
        }
        match self {
            Applies::All => (0..len).collect(),
            Applies::First => vec![0],
            Applies::Last => vec![len - 1],
            Applies::AllButFirst => (1..len).collect(),
            Applies::AllButLast => (0..len - 1).collect(),
            Applies::Interior => (1..len.saturating_sub(1)).collect(),
        }
    }
}

/// Who generated a constraint family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConstraintOrigin {
    Unit,
    Model,
    FlowConnection,
    EffortConnection,
    Discretization,
}

/// A named family of constraints `lhs REL rhs`, one per applicable point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConstraintRule {
    pub name: String,
    pub owner: Option<UnitId>,
    pub index: Option<TimeSetId>,
    pub applies: Applies,
    pub lhs: LinExpr,
    pub relation: Relation,
    pub rhs: LinExpr,
    pub origin: ConstraintOrigin,
    pub active: bool,
}

impl ConstraintRule {
    pub fn new(name: impl Into<String>, lhs: LinExpr, relation: Relation, rhs: LinExpr) -> Self {
        Self {
            name: name.into(),
            owner: None,
            index: None,
            applies: Applies::All,
            lhs,
            relation,
            rhs,
            origin: ConstraintOrigin::Model,
            active: true,
        }
    }

    pub fn indexed(mut self, index: TimeSetId) -> Self {
        self.index = Some(index);
        self
    }

    pub fn applies(mut self, applies: Applies) -> Self {
        self.applies = applies;
        self
    }

    pub fn owned_by(mut self, unit: UnitId) -> Self {
        self.owner = Some(unit);
        self.origin = ConstraintOrigin::Unit;
        self
    }

    pub fn origin(mut self, origin: ConstraintOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn quantities(&self) -> impl Iterator<Item = QuantityId> + '_ {
        self.lhs.quantities().chain(self.rhs.quantities())
    }
}

/// Solver-level variable: a quantity at one point (or the scalar itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarKey {
    pub quantity: QuantityId,
    pub point: Option<usize>,
}

/// `Σ coeff · var + constant`, with one entry per variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AffineForm {
    pub coeffs: Vec<(VarKey, f64)>,
    pub constant: f64,
}

impl AffineForm {
    pub fn add(&mut self, key: VarKey, coeff: f64) {
        match self.coeffs.iter_mut().find(|(k, _)| *k == key) {
            Some((_, c)) => *c += coeff,
            None => self.coeffs.push((key, coeff)),
        }
    }

    /// Drop entries whose coefficients cancelled out.
    pub fn prune(&mut self) {
        self.coeffs.retain(|(_, c)| *c != 0.0);
    }

    pub fn evaluate(&self, mut value: impl FnMut(VarKey) -> Option<f64>) -> Option<f64> {
        let mut total = self.constant;
        for (key, coeff) in &self.coeffs {
            total += coeff * value(*key)?;
        }
        Some(total)
    }
}

/// One expanded constraint: `form REL 0`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinearRow {
    pub name: String,
    /// Time point the row was expanded at, `None` for scalar rules.
    pub time: Option<f64>,
    pub form: AffineForm,
    pub relation: Relation,
}

impl LinearRow {
    /// True when the row holds for the given residual within `tolerance`.
    pub fn holds(&self, residual: f64, tolerance: f64) -> bool {
        match self.relation {
            Relation::Eq => residual.abs() <= tolerance,
            Relation::Le => residual <= tolerance,
            Relation::Ge => residual >= -tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applies_indices() {
        assert_eq!(Applies::All.indices(3), vec![0, 1, 2]);
        assert_eq!(Applies::First.indices(3), vec![0]);
        assert_eq!(Applies::Last.indices(3), vec![2]);
        assert_eq!(Applies::AllButFirst.indices(3), vec![1, 2]);
        assert_eq!(Applies::AllButLast.indices(3), vec![0, 1]);
        assert_eq!(Applies::Interior.indices(3), vec![1]);
        assert!(Applies::Interior.indices(1).is_empty());
        assert!(Applies::All.indices(0).is_empty());
    }

    #[test]
    fn test_affine_form_merges_keys() {
        let key = VarKey {
            quantity: QuantityId::new(0),
            point: Some(1),
        };
        let mut form = AffineForm::default();
        form.add(key, 1.0);
        form.add(key, -1.0);
        assert_eq!(form.coeffs.len(), 1);
        form.prune();
        assert!(form.coeffs.is_empty());
    }

    #[test]
    fn test_scaled_expression() {
        let q = QuantityId::new(2);
        let p = QuantityId::new(3);
        let expr = LinExpr::of(q)
            .with_param_product(2.0, p, q)
            .with_constant(1.0)
            .scaled(-1.0);
        assert_eq!(expr.terms[0].coeff, Coeff::Const(-1.0));
        assert_eq!(expr.terms[1].coeff, Coeff::Param { param: p, scale: -2.0 });
        assert_eq!(expr.constant, -1.0);
        assert_eq!(expr.quantities().collect::<Vec<_>>(), vec![q, q, p]);
    }

    #[test]
    fn test_row_holds() {
        let row = LinearRow {
            name: "r".into(),
            time: None,
            form: AffineForm::default(),
            relation: Relation::Le,
        };
        assert!(row.holds(-3.0, 1e-9));
        assert!(!row.holds(0.1, 1e-9));
    }
}
