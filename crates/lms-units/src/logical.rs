//! Absolute value of a variable as a mixed-integer block.
//!
//! ```text
//! x = s1 - s2,   |x| = s1 + s2
//! s1 <= u * M,   s2 <= (1 - u) * M
//! ```

use lms_core::{
    Applies, LinExpr, Model, ModelError, ModelResult, QuantityId, Relation, TimeSetId, UnitId,
    VarDomain,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbsoluteValueParams {
    /// Big-M bound on `|x|`.
    pub big_m: f64,
}

impl Default for AbsoluteValueParams {
    fn default() -> Self {
        Self { big_m: 1e4 }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AbsoluteValue {
    pub unit: UnitId,
    pub x: QuantityId,
    pub abs: QuantityId,
    pub s1: QuantityId,
    pub s2: QuantityId,
    pub u: QuantityId,
}

impl AbsoluteValue {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &AbsoluteValueParams,
    ) -> ModelResult<Self> {
        if params.big_m <= 0.0 {
            return Err(ModelError::Validation(format!(
                "absolute value {name}: big_m must be positive, got {}",
                params.big_m
            )));
        }
        let m = params.big_m;
        let mut unit = model.add_unit(name, "AbsoluteValue", time)?;
        let x = unit.var("x", VarDomain::bounded(-m, m))?;
        let abs = unit.var("abs", VarDomain::bounded(0.0, m))?;
        let s1 = unit.var("s1", VarDomain::non_negative())?;
        let s2 = unit.var("s2", VarDomain::non_negative())?;
        let u = unit.var("u", VarDomain::binary())?;

        unit.constraint(
            "split",
            Applies::All,
            LinExpr::of(x),
            Relation::Eq,
            LinExpr::of(s1).with(-1.0, s2),
        )?;
        unit.constraint(
            "magnitude",
            Applies::All,
            LinExpr::of(abs),
            Relation::Eq,
            LinExpr::of(s1).with(1.0, s2),
        )?;
        unit.constraint(
            "positive_part",
            Applies::All,
            LinExpr::of(s1).with(-m, u),
            Relation::Le,
            LinExpr::new(),
        )?;
        unit.constraint(
            "negative_part",
            Applies::All,
            LinExpr::of(s2).with(m, u),
            Relation::Le,
            LinExpr::constant(m),
        )?;
        Ok(Self {
            unit: unit.finish(),
            x,
            abs,
            s1,
            s2,
            u,
        })
    }
}
