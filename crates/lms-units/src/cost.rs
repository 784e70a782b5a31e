//! Instantaneous cost expressions attached to a unit.
//!
//! Prices are in €/kWh, powers in kW and time in seconds, so every cost
//! rate is divided by 3600 before it is integrated over the horizon. The
//! resulting expression is registered as `<unit>.inst_cost` with the
//! [`ExpressionTag::Cost`] tag; a cost objective is then
//! `model.objective_from_tag(ExpressionTag::Cost)`.
//!
//! A scalar price gives a static cost, a profile or per-point price a
//! time-varying one.

use lms_core::units::SECONDS_PER_HOUR;
use lms_core::{
    Applies, ExpressionTag, LinExpr, ModelResult, ParamValue, QuantityId, Relation, UnitBuilder,
    VarDomain,
};

pub const COST_EXPRESSION: &str = "inst_cost";

/// `inst_cost = var * cost / 3600`. Returns the price parameter.
pub fn linear_cost(
    unit: &mut UnitBuilder<'_>,
    var: QuantityId,
    price: impl Into<ParamValue>,
) -> ModelResult<QuantityId> {
    let cost = unit.param("cost", price)?;
    unit.expression(
        COST_EXPRESSION,
        ExpressionTag::Cost,
        LinExpr::new().with_param_product(1.0 / SECONDS_PER_HOUR, cost, var),
    )?;
    Ok(cost)
}

/// `inst_cost = (bought * cost_buy - sold * cost_sell) / 3600`.
///
/// Returns the buying and selling price parameters.
pub fn bilinear_cost(
    unit: &mut UnitBuilder<'_>,
    bought: QuantityId,
    sold: QuantityId,
    buy_price: impl Into<ParamValue>,
    sell_price: impl Into<ParamValue>,
) -> ModelResult<(QuantityId, QuantityId)> {
    let cost_buy = unit.param("cost_buy", buy_price)?;
    let cost_sell = unit.param("cost_sell", sell_price)?;
    unit.expression(
        COST_EXPRESSION,
        ExpressionTag::Cost,
        LinExpr::new()
            .with_param_product(1.0 / SECONDS_PER_HOUR, cost_buy, bought)
            .with_param_product(-1.0 / SECONDS_PER_HOUR, cost_sell, sold),
    )?;
    Ok((cost_buy, cost_sell))
}

/// `inst_cost = |var| * cost / 3600`, through an auxiliary `cost_abs`
/// bounded below by `var` and `-var`. Returns `(cost_abs, price)`.
///
/// Only valid when the cost is minimised.
pub fn absolute_cost(
    unit: &mut UnitBuilder<'_>,
    var: QuantityId,
    price: impl Into<ParamValue>,
) -> ModelResult<(QuantityId, QuantityId)> {
    let abs = unit.var("cost_abs", VarDomain::non_negative())?;
    unit.constraint(
        "cost_abs_pos",
        Applies::All,
        LinExpr::of(abs),
        Relation::Ge,
        LinExpr::of(var),
    )?;
    unit.constraint(
        "cost_abs_neg",
        Applies::All,
        LinExpr::of(abs),
        Relation::Ge,
        LinExpr::new().with(-1.0, var),
    )?;
    let cost = linear_cost(unit, abs, price)?;
    Ok((abs, cost))
}
