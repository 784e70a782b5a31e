//! Connection to the main electrical grid.
//!
//! `p = p_out - p_in` is the power delivered to the site (port `outlet`,
//! an outgoing flow): `p_out` is bought from the grid and `p_in` injected
//! into it. Buying and selling are made exclusive with a binary `u` unless
//! `exclusive` is disabled, in which case plain bounds keep the problem a LP.

use crate::cost::bilinear_cost;
use lms_core::units::SECONDS_PER_HOUR;
use lms_core::{
    Applies, ExpressionTag, Kilowatts, LinExpr, Model, ModelError, ModelResult, ParamValue,
    QuantityId, Relation, Sense, TimeSetId, UnitId, VarDomain,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainGridParams {
    /// Maximum power bought from the grid.
    pub pmax: Kilowatts,
    /// Maximum power injected into the grid.
    pub pmin: Kilowatts,
    /// Purchase price, €/kWh.
    pub cost_buy: ParamValue,
    /// Feed-in tariff, €/kWh.
    pub cost_sell: ParamValue,
    /// Carbon intensity of purchased power, kg eq/kWh.
    pub co2_mix: Option<ParamValue>,
    pub exclusive: bool,
}

impl Default for MainGridParams {
    fn default() -> Self {
        Self {
            pmax: Kilowatts(100.0),
            pmin: Kilowatts(100.0),
            cost_buy: ParamValue::Scalar(0.15),
            cost_sell: ParamValue::Scalar(0.0),
            co2_mix: None,
            exclusive: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MainGrid {
    pub unit: UnitId,
    pub p: QuantityId,
    pub p_out: QuantityId,
    pub p_in: QuantityId,
    pub u: Option<QuantityId>,
    pub cost_buy: QuantityId,
    pub cost_sell: QuantityId,
}

impl MainGrid {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &MainGridParams,
    ) -> ModelResult<Self> {
        let (pmax, pmin) = (params.pmax.value(), params.pmin.value());
        if pmax < 0.0 || pmin < 0.0 {
            return Err(ModelError::Validation(format!(
                "main grid {name}: limits must be non-negative (pmax {pmax}, pmin {pmin})"
            )));
        }
        let mut unit = model.add_unit(name, "MainGrid", time)?;

        let p = unit.flow_var("p", VarDomain::bounded(-pmin, pmax), Sense::Out)?;
        let p_out = unit.var("p_out", VarDomain::bounded(0.0, pmax))?;
        let p_in = unit.var("p_in", VarDomain::bounded(0.0, pmin))?;
        unit.constraint(
            "p_balance",
            Applies::All,
            LinExpr::of(p),
            Relation::Eq,
            LinExpr::of(p_out).with(-1.0, p_in),
        )?;

        let u = if params.exclusive {
            let u = unit.var("u", VarDomain::binary())?;
            // p_out <= u * pmax
            unit.constraint(
                "buy_mode",
                Applies::All,
                LinExpr::of(p_out).with(-pmax, u),
                Relation::Le,
                LinExpr::new(),
            )?;
            // p_in + u * pmin <= pmin
            unit.constraint(
                "sell_mode",
                Applies::All,
                LinExpr::of(p_in).with(pmin, u),
                Relation::Le,
                LinExpr::constant(pmin),
            )?;
            Some(u)
        } else {
            None
        };

        let (cost_buy, cost_sell) = bilinear_cost(
            &mut unit,
            p_out,
            p_in,
            params.cost_buy.clone(),
            params.cost_sell.clone(),
        )?;
        unit.expression(
            "energy",
            ExpressionTag::Energy,
            LinExpr::new().with(1.0 / SECONDS_PER_HOUR, p_out),
        )?;
        unit.expression(
            "prosumption",
            ExpressionTag::Prosumption,
            LinExpr::new()
                .with(1.0 / SECONDS_PER_HOUR, p_out)
                .with(1.0 / SECONDS_PER_HOUR, p_in),
        )?;
        if let Some(mix) = &params.co2_mix {
            let mix = unit.param("co2_mix", mix.clone())?;
            unit.expression(
                "co2",
                ExpressionTag::Co2,
                LinExpr::new().with_param_product(1.0 / SECONDS_PER_HOUR, mix, p_out),
            )?;
        }

        unit.port("outlet", &[("p", p)])?;
        Ok(Self {
            unit: unit.finish(),
            p,
            p_out,
            p_in,
            u,
            cost_buy,
            cost_sell,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use lms_core::TimeSet;

    fn model() -> (Model, TimeSetId) {
        let mut model = Model::new("g");
        let time = model
            .add_time_set(TimeSet::discrete("time", vec![0.0, 3600.0]).unwrap())
            .unwrap();
        (model, time)
    }

    #[test]
    fn test_exclusive_grid_modes() {
        let (mut model, time) = model();
        let grid = MainGrid::build(&mut model, "grid", time, &MainGridParams::default()).unwrap();
        let u = grid.u.unwrap();

        // selling 30 kW in mode u = 0
        model.set_values(u, &[0.0, 0.0]).unwrap();
        model.set_values(grid.p_out, &[0.0, 0.0]).unwrap();
        model.set_values(grid.p_in, &[30.0, 30.0]).unwrap();
        model.set_values(grid.p, &[-30.0, -30.0]).unwrap();
        for rule in ["grid.p_balance", "grid.buy_mode", "grid.sell_mode"] {
            assert!(model.is_satisfied(rule, 1e-12).unwrap(), "{rule}");
        }
        model.set_values(u, &[1.0, 1.0]).unwrap();
        assert!(!model.is_satisfied("grid.sell_mode", 1e-12).unwrap());
    }

    #[test]
    fn test_expressions_are_tagged() {
        let (mut model, time) = model();
        let params = MainGridParams {
            co2_mix: Some(ParamValue::Scalar(0.06)),
            exclusive: false,
            ..MainGridParams::default()
        };
        let grid = MainGrid::build(&mut model, "grid", time, &params).unwrap();
        assert!(grid.u.is_none());
        assert_eq!(model.expressions().len(), 4);

        model.set_values(grid.p_out, &[2.0, 2.0]).unwrap();
        model.set_values(grid.p_in, &[0.0, 0.0]).unwrap();
        let co2 = model.objective_from_tag(ExpressionTag::Co2).unwrap();
        // 2 kW for one hour at 0.06 kg/kWh
        assert_relative_eq!(model.evaluate_objective(&co2).unwrap(), 0.12, epsilon = 1e-12);
        let cost = model.objective_from_tag(ExpressionTag::Cost).unwrap();
        assert_relative_eq!(model.evaluate_objective(&cost).unwrap(), 0.3, epsilon = 1e-12);
        let energy = model.objective_from_tag(ExpressionTag::Energy).unwrap();
        assert_relative_eq!(model.evaluate_objective(&energy).unwrap(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_limits_rejected() {
        let (mut model, time) = model();
        let params = MainGridParams {
            pmin: Kilowatts(-1.0),
            ..MainGridParams::default()
        };
        assert!(MainGrid::build(&mut model, "grid", time, &params).is_err());
    }
}
