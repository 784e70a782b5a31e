//! Lumped thermal elements: conductances, capacities and heat pumps.
//!
//! Temperatures are efforts, heat rates are flows. Every element exposes
//! ports with the members `t` and/or `q` so they can be chained with
//! [`Model::connect_ports`].

use lms_core::{
    Applies, Celsius, Coeff, Kilowatts, LinExpr, Model, ModelError, ModelResult, ParamValue,
    QuantityId, Relation, Sense, TimeRef, TimeSetId, UnitId, VarDomain,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConductanceParams {
    /// Thermal resistance, K/kW.
    pub r: f64,
}

/// Heat exchanged between two temperatures: `q = (t1 - t2) / r`.
///
/// Heat enters on port `side1` and leaves on port `side2`.
#[derive(Debug, Clone, Copy)]
pub struct ThermalConductance {
    pub unit: UnitId,
    pub t1: QuantityId,
    pub t2: QuantityId,
    pub q1: QuantityId,
    pub q2: QuantityId,
    pub r: QuantityId,
}

impl ThermalConductance {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &ConductanceParams,
    ) -> ModelResult<Self> {
        if params.r <= 0.0 {
            return Err(ModelError::Validation(format!(
                "conductance {name}: resistance must be positive, got {}",
                params.r
            )));
        }
        let mut unit = model.add_unit(name, "ThermalConductance", time)?;
        let r = unit.scalar_param("r", params.r)?;
        let t1 = unit.effort_var("t1", VarDomain::real())?;
        let t2 = unit.effort_var("t2", VarDomain::real())?;
        let q1 = unit.flow_var("q1", VarDomain::real(), Sense::In)?;
        let q2 = unit.flow_var("q2", VarDomain::real(), Sense::Out)?;

        unit.constraint(
            "flow_continuity",
            Applies::All,
            LinExpr::of(q1),
            Relation::Eq,
            LinExpr::of(q2),
        )?;
        let inv_r = |scale| Coeff::InverseParam { param: r, scale };
        unit.constraint(
            "heat_transfer",
            Applies::All,
            LinExpr::of(q1),
            Relation::Eq,
            LinExpr::new()
                .with_coeff(inv_r(1.0), t1, TimeRef::Current)
                .with_coeff(inv_r(-1.0), t2, TimeRef::Current),
        )?;
        unit.port("side1", &[("t", t1), ("q", q1)])?;
        unit.port("side2", &[("t", t2), ("q", q2)])?;
        Ok(Self {
            unit: unit.finish(),
            t1,
            t2,
            q1,
            q2,
            r,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityParams {
    /// Heat capacity, kW·s/K.
    pub c: f64,
    pub theta0: Option<Celsius>,
    pub theta_min: Option<Celsius>,
    pub theta_max: Option<Celsius>,
}

impl Default for CapacityParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            theta0: None,
            theta_min: None,
            theta_max: None,
        }
    }
}

/// Heat stored at a uniform temperature: `q = c * dtheta/dt`.
///
/// Port `heat` exposes `t = theta` and the absorbed heat `q`.
#[derive(Debug, Clone, Copy)]
pub struct ThermalCapacity {
    pub unit: UnitId,
    pub theta: QuantityId,
    pub dtheta: QuantityId,
    pub q: QuantityId,
    pub c: QuantityId,
}

impl ThermalCapacity {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &CapacityParams,
    ) -> ModelResult<Self> {
        if params.c <= 0.0 {
            return Err(ModelError::Validation(format!(
                "capacity {name}: c must be positive, got {}",
                params.c
            )));
        }
        let mut unit = model.add_unit(name, "ThermalCapacity", time)?;
        let c = unit.scalar_param("c", params.c)?;
        let theta = unit.effort_var(
            "theta",
            VarDomain {
                lower: params.theta_min.map(Celsius::value),
                upper: params.theta_max.map(Celsius::value),
                ..VarDomain::default()
            },
        )?;
        let dtheta = unit.derivative("dtheta", theta)?;
        let q = unit.flow_var("q", VarDomain::real(), Sense::In)?;

        unit.constraint(
            "heat_balance",
            Applies::All,
            LinExpr::of(q),
            Relation::Eq,
            LinExpr::new().with_param_product(1.0, c, dtheta),
        )?;
        if let Some(theta0) = params.theta0 {
            unit.constraint(
                "theta_initial",
                Applies::First,
                LinExpr::of(theta),
                Relation::Eq,
                LinExpr::constant(theta0.value()),
            )?;
        }
        unit.port("heat", &[("t", theta), ("q", q)])?;
        Ok(Self {
            unit: unit.finish(),
            theta,
            dtheta,
            q,
            c,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatPumpParams {
    /// Coefficient of performance, constant or time-varying.
    pub cop: ParamValue,
    /// Maximum electrical power.
    pub pmax: Kilowatts,
    /// Maximum heat output.
    pub qmax: Option<Kilowatts>,
}

impl Default for HeatPumpParams {
    fn default() -> Self {
        Self {
            cop: ParamValue::Scalar(3.0),
            pmax: Kilowatts(5.0),
            qmax: None,
        }
    }
}

/// Electrically driven heat source: `q_th = cop * p_el`.
///
/// Draws `p_el` on port `power` and delivers `q_th` on port `heat`.
#[derive(Debug, Clone, Copy)]
pub struct HeatPump {
    pub unit: UnitId,
    pub p_el: QuantityId,
    pub q_th: QuantityId,
    pub cop: QuantityId,
}

impl HeatPump {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &HeatPumpParams,
    ) -> ModelResult<Self> {
        let mut unit = model.add_unit(name, "HeatPump", time)?;
        let cop = unit.param("cop", params.cop.clone())?;
        let p_el = unit.flow_var(
            "p_el",
            VarDomain::bounded(0.0, params.pmax.value()),
            Sense::In,
        )?;
        let mut heat_domain = VarDomain::non_negative();
        if let Some(qmax) = params.qmax {
            heat_domain = heat_domain.with_upper(qmax.value());
        }
        let q_th = unit.flow_var("q_th", heat_domain, Sense::Out)?;
        unit.constraint(
            "conversion",
            Applies::All,
            LinExpr::of(q_th),
            Relation::Eq,
            LinExpr::new().with_param_product(1.0, cop, p_el),
        )?;
        unit.port("power", &[("p", p_el)])?;
        unit.port("heat", &[("q", q_th)])?;
        Ok(Self {
            unit: unit.finish(),
            p_el,
            q_th,
            cop,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::TimeSet;

    fn model() -> (Model, TimeSetId) {
        let mut model = Model::new("th");
        let time = model
            .add_time_set(TimeSet::discrete("time", vec![0.0, 1.0]).unwrap())
            .unwrap();
        (model, time)
    }

    #[test]
    fn test_conductance_uses_inverse_resistance() {
        let (mut model, time) = model();
        let wall = ThermalConductance::build(&mut model, "wall", time, &ConductanceParams { r: 4.0 })
            .unwrap();
        model.set_values(wall.t1, &[20.0, 21.0]).unwrap();
        model.set_values(wall.t2, &[12.0, 13.0]).unwrap();
        model.set_values(wall.q1, &[2.0, 2.0]).unwrap();
        model.set_values(wall.q2, &[2.0, 2.0]).unwrap();
        assert!(model.is_satisfied("wall.heat_transfer", 1e-12).unwrap());
        assert!(model.is_satisfied("wall.flow_continuity", 1e-12).unwrap());

        model.set_param(wall.r, 0.0).unwrap();
        assert!(model.expand("wall.heat_transfer").is_err());
    }

    #[test]
    fn test_heat_pump_conversion() {
        let (mut model, time) = model();
        let hp = HeatPump::build(&mut model, "hp", time, &HeatPumpParams::default()).unwrap();
        model.set_values(hp.p_el, &[1.0, 2.0]).unwrap();
        model.set_values(hp.q_th, &[3.0, 6.0]).unwrap();
        assert!(model.is_satisfied("hp.conversion", 1e-12).unwrap());
        assert_eq!(
            model.quantity(hp.p_el).unwrap().domain().unwrap().upper,
            Some(5.0)
        );
    }

    #[test]
    fn test_capacity_initial_temperature() {
        let (mut model, time) = model();
        let params = CapacityParams {
            c: 10.0,
            theta0: Some(Celsius(19.0)),
            ..CapacityParams::default()
        };
        let zone = ThermalCapacity::build(&mut model, "zone", time, &params).unwrap();
        let rows = model.expand("zone.theta_initial").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].form.constant, -19.0);
        assert!(model.unit(zone.unit).unwrap().port("heat").is_some());
    }

    #[test]
    fn test_non_positive_resistance_rejected() {
        let (mut model, time) = model();
        let err = ThermalConductance::build(&mut model, "wall", time, &ConductanceParams { r: 0.0 })
            .unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
    }
}
