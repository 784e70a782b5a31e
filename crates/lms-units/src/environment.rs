//! Weather boundary conditions and solar gains.

use lms_core::{Model, ModelResult, ParamValue, QuantityId, Sense, TimeSetId, UnitId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentParams {
    /// Outdoor temperature, °C.
    pub te: ParamValue,
    /// Ground temperature, °C.
    pub tg: ParamValue,
}

impl Default for EnvironmentParams {
    fn default() -> Self {
        Self {
            te: ParamValue::Scalar(0.0),
            tg: ParamValue::Scalar(10.0),
        }
    }
}

/// Outdoor (`outdoor.t`) and ground (`ground.t`) temperatures.
#[derive(Debug, Clone, Copy)]
pub struct Environment {
    pub unit: UnitId,
    pub te: QuantityId,
    pub tg: QuantityId,
}

impl Environment {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &EnvironmentParams,
    ) -> ModelResult<Self> {
        let mut unit = model.add_unit(name, "Environment", time)?;
        let te = unit.effort_param("te", params.te.clone())?;
        let tg = unit.effort_param("tg", params.tg.clone())?;
        unit.port("outdoor", &[("t", te)])?;
        unit.port("ground", &[("t", tg)])?;
        Ok(Self {
            unit: unit.finish(),
            te,
            tg,
        })
    }
}

/// Solar heat gains through each facade, kW.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolarParams {
    pub north: ParamValue,
    pub south: ParamValue,
    pub east: ParamValue,
    pub west: ParamValue,
}

impl Default for SolarParams {
    fn default() -> Self {
        Self {
            north: ParamValue::Scalar(0.0),
            south: ParamValue::Scalar(0.0),
            east: ParamValue::Scalar(0.0),
            west: ParamValue::Scalar(0.0),
        }
    }
}

/// One outgoing heat flow per facade, each on its own port named after
/// the facade with member `q`.
#[derive(Debug, Clone, Copy)]
pub struct SolarInputs {
    pub unit: UnitId,
    pub q_sol_n: QuantityId,
    pub q_sol_s: QuantityId,
    pub q_sol_e: QuantityId,
    pub q_sol_w: QuantityId,
}

impl SolarInputs {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &SolarParams,
    ) -> ModelResult<Self> {
        let mut unit = model.add_unit(name, "SolarInputs", time)?;
        let mut gain = |facade: &str, value: &ParamValue| -> ModelResult<QuantityId> {
            let local = format!("q_sol_{}", &facade[..1]);
            let q = unit.flow_param(&local, value.clone(), Sense::Out)?;
            unit.port(facade, &[("q", q)])?;
            Ok(q)
        };
        let q_sol_n = gain("north", &params.north)?;
        let q_sol_s = gain("south", &params.south)?;
        let q_sol_e = gain("east", &params.east)?;
        let q_sol_w = gain("west", &params.west)?;
        Ok(Self {
            unit: unit.finish(),
            q_sol_n,
            q_sol_s,
            q_sol_e,
            q_sol_w,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lms_core::{PortKind, Profile, TimeSet};

    #[test]
    fn test_environment_defaults() {
        let mut model = Model::new("env");
        let time = model
            .add_time_set(TimeSet::discrete("time", vec![0.0, 1.0]).unwrap())
            .unwrap();
        let env = Environment::build(&mut model, "env", time, &EnvironmentParams::default())
            .unwrap();
        assert_eq!(model.value(env.tg, Some(0)).unwrap(), Some(10.0));
        assert_eq!(model.port_type(env.te).unwrap(), PortKind::Effort);
    }

    #[test]
    fn test_solar_profile_is_interpolated() {
        let mut model = Model::new("env");
        let time = model
            .add_time_set(TimeSet::discrete("time", vec![0.0, 1800.0, 3600.0]).unwrap())
            .unwrap();
        let params = SolarParams {
            south: Profile::new(vec![0.0, 3600.0], vec![0.0, 2.0]).unwrap().into(),
            ..SolarParams::default()
        };
        let sol = SolarInputs::build(&mut model, "sol", time, &params).unwrap();
        assert_eq!(model.value(sol.q_sol_s, Some(1)).unwrap(), Some(1.0));
        assert_eq!(model.quantity(sol.q_sol_w).unwrap().name(), "sol.q_sol_w");
        assert_eq!(model.unit(sol.unit).unwrap().ports().len(), 4);
    }
}
