//! Occupant-driven inputs of a building: internal gains, set points,
//! hot-water demand and comfort weights for the day and night zones.

use lms_core::{Model, ModelError, ModelResult, ParamValue, QuantityId, Sense, TimeSetId, UnitId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyParams {
    /// Internal heat gains, kW.
    pub q_int_d: ParamValue,
    pub q_int_n: ParamValue,
    /// Set temperatures, °C.
    pub tset_d: ParamValue,
    pub tset_n: ParamValue,
    /// Hot-water demand, kW.
    pub flow_hw: ParamValue,
    /// Comfort coefficients, non-negative.
    pub u_d: ParamValue,
    pub u_n: ParamValue,
}

impl Default for OccupancyParams {
    fn default() -> Self {
        Self {
            q_int_d: ParamValue::Scalar(0.0),
            q_int_n: ParamValue::Scalar(0.0),
            tset_d: ParamValue::Scalar(15.0),
            tset_n: ParamValue::Scalar(15.0),
            flow_hw: ParamValue::Scalar(0.0),
            u_d: ParamValue::Scalar(1.0),
            u_n: ParamValue::Scalar(1.0),
        }
    }
}

/// Parameter block; ports `day`, `night` carry the gains (`q`, outgoing)
/// and `hot_water` the demand (`q`, incoming).
#[derive(Debug, Clone, Copy)]
pub struct Occupancy {
    pub unit: UnitId,
    pub q_int_d: QuantityId,
    pub q_int_n: QuantityId,
    pub tset_d: QuantityId,
    pub tset_n: QuantityId,
    pub flow_hw: QuantityId,
    pub u_d: QuantityId,
    pub u_n: QuantityId,
}

impl Occupancy {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &OccupancyParams,
    ) -> ModelResult<Self> {
        for (label, coeff) in [("u_d", &params.u_d), ("u_n", &params.u_n)] {
            if let ParamValue::Scalar(v) = coeff {
                if *v < 0.0 {
                    return Err(ModelError::Validation(format!(
                        "occupancy {name}: comfort coefficient {label} is negative ({v})"
                    )));
                }
            }
        }
        let mut unit = model.add_unit(name, "Occupancy", time)?;
        let q_int_d = unit.flow_param("q_int_d", params.q_int_d.clone(), Sense::Out)?;
        let q_int_n = unit.flow_param("q_int_n", params.q_int_n.clone(), Sense::Out)?;
        let tset_d = unit.effort_param("tset_d", params.tset_d.clone())?;
        let tset_n = unit.effort_param("tset_n", params.tset_n.clone())?;
        let flow_hw = unit.flow_param("flow_hw", params.flow_hw.clone(), Sense::In)?;
        let u_d = unit.param("u_d", params.u_d.clone())?;
        let u_n = unit.param("u_n", params.u_n.clone())?;

        unit.port("day", &[("q", q_int_d)])?;
        unit.port("night", &[("q", q_int_n)])?;
        unit.port("hot_water", &[("q", flow_hw)])?;
        Ok(Self {
            unit: unit.finish(),
            q_int_d,
            q_int_n,
            tset_d,
            tset_n,
            flow_hw,
            u_d,
            u_n,
        })
    }
}
