//! Unidirectional power converter.
//!
//! Power enters through port `inlet` and leaves through port `outlet`,
//! scaled by a constant efficiency: `p_out = eta * p_in`.

use lms_core::{
    Applies, Kilowatts, LinExpr, Model, ModelError, ModelResult, QuantityId, Relation, Sense,
    TimeSetId, UnitId, VarDomain,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterParams {
    /// Efficiency in (0, 1].
    pub eta: f64,
    /// Output power limit; unlimited when absent.
    pub pmax: Option<Kilowatts>,
}

impl Default for ConverterParams {
    fn default() -> Self {
        Self {
            eta: 1.0,
            pmax: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimpleConverter {
    pub unit: UnitId,
    pub p_in: QuantityId,
    pub p_out: QuantityId,
}

impl SimpleConverter {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &ConverterParams,
    ) -> ModelResult<Self> {
        let eta = params.eta;
        if !(eta > 0.0 && eta <= 1.0) {
            return Err(ModelError::Validation(format!(
                "converter {name}: eta must lie in (0, 1], got {eta}"
            )));
        }
        if let Some(pmax) = params.pmax {
            if pmax.value() < 0.0 {
                return Err(ModelError::Validation(format!(
                    "converter {name}: negative pmax {pmax}"
                )));
            }
        }
        let mut unit = model.add_unit(name, "SimpleConverter", time)?;

        let p_in = unit.flow_var("p_in", VarDomain::non_negative(), Sense::In)?;
        let p_out = unit.flow_var("p_out", VarDomain::non_negative(), Sense::Out)?;
        unit.constraint(
            "efficiency",
            Applies::All,
            LinExpr::of(p_out),
            Relation::Eq,
            LinExpr::new().with(eta, p_in),
        )?;
        if let Some(pmax) = params.pmax {
            unit.constraint(
                "pmax",
                Applies::All,
                LinExpr::of(p_out),
                Relation::Le,
                LinExpr::constant(pmax.value()),
            )?;
        }

        unit.port("inlet", &[("p", p_in)])?;
        unit.port("outlet", &[("p", p_out)])?;
        Ok(Self {
            unit: unit.finish(),
            p_in,
            p_out,
        })
    }
}
