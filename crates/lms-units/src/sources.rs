//! Prescribed or free flow and effort sources.
//!
//! A source exposes a single quantity on a port. With a profile it is a
//! parameter (the exchange is imposed), without one it is a bounded
//! decision variable left to the optimiser.

use lms_core::{
    Applies, LinExpr, Model, ModelResult, ParamValue, QuantityId, Relation, Sense, TimeSetId,
    UnitId, VarDomain,
};
use serde::{Deserialize, Serialize};

/// Bounds and optional imposed values of a source quantity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceParams {
    /// Imposed values; the quantity becomes a parameter.
    pub profile: Option<ParamValue>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl SourceParams {
    pub fn free() -> Self {
        Self::default()
    }

    pub fn fixed(value: impl Into<ParamValue>) -> Self {
        Self {
            profile: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn bounded(lower: f64, upper: f64) -> Self {
        Self {
            profile: None,
            lower: Some(lower),
            upper: Some(upper),
        }
    }

    fn domain(&self) -> VarDomain {
        VarDomain {
            lower: self.lower,
            upper: self.upper,
            ..VarDomain::default()
        }
    }
}

/// Flow leaving the unit through port `outlet`.
#[derive(Debug, Clone, Copy)]
pub struct FlowSource {
    pub unit: UnitId,
    pub flow: QuantityId,
}

impl FlowSource {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &SourceParams,
    ) -> ModelResult<Self> {
        let mut unit = model.add_unit(name, "FlowSource", time)?;
        let flow = match &params.profile {
            Some(value) => unit.flow_param("flow", value.clone(), Sense::Out)?,
            None => unit.flow_var("flow", params.domain(), Sense::Out)?,
        };
        unit.port("outlet", &[("flow", flow)])?;
        Ok(Self {
            unit: unit.finish(),
            flow,
        })
    }
}

/// Flow entering the unit through port `inlet`.
#[derive(Debug, Clone, Copy)]
pub struct FlowLoad {
    pub unit: UnitId,
    pub flow: QuantityId,
}

impl FlowLoad {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &SourceParams,
    ) -> ModelResult<Self> {
        let mut unit = model.add_unit(name, "FlowLoad", time)?;
        let flow = match &params.profile {
            Some(value) => unit.flow_param("flow", value.clone(), Sense::In)?,
            None => unit.flow_var("flow", params.domain(), Sense::In)?,
        };
        unit.port("inlet", &[("flow", flow)])?;
        Ok(Self {
            unit: unit.finish(),
            flow,
        })
    }
}

/// Effort imposed on (or chosen for) port `outlet`, e.g. an outdoor temperature.
#[derive(Debug, Clone, Copy)]
pub struct EffortSource {
    pub unit: UnitId,
    pub effort: QuantityId,
}

impl EffortSource {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &SourceParams,
    ) -> ModelResult<Self> {
        let mut unit = model.add_unit(name, "EffortSource", time)?;
        let effort = match &params.profile {
            Some(value) => unit.effort_param("effort", value.clone())?,
            None => unit.effort_var("effort", params.domain())?,
        };
        unit.port("outlet", &[("effort", effort)])?;
        Ok(Self {
            unit: unit.finish(),
            effort,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalableParams {
    /// Output of one unit of installed capacity.
    pub unit_profile: ParamValue,
    #[serde(default)]
    pub max_scale: Option<f64>,
}

/// Source whose output is a unit profile times a sizing variable,
/// e.g. photovoltaic panels sized by the optimiser.
///
/// `flow[t] = scale_fact * flow_u[t]`
#[derive(Debug, Clone, Copy)]
pub struct ScalableFlowSource {
    pub unit: UnitId,
    pub flow: QuantityId,
    pub flow_u: QuantityId,
    pub scale_fact: QuantityId,
}

impl ScalableFlowSource {
    pub fn build(
        model: &mut Model,
        name: &str,
        time: TimeSetId,
        params: &ScalableParams,
    ) -> ModelResult<Self> {
        let mut unit = model.add_unit(name, "ScalableFlowSource", time)?;
        let flow_u = unit.param("flow_u", params.unit_profile.clone())?;
        let mut scale_domain = VarDomain::non_negative();
        if let Some(max) = params.max_scale {
            scale_domain = scale_domain.with_upper(max);
        }
        let scale_fact = unit.scalar_var("scale_fact", scale_domain)?;
        let flow = unit.flow_var("flow", VarDomain::real(), Sense::Out)?;
        unit.constraint(
            "flow_scaling",
            Applies::All,
            LinExpr::of(flow),
            Relation::Eq,
            LinExpr::new().with_param_product(1.0, flow_u, scale_fact),
        )?;
        unit.port("outlet", &[("flow", flow)])?;
        Ok(Self {
            unit: unit.finish(),
            flow,
            flow_u,
            scale_fact,
        })
    }
}
