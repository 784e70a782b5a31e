//! Tagged quantities: decision variables, parameters and time derivatives.

use crate::error::{ModelError, ModelResult};
use crate::port::{PortKind, PortTag, Sense};
use crate::time::TimeSetId;
use crate::unit::UnitId;
use ndarray::Array1;
use ninterp::prelude::{Interp1DOwned, Interpolator};
use serde::{Deserialize, Serialize};

/// Unique identifier for a quantity within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuantityId(usize);

impl QuantityId {
    #[inline]
    pub fn new(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Integrality {
    #[default]
    Continuous,
    Integer,
    Binary,
}

/// Bounds and integrality of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VarDomain {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub integrality: Integrality,
}

impl VarDomain {
    pub fn real() -> Self {
        Self::default()
    }

    pub fn non_negative() -> Self {
        Self::real().with_lower(0.0)
    }

    pub fn non_positive() -> Self {
        Self::real().with_upper(0.0)
    }

    pub fn bounded(lower: f64, upper: f64) -> Self {
        Self::real().with_lower(lower).with_upper(upper)
    }

    pub fn binary() -> Self {
        Self {
            lower: Some(0.0),
            upper: Some(1.0),
            integrality: Integrality::Binary,
        }
    }

    pub fn integer() -> Self {
        Self {
            integrality: Integrality::Integer,
            ..Self::default()
        }
    }

    pub fn with_lower(mut self, lower: f64) -> Self {
        self.lower = Some(lower);
        self
    }

    pub fn with_upper(mut self, upper: f64) -> Self {
        self.upper = Some(upper);
        self
    }

    pub fn is_integral(&self) -> bool {
        self.integrality != Integrality::Continuous
    }

    pub(crate) fn validate(&self, name: &str) -> ModelResult<()> {
        if let (Some(lo), Some(hi)) = (self.lower, self.upper) {
            if lo > hi {
                return Err(ModelError::Validation(format!(
                    "{name}: lower bound {lo} exceeds upper bound {hi}"
                )));
            }
        }
        Ok(())
    }
}

/// Time series given at sample instants, linearly interpolated in between.
///
/// Values outside the sampled range are extrapolated from the end segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    times: Vec<f64>,
    values: Vec<f64>,
}

impl Profile {
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> ModelResult<Self> {
        let profile = Self { times, values };
        profile.validate()?;
        Ok(profile)
    }

    /// Samples spaced `step` apart starting at `start`.
    pub fn uniform(start: f64, step: f64, values: Vec<f64>) -> ModelResult<Self> {
        if step <= 0.0 {
            return Err(ModelError::Profile(format!("step {step} must be positive")));
        }
        let times = (0..values.len()).map(|i| start + step * i as f64).collect();
        Self::new(times, values)
    }

    pub fn constant(value: f64) -> Self {
        Self {
            times: vec![0.0],
            values: vec![value],
        }
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn validate(&self) -> ModelResult<()> {
        if self.times.is_empty() {
            return Err(ModelError::Profile("profile has no samples".into()));
        }
        if self.times.len() != self.values.len() {
            return Err(ModelError::Profile(format!(
                "{} sample times for {} values",
                self.times.len(),
                self.values.len()
            )));
        }
        if self.times.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ModelError::Profile(
                "sample times must be strictly increasing".into(),
            ));
        }
        Ok(())
    }

    pub fn value_at(&self, t: f64) -> ModelResult<f64> {
        self.validate()?;
        if self.values.len() == 1 {
            return Ok(self.values[0]);
        }
        let interp = Interp1DOwned::new(
            Array1::from(self.times.clone()),
            Array1::from(self.values.clone()),
            ninterp::strategy::Linear,
            ninterp::interpolator::Extrapolate::Enable,
        )
        .map_err(|e| ModelError::Profile(e.to_string()))?;
        interp
            .interpolate(&[t])
            .map_err(|e| ModelError::Profile(e.to_string()))
    }

    /// Sample the profile at every given point.
    pub fn sample(&self, points: &[f64]) -> ModelResult<Vec<f64>> {
        points.iter().map(|t| self.value_at(*t)).collect()
    }
}

/// Value carried by a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    /// Same value at every point.
    Scalar(f64),
    /// Interpolated at each point of the time set.
    Profile(Profile),
    /// One value per point of the time set, in order.
    Points(Vec<f64>),
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Scalar(value)
    }
}

impl From<Profile> for ParamValue {
    fn from(profile: Profile) -> Self {
        ParamValue::Profile(profile)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QuantityKind {
    Variable(VarDomain),
    Parameter(ParamValue),
    /// Time derivative of `state`, a variable on the same time set.
    Derivative { state: QuantityId, domain: VarDomain },
}

/// A named variable, parameter or derivative owned by a unit or by the model.
#[derive(Debug, Clone)]
pub struct Quantity {
    pub(crate) name: String,
    pub(crate) owner: Option<UnitId>,
    pub(crate) index: Option<TimeSetId>,
    pub(crate) kind: QuantityKind,
    pub(crate) tag: PortTag,
    pub(crate) doc: String,
    pub(crate) values: Vec<Option<f64>>,
    pub(crate) fixed: bool,
}

impl Quantity {
    /// Fully qualified name, `unit.local` for unit-owned quantities.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> Option<UnitId> {
        self.owner
    }

    pub fn index(&self) -> Option<TimeSetId> {
        self.index
    }

    pub fn is_indexed(&self) -> bool {
        self.index.is_some()
    }

    pub fn kind(&self) -> &QuantityKind {
        &self.kind
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn tag(&self) -> PortTag {
        self.tag
    }

    pub fn port_type(&self) -> PortKind {
        self.tag.kind()
    }

    pub fn sense(&self) -> Option<Sense> {
        self.tag.sense()
    }

    pub fn is_flow(&self) -> bool {
        self.tag.is_flow()
    }

    pub fn is_effort(&self) -> bool {
        self.tag.is_effort()
    }

    /// Variables and derivatives are decided by the solver.
    pub fn is_decision(&self) -> bool {
        !matches!(self.kind, QuantityKind::Parameter(_))
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, QuantityKind::Parameter(_))
    }

    pub fn domain(&self) -> Option<&VarDomain> {
        match &self.kind {
            QuantityKind::Variable(domain) | QuantityKind::Derivative { domain, .. } => {
                Some(domain)
            }
            QuantityKind::Parameter(_) => None,
        }
    }

    pub fn is_binary(&self) -> bool {
        self.domain()
            .is_some_and(|d| d.integrality == Integrality::Binary)
    }

    /// Fixed variables are held at their current values by the solver.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Current value per point (one entry for scalar quantities).
    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn value(&self, point: usize) -> Option<f64> {
        self.values.get(point).copied().flatten()
    }
}
