//! Units: reusable blocks of quantities, constraints, ports and expressions.
//!
//! A unit is declared through a [`UnitBuilder`] borrowed from the model.
//! Everything the builder creates is owned by the unit and named
//! `<unit>.<local>`; connections generated later only reference it.

use crate::error::{ModelError, ModelResult};
use crate::expr::{Applies, ConstraintRule, LinExpr, Relation};
use crate::model::Model;
use crate::objective::{ExpressionTag, TaggedExpression};
use crate::port::{Port, PortTag, Sense};
use crate::quantity::{ParamValue, QuantityId, QuantityKind, VarDomain};
use crate::time::TimeSetId;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Unique identifier for a unit within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(usize);

impl UnitId {
    #[inline]
    pub fn new(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Unit {
    pub(crate) name: String,
    pub(crate) kind: String,
    pub(crate) index: TimeSetId,
    pub(crate) doc: String,
    pub(crate) quantities: Vec<QuantityId>,
    pub(crate) constraints: Vec<String>,
    pub(crate) ports: Vec<Port>,
    pub(crate) expressions: Vec<String>,
}

impl Unit {
    pub(crate) fn new(name: String, kind: String, index: TimeSetId) -> Self {
        Self {
            name,
            kind,
            index,
            doc: String::new(),
            quantities: Vec::new(),
            constraints: Vec::new(),
            ports: Vec::new(),
            expressions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block type label, e.g. `Battery`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn index(&self) -> TimeSetId {
        self.index
    }

    pub fn doc(&self) -> &str {
        &self.doc
    }

    pub fn quantities(&self) -> &[QuantityId] {
        &self.quantities
    }

    pub fn constraints(&self) -> &[String] {
        &self.constraints
    }

    pub fn ports(&self) -> &[Port] {
        &self.ports
    }

    pub fn port(&self, name: &str) -> Option<&Port> {
        self.ports.iter().find(|p| p.name() == name)
    }

    pub fn expressions(&self) -> &[String] {
        &self.expressions
    }
}

/// Declares the contents of one unit.
///
/// Time-indexed quantities and constraints use the unit's time set.
pub struct UnitBuilder<'m> {
    model: &'m mut Model,
    unit: UnitId,
}

impl<'m> UnitBuilder<'m> {
    pub(crate) fn new(model: &'m mut Model, unit: UnitId) -> Self {
        Self { model, unit }
    }

    pub fn id(&self) -> UnitId {
        self.unit
    }

    pub fn model(&self) -> &Model {
        &*self.model
    }

    fn unit(&self) -> &Unit {
        &self.model.units[self.unit.value()]
    }

    pub fn index(&self) -> TimeSetId {
        self.unit().index
    }

    fn qualified(&self, local: &str) -> String {
        format!("{}.{}", self.unit().name, local)
    }

    fn add(
        &mut self,
        local: &str,
        indexed: bool,
        kind: QuantityKind,
        tag: PortTag,
    ) -> ModelResult<QuantityId> {
        let name = self.qualified(local);
        let index = indexed.then(|| self.index());
        let id = self
            .model
            .register_quantity(Some(self.unit), name, index, kind, tag)?;
        self.model.units[self.unit.value()].quantities.push(id);
        Ok(id)
    }

    /// Time-indexed decision variable.
    pub fn var(&mut self, local: &str, domain: VarDomain) -> ModelResult<QuantityId> {
        self.add(local, true, QuantityKind::Variable(domain), PortTag::default())
    }

    pub fn scalar_var(&mut self, local: &str, domain: VarDomain) -> ModelResult<QuantityId> {
        self.add(local, false, QuantityKind::Variable(domain), PortTag::default())
    }

    /// Time-indexed variable tagged as a flow with the given direction.
    pub fn flow_var(
        &mut self,
        local: &str,
        domain: VarDomain,
        sense: Sense,
    ) -> ModelResult<QuantityId> {
        self.add(
            local,
            true,
            QuantityKind::Variable(domain),
            PortTag::flow(sense),
        )
    }

    pub fn effort_var(&mut self, local: &str, domain: VarDomain) -> ModelResult<QuantityId> {
        self.add(local, true, QuantityKind::Variable(domain), PortTag::effort())
    }

    /// Time-indexed parameter.
    pub fn param(&mut self, local: &str, value: impl Into<ParamValue>) -> ModelResult<QuantityId> {
        self.add(
            local,
            true,
            QuantityKind::Parameter(value.into()),
            PortTag::default(),
        )
    }

    pub fn scalar_param(&mut self, local: &str, value: f64) -> ModelResult<QuantityId> {
        self.add(
            local,
            false,
            QuantityKind::Parameter(ParamValue::Scalar(value)),
            PortTag::default(),
        )
    }

    /// Parameter tagged as a flow, for prescribed exchanges.
    pub fn flow_param(
        &mut self,
        local: &str,
        value: impl Into<ParamValue>,
        sense: Sense,
    ) -> ModelResult<QuantityId> {
        self.add(
            local,
            true,
            QuantityKind::Parameter(value.into()),
            PortTag::flow(sense),
        )
    }

    pub fn effort_param(
        &mut self,
        local: &str,
        value: impl Into<ParamValue>,
    ) -> ModelResult<QuantityId> {
        self.add(
            local,
            true,
            QuantityKind::Parameter(value.into()),
            PortTag::effort(),
        )
    }

    /// Time derivative of `state`, discretised with the unit's time set.
    pub fn derivative(&mut self, local: &str, state: QuantityId) -> ModelResult<QuantityId> {
        self.add(
            local,
            true,
            QuantityKind::Derivative {
                state,
                domain: VarDomain::real(),
            },
            PortTag::default(),
        )
    }

    /// Attach a per-point constraint family over the unit's time set.
    pub fn constraint(
        &mut self,
        local: &str,
        applies: Applies,
        lhs: LinExpr,
        relation: Relation,
        rhs: LinExpr,
    ) -> ModelResult<()> {
        let rule = ConstraintRule::new(self.qualified(local), lhs, relation, rhs)
            .indexed(self.index())
            .applies(applies)
            .owned_by(self.unit);
        self.model.insert_rules(vec![rule])?;
        Ok(())
    }

    /// Attach a single constraint over scalar quantities.
    pub fn scalar_constraint(
        &mut self,
        local: &str,
        lhs: LinExpr,
        relation: Relation,
        rhs: LinExpr,
    ) -> ModelResult<()> {
        let rule =
            ConstraintRule::new(self.qualified(local), lhs, relation, rhs).owned_by(self.unit);
        self.model.insert_rules(vec![rule])?;
        Ok(())
    }

    /// Expose quantities of this unit under a named port.
    pub fn port(&mut self, name: &str, members: &[(&str, QuantityId)]) -> ModelResult<()> {
        let unit = self.unit();
        if unit.port(name).is_some() {
            return Err(ModelError::DuplicateComponent(format!(
                "{}.{}",
                unit.name, name
            )));
        }
        let mut port = Port::new(name);
        for (key, id) in members {
            let quantity = self.model.quantity(*id)?;
            if quantity.owner() != Some(self.unit) {
                return Err(ModelError::Validation(format!(
                    "port {}.{} cannot expose '{}' owned by another unit",
                    unit.name,
                    name,
                    quantity.name()
                )));
            }
            if port.member(key).is_some() {
                return Err(ModelError::DuplicateComponent(format!(
                    "{}.{}.{}",
                    unit.name, name, key
                )));
            }
            port = port.with_member(*key, *id);
        }
        self.model.units[self.unit.value()].ports.push(port);
        Ok(())
    }

    /// Register an instantaneous expression for objective construction.
    pub fn expression(&mut self, local: &str, tag: ExpressionTag, expr: LinExpr) -> ModelResult<()> {
        let name = self.qualified(local);
        let index = self.index();
        self.model.add_expression(TaggedExpression {
            name: name.clone(),
            owner: Some(self.unit),
            tag,
            index,
            expr,
        })?;
        self.model.units[self.unit.value()].expressions.push(name);
        Ok(())
    }

    pub fn doc(&mut self, doc: impl Into<String>) {
        self.model.units[self.unit.value()].doc = doc.into();
    }

    pub fn finish(self) -> UnitId {
        let unit = self.unit();
        debug!(
            unit = %unit.name,
            kind = %unit.kind,
            quantities = unit.quantities.len(),
            constraints = unit.constraints.len(),
            ports = unit.ports.len(),
            "declared unit"
        );
        self.unit
    }
}
