//! Composite model: registry of time sets, units, quantities, constraint
//! families and tagged expressions.

use crate::connect::connection_key;
use crate::error::{ModelError, ModelResult};
use crate::expr::{
    AffineForm, Coeff, ConstraintOrigin, ConstraintRule, LinExpr, LinearRow, StepSpan, TimeRef,
    VarKey,
};
use crate::objective::TaggedExpression;
use crate::port::{PortKind, PortTag, Sense};
use crate::quantity::{ParamValue, Quantity, QuantityId, QuantityKind, VarDomain};
use crate::time::{TimeSet, TimeSetId};
use crate::unit::{Unit, UnitBuilder, UnitId};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Expansion point of a per-point rule: the rule's time set and a point index.
pub(crate) type At = Option<(TimeSetId, usize)>;

#[derive(Debug, Clone, Default)]
pub struct Model {
    name: String,
    pub(crate) time_sets: Vec<TimeSet>,
    pub(crate) units: Vec<Unit>,
    pub(crate) quantities: Vec<Quantity>,
    quantity_names: HashMap<String, QuantityId>,
    /// Quantity names as they appear inside connection names.
    connection_keys: HashSet<String>,
    pub(crate) constraints: Vec<ConstraintRule>,
    pub(crate) expressions: Vec<TaggedExpression>,
}

impl Model {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // =========================================================================
    // Time sets
    // =========================================================================

    pub fn add_time_set(&mut self, set: TimeSet) -> ModelResult<TimeSetId> {
        if self.time_sets.iter().any(|s| s.name() == set.name()) {
            return Err(ModelError::DuplicateComponent(set.name().to_string()));
        }
        let id = TimeSetId::new(self.time_sets.len());
        debug!(set = %set.name(), points = set.len(), "added time set");
        self.time_sets.push(set);
        Ok(id)
    }

    pub fn time_set(&self, id: TimeSetId) -> ModelResult<&TimeSet> {
        self.time_sets
            .get(id.value())
            .ok_or_else(|| ModelError::InvalidTimeSet(format!("no time set #{}", id.value())))
    }

    pub fn time_set_by_name(&self, name: &str) -> ModelResult<TimeSetId> {
        self.time_sets
            .iter()
            .position(|s| s.name() == name)
            .map(TimeSetId::new)
            .ok_or_else(|| ModelError::InvalidTimeSet(format!("no time set named '{name}'")))
    }

    pub fn time_sets(&self) -> impl Iterator<Item = (TimeSetId, &TimeSet)> {
        self.time_sets
            .iter()
            .enumerate()
            .map(|(i, s)| (TimeSetId::new(i), s))
    }

    /// Two sets are interchangeable when they are the same set or hold the
    /// same points.
    pub fn same_domain(&self, a: TimeSetId, b: TimeSetId) -> ModelResult<bool> {
        if a == b {
            return Ok(true);
        }
        Ok(self.time_set(a)?.same_points(self.time_set(b)?))
    }

    // =========================================================================
    // Units
    // =========================================================================

    /// Start declaring a unit of the given block type over `index`.
    pub fn add_unit(
        &mut self,
        name: &str,
        kind: &str,
        index: TimeSetId,
    ) -> ModelResult<UnitBuilder<'_>> {
        self.time_set(index)?;
        if name.is_empty() || name.contains('.') {
            return Err(ModelError::Validation(format!(
                "unit name '{name}' must be non-empty and contain no '.'"
            )));
        }
        if self.units.iter().any(|u| u.name == name) {
            return Err(ModelError::DuplicateComponent(name.to_string()));
        }
        let id = UnitId::new(self.units.len());
        self.units
            .push(Unit::new(name.to_string(), kind.to_string(), index));
        Ok(UnitBuilder::new(self, id))
    }

    pub fn unit(&self, id: UnitId) -> ModelResult<&Unit> {
        self.units
            .get(id.value())
            .ok_or_else(|| ModelError::UnknownUnit(format!("#{}", id.value())))
    }

    pub fn unit_by_name(&self, name: &str) -> ModelResult<UnitId> {
        self.units
            .iter()
            .position(|u| u.name == name)
            .map(UnitId::new)
            .ok_or_else(|| ModelError::UnknownUnit(name.to_string()))
    }

    pub fn units(&self) -> impl Iterator<Item = (UnitId, &Unit)> {
        self.units
            .iter()
            .enumerate()
            .map(|(i, u)| (UnitId::new(i), u))
    }

    // =========================================================================
    // Quantities
    // =========================================================================

    pub(crate) fn register_quantity(
        &mut self,
        owner: Option<UnitId>,
        name: String,
        index: Option<TimeSetId>,
        kind: QuantityKind,
        tag: PortTag,
    ) -> ModelResult<QuantityId> {
        if self.quantity_names.contains_key(&name) {
            return Err(ModelError::DuplicateComponent(name));
        }
        if name.contains('&') {
            return Err(ModelError::Validation(format!(
                "quantity name '{name}' must not contain '&'"
            )));
        }
        let key = connection_key(&name);
        if self.connection_keys.contains(&key) {
            return Err(ModelError::Validation(format!(
                "quantity name '{name}' collides with another quantity as '{key}'"
            )));
        }
        let len = match index {
            Some(set) => self.time_set(set)?.len(),
            None => 1,
        };
        match &kind {
            QuantityKind::Variable(domain) => domain.validate(&name)?,
            QuantityKind::Derivative { state, domain } => {
                domain.validate(&name)?;
                let state_q = self.quantity(*state)?;
                if !state_q.is_decision() {
                    return Err(ModelError::Validation(format!(
                        "derivative {name}: state '{}' is not a variable",
                        state_q.name()
                    )));
                }
                match (state_q.index(), index) {
                    (Some(a), Some(b)) if a == b => {}
                    _ => {
                        return Err(ModelError::IncompatibleTimeDomains {
                            first: state_q.name().to_string(),
                            other: name,
                        })
                    }
                }
            }
            QuantityKind::Parameter(value) => self.check_param_value(&name, index, value)?,
        }
        let id = QuantityId::new(self.quantities.len());
        self.quantity_names.insert(name.clone(), id);
        self.connection_keys.insert(key);
        self.quantities.push(Quantity {
            name,
            owner,
            index,
            kind,
            tag,
            doc: String::new(),
            values: vec![None; len],
            fixed: false,
        });
        Ok(id)
    }

    fn check_param_value(
        &self,
        name: &str,
        index: Option<TimeSetId>,
        value: &ParamValue,
    ) -> ModelResult<()> {
        match (value, index) {
            (ParamValue::Scalar(_), _) => Ok(()),
            (ParamValue::Profile(_), Some(_)) => Ok(()),
            (ParamValue::Points(values), Some(set)) => {
                let len = self.time_set(set)?.len();
                if values.len() != len {
                    return Err(ModelError::Validation(format!(
                        "{name}: {} values for {len} time points",
                        values.len()
                    )));
                }
                Ok(())
            }
            (_, None) => Err(ModelError::Validation(format!(
                "{name}: scalar parameter needs a scalar value"
            ))),
        }
    }

    /// Model-level variable, not owned by any unit.
    pub fn add_variable(
        &mut self,
        name: &str,
        index: Option<TimeSetId>,
        domain: VarDomain,
    ) -> ModelResult<QuantityId> {
        self.register_quantity(
            None,
            name.to_string(),
            index,
            QuantityKind::Variable(domain),
            PortTag::default(),
        )
    }

    /// Model-level parameter, not owned by any unit.
    pub fn add_parameter(
        &mut self,
        name: &str,
        index: Option<TimeSetId>,
        value: impl Into<ParamValue>,
    ) -> ModelResult<QuantityId> {
        self.register_quantity(
            None,
            name.to_string(),
            index,
            QuantityKind::Parameter(value.into()),
            PortTag::default(),
        )
    }

    pub fn quantity(&self, id: QuantityId) -> ModelResult<&Quantity> {
        self.quantities
            .get(id.value())
            .ok_or_else(|| ModelError::UnknownQuantity(format!("#{}", id.value())))
    }

    fn quantity_mut(&mut self, id: QuantityId) -> ModelResult<&mut Quantity> {
        self.quantities
            .get_mut(id.value())
            .ok_or_else(|| ModelError::UnknownQuantity(format!("#{}", id.value())))
    }

    pub fn quantity_by_name(&self, name: &str) -> ModelResult<QuantityId> {
        self.quantity_names
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::UnknownQuantity(name.to_string()))
    }

    pub fn quantities(&self) -> impl Iterator<Item = (QuantityId, &Quantity)> {
        self.quantities
            .iter()
            .enumerate()
            .map(|(i, q)| (QuantityId::new(i), q))
    }

    pub fn set_doc(&mut self, id: QuantityId, doc: impl Into<String>) -> ModelResult<()> {
        self.quantity_mut(id)?.doc = doc.into();
        Ok(())
    }

    // =========================================================================
    // Tagging
    // =========================================================================

    pub fn set_port_type(&mut self, id: QuantityId, kind: PortKind) -> ModelResult<()> {
        self.quantity_mut(id)?.tag.set_kind(kind);
        Ok(())
    }

    pub fn port_type(&self, id: QuantityId) -> ModelResult<PortKind> {
        Ok(self.quantity(id)?.port_type())
    }

    pub fn set_sense(&mut self, id: QuantityId, sense: Sense) -> ModelResult<()> {
        self.quantity_mut(id)?.tag.set_sense(sense);
        Ok(())
    }

    pub fn sense(&self, id: QuantityId) -> ModelResult<Option<Sense>> {
        Ok(self.quantity(id)?.sense())
    }

    pub fn is_flow(&self, id: QuantityId) -> ModelResult<bool> {
        Ok(self.quantity(id)?.is_flow())
    }

    pub fn is_effort(&self, id: QuantityId) -> ModelResult<bool> {
        Ok(self.quantity(id)?.is_effort())
    }

    /// Replace the tag declared by the owning unit.
    pub fn retag(
        &mut self,
        id: QuantityId,
        kind: PortKind,
        sense: Option<Sense>,
    ) -> ModelResult<()> {
        let quantity = self.quantity_mut(id)?;
        quantity.tag.retag(kind, sense);
        debug!(quantity = %quantity.name, %kind, ?sense, "retagged quantity");
        Ok(())
    }

    // =========================================================================
    // Parameters and values
    // =========================================================================

    pub fn set_param(&mut self, id: QuantityId, value: impl Into<ParamValue>) -> ModelResult<()> {
        let value = value.into();
        let quantity = self.quantity(id)?;
        if !quantity.is_parameter() {
            return Err(ModelError::Validation(format!(
                "'{}' is not a parameter",
                quantity.name()
            )));
        }
        self.check_param_value(quantity.name(), quantity.index(), &value)?;
        self.quantity_mut(id)?.kind = QuantityKind::Parameter(value);
        Ok(())
    }

    /// Parameter value at a point (`None` for scalar parameters).
    pub fn param_value(&self, id: QuantityId, point: Option<usize>) -> ModelResult<f64> {
        let quantity = self.quantity(id)?;
        let QuantityKind::Parameter(value) = &quantity.kind else {
            return Err(ModelError::Validation(format!(
                "'{}' is not a parameter",
                quantity.name()
            )));
        };
        match value {
            ParamValue::Scalar(v) => Ok(*v),
            ParamValue::Profile(profile) => {
                let t = self.point_time(quantity, point)?;
                profile.value_at(t)
            }
            ParamValue::Points(values) => {
                let i = point.unwrap_or(0);
                values.get(i).copied().ok_or_else(|| {
                    ModelError::Validation(format!(
                        "{}: {} values but point {i} requested",
                        quantity.name(),
                        values.len()
                    ))
                })
            }
        }
    }

    fn point_time(&self, quantity: &Quantity, point: Option<usize>) -> ModelResult<f64> {
        let (Some(set), Some(i)) = (quantity.index, point) else {
            return Err(ModelError::Validation(format!(
                "'{}' has no time point",
                quantity.name()
            )));
        };
        self.time_set(set)?.points().get(i).copied().ok_or_else(|| {
            ModelError::Validation(format!("{}: point {i} out of range", quantity.name()))
        })
    }

    /// Time of a solver-level variable, `None` for scalars.
    pub fn time_of(&self, key: VarKey) -> Option<f64> {
        let quantity = self.quantity(key.quantity).ok()?;
        self.point_time(quantity, key.point).ok()
    }

    /// Current value of a quantity at a point; parameters are evaluated.
    pub fn value(&self, id: QuantityId, point: Option<usize>) -> ModelResult<Option<f64>> {
        let quantity = self.quantity(id)?;
        if quantity.is_parameter() {
            return self.param_value(id, point).map(Some);
        }
        Ok(quantity.value(point.unwrap_or(0)))
    }

    pub fn set_value(&mut self, id: QuantityId, point: Option<usize>, value: f64) -> ModelResult<()> {
        let quantity = self.quantity_mut(id)?;
        let i = point.unwrap_or(0);
        let len = quantity.values.len();
        let slot = quantity.values.get_mut(i).ok_or_else(|| {
            ModelError::Validation(format!("point {i} out of range (len {len})"))
        })?;
        *slot = Some(value);
        Ok(())
    }

    /// Set every point of a quantity at once.
    pub fn set_values(&mut self, id: QuantityId, values: &[f64]) -> ModelResult<()> {
        let quantity = self.quantity_mut(id)?;
        if values.len() != quantity.values.len() {
            return Err(ModelError::Validation(format!(
                "{}: {} values for {} points",
                quantity.name,
                values.len(),
                quantity.values.len()
            )));
        }
        quantity.values = values.iter().map(|v| Some(*v)).collect();
        Ok(())
    }

    pub fn clear_values(&mut self) {
        for quantity in &mut self.quantities {
            quantity.values.iter_mut().for_each(|v| *v = None);
        }
    }

    /// Hold a variable at its current values in subsequent solves.
    pub fn fix(&mut self, id: QuantityId) -> ModelResult<()> {
        let quantity = self.quantity(id)?;
        if !quantity.is_decision() {
            return Err(ModelError::Validation(format!(
                "'{}' is not a variable",
                quantity.name()
            )));
        }
        if let Some(point) = quantity.values.iter().position(Option::is_none) {
            return Err(ModelError::MissingValue {
                quantity: quantity.name().to_string(),
                time: self.point_time(quantity, Some(point)).unwrap_or(0.0),
            });
        }
        self.quantity_mut(id)?.fixed = true;
        Ok(())
    }

    pub fn unfix(&mut self, id: QuantityId) -> ModelResult<()> {
        self.quantity_mut(id)?.fixed = false;
        Ok(())
    }

    /// Fix every binary variable at its current (rounded) value.
    ///
    /// Typically called after a MILP solve so that a continuous re-solve can
    /// report sensitivities. Returns the number of quantities fixed.
    pub fn fix_binaries(&mut self) -> ModelResult<usize> {
        let binaries: Vec<QuantityId> = self
            .quantities()
            .filter(|(_, q)| q.is_binary())
            .map(|(id, _)| id)
            .collect();
        for id in &binaries {
            let quantity = self.quantity(*id)?;
            if let Some(point) = quantity.values.iter().position(Option::is_none) {
                return Err(ModelError::MissingValue {
                    quantity: quantity.name().to_string(),
                    time: self.point_time(quantity, Some(point)).unwrap_or(0.0),
                });
            }
        }
        for id in &binaries {
            let quantity = self.quantity_mut(*id)?;
            for value in quantity.values.iter_mut().flatten() {
                *value = value.round();
            }
            quantity.fixed = true;
        }
        debug!(count = binaries.len(), "fixed binary variables");
        Ok(binaries.len())
    }

    pub fn unfix_binaries(&mut self) -> usize {
        let mut count = 0;
        for quantity in self.quantities.iter_mut().filter(|q| q.is_binary()) {
            quantity.fixed = false;
            count += 1;
        }
        count
    }

    // =========================================================================
    // Constraint families
    // =========================================================================

    /// Attach a model-level constraint family.
    pub fn add_constraint(&mut self, rule: ConstraintRule) -> ModelResult<()> {
        self.insert_rules(vec![rule])?;
        Ok(())
    }

    /// Validate a batch of rules against the model and each other.
    pub(crate) fn check_rules(&self, rules: &[ConstraintRule]) -> ModelResult<()> {
        let mut batch = HashSet::new();
        for rule in rules {
            if self.has_constraint(&rule.name) || !batch.insert(rule.name.as_str()) {
                return Err(ModelError::DuplicateConstraint(rule.name.clone()));
            }
            if let Some(set) = rule.index {
                self.time_set(set)?;
            }
            if let Some(owner) = rule.owner {
                self.unit(owner)?;
            }
            for expr in [&rule.lhs, &rule.rhs] {
                self.check_expr(&rule.name, expr, rule.index)?;
            }
        }
        Ok(())
    }

    /// Check that every point-relative reference in `expr` can be resolved
    /// on `index`.
    pub(crate) fn check_expr(
        &self,
        context: &str,
        expr: &LinExpr,
        index: Option<TimeSetId>,
    ) -> ModelResult<()> {
        for term in &expr.terms {
            let quantity = self.quantity(term.quantity)?;
            if matches!(term.at, TimeRef::Current | TimeRef::Offset(_)) {
                self.check_point_reference(context, quantity, index)?;
            }
            match term.coeff {
                Coeff::Param { param, .. } | Coeff::InverseParam { param, .. } => {
                    let param_q = self.quantity(param)?;
                    if !param_q.is_parameter() {
                        return Err(ModelError::Validation(format!(
                            "{context}: coefficient '{}' is not a parameter",
                            param_q.name()
                        )));
                    }
                    self.check_point_reference(context, param_q, index)?;
                }
                Coeff::Step { .. } if index.is_none() => {
                    return Err(ModelError::Validation(format!(
                        "{context}: step coefficient in a scalar constraint"
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_point_reference(
        &self,
        context: &str,
        quantity: &Quantity,
        index: Option<TimeSetId>,
    ) -> ModelResult<()> {
        let Some(own) = quantity.index else {
            return Ok(());
        };
        match index {
            Some(set) if self.same_domain(set, own)? => Ok(()),
            Some(set) => Err(ModelError::IncompatibleTimeDomains {
                first: self.time_set(set)?.name().to_string(),
                other: quantity.name().to_string(),
            }),
            None => Err(ModelError::Validation(format!(
                "{context}: time-indexed '{}' used without a time point",
                quantity.name()
            ))),
        }
    }

    /// Validate then attach a batch of rules; nothing is attached on error.
    pub(crate) fn insert_rules(&mut self, rules: Vec<ConstraintRule>) -> ModelResult<Vec<String>> {
        self.check_rules(&rules)?;
        let mut names = Vec::with_capacity(rules.len());
        for rule in rules {
            if let Some(owner) = rule.owner {
                self.units[owner.value()].constraints.push(rule.name.clone());
            }
            debug!(constraint = %rule.name, origin = ?rule.origin, "attached constraint");
            names.push(rule.name.clone());
            self.constraints.push(rule);
        }
        Ok(names)
    }

    pub fn has_constraint(&self, name: &str) -> bool {
        self.constraints.iter().any(|c| c.name == name)
    }

    pub fn constraint(&self, name: &str) -> ModelResult<&ConstraintRule> {
        self.constraints
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| ModelError::UnknownConstraint(name.to_string()))
    }

    pub fn constraints(&self) -> &[ConstraintRule] {
        &self.constraints
    }

    pub fn constraints_by_origin(
        &self,
        origin: ConstraintOrigin,
    ) -> impl Iterator<Item = &ConstraintRule> {
        self.constraints.iter().filter(move |c| c.origin == origin)
    }

    pub fn set_active(&mut self, name: &str, active: bool) -> ModelResult<()> {
        let rule = self
            .constraints
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| ModelError::UnknownConstraint(name.to_string()))?;
        rule.active = active;
        Ok(())
    }

    /// Detach a constraint family from the model and its owner unit.
    pub fn remove_constraint(&mut self, name: &str) -> ModelResult<ConstraintRule> {
        let position = self
            .constraints
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| ModelError::UnknownConstraint(name.to_string()))?;
        let rule = self.constraints.remove(position);
        if let Some(owner) = rule.owner {
            self.units[owner.value()].constraints.retain(|c| c != name);
        }
        Ok(rule)
    }

    // =========================================================================
    // Expansion
    // =========================================================================

    /// Expand one family into concrete rows at the current time points.
    pub fn expand(&self, name: &str) -> ModelResult<Vec<LinearRow>> {
        self.expand_rule(self.constraint(name)?)
    }

    /// Expand every active family.
    pub fn expand_all(&self) -> ModelResult<Vec<LinearRow>> {
        let mut rows = Vec::new();
        for rule in self.constraints.iter().filter(|c| c.active) {
            rows.extend(self.expand_rule(rule)?);
        }
        Ok(rows)
    }

    pub(crate) fn expand_rule(&self, rule: &ConstraintRule) -> ModelResult<Vec<LinearRow>> {
        let Some(set) = rule.index else {
            return Ok(vec![self.build_row(rule, None)?]);
        };
        let points = self.time_set(set)?.points();
        rule.applies
            .indices(points.len())
            .into_iter()
            .map(|i| {
                let mut row = self.build_row(rule, Some((set, i)))?;
                row.time = Some(points[i]);
                Ok(row)
            })
            .collect()
    }

    fn build_row(&self, rule: &ConstraintRule, at: At) -> ModelResult<LinearRow> {
        let mut form = AffineForm::default();
        self.accumulate(&mut form, &rule.lhs, at, 1.0)?;
        self.accumulate(&mut form, &rule.rhs, at, -1.0)?;
        form.prune();
        Ok(LinearRow {
            name: rule.name.clone(),
            time: None,
            form,
            relation: rule.relation,
        })
    }

    /// Add `weight * expr` evaluated at `at` into `form`.
    pub(crate) fn accumulate(
        &self,
        form: &mut AffineForm,
        expr: &LinExpr,
        at: At,
        weight: f64,
    ) -> ModelResult<()> {
        form.constant += weight * expr.constant;
        for term in &expr.terms {
            let quantity = self.quantity(term.quantity)?;
            let point = self.resolve_point(quantity, term.at, at)?;
            let coeff = weight * self.coefficient(&term.coeff, at)?;
            if quantity.is_parameter() {
                form.constant += coeff * self.param_value(term.quantity, point)?;
            } else {
                form.add(
                    VarKey {
                        quantity: term.quantity,
                        point,
                    },
                    coeff,
                );
            }
        }
        Ok(())
    }

    fn resolve_point(&self, quantity: &Quantity, at_ref: TimeRef, at: At) -> ModelResult<Option<usize>> {
        let Some(set) = quantity.index else {
            return Ok(None);
        };
        let len = self.time_set(set)?.len();
        if let (Some((rule_set, _)), TimeRef::Current | TimeRef::Offset(_)) = (at, at_ref) {
            // sets that matched when connected may have been discretised apart
            if !self.same_domain(rule_set, set)? {
                return Err(ModelError::IncompatibleTimeDomains {
                    first: self.time_set(rule_set)?.name().to_string(),
                    other: quantity.name().to_string(),
                });
            }
        }
        let current = || {
            at.map(|(_, i)| i).ok_or_else(|| {
                ModelError::Validation(format!(
                    "time-indexed '{}' used without a time point",
                    quantity.name()
                ))
            })
        };
        let point = match at_ref {
            TimeRef::First => 0,
            TimeRef::Last => len.saturating_sub(1),
            TimeRef::Current => current()?,
            TimeRef::Offset(k) => {
                let j = current()? as isize + k;
                if j < 0 || j as usize >= len {
                    return Err(ModelError::Validation(format!(
                        "'{}' referenced at offset {k} outside its time set",
                        quantity.name()
                    )));
                }
                j as usize
            }
        };
        if point >= len {
            return Err(ModelError::Validation(format!(
                "'{}' has no point {point}",
                quantity.name()
            )));
        }
        Ok(Some(point))
    }

    fn coefficient(&self, coeff: &Coeff, at: At) -> ModelResult<f64> {
        match *coeff {
            Coeff::Const(c) => Ok(c),
            Coeff::Param { param, scale } => Ok(scale * self.param_at(param, at)?),
            Coeff::InverseParam { param, scale } => {
                let value = self.param_at(param, at)?;
                if value == 0.0 {
                    return Err(ModelError::Validation(format!(
                        "division by zero parameter '{}'",
                        self.quantity(param)?.name()
                    )));
                }
                Ok(scale / value)
            }
            Coeff::Step { scale, span } => {
                let (set, i) = at.ok_or_else(|| {
                    ModelError::Validation("step coefficient without a time point".into())
                })?;
                let points = self.time_set(set)?.points();
                let (lo, hi) = match span {
                    StepSpan::Backward => (i.checked_sub(1), Some(i)),
                    StepSpan::Forward => (Some(i), Some(i + 1)),
                    StepSpan::Central => (i.checked_sub(1), Some(i + 1)),
                };
                match (lo.and_then(|k| points.get(k)), hi.and_then(|k| points.get(k))) {
                    (Some(a), Some(b)) => Ok(scale / (b - a)),
                    _ => Err(ModelError::Discretization(format!(
                        "{span:?} step undefined at point {i}"
                    ))),
                }
            }
        }
    }

    fn param_at(&self, param: QuantityId, at: At) -> ModelResult<f64> {
        let quantity = self.quantity(param)?;
        let point = self.resolve_point(quantity, TimeRef::Current, at)?;
        self.param_value(param, point)
    }

    /// Every solver-level variable, in quantity order.
    pub fn decision_keys(&self) -> Vec<VarKey> {
        let mut keys = Vec::new();
        for (id, quantity) in self.quantities().filter(|(_, q)| q.is_decision()) {
            match quantity.index {
                Some(_) => keys.extend((0..quantity.values.len()).map(|i| VarKey {
                    quantity: id,
                    point: Some(i),
                })),
                None => keys.push(VarKey {
                    quantity: id,
                    point: None,
                }),
            }
        }
        keys
    }

    /// Residual `lhs - rhs` of every row of a family at the current values.
    pub fn residuals(&self, name: &str) -> ModelResult<Vec<f64>> {
        self.expand(name)?
            .iter()
            .map(|row| self.row_residual(row))
            .collect()
    }

    pub fn row_residual(&self, row: &LinearRow) -> ModelResult<f64> {
        let mut missing = None;
        let value = row.form.evaluate(|key| {
            let value = self.quantity(key.quantity).ok()?.value(key.point.unwrap_or(0));
            if value.is_none() && missing.is_none() {
                missing = Some(key);
            }
            value
        });
        match (value, missing) {
            (Some(v), _) => Ok(v),
            (None, Some(key)) => Err(ModelError::MissingValue {
                quantity: self.quantity(key.quantity)?.name().to_string(),
                time: self.time_of(key).unwrap_or(0.0),
            }),
            (None, None) => Err(ModelError::UnknownQuantity(row.name.clone())),
        }
    }

    /// True when every row of the family holds within `tolerance`.
    pub fn is_satisfied(&self, name: &str, tolerance: f64) -> ModelResult<bool> {
        for row in self.expand(name)? {
            if !row.holds(self.row_residual(&row)?, tolerance) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Applies, Relation};

    fn model_with_set(points: Vec<f64>) -> (Model, TimeSetId) {
        let mut model = Model::new("test");
        let set = model
            .add_time_set(TimeSet::discrete("time", points).unwrap())
            .unwrap();
        (model, set)
    }

    #[test]
    fn test_quantity_names_are_unique() {
        let (mut model, set) = model_with_set(vec![0.0, 1.0]);
        model.add_variable("x", Some(set), VarDomain::real()).unwrap();
        let err = model
            .add_variable("x", None, VarDomain::real())
            .unwrap_err();
        assert_eq!(err, ModelError::DuplicateComponent("x".into()));
    }

    #[test]
    fn test_untagged_quantity() {
        let (mut model, set) = model_with_set(vec![0.0, 1.0]);
        let x = model.add_variable("x", Some(set), VarDomain::real()).unwrap();
        assert_eq!(model.port_type(x).unwrap(), PortKind::None);
        assert_eq!(model.sense(x).unwrap(), None);
    }

    #[test]
    fn test_set_port_type_keeps_sense() {
        let (mut model, set) = model_with_set(vec![0.0, 1.0]);
        let x = model.add_variable("x", Some(set), VarDomain::real()).unwrap();
        model.set_port_type(x, PortKind::Flow).unwrap();
        model.set_sense(x, Sense::Out).unwrap();
        model.set_port_type(x, PortKind::None).unwrap();
        assert_eq!(model.sense(x).unwrap(), None);
        model.set_port_type(x, PortKind::Flow).unwrap();
        assert_eq!(model.sense(x).unwrap(), Some(Sense::Out));
    }

    #[test]
    fn test_expand_with_offsets_and_params() {
        let (mut model, set) = model_with_set(vec![0.0, 1.0, 3.0]);
        let x = model.add_variable("x", Some(set), VarDomain::real()).unwrap();
        let c = model
            .add_parameter("c", Some(set), ParamValue::Points(vec![1.0, 2.0, 4.0]))
            .unwrap();
        // x[t] - x[t-1] == c[t]
        let rule = ConstraintRule::new(
            "step",
            LinExpr::of(x).with_at(-1.0, x, TimeRef::Offset(-1)),
            Relation::Eq,
            LinExpr::of(c),
        )
        .indexed(set)
        .applies(Applies::AllButFirst);
        model.add_constraint(rule).unwrap();

        let rows = model.expand("step").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].time, Some(3.0));
        assert_eq!(rows[1].form.constant, -4.0);
        assert_eq!(rows[1].form.coeffs.len(), 2);

        model.set_values(x, &[0.0, 2.0, 6.0]).unwrap();
        assert_eq!(model.residuals("step").unwrap(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_step_coefficient_uses_local_spacing() {
        let (mut model, set) = model_with_set(vec![0.0, 1.0, 3.0]);
        let x = model.add_variable("x", Some(set), VarDomain::real()).unwrap();
        let rule = ConstraintRule::new(
            "slope",
            LinExpr::new().with_coeff(
                Coeff::Step {
                    scale: 1.0,
                    span: StepSpan::Backward,
                },
                x,
                TimeRef::Current,
            ),
            Relation::Le,
            LinExpr::constant(1.0),
        )
        .indexed(set)
        .applies(Applies::AllButFirst);
        model.add_constraint(rule).unwrap();
        let rows = model.expand("slope").unwrap();
        assert_eq!(rows[0].form.coeffs[0].1, 1.0);
        assert_eq!(rows[1].form.coeffs[0].1, 0.5);
    }

    #[test]
    fn test_residual_reports_missing_value() {
        let (mut model, set) = model_with_set(vec![0.0, 1.0]);
        let x = model.add_variable("x", Some(set), VarDomain::real()).unwrap();
        model
            .add_constraint(
                ConstraintRule::new("pos", LinExpr::of(x), Relation::Ge, LinExpr::new())
                    .indexed(set),
            )
            .unwrap();
        model.set_value(x, Some(0), 1.0).unwrap();
        let err = model.residuals("pos").unwrap_err();
        assert_eq!(
            err,
            ModelError::MissingValue {
                quantity: "x".into(),
                time: 1.0
            }
        );
    }

    #[test]
    fn test_scalar_rule_rejects_indexed_terms() {
        let (mut model, set) = model_with_set(vec![0.0, 1.0]);
        let x = model.add_variable("x", Some(set), VarDomain::real()).unwrap();
        let rule = ConstraintRule::new("bad", LinExpr::of(x), Relation::Eq, LinExpr::new());
        assert!(matches!(
            model.add_constraint(rule),
            Err(ModelError::Validation(_))
        ));
        assert!(model.constraints().is_empty());
        // First/Last references are fine in a scalar rule
        let rule = ConstraintRule::new(
            "end",
            LinExpr::new().with_at(1.0, x, TimeRef::Last),
            Relation::Eq,
            LinExpr::constant(2.0),
        );
        model.add_constraint(rule).unwrap();
        assert_eq!(model.expand("end").unwrap()[0].form.coeffs[0].0.point, Some(1));
    }

    #[test]
    fn test_fix_binaries_requires_values() {
        let (mut model, set) = model_with_set(vec![0.0, 1.0]);
        let u = model.add_variable("u", Some(set), VarDomain::binary()).unwrap();
        assert!(matches!(
            model.fix_binaries(),
            Err(ModelError::MissingValue { .. })
        ));
        model.set_values(u, &[0.9999, 0.0]).unwrap();
        assert_eq!(model.fix_binaries().unwrap(), 1);
        let q = model.quantity(u).unwrap();
        assert!(q.is_fixed());
        assert_eq!(q.value(0), Some(1.0));
        assert_eq!(model.unfix_binaries(), 1);
        assert!(!model.quantity(u).unwrap().is_fixed());
    }

    #[test]
    fn test_remove_and_deactivate_constraint() {
        let (mut model, set) = model_with_set(vec![0.0, 1.0]);
        let x = model.add_variable("x", Some(set), VarDomain::real()).unwrap();
        model
            .add_constraint(
                ConstraintRule::new("a", LinExpr::of(x), Relation::Ge, LinExpr::new())
                    .indexed(set),
            )
            .unwrap();
        model.set_active("a", false).unwrap();
        assert!(model.expand_all().unwrap().is_empty());
        model.remove_constraint("a").unwrap();
        assert!(!model.has_constraint("a"));
        assert!(matches!(
            model.remove_constraint("a"),
            Err(ModelError::UnknownConstraint(_))
        ));
    }
}
