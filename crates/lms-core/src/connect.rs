//! Connection constraint generators.
//!
//! A flow connection balances tagged flows at a node:
//! `Σ out[t] − Σ in[t] = 0` at every point. An effort connection equates
//! tagged efforts point by point. Both are owned by the model, never by a
//! participant unit, and every participant is validated before anything is
//! attached.

use crate::error::{ModelError, ModelResult};
use crate::expr::{ConstraintOrigin, ConstraintRule, LinExpr, Relation};
use crate::model::Model;
use crate::port::PortKind;
use crate::quantity::QuantityId;
use crate::time::TimeSetId;
use crate::unit::UnitId;
use tracing::info;

pub const FLOW_PREFIX: &str = "_flow_cst_";
pub const EFFORT_PREFIX: &str = "_effort_cst_";

/// A quantity name as it appears in a connection name.
pub(crate) fn connection_key(name: &str) -> String {
    name.replace('.', "_")
}

impl Model {
    /// Attach a flow balance over `participants` and return its name.
    pub fn connect_flow(&mut self, participants: &[QuantityId]) -> ModelResult<String> {
        self.connect_flow_named(participants, None)
    }

    pub fn connect_flow_named(
        &mut self,
        participants: &[QuantityId],
        name: Option<&str>,
    ) -> ModelResult<String> {
        let rule = self.flow_rule(participants, name)?;
        let name = rule.name.clone();
        self.insert_rules(vec![rule])?;
        info!(
            constraint = %name,
            participants = participants.len(),
            "connected flows"
        );
        Ok(name)
    }

    /// Attach `a[t] = b[t]` for two effort quantities.
    pub fn connect_effort(&mut self, a: QuantityId, b: QuantityId) -> ModelResult<String> {
        self.connect_efforts(&[a, b], None)
    }

    /// Equate every participant with the first one.
    ///
    /// With more than two participants the pairs are named `<name>`,
    /// `<name>_2`, ... and the base name is returned.
    pub fn connect_efforts(
        &mut self,
        participants: &[QuantityId],
        name: Option<&str>,
    ) -> ModelResult<String> {
        let rules = self.effort_rules(participants, name)?;
        let base = rules[0].name.clone();
        self.insert_rules(rules)?;
        info!(
            constraint = %base,
            participants = participants.len(),
            "connected efforts"
        );
        Ok(base)
    }

    /// Connect ports member by member.
    ///
    /// Every port must expose the same member names. Each member group is
    /// balanced when all members are flows and equated when all are efforts.
    pub fn connect_ports(&mut self, ports: &[(UnitId, &str)]) -> ModelResult<Vec<String>> {
        if ports.len() < 2 {
            return Err(ModelError::EmptyConnection {
                required: 2,
                got: ports.len(),
            });
        }
        let mut resolved = Vec::with_capacity(ports.len());
        for (unit_id, port_name) in ports {
            let unit = self.unit(*unit_id)?;
            let port = unit.port(port_name).ok_or_else(|| ModelError::UnknownPort {
                unit: unit.name().to_string(),
                port: port_name.to_string(),
            })?;
            resolved.push((format!("{}.{}", unit.name(), port_name), port));
        }

        let (first_name, first) = &resolved[0];
        let mut keys: Vec<&str> = first.keys().collect();
        keys.sort_unstable();
        for (name, port) in &resolved[1..] {
            let mut other: Vec<&str> = port.keys().collect();
            other.sort_unstable();
            if other != keys {
                return Err(ModelError::Validation(format!(
                    "ports {first_name} and {name} expose different members"
                )));
            }
        }

        let mut rules = Vec::new();
        for (key, _) in first.members() {
            let group: Vec<QuantityId> = resolved
                .iter()
                .filter_map(|(_, port)| port.member(key))
                .collect();
            let lead = self.quantity(group[0])?;
            match lead.port_type() {
                PortKind::Flow => rules.push(self.flow_rule(&group, None)?),
                PortKind::Effort => rules.extend(self.effort_rules(&group, None)?),
                PortKind::None => {
                    return Err(ModelError::PortTypeMismatch {
                        quantity: lead.name().to_string(),
                        expected: PortKind::Flow,
                        found: PortKind::None,
                    })
                }
            }
        }
        let names = self.insert_rules(rules)?;
        info!(ports = ports.len(), constraints = names.len(), "connected ports");
        Ok(names)
    }

    fn flow_rule(
        &self,
        participants: &[QuantityId],
        name: Option<&str>,
    ) -> ModelResult<ConstraintRule> {
        if participants.is_empty() {
            return Err(ModelError::EmptyConnection {
                required: 1,
                got: 0,
            });
        }
        let mut lhs = LinExpr::new();
        for &id in participants {
            let quantity = self.quantity(id)?;
            if !quantity.is_flow() {
                return Err(ModelError::PortTypeMismatch {
                    quantity: quantity.name().to_string(),
                    expected: PortKind::Flow,
                    found: quantity.port_type(),
                });
            }
            let sense = quantity
                .sense()
                .ok_or_else(|| ModelError::UndefinedSense(quantity.name().to_string()))?;
            lhs = lhs.with(sense.sign(), id);
        }
        let index = self.shared_index(participants)?;
        let name = match name {
            Some(name) => name.to_string(),
            None => self.connection_name(FLOW_PREFIX, participants)?,
        };
        Ok(ConstraintRule::new(name, lhs, Relation::Eq, LinExpr::new())
            .indexed(index)
            .origin(ConstraintOrigin::FlowConnection))
    }

    fn effort_rules(
        &self,
        participants: &[QuantityId],
        name: Option<&str>,
    ) -> ModelResult<Vec<ConstraintRule>> {
        if participants.len() < 2 {
            return Err(ModelError::EmptyConnection {
                required: 2,
                got: participants.len(),
            });
        }
        for &id in participants {
            let quantity = self.quantity(id)?;
            if !quantity.is_effort() {
                return Err(ModelError::PortTypeMismatch {
                    quantity: quantity.name().to_string(),
                    expected: PortKind::Effort,
                    found: quantity.port_type(),
                });
            }
        }
        let index = self.shared_index(participants)?;
        let base = match name {
            Some(name) => name.to_string(),
            None => self.connection_name(EFFORT_PREFIX, participants)?,
        };
        let lead = participants[0];
        Ok(participants[1..]
            .iter()
            .enumerate()
            .map(|(k, &other)| {
                let name = if k == 0 {
                    base.clone()
                } else {
                    format!("{base}_{}", k + 1)
                };
                ConstraintRule::new(name, LinExpr::of(lead), Relation::Eq, LinExpr::of(other))
                    .indexed(index)
                    .origin(ConstraintOrigin::EffortConnection)
            })
            .collect())
    }

    /// Time set of the first participant, checked against every other one.
    fn shared_index(&self, participants: &[QuantityId]) -> ModelResult<TimeSetId> {
        let first = self.quantity(participants[0])?;
        let index = first
            .index()
            .ok_or_else(|| ModelError::IncompatibleTimeDomains {
                first: first.name().to_string(),
                other: "(not time-indexed)".into(),
            })?;
        for &id in &participants[1..] {
            let other = self.quantity(id)?;
            let compatible = match other.index() {
                Some(set) => self.same_domain(index, set)?,
                None => false,
            };
            if !compatible {
                return Err(ModelError::IncompatibleTimeDomains {
                    first: first.name().to_string(),
                    other: other.name().to_string(),
                });
            }
        }
        Ok(index)
    }

    fn connection_name(&self, prefix: &str, participants: &[QuantityId]) -> ModelResult<String> {
        let names = participants
            .iter()
            .map(|id| Ok(connection_key(self.quantity(*id)?.name())))
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(format!("{prefix}{}", names.join("&")))
    }
}
