//! Port tagging of quantities.
//!
//! Every quantity carries a [`PortTag`]: a port type (flow, effort or none)
//! and, for flows, a direction. Flow quantities are extensive and conserved
//! at a connection point; effort quantities are intensive and shared by
//! equality.

use crate::error::{ModelError, ModelResult};
use crate::quantity::QuantityId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Port type of a quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Extensive quantity conserved by signed sum (power, heat flow).
    Flow,
    /// Intensive quantity shared by equality (temperature, voltage).
    Effort,
    /// Not connectable.
    #[default]
    None,
}

impl PortKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PortKind::Flow => "flow",
            PortKind::Effort => "effort",
            PortKind::None => "none",
        }
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flow" => Ok(PortKind::Flow),
            "effort" => Ok(PortKind::Effort),
            "none" => Ok(PortKind::None),
            _ => Err(ModelError::InvalidPortKind(s.to_string())),
        }
    }
}

/// Direction of a flow quantity relative to its unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sense {
    /// Counted positive when entering the unit.
    In,
    /// Counted positive when leaving the unit.
    Out,
}

impl Sense {
    /// Coefficient in a flow balance: outgoing flows add, incoming subtract.
    pub fn sign(self) -> f64 {
        match self {
            Sense::Out => 1.0,
            Sense::In => -1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Sense::In => "in",
            Sense::Out => "out",
        }
    }
}

impl fmt::Display for Sense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sense {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "in" => Ok(Sense::In),
            "out" => Ok(Sense::Out),
            _ => Err(ModelError::InvalidSense(s.to_string())),
        }
    }
}

/// Port type and direction of a quantity.
///
/// The stored sense survives a change of port type, but [`PortTag::sense`]
/// only reports it while the kind is [`PortKind::Flow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PortTag {
    kind: PortKind,
    sense: Option<Sense>,
}

impl PortTag {
    pub fn untagged() -> Self {
        Self::default()
    }

    pub fn flow(sense: Sense) -> Self {
        Self {
            kind: PortKind::Flow,
            sense: Some(sense),
        }
    }

    pub fn effort() -> Self {
        Self {
            kind: PortKind::Effort,
            sense: None,
        }
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn sense(&self) -> Option<Sense> {
        match self.kind {
            PortKind::Flow => self.sense,
            _ => None,
        }
    }

    pub fn set_kind(&mut self, kind: PortKind) {
        self.kind = kind;
    }

    pub fn set_sense(&mut self, sense: Sense) {
        self.sense = Some(sense);
    }

    /// Parse and store a sense given as text.
    pub fn set_sense_str(&mut self, sense: &str) -> ModelResult<()> {
        self.sense = Some(sense.parse()?);
        Ok(())
    }

    /// Replace both the port type and the direction.
    pub fn retag(&mut self, kind: PortKind, sense: Option<Sense>) {
        self.kind = kind;
        self.sense = sense;
    }

    pub fn is_flow(&self) -> bool {
        self.kind == PortKind::Flow
    }

    pub fn is_effort(&self) -> bool {
        self.kind == PortKind::Effort
    }
}

/// Named bundle of quantities a unit exposes for connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Port {
    name: String,
    members: Vec<(String, QuantityId)>,
}

impl Port {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
        }
    }

    pub fn with_member(mut self, key: impl Into<String>, quantity: QuantityId) -> Self {
        self.members.push((key.into(), quantity));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[(String, QuantityId)] {
        &self.members
    }

    pub fn member(&self, key: &str) -> Option<QuantityId> {
        self.members
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, id)| *id)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(|(k, _)| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untagged_defaults() {
        let tag = PortTag::default();
        assert_eq!(tag.kind(), PortKind::None);
        assert_eq!(tag.sense(), None);
        assert!(!tag.is_flow());
        assert!(!tag.is_effort());
    }

    #[test]
    fn test_parse_port_kind() {
        assert_eq!("Flow".parse::<PortKind>().unwrap(), PortKind::Flow);
        assert_eq!(" effort ".parse::<PortKind>().unwrap(), PortKind::Effort);
        assert_eq!("none".parse::<PortKind>().unwrap(), PortKind::None);
        assert!(matches!(
            "pressure".parse::<PortKind>(),
            Err(ModelError::InvalidPortKind(_))
        ));
    }

    #[test]
    fn test_invalid_sense_raises() {
        let mut tag = PortTag::flow(Sense::Out);
        let err = tag.set_sense_str("up").unwrap_err();
        assert_eq!(err, ModelError::InvalidSense("up".into()));
        assert_eq!(tag.sense(), Some(Sense::Out));
    }

    #[test]
    fn test_sense_masked_outside_flow() {
        let mut tag = PortTag::flow(Sense::In);
        tag.set_kind(PortKind::Effort);
        assert_eq!(tag.sense(), None);
        tag.set_kind(PortKind::Flow);
        assert_eq!(tag.sense(), Some(Sense::In));
    }

    #[test]
    fn test_sense_sign() {
        assert_eq!(Sense::Out.sign(), 1.0);
        assert_eq!(Sense::In.sign(), -1.0);
    }

    #[test]
    fn test_port_members() {
        let port = Port::new("outlet")
            .with_member("p", QuantityId::new(3))
            .with_member("t", QuantityId::new(4));
        assert_eq!(port.member("t"), Some(QuantityId::new(4)));
        assert_eq!(port.member("q"), None);
        assert_eq!(port.keys().collect::<Vec<_>>(), vec!["p", "t"]);
    }
}
