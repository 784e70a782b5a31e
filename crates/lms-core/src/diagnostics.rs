//! Structural diagnostics for assembled models.
//!
//! Collects warnings and errors about a model that is syntactically valid but
//! probably not what was intended: derivatives on a set that was never
//! discretised, port members without a tag, flow ports never connected, and
//! flow balances whose participants all point the same way.
//!
//! # Example
//!
//! ```
//! use lms_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//! diag.add_warning("ports", "Flow port never connected");
//! diag.add_error_with_entity("time", "Derivative on continuous set", "bat.de");
//!
//! assert_eq!(diag.warning_count(), 1);
//! assert_eq!(diag.error_count(), 1);
//! ```

use crate::expr::ConstraintOrigin;
use crate::model::Model;
use crate::port::{PortKind, Sense};
use crate::quantity::{QuantityId, QuantityKind};
use serde::Serialize;
use std::collections::HashSet;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Model can be solved but may not behave as intended
    Warning,
    /// Model cannot be expanded or solved as is
    Error,
}

/// A single diagnostic issue
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    pub severity: Severity,
    /// Category for grouping (e.g., "time", "ports", "connections")
    pub category: String,
    pub message: String,
    /// Optional entity reference (e.g., "bat.p", "grid.outlet")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
}

impl DiagnosticIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            entity: None,
        }
    }

    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;

        if let Some(entity) = &self.entity {
            write!(f, " ({})", entity)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    pub fn add_warning_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_entity(entity));
    }

    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message));
    }

    pub fn add_error_with_entity(&mut self, category: &str, message: &str, entity: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_entity(entity));
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }

    pub fn summary(&self) -> String {
        let warnings = self.warning_count();
        let errors = self.error_count();
        let plural = |n: usize| if n == 1 { "" } else { "s" };

        match (warnings, errors) {
            (0, 0) => "No issues".to_string(),
            (w, 0) => format!("{} warning{}", w, plural(w)),
            (0, e) => format!("{} error{}", e, plural(e)),
            (w, e) => format!("{} warning{}, {} error{}", w, plural(w), e, plural(e)),
        }
    }
}

impl std::fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Diagnostics: {}", self.summary())?;
        for issue in &self.issues {
            writeln!(f, "  {}", issue)?;
        }
        Ok(())
    }
}

impl Model {
    /// Inspect the model structure without modifying it.
    pub fn diagnose(&self) -> Diagnostics {
        let mut diag = Diagnostics::new();
        self.diagnose_time(&mut diag);
        self.diagnose_ports(&mut diag);
        self.diagnose_connections(&mut diag);
        diag
    }

    fn diagnose_time(&self, diag: &mut Diagnostics) {
        for (_, quantity) in self.quantities() {
            if !matches!(quantity.kind(), QuantityKind::Derivative { .. }) {
                continue;
            }
            let Some(set) = quantity.index().and_then(|i| self.time_set(i).ok()) else {
                continue;
            };
            if set.is_continuous() {
                diag.add_error_with_entity(
                    "time",
                    &format!("derivative on undiscretised continuous set '{}'", set.name()),
                    quantity.name(),
                );
            }
        }
    }

    fn diagnose_ports(&self, diag: &mut Diagnostics) {
        let connected: HashSet<QuantityId> = self
            .constraints()
            .iter()
            .filter(|c| c.origin == ConstraintOrigin::FlowConnection)
            .flat_map(|c| c.quantities())
            .collect();
        for (_, unit) in self.units() {
            for port in unit.ports() {
                let entity = format!("{}.{}", unit.name(), port.name());
                for (key, id) in port.members() {
                    let Ok(quantity) = self.quantity(*id) else {
                        continue;
                    };
                    match quantity.port_type() {
                        PortKind::None => diag.add_warning_with_entity(
                            "ports",
                            &format!("member '{key}' has no port type"),
                            &entity,
                        ),
                        PortKind::Flow if !connected.contains(id) => diag
                            .add_warning_with_entity(
                                "ports",
                                &format!("flow member '{key}' is never connected"),
                                &entity,
                            ),
                        _ => {}
                    }
                }
            }
        }
    }

    fn diagnose_connections(&self, diag: &mut Diagnostics) {
        for rule in self
            .constraints()
            .iter()
            .filter(|c| c.origin == ConstraintOrigin::FlowConnection)
        {
            let senses: HashSet<Sense> = rule
                .lhs
                .terms
                .iter()
                .filter_map(|t| self.quantity(t.quantity).ok()?.sense())
                .collect();
            if rule.lhs.terms.len() > 1 && senses.len() == 1 {
                diag.add_warning_with_entity(
                    "connections",
                    "all participants share one sense; the balance forces them to zero",
                    &rule.name,
                );
            }
        }
    }
}
