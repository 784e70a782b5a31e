//! Error types for model construction and evaluation.
//!
//! Every fallible operation on a [`Model`](crate::Model) returns
//! [`ModelResult`]. Errors are raised synchronously and a failed call leaves
//! the model exactly as it was before the call.
//!
//! # Example
//!
//! ```
//! use lms_core::{ModelError, Sense};
//!
//! let err = "sideways".parse::<Sense>().unwrap_err();
//! assert!(matches!(err, ModelError::InvalidSense(_)));
//! ```

use crate::port::PortKind;
use thiserror::Error;

/// Unified error type for model operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    /// Port kind text outside `flow`, `effort`, `none`
    #[error("Invalid port type '{0}': expected \"flow\", \"effort\" or \"none\"")]
    InvalidPortKind(String),

    /// Sense text outside `in`, `out`
    #[error("Invalid sense '{0}': expected \"in\" or \"out\"")]
    InvalidSense(String),

    /// A connection participant carries the wrong port type
    #[error("Port type mismatch on '{quantity}': expected {expected}, found {found}")]
    PortTypeMismatch {
        quantity: String,
        expected: PortKind,
        found: PortKind,
    },

    /// A flow participant has no sense
    #[error("Flow quantity '{0}' has no sense (in/out)")]
    UndefinedSense(String),

    /// Participants are indexed by different time domains
    #[error("Incompatible time domains between '{first}' and '{other}'")]
    IncompatibleTimeDomains { first: String, other: String },

    /// Too few participants for a connection
    #[error("Connection needs at least {required} participant(s), got {got}")]
    EmptyConnection { required: usize, got: usize },

    /// A constraint family with that name is already attached
    #[error("Constraint '{0}' already exists")]
    DuplicateConstraint(String),

    /// A time set, unit, quantity or expression with that name already exists
    #[error("Component '{0}' already exists")]
    DuplicateComponent(String),

    #[error("Unknown quantity: {0}")]
    UnknownQuantity(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Unit '{unit}' has no port named '{port}'")]
    UnknownPort { unit: String, port: String },

    #[error("Unknown constraint: {0}")]
    UnknownConstraint(String),

    #[error("Invalid time set: {0}")]
    InvalidTimeSet(String),

    #[error("Discretization error: {0}")]
    Discretization(String),

    /// A quantity has no current value at a point being evaluated
    #[error("No value for '{quantity}' at t = {time}")]
    MissingValue { quantity: String, time: f64 },

    #[error("Profile error: {0}")]
    Profile(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Convenience type alias for Results using ModelError.
pub type ModelResult<T> = Result<T, ModelError>;
