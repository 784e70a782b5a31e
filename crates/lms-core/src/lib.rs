//! # lms-core: Energy System Modelling Core
//!
//! Building blocks for linear and mixed-integer optimisation models of
//! energy systems assembled from reusable units.
//!
//! ## Design Philosophy
//!
//! A [`Model`] owns every component in arenas addressed by newtype IDs:
//! - **Time sets** ([`TimeSetId`]): continuous domains or explicit points
//! - **Units** ([`UnitId`]): blocks declared through a [`UnitBuilder`]
//! - **Quantities** ([`QuantityId`]): variables, parameters and derivatives,
//!   each carrying a [`PortTag`] (flow with a [`Sense`], effort, or none)
//! - **Constraint families** ([`ConstraintRule`]): templates expanded into
//!   [`LinearRow`]s at the current points of their time set
//!
//! Units never reference each other. They are tied together afterwards by
//! connection constraints owned by the model: flow balances
//! (`Σ out − Σ in = 0`) and effort equalities, generated from the tags.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lms_core::*;
//!
//! let mut model = Model::new("site");
//! let time = model.add_time_set(TimeSet::continuous("time", 0.0, 86_400.0)?)?;
//!
//! let mut pv = model.add_unit("pv", "FlowSource", time)?;
//! let pv_p = pv.flow_var("p", VarDomain::non_negative(), Sense::Out)?;
//! pv.finish();
//!
//! let mut load = model.add_unit("load", "FlowLoad", time)?;
//! let load_p = load.flow_param("p", ParamValue::Scalar(2.0), Sense::In)?;
//! load.finish();
//!
//! model.connect_flow(&[pv_p, load_p])?;
//! model.discretize(time, &FiniteDifference::backward(24))?;
//! # Ok::<(), ModelError>(())
//! ```
//!
//! ## Modules
//!
//! - [`port`] - Port kinds, senses and named ports
//! - [`expr`] - Linear expression templates and expanded rows
//! - [`connect`] - Flow and effort connection generators
//! - [`discretize`] - Finite-difference discretisation
//! - [`objective`] - Tagged expressions and integral objectives
//! - [`diagnostics`] - Structural checks of an assembled model
//! - [`graph_utils`] - Connection topology (islands, DOT export)

pub mod connect;
pub mod diagnostics;
pub mod discretize;
pub mod error;
pub mod expr;
pub mod graph_utils;
pub mod model;
pub mod objective;
pub mod port;
pub mod quantity;
pub mod time;
pub mod unit;
pub mod units;

pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use discretize::{Discretization, FiniteDifference, Scheme};
pub use error::{ModelError, ModelResult};
pub use expr::{
    AffineForm, Applies, Coeff, ConstraintOrigin, ConstraintRule, LinExpr, LinearRow, Relation,
    StepSpan, Term, TimeRef, VarKey,
};
pub use graph_utils::{connection_graph, export_graph, find_islands, graph_stats};
pub use model::Model;
pub use objective::{ExpressionTag, Objective, ObjectiveSense, ObjectiveTerm, TaggedExpression};
pub use port::{Port, PortKind, PortTag, Sense};
pub use quantity::{
    Integrality, ParamValue, Profile, Quantity, QuantityId, QuantityKind, VarDomain,
};
pub use time::{Horizon, TimeSet, TimeSetId};
pub use unit::{Unit, UnitBuilder, UnitId};
pub use units::{Celsius, KilowattHours, Kilowatts, Seconds};
