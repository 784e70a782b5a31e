//! # lms-solve: Solving lms-core Models
//!
//! Expands a [`lms_core::Model`] into concrete rows and hands them to a
//! `good_lp` backend selected by [`SolverKind`]:
//!
//! | Backend | Feature | Integers |
//! |---------|---------|----------|
//! | Clarabel | `solver-clarabel` (default) | no |
//! | HiGHS | `solver-highs` | yes |
//!
//! Models with free binary or integer variables are rejected by continuous
//! backends unless `relax_integrality` is set. Fixing them first
//! ([`lms_core::Model::fix_binaries`]) turns them into bounds.
//!
//! ```rust,no_run
//! use lms_core::{ExpressionTag, Model};
//! use lms_solve::{Solver, SolverConfig};
//!
//! # fn build() -> Model { Model::new("m") }
//! let mut model = build();
//! let objective = model.objective_from_tag(ExpressionTag::Cost)?;
//! let outcome = Solver::new(SolverConfig::default()).solve_and_load(&mut model, &objective)?;
//! println!("cost: {:.2} €", outcome.objective_value);
//! # Ok::<(), lms_solve::SolveError>(())
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod lp;

pub use backend::SolverKind;
pub use config::SolverConfig;
pub use error::{SolveError, SolveResult};
pub use lp::{SolveOutcome, SolveStatus, Solver};
