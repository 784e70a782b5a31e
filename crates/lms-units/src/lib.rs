//! # lms-units: Reusable Energy-System Units
//!
//! Each unit is declared on an [`lms_core::Model`] by a `build` constructor
//! taking a unit name, the time set it lives on and a `serde`-deserialisable
//! parameter struct. It returns a handle with the ids of the quantities it
//! created, so they can be connected, constrained or read back after a solve.
//!
//! ```rust,no_run
//! use lms_core::{FiniteDifference, Model, TimeSet};
//! use lms_units::{Battery, BatteryParams, FlowLoad, MainGrid, MainGridParams, SourceParams};
//!
//! let mut model = Model::new("microgrid");
//! let time = model.add_time_set(TimeSet::continuous("time", 0.0, 86_400.0)?)?;
//! let grid = MainGrid::build(&mut model, "grid", time, &MainGridParams::default())?;
//! let load = FlowLoad::build(&mut model, "load", time, &SourceParams::fixed(2.0))?;
//! let bat = Battery::build(&mut model, "bat", time, &BatteryParams::default())?;
//! model.connect_flow(&[grid.p, load.flow, bat.p])?;
//! model.discretize(time, &FiniteDifference::backward(24))?;
//! # Ok::<(), lms_core::ModelError>(())
//! ```
//!
//! Power is in kW, energy in kWh, temperatures in °C and time in seconds.

pub mod battery;
pub mod converter;
pub mod cost;
pub mod environment;
pub mod grid;
pub mod logical;
pub mod occupancy;
pub mod sources;
pub mod storage;
pub mod thermal;

pub use battery::{Battery, BatteryParams};
pub use converter::{ConverterParams, SimpleConverter};
pub use cost::{absolute_cost, bilinear_cost, linear_cost};
pub use environment::{Environment, EnvironmentParams, SolarInputs, SolarParams};
pub use grid::{MainGrid, MainGridParams};
pub use logical::{AbsoluteValue, AbsoluteValueParams};
pub use occupancy::{Occupancy, OccupancyParams};
pub use sources::{EffortSource, FlowLoad, FlowSource, ScalableFlowSource, ScalableParams, SourceParams};
pub use storage::{Storage, StorageParams};
pub use thermal::{
    CapacityParams, ConductanceParams, HeatPump, HeatPumpParams, ThermalCapacity,
    ThermalConductance,
};
