//! End-to-end solves with the default continuous backend
#![cfg(feature = "solver-clarabel")]

use approx::assert_relative_eq;
use lms_core::{
    ExpressionTag, FiniteDifference, KilowattHours, Kilowatts, Model, Objective, Profile, Sense,
    TimeSet,
};
use lms_solve::{SolveError, SolveStatus, Solver, SolverConfig, SolverKind};
use lms_units::{
    Battery, BatteryParams, FlowLoad, FlowSource, MainGrid, MainGridParams, SourceParams,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Microgrid {
    model: Model,
    grid: MainGrid,
    bat: Battery,
    node: String,
}

/// Two hours, 2 kW load, cheap first hour and expensive end point.
fn microgrid(battery: BatteryParams) -> Microgrid {
    let mut model = Model::new("microgrid");
    let time = model
        .add_time_set(TimeSet::continuous("time", 0.0, 7200.0).unwrap())
        .unwrap();
    let grid = MainGrid::build(
        &mut model,
        "grid",
        time,
        &MainGridParams {
            pmin: Kilowatts(0.0),
            cost_buy: Profile::new(vec![0.0, 3600.0, 7200.0], vec![0.1, 0.1, 0.5])
                .unwrap()
                .into(),
            exclusive: false,
            ..MainGridParams::default()
        },
    )
    .unwrap();
    let load = FlowLoad::build(&mut model, "load", time, &SourceParams::fixed(2.0)).unwrap();
    let bat = Battery::build(&mut model, "bat", time, &battery).unwrap();
    let node = model.connect_flow(&[grid.p, load.flow, bat.p]).unwrap();
    model
        .discretize(time, &FiniteDifference::backward(2))
        .unwrap();
    Microgrid {
        model,
        grid,
        bat,
        node,
    }
}

fn ideal_battery() -> BatteryParams {
    BatteryParams {
        e0: Some(KilowattHours(0.0)),
        ..BatteryParams::default()
    }
}

#[test]
fn battery_shifts_load_to_cheap_hour() {
    init_tracing();
    let mut mg = microgrid(ideal_battery());
    let objective = mg.model.objective_from_tag(ExpressionTag::Cost).unwrap();

    let outcome = Solver::default()
        .solve_and_load(&mut mg.model, &objective)
        .expect("solve");

    assert_eq!(outcome.status, SolveStatus::Optimal);
    assert_eq!(outcome.solver, SolverKind::Clarabel);
    assert_relative_eq!(outcome.objective_value, 0.5, epsilon = 1e-4);

    let grid = outcome.series("grid.p").unwrap();
    for (got, want) in grid.iter().zip([2.0, 4.0, 0.0]) {
        assert_relative_eq!(*got, want, epsilon = 1e-4);
    }
    let bat = outcome.series("bat.p").unwrap();
    for (got, want) in bat.iter().zip([0.0, 2.0, -2.0]) {
        assert_relative_eq!(*got, want, epsilon = 1e-4);
    }
    assert!(outcome.max_violation.unwrap() < 1e-5);

    // values were written back into the model
    assert!(mg.model.is_satisfied(&mg.node, 1e-5).unwrap());
    let energy = mg.model.quantity(mg.bat.e).unwrap().values().to_vec();
    assert_relative_eq!(energy[1].unwrap(), 2.0, epsilon = 1e-4);
    assert_relative_eq!(
        mg.model.evaluate_objective(&objective).unwrap(),
        0.5,
        epsilon = 1e-4
    );
}

#[test]
fn lossy_battery_needs_integer_support() {
    let mg = microgrid(BatteryParams {
        etac: 0.9,
        etad: 0.9,
        ..ideal_battery()
    });
    let objective = mg.model.objective_from_tag(ExpressionTag::Cost).unwrap();

    let err = Solver::default().solve(&mg.model, &objective).unwrap_err();
    assert!(matches!(
        err,
        SolveError::IntegerVariablesUnsupported {
            solver: SolverKind::Clarabel,
            count: 3
        }
    ));

    let relaxed = Solver::new(SolverConfig::default().relaxed())
        .solve(&mg.model, &objective)
        .unwrap();
    assert_eq!(relaxed.status, SolveStatus::Relaxed);
}

#[test]
fn fixed_binaries_allow_continuous_resolve() {
    let mut mg = microgrid(BatteryParams {
        etac: 0.9,
        etad: 0.9,
        ..ideal_battery()
    });
    let u = mg.bat.u.unwrap();
    // idle, charge, discharge
    mg.model.set_values(u, &[1.0, 1.0, 0.0]).unwrap();
    assert_eq!(mg.model.fix_binaries().unwrap(), 1);

    let objective = mg.model.objective_from_tag(ExpressionTag::Cost).unwrap();
    let outcome = Solver::default().solve(&mg.model, &objective).unwrap();
    assert_eq!(outcome.status, SolveStatus::Optimal);
    assert_relative_eq!(outcome.value("bat.u", 2).unwrap(), 0.0, epsilon = 1e-6);
    // discharging 2 kW at the end needs 2 / 0.9 kWh stored, bought at 0.1
    assert!(outcome.objective_value < 0.5 + 0.25 * 2.0);
    assert_eq!(mg.model.unfix_binaries(), 1);
    let p_out = mg.model.quantity(mg.grid.p_out).unwrap().name().to_string();
    assert!(outcome.value(&p_out, 1).unwrap() > 2.0);
}

#[test]
fn contradictory_parameters_are_infeasible() {
    let mut model = Model::new("fixed");
    let time = model
        .add_time_set(TimeSet::discrete("time", vec![0.0, 1.0]).unwrap())
        .unwrap();
    let supply = FlowSource::build(&mut model, "supply", time, &SourceParams::fixed(2.0)).unwrap();
    let load = FlowLoad::build(&mut model, "load", time, &SourceParams::fixed(3.0)).unwrap();
    model.connect_flow(&[supply.flow, load.flow]).unwrap();
    assert_eq!(model.sense(load.flow).unwrap(), Some(Sense::In));

    let err = Solver::default()
        .solve(&model, &Objective::minimize())
        .unwrap_err();
    assert!(matches!(err, SolveError::Infeasible(msg) if msg.contains("_flow_cst_supply_flow&load_flow")));
}

#[cfg(not(feature = "solver-highs"))]
#[test]
fn missing_backend_is_reported() {
    let mg = microgrid(ideal_battery());
    let objective = mg.model.objective_from_tag(ExpressionTag::Cost).unwrap();
    let err = Solver::with_kind(SolverKind::Highs)
        .solve(&mg.model, &objective)
        .unwrap_err();
    assert!(matches!(err, SolveError::SolverUnavailable(SolverKind::Highs)));
}
