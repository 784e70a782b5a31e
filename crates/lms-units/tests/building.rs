//! A single thermal zone assembled from library units through ports

use approx::assert_relative_eq;
use lms_core::{Celsius, FiniteDifference, Model, TimeSet, TimeSetId};
use lms_units::{
    CapacityParams, ConductanceParams, Environment, EnvironmentParams, HeatPump, HeatPumpParams,
    Occupancy, OccupancyParams, ThermalCapacity, ThermalConductance,
};

struct Zone {
    env: Environment,
    wall: ThermalConductance,
    zone: ThermalCapacity,
    hp: HeatPump,
}

fn zone(model: &mut Model, time: TimeSetId) -> Zone {
    let env = Environment::build(
        model,
        "env",
        time,
        &EnvironmentParams {
            te: 5.0.into(),
            ..EnvironmentParams::default()
        },
    )
    .unwrap();
    let wall = ThermalConductance::build(model, "wall", time, &ConductanceParams { r: 5.0 }).unwrap();
    let zone = ThermalCapacity::build(
        model,
        "zone",
        time,
        &CapacityParams {
            c: 3600.0,
            theta0: Some(Celsius(20.0)),
            ..CapacityParams::default()
        },
    )
    .unwrap();
    let hp = HeatPump::build(model, "hp", time, &HeatPumpParams::default()).unwrap();
    Zone {
        env,
        wall,
        zone,
        hp,
    }
}

#[test]
fn zone_reaches_steady_state() {
    let mut model = Model::new("house");
    let time = model
        .add_time_set(TimeSet::continuous("time", 0.0, 7200.0).unwrap())
        .unwrap();
    let z = zone(&mut model, time);

    // heat leaves the zone through the wall towards the outdoor temperature
    model.connect_effort(z.zone.theta, z.wall.t1).unwrap();
    model.connect_effort(z.wall.t2, z.env.te).unwrap();
    model
        .connect_flow(&[z.hp.q_th, z.zone.q, z.wall.q1])
        .unwrap();
    model
        .discretize(time, &FiniteDifference::backward(2))
        .unwrap();
    assert!(!model.diagnose().has_errors());

    // steady state: the heat pump covers the wall loss at 20 °C
    let loss = (20.0 - 5.0) / 5.0;
    model.set_values(z.zone.theta, &[20.0; 3]).unwrap();
    model.set_values(z.zone.dtheta, &[0.0; 3]).unwrap();
    model.set_values(z.zone.q, &[0.0; 3]).unwrap();
    model.set_values(z.wall.t1, &[20.0; 3]).unwrap();
    model.set_values(z.wall.t2, &[5.0; 3]).unwrap();
    model.set_values(z.wall.q1, &[loss; 3]).unwrap();
    model.set_values(z.wall.q2, &[loss; 3]).unwrap();
    model.set_values(z.hp.q_th, &[loss; 3]).unwrap();
    model.set_values(z.hp.p_el, &[loss / 3.0; 3]).unwrap();

    for rule in model.constraints() {
        for residual in model.residuals(&rule.name).unwrap() {
            assert_relative_eq!(residual, 0.0, epsilon = 1e-9);
        }
    }
}

#[test]
fn occupancy_gains_balance_with_zone() {
    let mut model = Model::new("house");
    let time = model
        .add_time_set(TimeSet::discrete("time", vec![0.0, 3600.0]).unwrap())
        .unwrap();
    let occ = Occupancy::build(
        &mut model,
        "occ",
        time,
        &OccupancyParams {
            q_int_d: 0.4.into(),
            ..OccupancyParams::default()
        },
    )
    .unwrap();
    let zone = ThermalCapacity::build(&mut model, "zone", time, &CapacityParams::default()).unwrap();

    let name = model.connect_flow(&[occ.q_int_d, zone.q]).unwrap();
    model.set_values(zone.q, &[0.4, 0.4]).unwrap();
    assert!(model.is_satisfied(&name, 1e-12).unwrap());
}
