mod common;

use common::{c, config, init_logging, tapped_feeder, two_bus};
use gridsim::{
    Battery, Clock, Error, NetworkComponent, SimTime, Simulation, SimulationConfig,
    StepwiseSeries, TapChanger, TapState, Value,
};

#[test]
fn load_step_drives_tap_changes_at_the_same_instant() {
    init_logging();
    let mut net = tapped_feeder();
    net.set_injection("LV", c(0.0, 0.0)).unwrap();
    let grid = NetworkComponent::new(net, &config())
        .with_tap_changer(TapChanger::new("T1", "LV", 0.985, 1.015).unwrap())
        .unwrap()
        .with_injection_source("load", "LV")
        .unwrap();
    let load = StepwiseSeries::load(vec![(SimTime(600), c(1.2, 0.5))]).unwrap();

    let mut sim = Simulation::from_config(&config()).unwrap();
    sim.register("load", load, &[]).unwrap();
    sim.register("grid", grid, &["load"]).unwrap();

    sim.advance_to(SimTime(300)).unwrap();
    let light_tap = tap_position(&sim);

    sim.advance_to(SimTime(600)).unwrap();
    assert_eq!(sim.last_updated("grid"), Some(SimTime(600)));
    let grid = sim.component::<NetworkComponent>("grid").unwrap();
    let v_lv = grid.solution().unwrap().voltage("LV").unwrap().norm();
    assert!(tap_position(&sim) > light_tap);
    assert!(
        (0.985..=1.015).contains(&v_lv) || grid.tap_changers()[0].state() == TapState::AtLimit,
        "|V_LV| = {}",
        v_lv
    );

    // Nothing changes afterwards, so the network is not solved again.
    sim.advance_to(SimTime(3600)).unwrap();
    assert_eq!(sim.last_updated("grid"), Some(SimTime(600)));
}

fn tap_position(sim: &Simulation) -> i32 {
    sim.component::<NetworkComponent>("grid")
        .unwrap()
        .network()
        .transformer("T1")
        .unwrap()
        .tap
        .position()
}

#[test]
fn battery_discharge_is_seen_by_the_network() {
    init_logging();
    let mut sim = Simulation::new(SimTime(0));
    let setpoint = StepwiseSeries::scalar(0.0, vec![(SimTime(3600), -1000.0)]).unwrap();
    let battery = Battery::new(2000.0, 1000.0, 1000.0, 100.0)
        .unwrap()
        .with_setpoint_source("setpoint");
    let grid = NetworkComponent::new(two_bus(c(0.3, 0.1)), &config())
        .with_injection_source("battery", "B")
        .unwrap();

    sim.register("setpoint", setpoint, &[]).unwrap();
    sim.register("battery", battery, &["setpoint"]).unwrap();
    sim.register("grid", grid, &["battery"]).unwrap();

    sim.advance_to(SimTime(1800)).unwrap();
    let idle = sim.value_of("grid").unwrap().voltage("B").unwrap().norm();

    // One hour of discharge at 1 MW empties the remaining 1 MWh.
    sim.advance_to(SimTime(3600)).unwrap();
    assert_eq!(sim.valid_until("battery"), Some(SimTime(7200)));
    let supported = sim.value_of("grid").unwrap().voltage("B").unwrap().norm();
    assert!(supported > idle);
    assert_eq!(
        sim.value_of("battery").unwrap(),
        &Value::Power(c(0.01, 0.0))
    );

    assert!(sim.do_next_update().unwrap());
    assert_eq!(sim.current_time(), SimTime(7200));
    let battery = sim.component::<Battery>("battery").unwrap();
    assert!(battery.state_of_charge().abs() < 1e-9);
    let drained = sim.value_of("grid").unwrap().voltage("B").unwrap().norm();
    assert!((drained - idle).abs() < 1e-6);

    assert!(!sim.do_next_update().unwrap());
}

#[test]
fn clock_only_wakes_its_dependents_on_ticks() {
    init_logging();
    let mut sim = Simulation::new(SimTime(0));
    sim.register("clock", Clock::new(900).unwrap(), &[]).unwrap();
    sim.register("profile", StepwiseSeries::scalar(1.0, vec![]).unwrap(), &[])
        .unwrap();
    sim.add_dependency("profile", "clock").unwrap();

    let mut steps = 0;
    while sim.current_time() < SimTime(3600) {
        assert!(sim.do_next_update().unwrap());
        steps += 1;
    }
    assert_eq!(steps, 4);
    assert_eq!(sim.value_of("clock").unwrap(), &Value::Tick(4));
    assert_eq!(sim.last_updated("profile"), Some(SimTime(3600)));
}

#[test]
fn dependency_cycle_is_refused() {
    init_logging();
    let mut sim = Simulation::new(SimTime(0));
    sim.register("a", Clock::new(10).unwrap(), &[]).unwrap();
    sim.register("b", Clock::new(10).unwrap(), &["a"]).unwrap();
    sim.evaluate_pending().unwrap();

    let err = sim.add_dependency("a", "b").unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
    assert!(sim.pending().is_empty());
    assert_eq!(sim.evaluate_pending().unwrap(), 0);
}

#[test]
fn failed_solve_is_reported_with_the_component_id() {
    init_logging();
    let mut sim = Simulation::new(SimTime(0));
    let grid = NetworkComponent::new(two_bus(c(40.0, 20.0)), &config());
    sim.register("grid", grid, &[]).unwrap();

    match sim.evaluate_pending() {
        Err(Error::Component { id, source }) => {
            assert_eq!(id, "grid");
            assert!(matches!(*source, Error::Numeric(_)));
        }
        other => panic!("expected component failure, got {:?}", other),
    }
    assert_eq!(sim.pending(), vec!["grid"]);
}

#[test]
fn simulation_config_loads_from_json() {
    let config = SimulationConfig::from_json_str(
        r#"{ "start_time": 120, "solver": { "tolerance": 1e-9 } }"#,
    )
    .unwrap();
    assert_eq!(config.start_time, SimTime(120));
    assert_eq!(config.solver.max_iterations, 20);
    let sim = Simulation::from_config(&config).unwrap();
    assert_eq!(sim.current_time(), SimTime(120));
}
