//! Shared fixtures for integration tests.
#![allow(dead_code)]

use gridsim::{
    Branch, Bus, BusType, Network, SimulationConfig, TapSettings, Transformer, WindingConnection,
};
use num_complex::Complex64;

/// Routes `log` output through the test harness; safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// Slack `A` feeding load bus `B` through one line.
pub fn two_bus(load: Complex64) -> Network {
    let mut net = Network::new("two bus", 100.0, 60.0);
    net.add_bus(Bus::new("A", BusType::Slack, 11.0)).unwrap();
    net.add_bus(Bus::new("B", BusType::PQ, 11.0).with_injection(-load))
        .unwrap();
    net.add_branch(Branch::new("L1", "A", "B", c(0.01, 0.05))).unwrap();
    net
}

/// Substation (`HV`, slack) -> tapped delta/grounded-wye transformer -> `MV`
/// -> line -> `LV`, with a generator bus `G` hanging off the substation.
pub fn tapped_feeder() -> Network {
    let mut net = Network::new("feeder", 100.0, 60.0);
    net.add_bus(Bus::new("HV", BusType::Slack, 33.0)).unwrap();
    net.add_bus(Bus::new("MV", BusType::PQ, 11.0)).unwrap();
    net.add_bus(Bus::new("G", BusType::PV, 33.0).with_setpoint(1.0, 0.0).with_injection(c(0.2, 0.0)))
        .unwrap();
    net.add_bus(
        Bus::new("LV", BusType::PQ, 11.0)
            .with_injection(c(-0.5, -0.2))
            .with_shunt(c(0.0, 0.01)),
    )
    .unwrap();
    net.add_transformer(
        Transformer::new("T1", "HV", "MV", WindingConnection::DeltaGroundedWye, c(0.005, 0.06))
            .with_tap(TapSettings::new(0, -8, 8, 0.0125).unwrap())
            .with_magnetizing(c(0.001, -0.004)),
    )
    .unwrap();
    net.add_branch(Branch::new("L1", "MV", "LV", c(0.02, 0.06)).with_charging(c(0.0, 0.02)))
        .unwrap();
    net.add_branch(Branch::new("L2", "HV", "G", c(0.01, 0.04))).unwrap();
    net
}

pub fn config() -> SimulationConfig {
    SimulationConfig::default()
}
