//! Steady-state power flow embedded in a lazy, time-driven simulation.
//!
//! A [`Network`] holds buses, lines and transformers. [`Admittance`] turns a
//! snapshot of it into a nodal admittance matrix that [`solve`] runs
//! Newton-Raphson on. [`Simulation`] schedules components such as
//! [`NetworkComponent`], [`Battery`] and [`Clock`] by their valid-until horizons.

pub mod admittance;
pub mod components;
pub mod config;
pub mod description;
pub mod error;
pub mod line;
pub mod network;
pub mod newton;
pub mod simulation;
pub mod tap_changer;
pub mod transformer;

pub use admittance::{Admittance, Element, Stamp, islands};
pub use components::{Battery, Clock, NetworkComponent, StepwiseSeries};
pub use config::{SimulationConfig, SolverConfig};
pub use description::NetworkDescription;
pub use error::{Error, PowerFlowError, Result, TopologyError};
pub use line::{Conductor, Shield, UndergroundLine};
pub use network::{Branch, Bus, BusType, Network, Topology};
pub use newton::{BranchFlow, PowerFlowSolution, solve};
pub use simulation::{
    ComponentId, SimComponent, SimTime, Simulation, Update, UpdateContext, Value,
};
pub use tap_changer::{TapAction, TapChanger, TapState};
pub use transformer::{TapSettings, ThreeWindingTransformer, Transformer, WindingConnection};
