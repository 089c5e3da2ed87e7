//! Schedulable entities driving and observing the network.

use std::any::Any;
use std::collections::HashMap;

use log::{debug, info, warn};
use num_complex::Complex64;

use crate::config::{SimulationConfig, SolverConfig};
use crate::error::{Error, Result};
use crate::network::Network;
use crate::newton::PowerFlowSolution;
use crate::simulation::{SimComponent, SimTime, Update, UpdateContext, Value};
use crate::tap_changer::TapChanger;

const SECONDS_PER_HOUR: f64 = 3600.0;

macro_rules! any_component {
    () => {
        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    };
}

/// Heartbeat publishing the index of the current period.
#[derive(Debug, Clone)]
pub struct Clock {
    period: i64,
}

impl Clock {
    pub fn new(period: i64) -> Result<Self> {
        if period <= 0 {
            return Err(Error::Configuration(format!(
                "clock period must be positive, got {}",
                period
            )));
        }
        Ok(Self { period })
    }

    pub fn period(&self) -> i64 {
        self.period
    }
}

impl SimComponent for Clock {
    fn update(&mut self, ctx: &UpdateContext<'_>) -> Result<Update> {
        let n = ctx.time().0.div_euclid(self.period);
        let next = (n + 1).saturating_mul(self.period);
        Ok(Update::new(Value::Tick(n), SimTime(next)))
    }

    any_component!();
}

/// Piecewise-constant time series: each value holds from its breakpoint until the next.
#[derive(Debug, Clone)]
pub struct StepwiseSeries {
    initial: Value,
    points: Vec<(SimTime, Value)>,
}

impl StepwiseSeries {
    /// `initial` applies before the first breakpoint. Breakpoints must be finite
    /// and strictly increasing.
    pub fn new(initial: Value, points: Vec<(SimTime, Value)>) -> Result<Self> {
        if points.iter().any(|(t, _)| !t.is_finite()) {
            return Err(Error::Configuration(
                "stepwise series breakpoints must be finite".to_string(),
            ));
        }
        if points.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(Error::Configuration(
                "stepwise series breakpoints must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { initial, points })
    }

    /// Load profile in per unit; published as the negative injection it causes.
    pub fn load(points: Vec<(SimTime, Complex64)>) -> Result<Self> {
        Self::new(
            Value::Power(Complex64::new(0.0, 0.0)),
            points.into_iter().map(|(t, s)| (t, Value::Power(-s))).collect(),
        )
    }

    pub fn scalar(initial: f64, points: Vec<(SimTime, f64)>) -> Result<Self> {
        Self::new(
            Value::Scalar(initial),
            points.into_iter().map(|(t, x)| (t, Value::Scalar(x))).collect(),
        )
    }

    pub fn value_at(&self, t: SimTime) -> &Value {
        match self.points.partition_point(|(at, _)| *at <= t) {
            0 => &self.initial,
            k => &self.points[k - 1].1,
        }
    }
}

impl SimComponent for StepwiseSeries {
    fn update(&mut self, ctx: &UpdateContext<'_>) -> Result<Update> {
        let now = ctx.time();
        let next = self.points.partition_point(|(at, _)| *at <= now);
        let valid_until = self
            .points
            .get(next)
            .map(|(at, _)| *at)
            .unwrap_or(SimTime::INFINITY);
        Ok(Update::new(self.value_at(now).clone(), valid_until))
    }

    any_component!();
}

/// Energy store following a requested charging power.
///
/// Positive power charges. The published value is the network injection in per
/// unit, so charging shows up as load.
#[derive(Debug, Clone)]
pub struct Battery {
    // Ratings
    capacity_kwh: f64,
    max_power_kw: f64,
    charge_efficiency: f64,
    discharge_efficiency: f64,
    /// Network power base in kW.
    s_base_kw: f64,

    // State
    charge_kwh: f64,
    requested_kw: f64,
    power_kw: f64,
    last_time: Option<SimTime>,

    /// Component publishing the requested power as `Value::Scalar` kW.
    setpoint_source: Option<String>,
}

impl Battery {
    pub fn new(capacity_kwh: f64, max_power_kw: f64, charge_kwh: f64, s_base_mva: f64) -> Result<Self> {
        let battery = Self {
            capacity_kwh,
            max_power_kw,
            charge_efficiency: 1.0,
            discharge_efficiency: 1.0,
            s_base_kw: s_base_mva * 1000.0,
            charge_kwh,
            requested_kw: 0.0,
            power_kw: 0.0,
            last_time: None,
            setpoint_source: None,
        };
        battery.validate()?;
        Ok(battery)
    }

    pub fn with_efficiencies(mut self, charge: f64, discharge: f64) -> Result<Self> {
        self.charge_efficiency = charge;
        self.discharge_efficiency = discharge;
        self.validate()?;
        Ok(self)
    }

    pub fn with_setpoint_source(mut self, source: impl Into<String>) -> Self {
        self.setpoint_source = Some(source.into());
        self
    }

    /// Fixed request, used when no setpoint source is attached.
    pub fn set_requested_power(&mut self, kw: f64) {
        self.requested_kw = kw;
    }

    pub fn setpoint_source(&self) -> Option<&str> {
        self.setpoint_source.as_deref()
    }

    pub fn charge_kwh(&self) -> f64 {
        self.charge_kwh
    }

    pub fn state_of_charge(&self) -> f64 {
        self.charge_kwh / self.capacity_kwh
    }

    /// Power actually flowing, after limits.
    pub fn power_kw(&self) -> f64 {
        self.power_kw
    }

    fn validate(&self) -> Result<()> {
        let entity = "battery";
        if !(self.capacity_kwh.is_finite() && self.capacity_kwh > 0.0) {
            return Err(Error::validation(entity, "capacity must be positive"));
        }
        if !(self.max_power_kw.is_finite() && self.max_power_kw > 0.0) {
            return Err(Error::validation(entity, "power rating must be positive"));
        }
        if !(0.0..=self.capacity_kwh).contains(&self.charge_kwh) {
            return Err(Error::validation(entity, "initial charge outside [0, capacity]"));
        }
        for eta in [self.charge_efficiency, self.discharge_efficiency] {
            if !(eta > 0.0 && eta <= 1.0) {
                return Err(Error::validation(entity, "efficiencies must lie in (0, 1]"));
            }
        }
        if !(self.s_base_kw.is_finite() && self.s_base_kw > 0.0) {
            return Err(Error::validation(entity, "power base must be positive"));
        }
        Ok(())
    }

    // Rate of change of stored energy in kW for a terminal power.
    fn stored_rate(&self, power_kw: f64) -> f64 {
        if power_kw >= 0.0 {
            power_kw * self.charge_efficiency
        } else {
            power_kw / self.discharge_efficiency
        }
    }

    fn integrate(&mut self, now: SimTime) {
        if let Some(last) = self.last_time {
            let hours = now.seconds_since(last) as f64 / SECONDS_PER_HOUR;
            self.charge_kwh = (self.charge_kwh + self.stored_rate(self.power_kw) * hours)
                .clamp(0.0, self.capacity_kwh);
        }
        self.last_time = Some(now);
    }

    // Seconds until the store fills or empties at the current power.
    fn seconds_to_limit(&self) -> Option<i64> {
        let rate = self.stored_rate(self.power_kw);
        let room = if rate > 0.0 {
            self.capacity_kwh - self.charge_kwh
        } else if rate < 0.0 {
            self.charge_kwh
        } else {
            return None;
        };
        let seconds = (room / rate.abs() * SECONDS_PER_HOUR).ceil();
        Some((seconds as i64).max(1))
    }
}

impl SimComponent for Battery {
    fn update(&mut self, ctx: &UpdateContext<'_>) -> Result<Update> {
        let now = ctx.time();
        self.integrate(now);

        if let Some(source) = &self.setpoint_source {
            self.requested_kw = ctx.value_of(source)?.as_scalar().ok_or_else(|| {
                Error::Configuration(format!("battery setpoint {} is not a scalar", source))
            })?;
        }
        let requested = self.requested_kw.clamp(-self.max_power_kw, self.max_power_kw);
        self.power_kw = if requested > 0.0 && self.charge_kwh >= self.capacity_kwh {
            0.0
        } else if requested < 0.0 && self.charge_kwh <= 0.0 {
            0.0
        } else {
            requested
        };
        debug!(
            "{}: charge {:.3} kWh, power {:.3} kW",
            ctx.id(),
            self.charge_kwh,
            self.power_kw
        );

        let valid_until = match self.seconds_to_limit() {
            Some(seconds) => now.plus(seconds),
            None => SimTime::INFINITY,
        };
        let injection = Complex64::new(-self.power_kw / self.s_base_kw, 0.0);
        Ok(Update::new(Value::Power(injection), valid_until))
    }

    any_component!();
}

/// A network solved whenever its inputs change.
///
/// Injection sources add their `Value::Power` on top of whatever injection a
/// bus already carries, so edits made through [`NetworkComponent::network_mut`]
/// survive later updates. Tap changers are iterated at the same instant until no tap moves.
#[derive(Debug, Clone)]
pub struct NetworkComponent {
    network: Network,
    tap_changers: Vec<TapChanger>,
    solver: SolverConfig,
    max_tap_iterations: usize,
    /// (source component, bus)
    injection_sources: Vec<(String, String)>,
    /// Per-bus source contributions applied by the last update.
    source_injections: HashMap<String, Complex64>,
    solution: Option<PowerFlowSolution>,
}

impl NetworkComponent {
    pub fn new(network: Network, config: &SimulationConfig) -> Self {
        network.summary();
        Self {
            network,
            tap_changers: Vec::new(),
            solver: config.solver,
            max_tap_iterations: config.max_tap_iterations,
            injection_sources: Vec::new(),
            source_injections: HashMap::new(),
            solution: None,
        }
    }

    pub fn with_tap_changer(mut self, tap_changer: TapChanger) -> Result<Self> {
        let entity = format!("tap changer {}", tap_changer.transformer);
        if self.network.transformer(&tap_changer.transformer).is_none() {
            return Err(Error::validation(entity, "transformer does not exist"));
        }
        if self.network.bus(&tap_changer.controlled_bus).is_none() {
            return Err(Error::validation(entity, "controlled bus does not exist"));
        }
        self.tap_changers.push(tap_changer);
        Ok(self)
    }

    pub fn with_injection_source(
        mut self,
        source: impl Into<String>,
        bus_id: impl Into<String>,
    ) -> Result<Self> {
        let bus_id = bus_id.into();
        if self.network.bus(&bus_id).is_none() {
            return Err(Error::validation(
                format!("bus {}", bus_id),
                "injection target does not exist",
            ));
        }
        self.injection_sources.push((source.into(), bus_id));
        Ok(self)
    }

    /// Components this network must be registered as depending on.
    pub fn injection_sources(&self) -> impl Iterator<Item = &str> {
        self.injection_sources.iter().map(|(source, _)| source.as_str())
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Direct edits bypass the scheduler; invalidate the component afterwards.
    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn tap_changers(&self) -> &[TapChanger] {
        &self.tap_changers
    }

    pub fn solution(&self) -> Option<&PowerFlowSolution> {
        self.solution.as_ref()
    }

    // Swaps last round's source contributions for the current ones, leaving
    // the rest of each bus injection alone.
    fn apply_injections(&mut self, ctx: &UpdateContext<'_>) -> Result<()> {
        let mut contributions: HashMap<String, Complex64> = HashMap::new();
        for (source, bus_id) in &self.injection_sources {
            let power = ctx.value_of(source)?.as_power().ok_or_else(|| {
                Error::Configuration(format!(
                    "injection source {} does not publish power",
                    source
                ))
            })?;
            *contributions.entry(bus_id.clone()).or_default() += power;
        }

        let mut touched: Vec<String> = contributions
            .keys()
            .chain(self.source_injections.keys())
            .cloned()
            .collect();
        touched.sort();
        touched.dedup();
        for bus_id in touched {
            let previous = self.source_injections.get(&bus_id).copied().unwrap_or_default();
            let next = contributions.get(&bus_id).copied().unwrap_or_default();
            if previous == next {
                continue;
            }
            let Some(bus) = self.network.bus(&bus_id) else {
                continue;
            };
            let injection = bus.injection - previous + next;
            self.network.set_injection(&bus_id, injection)?;
            // `source_injections` mirrors what each bus currently holds
            self.source_injections.insert(bus_id, next);
        }
        self.source_injections = contributions;
        Ok(())
    }

    // One pass of every tap changer; true if any tap moved.
    fn step_taps(&mut self, solution: &PowerFlowSolution) -> Result<bool> {
        let mut stepped = false;
        for tap_changer in &mut self.tap_changers {
            let v_mag = solution
                .voltage(&tap_changer.controlled_bus)
                .map(|v| v.norm())
                .ok_or_else(|| {
                    Error::Configuration(format!(
                        "bus {} missing from solution",
                        tap_changer.controlled_bus
                    ))
                })?;
            let tap = self.network.tap_mut(&tap_changer.transformer).ok_or_else(|| {
                Error::Configuration(format!(
                    "transformer {} missing from network",
                    tap_changer.transformer
                ))
            })?;
            stepped |= tap_changer.evaluate(v_mag, tap).stepped();
        }
        Ok(stepped)
    }
}

impl SimComponent for NetworkComponent {
    fn update(&mut self, ctx: &UpdateContext<'_>) -> Result<Update> {
        self.apply_injections(ctx)?;

        let mut round = 0;
        let solution = loop {
            let solution = self.network.solve(&self.solver, self.solution.as_ref())?;
            if round == self.max_tap_iterations {
                warn!(
                    "t={} {}: taps still moving after {} rounds",
                    ctx.time(),
                    ctx.id(),
                    round
                );
                break solution;
            }
            let stepped = self.step_taps(&solution)?;
            self.solution = Some(solution.clone());
            if !stepped {
                break solution;
            }
            round += 1;
        };
        if round > 0 {
            info!("t={} {}: settled after {} tap rounds", ctx.time(), ctx.id(), round);
        }

        let voltages = solution
            .bus_ids
            .iter()
            .cloned()
            .zip(solution.voltages.iter().copied())
            .collect();
        self.solution = Some(solution);
        Ok(Update::new(Value::Voltages(voltages), SimTime::INFINITY))
    }

    any_component!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{Bus, BusType};
    use crate::simulation::Simulation;
    use crate::transformer::{TapSettings, Transformer, WindingConnection};

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    #[test]
    fn clock_ticks_on_period_boundaries() {
        let mut sim = Simulation::new(SimTime(7));
        sim.register("clock", Clock::new(10).unwrap(), &[]).unwrap();
        sim.evaluate_pending().unwrap();
        assert_eq!(sim.value_of("clock").unwrap(), &Value::Tick(0));
        assert_eq!(sim.valid_until("clock"), Some(SimTime(10)));

        sim.advance_to(SimTime(30)).unwrap();
        assert_eq!(sim.value_of("clock").unwrap(), &Value::Tick(3));
        assert_eq!(sim.valid_until("clock"), Some(SimTime(40)));
        assert!(Clock::new(0).is_err());
    }

    #[test]
    fn clock_handles_negative_time() {
        let mut sim = Simulation::new(SimTime(-5));
        sim.register("clock", Clock::new(10).unwrap(), &[]).unwrap();
        sim.evaluate_pending().unwrap();
        assert_eq!(sim.value_of("clock").unwrap(), &Value::Tick(-1));
        assert_eq!(sim.valid_until("clock"), Some(SimTime(0)));
    }

    #[test]
    fn stepwise_series_holds_values_between_breakpoints() {
        let series = StepwiseSeries::scalar(1.0, vec![(SimTime(10), 2.0), (SimTime(20), 3.0)]).unwrap();
        let mut sim = Simulation::new(SimTime(0));
        sim.register("profile", series, &[]).unwrap();

        sim.evaluate_pending().unwrap();
        assert_eq!(sim.value_of("profile").unwrap(), &Value::Scalar(1.0));
        assert_eq!(sim.valid_until("profile"), Some(SimTime(10)));

        sim.advance_to(SimTime(15)).unwrap();
        assert_eq!(sim.value_of("profile").unwrap(), &Value::Scalar(2.0));
        assert_eq!(sim.valid_until("profile"), Some(SimTime(20)));

        sim.advance_to(SimTime(25)).unwrap();
        assert_eq!(sim.value_of("profile").unwrap(), &Value::Scalar(3.0));
        assert_eq!(sim.valid_until("profile"), Some(SimTime::INFINITY));
    }

    #[test]
    fn stepwise_series_rejects_unordered_points() {
        assert!(StepwiseSeries::scalar(0.0, vec![(SimTime(10), 1.0), (SimTime(10), 2.0)]).is_err());
        assert!(StepwiseSeries::scalar(0.0, vec![(SimTime::INFINITY, 1.0)]).is_err());
    }

    #[test]
    fn load_profile_publishes_negative_injection() {
        let load = StepwiseSeries::load(vec![(SimTime(0), c(0.5, 0.1))]).unwrap();
        assert_eq!(load.value_at(SimTime(-1)), &Value::Power(c(0.0, 0.0)));
        assert_eq!(load.value_at(SimTime(0)), &Value::Power(c(-0.5, -0.1)));
    }

    #[test]
    fn battery_charges_until_full() {
        let mut battery = Battery::new(10.0, 5.0, 5.0, 1.0).unwrap();
        battery.set_requested_power(5.0);
        let mut sim = Simulation::new(SimTime(0));
        sim.register("battery", battery, &[]).unwrap();

        sim.evaluate_pending().unwrap();
        // 5 kWh of room at 5 kW is one hour.
        assert_eq!(sim.valid_until("battery"), Some(SimTime(3600)));
        assert_eq!(sim.value_of("battery").unwrap(), &Value::Power(c(-0.005, 0.0)));

        sim.advance_to(SimTime(7200)).unwrap();
        let battery = sim.component::<Battery>("battery").unwrap();
        assert!((battery.charge_kwh() - 10.0).abs() < 1e-9);
        assert_eq!(battery.power_kw(), 0.0);
        assert_eq!(sim.valid_until("battery"), Some(SimTime::INFINITY));
        assert_eq!(sim.value_of("battery").unwrap(), &Value::Power(c(0.0, 0.0)));
    }

    #[test]
    fn battery_follows_setpoint_source() {
        let setpoint = StepwiseSeries::scalar(0.0, vec![(SimTime(100), -2.0)]).unwrap();
        let battery = Battery::new(4.0, 2.0, 4.0, 1.0)
            .unwrap()
            .with_efficiencies(1.0, 0.5)
            .unwrap()
            .with_setpoint_source("setpoint");
        let mut sim = Simulation::new(SimTime(0));
        sim.register("setpoint", setpoint, &[]).unwrap();
        sim.register("battery", battery, &["setpoint"]).unwrap();

        sim.advance_to(SimTime(50)).unwrap();
        assert_eq!(sim.valid_until("battery"), Some(SimTime::INFINITY));

        sim.advance_to(SimTime(100)).unwrap();
        // 4 kWh drained at 2 kW / 0.5 = 4 kW: one hour.
        assert_eq!(sim.valid_until("battery"), Some(SimTime(3700)));
        assert_eq!(sim.last_updated("battery"), Some(SimTime(100)));

        sim.advance_to(SimTime(4000)).unwrap();
        let battery = sim.component::<Battery>("battery").unwrap();
        assert!(battery.charge_kwh().abs() < 1e-9);
        assert_eq!(battery.power_kw(), 0.0);
    }

    #[test]
    fn battery_rejects_implausible_ratings() {
        assert!(Battery::new(0.0, 1.0, 0.0, 1.0).is_err());
        assert!(Battery::new(1.0, 1.0, 2.0, 1.0).is_err());
        assert!(Battery::new(1.0, 1.0, 0.5, 1.0)
            .unwrap()
            .with_efficiencies(1.5, 1.0)
            .is_err());
    }

    fn tapped_feeder() -> Network {
        let mut net = Network::new("feeder", 100.0, 60.0);
        net.add_bus(Bus::new("HV", BusType::Slack, 33.0)).unwrap();
        net.add_bus(Bus::new("LV", BusType::PQ, 11.0).with_injection(c(-1.0, -0.5)))
            .unwrap();
        net.add_transformer(
            Transformer::new("T1", "HV", "LV", WindingConnection::WyeWye, c(0.0, 0.08))
                .with_tap(TapSettings::new(0, -8, 8, 0.0125).unwrap()),
        )
        .unwrap();
        net
    }

    #[test]
    fn network_component_settles_taps_at_one_instant() {
        let config = SimulationConfig::default();
        let grid = NetworkComponent::new(tapped_feeder(), &config)
            .with_tap_changer(TapChanger::new("T1", "LV", 0.98, 1.02).unwrap())
            .unwrap();
        let mut sim = Simulation::new(SimTime(0));
        sim.register("grid", grid, &[]).unwrap();
        assert_eq!(sim.evaluate_pending().unwrap(), 1);

        let grid = sim.component::<NetworkComponent>("grid").unwrap();
        let v_lv = grid.solution().unwrap().voltage("LV").unwrap().norm();
        assert!((0.98..=1.02).contains(&v_lv), "|V| = {}", v_lv);
        assert!(grid.network().transformer("T1").unwrap().tap.position() > 0);
        assert_eq!(
            sim.value_of("grid").unwrap().voltage("LV").map(|v| v.norm()),
            Some(v_lv)
        );
    }

    #[test]
    fn network_component_sums_injection_sources() {
        let config = SimulationConfig::default();
        let mut net = tapped_feeder();
        net.set_injection("LV", c(0.0, 0.0)).unwrap();
        let grid = NetworkComponent::new(net, &config)
            .with_injection_source("load", "LV")
            .unwrap();
        let load = StepwiseSeries::load(vec![(SimTime(10), c(0.4, 0.1))]).unwrap();

        let mut sim = Simulation::new(SimTime(0));
        sim.register("load", load, &[]).unwrap();
        sim.register("grid", grid, &["load"]).unwrap();

        sim.evaluate_pending().unwrap();
        let unloaded = sim.value_of("grid").unwrap().voltage("LV").unwrap();
        assert!((unloaded.norm() - 1.0).abs() < 1e-6);

        sim.advance_to(SimTime(10)).unwrap();
        let grid = sim.component::<NetworkComponent>("grid").unwrap();
        assert_eq!(grid.network().bus("LV").unwrap().injection, c(-0.4, -0.1));
        let loaded = sim.value_of("grid").unwrap().voltage("LV").unwrap();
        assert!(loaded.norm() < unloaded.norm());
    }

    #[test]
    fn direct_injection_edits_survive_source_updates() {
        let config = SimulationConfig::default();
        let grid = NetworkComponent::new(tapped_feeder(), &config)
            .with_injection_source("load", "LV")
            .unwrap();
        let load = StepwiseSeries::load(vec![
            (SimTime(0), c(0.2, 0.0)),
            (SimTime(10), c(0.4, 0.0)),
        ])
        .unwrap();

        let mut sim = Simulation::new(SimTime(0));
        sim.register("load", load, &[]).unwrap();
        sim.register("grid", grid, &["load"]).unwrap();
        sim.evaluate_pending().unwrap();
        let heavy = sim.value_of("grid").unwrap().voltage("LV").unwrap().norm();

        // A hand edit holds; later source changes apply on top of it.
        sim.component_mut::<NetworkComponent>("grid")
            .unwrap()
            .network_mut()
            .set_injection("LV", c(-0.5, -0.2))
            .unwrap();
        sim.invalidate("grid").unwrap();
        sim.evaluate_pending().unwrap();
        let grid = sim.component::<NetworkComponent>("grid").unwrap();
        assert_eq!(grid.network().bus("LV").unwrap().injection, c(-0.5, -0.2));
        let light = sim.value_of("grid").unwrap().voltage("LV").unwrap().norm();
        assert!(light > heavy);

        sim.advance_to(SimTime(10)).unwrap();
        let grid = sim.component::<NetworkComponent>("grid").unwrap();
        let injection = grid.network().bus("LV").unwrap().injection;
        assert!((injection - c(-0.7, -0.2)).norm() < 1e-12);
    }

    #[test]
    fn tap_changer_on_unknown_transformer_is_rejected() {
        let config = SimulationConfig::default();
        let grid = NetworkComponent::new(tapped_feeder(), &config);
        assert!(grid
            .with_tap_changer(TapChanger::new("T9", "LV", 0.98, 1.02).unwrap())
            .is_err());
    }
}
