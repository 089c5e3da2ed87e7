use log::{debug, info};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::admittance::{Element, Stamp};
use crate::description::NetworkDescription;
use crate::error::{Error, Result};
use crate::line::UndergroundLine;
use crate::transformer::{TapSettings, ThreeWindingTransformer, Transformer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BusType {
    Slack, // slack, swing, Vd, reference bus
    PQ,    // load bus
    PV,    // generator bus
}

impl fmt::Display for BusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusType::Slack => write!(f, "REF"),
            BusType::PQ => write!(f, "P-Q"),
            BusType::PV => write!(f, "P-V"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bus {
    // Identifiers
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub bus_type: BusType,
    pub base_kv: f64,

    // Voltage setpoint (Slack: magnitude and angle, PV: magnitude)
    #[serde(default = "unit_voltage")]
    pub v_setpoint: f64,
    #[serde(default)]
    pub angle_setpoint: f64,

    /// Net injected complex power in per unit (generation minus load).
    #[serde(default)]
    pub injection: Complex64,
    /// Constant-current part of the injection: per-unit power at `|V| = 1`,
    /// scaling linearly with `|V|`.
    #[serde(default)]
    pub current: Complex64,
    /// Shunt admittance to ground in per unit.
    #[serde(default)]
    pub shunt: Complex64,

    // Limits
    #[serde(default = "default_v_min")]
    pub v_min: f64,
    #[serde(default = "default_v_max")]
    pub v_max: f64,
}

fn unit_voltage() -> f64 {
    1.0
}

fn default_v_min() -> f64 {
    0.9
}

fn default_v_max() -> f64 {
    1.1
}

fn default_in_service() -> bool {
    true
}

impl Bus {
    pub fn new(id: impl Into<String>, bus_type: BusType, base_kv: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            bus_type,
            base_kv,
            v_setpoint: 1.0,
            angle_setpoint: 0.0,
            injection: Complex64::new(0.0, 0.0),
            current: Complex64::new(0.0, 0.0),
            shunt: Complex64::new(0.0, 0.0),
            v_min: default_v_min(),
            v_max: default_v_max(),
        }
    }

    pub fn with_injection(mut self, injection: Complex64) -> Self {
        self.injection = injection;
        self
    }

    pub fn with_current(mut self, current: Complex64) -> Self {
        self.current = current;
        self
    }

    pub fn with_setpoint(mut self, magnitude: f64, angle: f64) -> Self {
        self.v_setpoint = magnitude;
        self.angle_setpoint = angle;
        self
    }

    pub fn with_shunt(mut self, shunt: Complex64) -> Self {
        self.shunt = shunt;
        self
    }

    /// Voltage the solver holds fixed (Slack) or starts from (PV, PQ).
    pub fn setpoint_voltage(&self) -> Complex64 {
        match self.bus_type {
            BusType::Slack => Complex64::from_polar(self.v_setpoint, self.angle_setpoint),
            BusType::PV => Complex64::new(self.v_setpoint, 0.0),
            BusType::PQ => Complex64::new(1.0, 0.0),
        }
    }

    fn validate(&self) -> Result<()> {
        let entity = format!("bus {}", self.id);
        if self.id.trim().is_empty() {
            return Err(Error::validation("bus", "identifier must not be empty"));
        }
        if !self.base_kv.is_finite() || self.base_kv <= 0.0 {
            return Err(Error::validation(
                entity,
                format!("base voltage must be positive, got {} kV", self.base_kv),
            ));
        }
        if !self.v_setpoint.is_finite() || self.v_setpoint <= 0.0 {
            return Err(Error::validation(
                entity,
                format!("voltage setpoint must be positive, got {}", self.v_setpoint),
            ));
        }
        if !self.angle_setpoint.is_finite() {
            return Err(Error::validation(entity, "angle setpoint must be finite"));
        }
        if !(self.v_min < self.v_max) {
            return Err(Error::validation(
                entity,
                format!("voltage limits [{}, {}] are inverted", self.v_min, self.v_max),
            ));
        }
        if !is_finite(self.injection) || !is_finite(self.current) || !is_finite(self.shunt) {
            return Err(Error::validation(entity, "injection, current and shunt must be finite"));
        }
        Ok(())
    }
}

impl fmt::Display for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Bus {:<10} {:<14} {:>5} {:>8.2} kV  Vset={:.4}  S={:.4}{:+.4}j",
            self.id,
            self.name,
            self.bus_type,
            self.base_kv,
            self.v_setpoint,
            self.injection.re,
            self.injection.im
        )
    }
}

/// Two-terminal pi-model line or cable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    // Identifiers
    pub id: String,
    pub from_bus: String,
    pub to_bus: String,
    #[serde(default = "default_in_service")]
    pub in_service: bool,

    // Impedance data, per unit
    pub impedance: Complex64,
    #[serde(default)]
    pub from_shunt: Complex64,
    #[serde(default)]
    pub to_shunt: Complex64,
}

impl Branch {
    pub fn new(
        id: impl Into<String>,
        from_bus: impl Into<String>,
        to_bus: impl Into<String>,
        impedance: Complex64,
    ) -> Self {
        Self {
            id: id.into(),
            from_bus: from_bus.into(),
            to_bus: to_bus.into(),
            in_service: true,
            impedance,
            from_shunt: Complex64::new(0.0, 0.0),
            to_shunt: Complex64::new(0.0, 0.0),
        }
    }

    /// Splits a total line charging admittance evenly over both ends.
    pub fn with_charging(mut self, total: Complex64) -> Self {
        self.from_shunt = total / 2.0;
        self.to_shunt = total / 2.0;
        self
    }
}

impl Element for Branch {
    fn id(&self) -> &str {
        &self.id
    }

    fn endpoints(&self) -> (&str, &str) {
        (&self.from_bus, &self.to_bus)
    }

    fn in_service(&self) -> bool {
        self.in_service
    }

    fn validate(&self) -> Result<()> {
        let z = self.impedance.norm();
        if !z.is_finite() || z == 0.0 {
            return Err(Error::validation(
                format!("branch {}", self.id),
                "series impedance must be finite and non-zero",
            ));
        }
        if !is_finite(self.from_shunt) || !is_finite(self.to_shunt) {
            return Err(Error::validation(
                format!("branch {}", self.id),
                "shunt admittance must be finite",
            ));
        }
        Ok(())
    }

    fn stamp(&self) -> Stamp {
        let y = 1.0 / self.impedance;
        Stamp {
            yff: y + self.from_shunt,
            yft: -y,
            ytf: -y,
            ytt: y + self.to_shunt,
        }
    }

    fn losses(&self, v_from: Complex64, v_to: Complex64) -> Complex64 {
        let dv = v_from - v_to;
        dv * (dv / self.impedance).conj()
            + v_from.norm_sqr() * self.from_shunt.conj()
            + v_to.norm_sqr() * self.to_shunt.conj()
    }
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line {:<12} {:>8} -> {:<8}  R={:>10.6}  X={:>10.6}  In service: {}",
            self.id,
            self.from_bus,
            self.to_bus,
            self.impedance.re,
            self.impedance.im,
            self.in_service,
        )
    }
}

fn is_finite(z: Complex64) -> bool {
    z.re.is_finite() && z.im.is_finite()
}

/// Immutable view of the store handed to the admittance assembler.
#[derive(Debug, Clone)]
pub struct Topology {
    pub s_base: f64,
    pub buses: Vec<Bus>,
    pub branches: Vec<Branch>,
    pub transformers: Vec<Transformer>,
}

impl Topology {
    pub fn bus_index(&self, id: &str) -> Option<usize> {
        self.buses.iter().position(|bus| bus.id == id)
    }

    /// All in-service two-terminal elements, lines first.
    pub fn elements(&self) -> impl Iterator<Item = &dyn Element> {
        self.branches
            .iter()
            .map(|b| b as &dyn Element)
            .chain(self.transformers.iter().map(|t| t as &dyn Element))
            .filter(|e| e.in_service())
    }
}

/// Network topology store.
///
/// Deserialising goes through [`NetworkDescription`], so every entry is
/// validated and the bus index is rebuilt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "NetworkDescription")]
pub struct Network {
    #[serde(rename = "name")]
    pub case_name: String,
    pub s_base: f64,
    pub frequency: f64,

    buses: Vec<Bus>,
    branches: Vec<Branch>,
    transformers: Vec<Transformer>,
    #[serde(skip)]
    bus_map: HashMap<String, usize>, // bus id -> position in `buses`
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Case: {}  Sbase: {} MVA  Frequency: {} Hz",
            self.case_name, self.s_base, self.frequency
        )?;
        writeln!(
            f,
            "{} buses, {} branches, {} transformers\n",
            self.buses.len(),
            self.branches.len(),
            self.transformers.len(),
        )?;

        writeln!(f, "=== Buses ===")?;
        for bus in &self.buses {
            writeln!(f, "  {}", bus)?;
        }

        writeln!(f, "\n=== Branches ===")?;
        for branch in &self.branches {
            writeln!(f, "  {}", branch)?;
        }

        if !self.transformers.is_empty() {
            writeln!(f, "\n=== Transformers ===")?;
            for transformer in &self.transformers {
                writeln!(f, "  {}", transformer)?;
            }
        }

        Ok(())
    }
}

impl Network {
    // New case
    pub fn new(case_name: impl Into<String>, s_base: f64, frequency: f64) -> Self {
        Self {
            case_name: case_name.into(),
            s_base,
            frequency,
            buses: Vec::new(),
            branches: Vec::new(),
            transformers: Vec::new(),
            bus_map: HashMap::new(),
        }
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn transformers(&self) -> &[Transformer] {
        &self.transformers
    }

    pub fn bus(&self, id: &str) -> Option<&Bus> {
        self.bus_map.get(id).map(|&idx| &self.buses[idx])
    }

    pub fn transformer(&self, id: &str) -> Option<&Transformer> {
        self.transformers.iter().find(|t| t.id == id)
    }

    pub fn tap_mut(&mut self, transformer_id: &str) -> Option<&mut TapSettings> {
        self.transformers
            .iter_mut()
            .find(|t| t.id == transformer_id)
            .map(|t| &mut t.tap)
    }

    pub fn add_bus(&mut self, bus: Bus) -> Result<()> {
        bus.validate()?;
        if self.bus_map.contains_key(&bus.id) {
            return Err(Error::validation(
                format!("bus {}", bus.id),
                "duplicate bus identifier",
            ));
        }
        debug!("Adding {}", bus);
        self.bus_map.insert(bus.id.clone(), self.buses.len());
        self.buses.push(bus);
        Ok(())
    }

    pub fn add_branch(&mut self, branch: Branch) -> Result<()> {
        self.check_element(&branch, "branch")?;
        debug!("Adding {}", branch);
        self.branches.push(branch);
        Ok(())
    }

    pub fn add_transformer(&mut self, transformer: Transformer) -> Result<()> {
        self.check_element(&transformer, "transformer")?;
        debug!(
            "Adding {} ({} neutral)",
            transformer,
            if transformer.connection.grounded_neutral() { "grounded" } else { "floating" }
        );
        self.transformers.push(transformer);
        Ok(())
    }

    /// Adds the star bus and three legs, or nothing at all.
    pub fn add_three_winding_transformer(&mut self, xfmr: ThreeWindingTransformer) -> Result<()> {
        let primary = self.bus(&xfmr.primary).ok_or_else(|| {
            Error::validation(
                format!("transformer {}", xfmr.id),
                format!("primary bus {} does not exist", xfmr.primary),
            )
        })?;
        let star = Bus::new(xfmr.star_bus_id(), BusType::PQ, primary.base_kv);

        let mut staged = self.clone();
        staged.add_bus(star)?;
        for leg in xfmr.legs() {
            staged.add_transformer(leg)?;
        }
        *self = staged;
        Ok(())
    }

    /// Derives the cable impedance on the from-bus base and adds it as a branch.
    pub fn add_underground_line(&mut self, line: &UndergroundLine) -> Result<()> {
        let base_kv = self
            .bus(&line.from_bus)
            .ok_or_else(|| {
                Error::validation(
                    format!("line {}", line.id),
                    format!("from bus {} does not exist", line.from_bus),
                )
            })?
            .base_kv;
        let z_base = base_kv * base_kv / self.s_base;
        let impedance = line.impedance_ohms()? / z_base;
        self.add_branch(Branch::new(
            line.id.clone(),
            line.from_bus.clone(),
            line.to_bus.clone(),
            impedance,
        ))
    }

    pub fn set_injection(&mut self, bus_id: &str, injection: Complex64) -> Result<()> {
        if !is_finite(injection) {
            return Err(Error::validation(
                format!("bus {}", bus_id),
                "injection must be finite",
            ));
        }
        let idx = *self.bus_map.get(bus_id).ok_or_else(|| {
            Error::validation(format!("bus {}", bus_id), "bus does not exist")
        })?;
        self.buses[idx].injection = injection;
        Ok(())
    }

    pub fn set_tap_position(&mut self, transformer_id: &str, position: i32) -> Result<()> {
        let tap = self.tap_mut(transformer_id).ok_or_else(|| {
            Error::validation(
                format!("transformer {}", transformer_id),
                "transformer does not exist",
            )
        })?;
        tap.set_position(position)
    }

    pub fn topology(&self) -> Topology {
        Topology {
            s_base: self.s_base,
            buses: self.buses.clone(),
            branches: self.branches.clone(),
            transformers: self.transformers.clone(),
        }
    }

    pub fn summary(&self) {
        info!(
            "{}: {} buses, {} branches, {} transformers",
            self.case_name,
            self.buses.len(),
            self.branches.len(),
            self.transformers.len()
        );
    }

    fn check_element(&self, element: &dyn Element, kind: &str) -> Result<()> {
        let entity = format!("{} {}", kind, element.id());
        let taken = self.branches.iter().any(|b| b.id == element.id())
            || self.transformers.iter().any(|t| t.id == element.id());
        if taken {
            return Err(Error::validation(entity, "duplicate element identifier"));
        }
        let (from, to) = element.endpoints();
        for endpoint in [from, to] {
            if !self.bus_map.contains_key(endpoint) {
                return Err(Error::validation(
                    entity,
                    format!("endpoint bus {} does not exist", endpoint),
                ));
            }
        }
        if from == to {
            return Err(Error::validation(entity, "both endpoints are the same bus"));
        }
        element.validate()
    }
}
