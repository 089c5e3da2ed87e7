use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::FRAC_PI_6;
use std::fmt;

use crate::admittance::{Element, Stamp};
use crate::error::{Error, Result};

/// Winding connection of a two-winding transformer bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindingConnection {
    DeltaDelta,
    DeltaGroundedWye,
    WyeWye,
    /// Two single-phase units in V-V; runs at 1/sqrt(3) of the closed bank's capacity.
    OpenDelta,
}

/// Terminal that carries the magnetizing branch in the positive-sequence stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    From,
    To,
}

impl WindingConnection {
    /// Angle by which the from-side voltage leads the to side in positive sequence.
    pub fn phase_shift(&self) -> f64 {
        match self {
            WindingConnection::DeltaGroundedWye => FRAC_PI_6,
            WindingConnection::DeltaDelta
            | WindingConnection::WyeWye
            | WindingConnection::OpenDelta => 0.0,
        }
    }

    /// Whether the connection offers a path to ground for zero-sequence current.
    pub fn grounded_neutral(&self) -> bool {
        matches!(
            self,
            WindingConnection::DeltaGroundedWye | WindingConnection::WyeWye
        )
    }

    /// Leakage impedance multiplier for the positive-sequence equivalent.
    pub fn impedance_scale(&self) -> f64 {
        match self {
            WindingConnection::OpenDelta => 3f64.sqrt(),
            _ => 1.0,
        }
    }

    /// Magnetizing current is drawn from the grounded winding when there is one.
    pub fn magnetizing_side(&self) -> Side {
        match self {
            WindingConnection::DeltaGroundedWye => Side::To,
            _ => Side::From,
        }
    }
}

impl fmt::Display for WindingConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindingConnection::DeltaDelta => write!(f, "D-D"),
            WindingConnection::DeltaGroundedWye => write!(f, "D-gY"),
            WindingConnection::WyeWye => write!(f, "Y-Y"),
            WindingConnection::OpenDelta => write!(f, "V-V"),
        }
    }
}

/// Discrete tap of an on-load tap changer.
///
/// The effective secondary boost is `1 + step * position`, so raising the
/// position raises the to-side voltage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TapSettings {
    position: i32,
    min: i32,
    max: i32,
    step: f64,
}

impl Default for TapSettings {
    fn default() -> Self {
        Self {
            position: 0,
            min: 0,
            max: 0,
            step: 0.0,
        }
    }
}

impl TapSettings {
    pub fn new(position: i32, min: i32, max: i32, step: f64) -> Result<Self> {
        let tap = Self {
            position,
            min,
            max,
            step,
        };
        tap.validate("tap")?;
        Ok(tap)
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn ratio(&self) -> f64 {
        1.0 + self.step * self.position as f64
    }

    pub fn at_max(&self) -> bool {
        self.position >= self.max
    }

    pub fn at_min(&self) -> bool {
        self.position <= self.min
    }

    /// Moves one step up; returns false when already at the upper bound.
    pub fn raise(&mut self) -> bool {
        if self.at_max() {
            return false;
        }
        self.position += 1;
        true
    }

    /// Moves one step down; returns false when already at the lower bound.
    pub fn lower(&mut self) -> bool {
        if self.at_min() {
            return false;
        }
        self.position -= 1;
        true
    }

    pub fn set_position(&mut self, position: i32) -> Result<()> {
        if position < self.min || position > self.max {
            return Err(Error::validation(
                "tap",
                format!(
                    "position {} outside [{}, {}]",
                    position, self.min, self.max
                ),
            ));
        }
        self.position = position;
        Ok(())
    }

    fn validate(&self, entity: &str) -> Result<()> {
        if self.min > self.max {
            return Err(Error::validation(
                entity,
                format!("tap bounds [{}, {}] are inverted", self.min, self.max),
            ));
        }
        if self.position < self.min || self.position > self.max {
            return Err(Error::validation(
                entity,
                format!(
                    "tap position {} outside [{}, {}]",
                    self.position, self.min, self.max
                ),
            ));
        }
        if !self.step.is_finite() {
            return Err(Error::validation(entity, "tap step must be finite"));
        }
        // raising must raise the to side; a fixed tap may have no step at all
        if self.step < 0.0 || (self.step == 0.0 && self.min != self.max) {
            return Err(Error::validation(
                entity,
                format!("tap step must be positive, got {}", self.step),
            ));
        }
        // every reachable position must keep a positive ratio
        let lowest = (1.0 + self.step * self.min as f64).min(1.0 + self.step * self.max as f64);
        if lowest <= 0.0 {
            return Err(Error::validation(
                entity,
                "tap range drives the turns ratio to zero or below",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transformer {
    // Identifiers
    pub id: String,
    pub from_bus: String,
    pub to_bus: String,
    pub connection: WindingConnection,
    #[serde(default = "default_in_service")]
    pub in_service: bool,

    // Electrical data, per unit
    /// Off-nominal turns ratio on the from side; its argument is an extra phase shift.
    #[serde(default = "unit_ratio")]
    pub nominal_ratio: Complex64,
    pub impedance: Complex64,
    #[serde(default)]
    pub magnetizing: Complex64,

    #[serde(default)]
    pub tap: TapSettings,
}

fn default_in_service() -> bool {
    true
}

fn unit_ratio() -> Complex64 {
    Complex64::new(1.0, 0.0)
}

impl Transformer {
    pub fn new(
        id: impl Into<String>,
        from_bus: impl Into<String>,
        to_bus: impl Into<String>,
        connection: WindingConnection,
        impedance: Complex64,
    ) -> Self {
        Self {
            id: id.into(),
            from_bus: from_bus.into(),
            to_bus: to_bus.into(),
            connection,
            in_service: true,
            nominal_ratio: unit_ratio(),
            impedance,
            magnetizing: Complex64::new(0.0, 0.0),
            tap: TapSettings::default(),
        }
    }

    pub fn with_ratio(mut self, ratio: Complex64) -> Self {
        self.nominal_ratio = ratio;
        self
    }

    pub fn with_tap(mut self, tap: TapSettings) -> Self {
        self.tap = tap;
        self
    }

    pub fn with_magnetizing(mut self, admittance: Complex64) -> Self {
        self.magnetizing = admittance;
        self
    }

    /// Complex ratio `a` such that the ideal transformer maps `V_from / a` onto the to side.
    pub fn effective_ratio(&self) -> Complex64 {
        self.nominal_ratio * Complex64::from_polar(1.0, self.connection.phase_shift())
            / self.tap.ratio()
    }

    pub fn series_admittance(&self) -> Complex64 {
        1.0 / (self.impedance * self.connection.impedance_scale())
    }
}

impl Element for Transformer {
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
        let entity = format!("transformer {}", self.id);
        let ratio = self.nominal_ratio.norm();
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(Error::validation(
                entity,
                "turns ratio must have a strictly positive magnitude",
            ));
        }
        let z = self.impedance.norm();
        if !z.is_finite() || z == 0.0 {
            return Err(Error::validation(
                entity,
                "leakage impedance must be finite and non-zero",
            ));
        }
        if !self.magnetizing.re.is_finite() || !self.magnetizing.im.is_finite() {
            return Err(Error::validation(entity, "magnetizing admittance must be finite"));
        }
        self.tap.validate(&entity)
    }

    fn stamp(&self) -> Stamp {
        let y = self.series_admittance();
        let a = self.effective_ratio();
        let mut stamp = Stamp {
            yff: y / a.norm_sqr(),
            yft: -y / a.conj(),
            ytf: -y / a,
            ytt: y,
        };
        match self.connection.magnetizing_side() {
            Side::From => stamp.yff += self.magnetizing,
            Side::To => stamp.ytt += self.magnetizing,
        }
        stamp
    }

    fn losses(&self, v_from: Complex64, v_to: Complex64) -> Complex64 {
        let y = self.series_admittance();
        let dv = v_from / self.effective_ratio() - v_to;
        let shunt_v = match self.connection.magnetizing_side() {
            Side::From => v_from,
            Side::To => v_to,
        };
        dv * (y * dv).conj() + shunt_v.norm_sqr() * self.magnetizing.conj()
    }
}

impl fmt::Display for Transformer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Xfmr {:<12} {:>4} {:>8} -> {:<8} Z={:.5}{:+.5}j  Tap={:>3} [{}, {}]",
            self.id,
            self.connection,
            self.from_bus,
            self.to_bus,
            self.impedance.re,
            self.impedance.im,
            self.tap.position,
            self.tap.min,
            self.tap.max,
        )
    }
}

/// Three-winding transformer, expanded by the store into a star equivalent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreeWindingTransformer {
    pub id: String,
    pub primary: String,
    pub secondary: String,
    pub tertiary: String,
    pub connection: WindingConnection,
    #[serde(default = "unit_ratio")]
    pub nominal_ratio: Complex64,

    // Pairwise short-circuit impedances, per unit
    pub z_ps: Complex64,
    pub z_pt: Complex64,
    pub z_st: Complex64,

    #[serde(default)]
    pub tap: TapSettings,
}

impl ThreeWindingTransformer {
    pub fn star_bus_id(&self) -> String {
        format!("{}/star", self.id)
    }

    /// Delta-to-star conversion of the pairwise impedances: (primary, secondary, tertiary).
    pub fn star_impedances(&self) -> (Complex64, Complex64, Complex64) {
        (
            (self.z_ps + self.z_pt - self.z_st) / 2.0,
            (self.z_ps + self.z_st - self.z_pt) / 2.0,
            (self.z_pt + self.z_st - self.z_ps) / 2.0,
        )
    }

    /// The three star legs. The primary leg carries the connection, ratio and tap.
    pub fn legs(&self) -> [Transformer; 3] {
        let star = self.star_bus_id();
        let (zp, zs, zt) = self.star_impedances();
        [
            Transformer::new(
                format!("{}/p", self.id),
                self.primary.clone(),
                star.clone(),
                self.connection,
                zp,
            )
            .with_ratio(self.nominal_ratio)
            .with_tap(self.tap),
            Transformer::new(
                format!("{}/s", self.id),
                star.clone(),
                self.secondary.clone(),
                WindingConnection::WyeWye,
                zs,
            ),
            Transformer::new(
                format!("{}/t", self.id),
                star,
                self.tertiary.clone(),
                WindingConnection::WyeWye,
                zt,
            ),
        ]
    }
}
