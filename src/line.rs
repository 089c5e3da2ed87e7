//! Underground cable impedance from geometry and materials.
//!
//! Three single-core cables laid in trefoil at a common centre spacing. Self and
//! mutual impedances of the phase conductors and their shields come from the
//! modified Carson's equations in metric form (ohm/km, distances in metres).
//! The shields are grounded at both ends, so they are Kron-reduced away and the
//! positive-sequence impedance is taken from the resulting 3x3 phase matrix.

use log::debug;
use nalgebra::DMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Annealed copper at 20 degC, ohm metre.
const COPPER_RESISTIVITY: f64 = 1.7241e-8;
/// Carson's earth-return constant for distances in metres.
const CARSON_CONSTANT: f64 = 6.4904;

const MAX_STRANDS: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Conductor {
    pub radius_m: f64,
    pub gmr_m: f64,
    pub resistance_ohm_per_km: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shield {
    None,
    TapeShield {
        outer_radius_m: f64,
        thickness_m: f64,
    },
    ConcentricNeutral {
        strands: u32,
        strand_radius_m: f64,
        strand_gmr_m: f64,
        strand_resistance_ohm_per_km: f64,
        /// Radius of the circle through the strand centres.
        circle_radius_m: f64,
    },
}

/// Equivalent single conductor replacing a shield: (gmr, resistance ohm/km, radius to phase centre).
struct ShieldEquivalent {
    gmr: f64,
    resistance: f64,
    radius: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UndergroundLine {
    pub id: String,
    pub from_bus: String,
    pub to_bus: String,
    pub length_km: f64,
    /// Centre-to-centre distance between the three cables.
    pub phase_spacing_m: f64,
    pub conductor: Conductor,
    pub shield: Shield,
    #[serde(default = "default_earth_resistivity")]
    pub earth_resistivity: f64,
    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,
}

fn default_earth_resistivity() -> f64 {
    100.0
}

fn default_frequency() -> f64 {
    60.0
}

impl UndergroundLine {
    /// Outermost radius of one cable, used for the spacing check.
    fn outer_radius(&self) -> f64 {
        match self.shield {
            Shield::None => self.conductor.radius_m,
            Shield::TapeShield { outer_radius_m, .. } => outer_radius_m,
            Shield::ConcentricNeutral {
                strand_radius_m,
                circle_radius_m,
                ..
            } => circle_radius_m + strand_radius_m,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let entity = format!("line {}", self.id);
        let positive = |value: f64, what: &str| -> Result<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::validation(
                    entity.clone(),
                    format!("{} must be positive, got {}", what, value),
                ))
            }
        };

        positive(self.length_km, "length")?;
        positive(self.conductor.radius_m, "conductor radius")?;
        positive(self.conductor.gmr_m, "conductor GMR")?;
        positive(self.conductor.resistance_ohm_per_km, "conductor resistance")?;
        positive(self.earth_resistivity, "earth resistivity")?;
        positive(self.frequency_hz, "frequency")?;
        positive(self.phase_spacing_m, "phase spacing")?;
        if self.conductor.gmr_m > self.conductor.radius_m {
            return Err(Error::validation(
                entity,
                "conductor GMR exceeds conductor radius",
            ));
        }

        match self.shield {
            Shield::None => {}
            Shield::TapeShield {
                outer_radius_m,
                thickness_m,
            } => {
                positive(outer_radius_m, "tape shield radius")?;
                positive(thickness_m, "tape shield thickness")?;
                if outer_radius_m <= self.conductor.radius_m {
                    return Err(Error::validation(
                        entity,
                        "tape shield must enclose the phase conductor",
                    ));
                }
                if thickness_m >= outer_radius_m {
                    return Err(Error::validation(
                        entity,
                        "tape shield thickness exceeds its radius",
                    ));
                }
            }
            Shield::ConcentricNeutral {
                strands,
                strand_radius_m,
                strand_gmr_m,
                strand_resistance_ohm_per_km,
                circle_radius_m,
            } => {
                if strands == 0 || strands > MAX_STRANDS {
                    return Err(Error::validation(
                        entity,
                        format!(
                            "concentric neutral needs 1 to {} strands, got {}",
                            MAX_STRANDS, strands
                        ),
                    ));
                }
                positive(strand_radius_m, "strand radius")?;
                positive(strand_gmr_m, "strand GMR")?;
                positive(strand_resistance_ohm_per_km, "strand resistance")?;
                positive(circle_radius_m, "neutral circle radius")?;
                if strand_gmr_m > strand_radius_m {
                    return Err(Error::validation(entity, "strand GMR exceeds strand radius"));
                }
                if circle_radius_m <= self.conductor.radius_m {
                    return Err(Error::validation(
                        entity,
                        "neutral strands must lie outside the phase conductor",
                    ));
                }
            }
        }

        if self.phase_spacing_m <= 2.0 * self.outer_radius() {
            return Err(Error::validation(
                entity,
                format!(
                    "phase spacing {} m does not clear cable radius {} m",
                    self.phase_spacing_m,
                    self.outer_radius()
                ),
            ));
        }
        Ok(())
    }

    fn shield_equivalent(&self) -> Option<ShieldEquivalent> {
        match self.shield {
            Shield::None => None,
            Shield::TapeShield {
                outer_radius_m,
                thickness_m,
            } => {
                let mean_radius = outer_radius_m - thickness_m / 2.0;
                Some(ShieldEquivalent {
                    gmr: mean_radius,
                    resistance: 1000.0 * COPPER_RESISTIVITY / (2.0 * PI * mean_radius * thickness_m),
                    radius: mean_radius,
                })
            }
            Shield::ConcentricNeutral {
                strands,
                strand_gmr_m,
                strand_resistance_ohm_per_km,
                circle_radius_m,
                ..
            } => {
                let k = f64::from(strands);
                // (gmr_s k R^(k-1))^(1/k), factored to stay representable for large k
                Some(ShieldEquivalent {
                    gmr: circle_radius_m * (strand_gmr_m * k / circle_radius_m).powf(1.0 / k),
                    resistance: strand_resistance_ohm_per_km / k,
                    radius: circle_radius_m,
                })
            }
        }
    }

    fn carson_self(&self, resistance: f64, gmr: f64) -> Complex64 {
        let f = self.frequency_hz;
        Complex64::new(
            resistance + PI * PI * 1e-4 * f,
            4.0 * PI * 1e-4 * f
                * ((1.0 / gmr).ln() + CARSON_CONSTANT + 0.5 * (self.earth_resistivity / f).ln()),
        )
    }

    fn carson_mutual(&self, distance: f64) -> Complex64 {
        let f = self.frequency_hz;
        Complex64::new(
            PI * PI * 1e-4 * f,
            4.0 * PI * 1e-4 * f
                * ((1.0 / distance).ln()
                    + CARSON_CONSTANT
                    + 0.5 * (self.earth_resistivity / f).ln()),
        )
    }

    /// Kron-reduced 3x3 phase impedance matrix in ohm/km.
    pub fn phase_impedance_matrix(&self) -> Result<DMatrix<Complex64>> {
        self.validate()?;
        let d = self.phase_spacing_m;
        let zp = self.carson_self(self.conductor.resistance_ohm_per_km, self.conductor.gmr_m);
        let zm = self.carson_mutual(d);
        let z_phase = DMatrix::from_fn(3, 3, |i, j| if i == j { zp } else { zm });

        let Some(shield) = self.shield_equivalent() else {
            return Ok(z_phase);
        };

        let zs = self.carson_self(shield.resistance, shield.gmr);
        // phase to the shields of the other two cables
        let d_cross = match self.shield {
            Shield::ConcentricNeutral { strands, .. } => {
                let k = f64::from(strands);
                d * (1.0 - (shield.radius / d).powf(k)).powf(1.0 / k)
            }
            _ => d,
        };
        let z_own = self.carson_mutual(shield.radius);
        let z_cross = self.carson_mutual(d_cross);
        let z_pn = DMatrix::from_fn(3, 3, |i, j| if i == j { z_own } else { z_cross });
        let z_nn = DMatrix::from_fn(3, 3, |i, j| if i == j { zs } else { zm });

        let z_nn_inv = z_nn.try_inverse().ok_or_else(|| {
            Error::validation(
                format!("line {}", self.id),
                "shield impedance matrix is singular",
            )
        })?;
        Ok(&z_phase - &z_pn * z_nn_inv * z_pn.transpose())
    }

    /// Positive-sequence series impedance in ohm/km.
    pub fn positive_sequence_per_km(&self) -> Result<Complex64> {
        let z = self.phase_impedance_matrix()?;
        let self_avg = (z[(0, 0)] + z[(1, 1)] + z[(2, 2)]) / 3.0;
        let mutual_avg = (z[(0, 1)] + z[(1, 2)] + z[(2, 0)]) / 3.0;
        Ok(self_avg - mutual_avg)
    }

    /// Total positive-sequence series impedance in ohms.
    pub fn impedance_ohms(&self) -> Result<Complex64> {
        let z1 = self.positive_sequence_per_km()?;
        debug!(
            "line {}: z1 = {:.6}{:+.6}j ohm/km over {} km",
            self.id, z1.re, z1.im, self.length_km
        );
        Ok(z1 * self.length_km)
    }
}
