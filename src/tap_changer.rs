use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transformer::TapSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TapState {
    Idle,
    Adjusting,
    AtLimit,
}

/// Outcome of one controller evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapAction {
    Hold,
    Raise,
    Lower,
    /// Out of band with the tap already at the bound that would help.
    Blocked,
}

impl TapAction {
    pub fn stepped(&self) -> bool {
        matches!(self, TapAction::Raise | TapAction::Lower)
    }
}

/// Voltage-band controller driving one transformer's tap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TapChanger {
    pub transformer: String,
    pub controlled_bus: String,
    low: f64,
    high: f64,
    #[serde(skip, default = "idle")]
    state: TapState,
}

fn idle() -> TapState {
    TapState::Idle
}

impl TapChanger {
    pub fn new(
        transformer: impl Into<String>,
        controlled_bus: impl Into<String>,
        low: f64,
        high: f64,
    ) -> Result<Self> {
        let transformer = transformer.into();
        if !(low.is_finite() && high.is_finite() && 0.0 < low && low < high) {
            return Err(Error::validation(
                format!("tap changer {}", transformer),
                format!("voltage band [{}, {}] is not a positive interval", low, high),
            ));
        }
        Ok(Self {
            transformer,
            controlled_bus: controlled_bus.into(),
            low,
            high,
            state: TapState::Idle,
        })
    }

    pub fn band(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    /// One decision: at most a single tap step toward the band.
    pub fn evaluate(&mut self, v_mag: f64, tap: &mut TapSettings) -> TapAction {
        let action = if v_mag < self.low {
            if tap.raise() {
                TapAction::Raise
            } else {
                TapAction::Blocked
            }
        } else if v_mag > self.high {
            if tap.lower() {
                TapAction::Lower
            } else {
                TapAction::Blocked
            }
        } else {
            TapAction::Hold
        };

        self.state = match action {
            TapAction::Hold => TapState::Idle,
            TapAction::Raise | TapAction::Lower => {
                debug!(
                    "{}: |V|={:.4} outside [{}, {}], tap -> {}",
                    self.transformer,
                    v_mag,
                    self.low,
                    self.high,
                    tap.position()
                );
                TapState::Adjusting
            }
            TapAction::Blocked => {
                if self.state != TapState::AtLimit {
                    warn!(
                        "{}: |V|={:.4} outside [{}, {}] with tap at limit {}",
                        self.transformer,
                        v_mag,
                        self.low,
                        self.high,
                        tap.position()
                    );
                }
                TapState::AtLimit
            }
        };
        action
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tap() -> TapSettings {
        TapSettings::new(0, -2, 2, 0.01).unwrap()
    }

    #[test]
    fn in_band_is_idempotent() {
        let mut tc = TapChanger::new("T1", "B", 0.98, 1.02).unwrap();
        let mut settings = tap();
        for _ in 0..5 {
            assert_eq!(tc.evaluate(1.0, &mut settings), TapAction::Hold);
        }
        assert_eq!(settings.position(), 0);
        assert_eq!(tc.state(), TapState::Idle);
    }

    #[test]
    fn low_voltage_raises_one_step_per_evaluation() {
        let mut tc = TapChanger::new("T1", "B", 0.98, 1.02).unwrap();
        let mut settings = tap();
        assert_eq!(tc.evaluate(0.95, &mut settings), TapAction::Raise);
        assert_eq!(settings.position(), 1);
        assert_eq!(tc.state(), TapState::Adjusting);
        assert_eq!(tc.evaluate(0.95, &mut settings), TapAction::Raise);
        assert_eq!(settings.position(), 2);
    }

    #[test]
    fn high_voltage_lowers_until_limit() {
        let mut tc = TapChanger::new("T1", "B", 0.98, 1.02).unwrap();
        let mut settings = tap();
        let actions: Vec<TapAction> = (0..4).map(|_| tc.evaluate(1.06, &mut settings)).collect();
        assert_eq!(
            actions,
            vec![
                TapAction::Lower,
                TapAction::Lower,
                TapAction::Blocked,
                TapAction::Blocked
            ]
        );
        assert_eq!(settings.position(), -2);
        assert_eq!(tc.state(), TapState::AtLimit);
    }

    #[test]
    fn returns_to_idle_once_in_band() {
        let mut tc = TapChanger::new("T1", "B", 0.98, 1.02).unwrap();
        let mut settings = tap();
        tc.evaluate(0.9, &mut settings);
        tc.evaluate(0.9, &mut settings);
        tc.evaluate(0.9, &mut settings);
        assert_eq!(tc.state(), TapState::AtLimit);
        assert_eq!(tc.evaluate(0.99, &mut settings), TapAction::Hold);
        assert_eq!(tc.state(), TapState::Idle);
        assert_eq!(settings.position(), 2);
    }

    #[test]
    fn band_must_be_ordered() {
        assert!(TapChanger::new("T1", "B", 1.02, 0.98).is_err());
        assert!(TapChanger::new("T1", "B", 0.0, 0.98).is_err());
    }
}
