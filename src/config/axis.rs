//! Axis configuration from TOML.

use heapless::String;
use serde::{Deserialize, Serialize};

use crate::backend::PinId;

use super::limits::AngleLimits;
use super::units::{Degrees, DegreesPerSec, DegreesPerSecSquared, Microsteps};

/// Logical pins driving one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct AxisPins {
    /// STEP input of the driver.
    pub step: PinId,
    /// DIR input of the driver.
    pub direction: PinId,
    /// EN input of the driver.
    pub enable: PinId,
    /// Home limit switch (input with pull-up). Absent means software homing.
    #[serde(default)]
    pub home_switch: Option<PinId>,
}

/// Home switch wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct HomeSwitchConfig {
    /// Use the switch at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Switch pulls the line to ground when triggered.
    #[serde(default = "default_true")]
    pub active_low: bool,
}

impl Default for HomeSwitchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            active_low: true,
        }
    }
}

/// Complete axis configuration from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AxisConfig {
    /// Human-readable name (max 32 chars).
    pub name: String<32>,

    /// Base steps per revolution (typically 200 for 1.8° motors).
    pub steps_per_revolution: u16,

    /// Microstep setting (1, 2, 4, 8, 16, 32, etc.).
    pub microsteps: Microsteps,

    /// Gear ratio (output:input, e.g., 50.0 means 50:1 reduction).
    #[serde(default = "default_gear_ratio")]
    pub gear_ratio: f64,

    /// Travel limits.
    #[serde(flatten)]
    pub limits: AngleLimits,

    /// Maximum angular velocity in degrees per second.
    #[serde(rename = "max_velocity_deg_per_sec")]
    pub max_velocity: DegreesPerSec,

    /// Angular acceleration in degrees per second squared.
    #[serde(rename = "acceleration_deg_per_sec2")]
    pub acceleration: DegreesPerSecSquared,

    /// Position assigned to the axis once homing completes.
    #[serde(default, rename = "home_offset_deg")]
    pub home_offset: Degrees,

    /// Invert direction pin logic.
    #[serde(default)]
    pub invert_direction: bool,

    /// Driver is enabled by pulling EN low (TMC2209, A4988, DRV8825).
    #[serde(default = "default_true")]
    pub enable_active_low: bool,

    /// Pin assignment.
    pub pins: AxisPins,

    /// Home switch wiring.
    #[serde(default)]
    pub home_switch: HomeSwitchConfig,
}

fn default_gear_ratio() -> f64 {
    1.0
}

fn default_true() -> bool {
    true
}

impl AxisConfig {
    /// Calculate total microsteps per output shaft revolution.
    pub fn total_steps_per_revolution(&self) -> f64 {
        self.steps_per_revolution as f64 * self.microsteps.value() as f64 * self.gear_ratio
    }

    /// Calculate microsteps per degree of output rotation.
    pub fn steps_per_degree(&self) -> f64 {
        self.total_steps_per_revolution() / 360.0
    }

    /// Degrees of output rotation per microstep.
    pub fn degrees_per_step(&self) -> f64 {
        1.0 / self.steps_per_degree()
    }

    /// Angular resolution in arcseconds.
    pub fn resolution_arcsec(&self) -> f64 {
        Degrees(self.degrees_per_step()).arcsec()
    }

    /// Home switch pin, if one is wired and enabled.
    pub fn home_switch_pin(&self) -> Option<PinId> {
        self.pins.home_switch.filter(|_| self.home_switch.enabled)
    }

    /// Default azimuth axis of the reference rig (NEMA 17, TMC2209, 50:1 worm).
    pub fn default_azimuth() -> Self {
        Self {
            name: String::try_from("azimuth").unwrap_or_default(),
            steps_per_revolution: 200,
            microsteps: Microsteps::SIXTEENTH,
            gear_ratio: 50.0,
            limits: AngleLimits::new(Degrees(0.0), Degrees(360.0)),
            max_velocity: DegreesPerSec(5.0),
            acceleration: DegreesPerSecSquared(2.0),
            home_offset: Degrees(0.0),
            invert_direction: false,
            enable_active_low: true,
            pins: AxisPins {
                step: PinId(19),
                direction: PinId(13),
                enable: PinId(12),
                home_switch: Some(PinId(5)),
            },
            home_switch: HomeSwitchConfig::default(),
        }
    }

    /// Default elevation axis of the reference rig.
    pub fn default_elevation() -> Self {
        Self {
            name: String::try_from("elevation").unwrap_or_default(),
            limits: AngleLimits::new(Degrees(0.0), Degrees(90.0)),
            pins: AxisPins {
                step: PinId(18),
                direction: PinId(24),
                enable: PinId(4),
                home_switch: Some(PinId(6)),
            },
            ..Self::default_azimuth()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_steps() {
        let config = AxisConfig::default_azimuth();

        // 200 * 16 * 50.0 = 160000
        assert_eq!(config.total_steps_per_revolution(), 160_000.0);
        assert!((config.steps_per_degree() - 444.444).abs() < 0.001);
        assert!((config.resolution_arcsec() - 8.1).abs() < 0.01);
    }

    #[test]
    fn test_disabled_switch_is_ignored() {
        let mut config = AxisConfig::default_elevation();
        assert_eq!(config.home_switch_pin(), Some(PinId(6)));

        config.home_switch.enabled = false;
        assert_eq!(config.home_switch_pin(), None);
    }
}
