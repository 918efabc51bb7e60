//! Unit types for physical quantities.
//!
//! Provides type-safe representations of angles, angular rates and motor
//! microsteps to prevent unit confusion at compile time.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Angular position in degrees.
///
/// Used for configuration and the pointing API. Internally converted to [`Steps`].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct Degrees(pub f64);

impl Degrees {
    /// Absolute angular distance to another angle.
    #[inline]
    pub fn distance(self, other: Degrees) -> f64 {
        (self.0 - other.0).abs()
    }

    /// Same angle in arcseconds.
    #[inline]
    pub fn arcsec(self) -> f64 {
        self.0 * 3600.0
    }
}

impl fmt::Display for Degrees {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}°", self.0)
    }
}

/// Angular velocity in degrees per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct DegreesPerSec(pub f64);

impl DegreesPerSec {
    /// Step rate for an axis with `steps_per_degree` resolution.
    #[inline]
    pub fn to_steps_per_sec(self, steps_per_degree: f64) -> f64 {
        self.0 * steps_per_degree
    }
}

/// Angular acceleration in degrees per second squared.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Deserialize, Serialize)]
#[serde(transparent)]
pub struct DegreesPerSecSquared(pub f64);

impl DegreesPerSecSquared {
    /// Step-rate change per second for an axis with `steps_per_degree` resolution.
    #[inline]
    pub fn to_steps_per_sec2(self, steps_per_degree: f64) -> f64 {
        self.0 * steps_per_degree
    }
}

/// Axis position in microsteps from the home reference.
///
/// This is the only authoritative position; degrees are always derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
#[serde(transparent)]
pub struct Steps(pub i64);

impl Steps {
    /// Convert to degrees using steps per degree ratio.
    #[inline]
    pub fn to_degrees(self, steps_per_degree: f64) -> Degrees {
        Degrees(self.0 as f64 / steps_per_degree)
    }

    /// Nearest step to an angle.
    ///
    /// Rounds so that `from_degrees(to_degrees(s)) == s`.
    #[inline]
    pub fn from_degrees(degrees: Degrees, steps_per_degree: f64) -> Self {
        Self((degrees.0 * steps_per_degree).round() as i64)
    }
}

/// Microstep divisor (1, 2, 4, 8, 16, 32, 64, 128, 256).
///
/// Validated at construction to be a power of 2 within the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u16")]
pub struct Microsteps(u16);

impl Microsteps {
    /// Full step (no microstepping).
    pub const FULL: Self = Self(1);
    /// Half step.
    pub const HALF: Self = Self(2);
    /// Quarter step.
    pub const QUARTER: Self = Self(4);
    /// Eighth step.
    pub const EIGHTH: Self = Self(8);
    /// Sixteenth step.
    pub const SIXTEENTH: Self = Self(16);
    /// Thirty-second step.
    pub const THIRTY_SECOND: Self = Self(32);
    /// Sixty-fourth step.
    pub const SIXTY_FOURTH: Self = Self(64);
    /// 128th step.
    pub const ONE_TWENTY_EIGHTH: Self = Self(128);
    /// 256th step (maximum resolution).
    pub const TWO_FIFTY_SIXTH: Self = Self(256);

    const VALID_VALUES: [u16; 9] = [1, 2, 4, 8, 16, 32, 64, 128, 256];

    /// Create a new Microsteps value with validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidMicrosteps` if the value is not a valid power of 2.
    pub fn new(value: u16) -> Result<Self, ConfigError> {
        if Self::VALID_VALUES.contains(&value) {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidMicrosteps(value))
        }
    }

    /// Get the raw divisor value.
    #[inline]
    pub const fn value(self) -> u16 {
        self.0
    }
}

impl Default for Microsteps {
    fn default() -> Self {
        Self::FULL
    }
}

impl TryFrom<u16> for Microsteps {
    type Error = ConfigError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Microsteps> for u16 {
    fn from(value: Microsteps) -> Self {
        value.0
    }
}

impl<'de> Deserialize<'de> for Microsteps {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u16::deserialize(deserializer)?;
        Microsteps::new(value).map_err(serde::de::Error::custom)
    }
}
