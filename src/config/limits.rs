//! Angle limit configuration and types.

use serde::{Deserialize, Serialize};

use super::units::Degrees;

/// Travel limits in degrees (from configuration).
///
/// Targets outside the range are clamped, never rejected: rotctld clients
/// routinely send positions a hair outside the advertised range.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AngleLimits {
    /// Minimum allowed position in degrees.
    #[serde(rename = "min_degrees")]
    pub min: Degrees,

    /// Maximum allowed position in degrees.
    #[serde(rename = "max_degrees")]
    pub max: Degrees,
}

impl AngleLimits {
    /// Create new limits.
    pub fn new(min: Degrees, max: Degrees) -> Self {
        Self { min, max }
    }

    /// Check if limits are valid (min < max).
    pub fn is_valid(&self) -> bool {
        self.min.0 < self.max.0
    }

    /// Check if a position is within limits.
    pub fn contains(&self, position: Degrees) -> bool {
        position.0 >= self.min.0 && position.0 <= self.max.0
    }

    /// Clamp a target into `[min, max]`.
    ///
    /// NaN is mapped to `min` so that a garbage target can never produce
    /// an undefined step count.
    pub fn clamp(&self, target: Degrees) -> Degrees {
        if target.0.is_nan() {
            return self.min;
        }
        Degrees(target.0.clamp(self.min.0, self.max.0))
    }
}
