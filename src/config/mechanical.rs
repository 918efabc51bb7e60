//! Mechanical constraints derived from axis configuration.

use super::axis::AxisConfig;
use super::units::{Degrees, DegreesPerSec, DegreesPerSecSquared, Steps};

/// Derived mechanical parameters computed from axis configuration.
///
/// These are computed once at initialization and used for all motion planning.
#[derive(Debug, Clone, PartialEq)]
pub struct MechanicalConstraints {
    /// Microsteps per degree of output rotation.
    pub steps_per_degree: f64,

    /// Maximum velocity in steps per second.
    pub max_velocity_steps_per_sec: f64,

    /// Acceleration in steps per second squared.
    pub acceleration_steps_per_sec2: f64,

    /// Maximum velocity in degrees per second.
    pub max_velocity: DegreesPerSec,

    /// Acceleration in degrees per second squared.
    pub acceleration: DegreesPerSecSquared,
}

impl MechanicalConstraints {
    /// Compute mechanical constraints from axis configuration.
    pub fn from_config(config: &AxisConfig) -> Self {
        let steps_per_degree = config.steps_per_degree();

        Self {
            steps_per_degree,
            max_velocity_steps_per_sec: config.max_velocity.to_steps_per_sec(steps_per_degree),
            acceleration_steps_per_sec2: config
                .acceleration
                .to_steps_per_sec2(steps_per_degree),
            max_velocity: config.max_velocity,
            acceleration: config.acceleration,
        }
    }

    /// Convert degrees to steps (nearest step).
    #[inline]
    pub fn degrees_to_steps(&self, degrees: Degrees) -> i64 {
        Steps::from_degrees(degrees, self.steps_per_degree).0
    }

    /// Convert steps to degrees.
    #[inline]
    pub fn steps_to_degrees(&self, steps: i64) -> Degrees {
        Steps(steps).to_degrees(self.steps_per_degree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps_per_degree() {
        let constraints = MechanicalConstraints::from_config(&AxisConfig::default_azimuth());

        // 160000 / 360 = 444.44
        assert!((constraints.steps_per_degree - 444.444).abs() < 0.001);
    }

    #[test]
    fn test_velocity_conversion() {
        let constraints = MechanicalConstraints::from_config(&AxisConfig::default_azimuth());

        // 5 deg/s * 444.44 steps/deg = 2222 steps/s
        assert!((constraints.max_velocity_steps_per_sec - 2222.22).abs() < 0.01);
        assert!((constraints.acceleration_steps_per_sec2 - 888.89).abs() < 0.01);
    }

    #[test]
    fn test_degree_step_conversion() {
        let constraints = MechanicalConstraints::from_config(&AxisConfig::default_elevation());

        assert_eq!(constraints.degrees_to_steps(Degrees(45.0)), 20_000);
        assert!((constraints.steps_to_degrees(20_000).0 - 45.0).abs() < 1e-9);
    }
}
