//! Configuration validation.

use crate::error::ConfigError;

use super::{AxisConfig, TrackerConfig};

/// Validate a tracker configuration.
///
/// Checks:
/// - Axis parameters give a finite, non-zero steps-per-degree
/// - Speeds and accelerations are positive
/// - Limits are ordered and contain the home offset and park position
/// - Pins are header GPIOs and not shared within an axis
/// - Tracking interval and tolerance are sensible
pub fn validate_config(config: &TrackerConfig) -> Result<(), ConfigError> {
    validate_axis(&config.azimuth)?;
    validate_axis(&config.elevation)?;

    check_inside(&config.azimuth, "park position", config.park.azimuth.0)?;
    check_inside(&config.elevation, "park position", config.park.elevation.0)?;

    let interval = config.tracking.interval_secs;
    if !(interval.is_finite() && interval > 0.0) {
        return Err(ConfigError::InvalidTrackingInterval(interval));
    }

    let tolerance = config.tracking.position_tolerance.0;
    if !(tolerance.is_finite() && tolerance >= 0.0) {
        return Err(ConfigError::InvalidTolerance(tolerance));
    }

    Ok(())
}

/// Validate a single axis.
pub fn validate_axis(config: &AxisConfig) -> Result<(), ConfigError> {
    let axis = || config.name.as_str().to_string();

    if config.steps_per_revolution == 0 {
        return Err(ConfigError::InvalidStepsPerRevolution {
            axis: axis(),
            value: config.steps_per_revolution,
        });
    }

    // Microsteps is validated on construction, but guard the derived constant anyway
    if config.microsteps.value() == 0 {
        return Err(ConfigError::InvalidMicrosteps(0));
    }

    if !(config.gear_ratio.is_finite() && config.gear_ratio > 0.0) {
        return Err(ConfigError::InvalidGearRatio {
            axis: axis(),
            value: config.gear_ratio,
        });
    }

    if !(config.max_velocity.0.is_finite() && config.max_velocity.0 > 0.0) {
        return Err(ConfigError::InvalidMaxVelocity {
            axis: axis(),
            value: config.max_velocity.0,
        });
    }

    if !(config.acceleration.0.is_finite() && config.acceleration.0 > 0.0) {
        return Err(ConfigError::InvalidAcceleration {
            axis: axis(),
            value: config.acceleration.0,
        });
    }

    if !config.limits.is_valid() {
        return Err(ConfigError::InvalidLimits {
            axis: axis(),
            min: config.limits.min.0,
            max: config.limits.max.0,
        });
    }

    check_inside(config, "home offset", config.home_offset.0)?;

    let pins = &config.pins;
    let mut used = vec![pins.step, pins.direction, pins.enable];
    used.extend(pins.home_switch);
    if let Some(pin) = used.iter().find(|pin| !pin.is_header_gpio()) {
        return Err(ConfigError::InvalidPin {
            axis: axis(),
            pin: pin.0,
        });
    }
    for (i, pin) in used.iter().enumerate() {
        if used[i + 1..].contains(pin) {
            return Err(ConfigError::DuplicatePin {
                axis: axis(),
                pin: pin.0,
            });
        }
    }

    Ok(())
}

fn check_inside(config: &AxisConfig, what: &'static str, value: f64) -> Result<(), ConfigError> {
    let limits = &config.limits;
    if limits.contains(super::Degrees(value)) {
        Ok(())
    } else {
        Err(ConfigError::OutsideLimits {
            axis: config.name.as_str().to_string(),
            what,
            value,
            min: limits.min.0,
            max: limits.max.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::PinId;
    use crate::config::Degrees;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&TrackerConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_gear_ratio() {
        let mut config = AxisConfig::default_azimuth();
        config.gear_ratio = 0.0;

        let result = validate_axis(&config);
        assert!(matches!(result, Err(ConfigError::InvalidGearRatio { .. })));
    }

    #[test]
    fn test_zero_steps_per_revolution() {
        let mut config = AxisConfig::default_azimuth();
        config.steps_per_revolution = 0;

        let result = validate_axis(&config);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidStepsPerRevolution { value: 0, .. })
        ));
    }

    #[test]
    fn test_duplicate_pin() {
        let mut config = AxisConfig::default_elevation();
        config.pins.home_switch = Some(PinId(18));

        let result = validate_axis(&config);
        assert!(matches!(result, Err(ConfigError::DuplicatePin { pin: 18, .. })));
    }

    #[test]
    fn test_pin_beyond_header_rejected() {
        let mut config = TrackerConfig::default();
        config.azimuth.pins.step = PinId(40);

        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::InvalidPin { pin: 40, .. })));

        config.azimuth.pins.step = PinId(27);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_park_outside_limits() {
        let mut config = TrackerConfig::default();
        config.park.elevation = Degrees(95.0);

        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::OutsideLimits { .. })));
    }

    #[test]
    fn test_non_positive_interval() {
        let mut config = TrackerConfig::default();
        config.tracking.interval_secs = 0.0;

        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::InvalidTrackingInterval(_))));
    }
}
