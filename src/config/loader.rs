//! Configuration loading from files.

use std::fs;
use std::path::Path;

use crate::error::ConfigError;

use super::TrackerConfig;

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
///
/// # Example
///
/// ```rust,ignore
/// use altaz_rotator::load_config;
///
/// let config = load_config("rotator.toml")?;
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TrackerConfig, ConfigError> {
    let content = fs::read_to_string(path.as_ref()).map_err(|e| {
        ConfigError::IoError(format!("{}: {}", path.as_ref().display(), e))
    })?;

    parse_config(&content)
}

/// Parse configuration from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is invalid or fails validation.
pub fn parse_config(content: &str) -> Result<TrackerConfig, ConfigError> {
    let config: TrackerConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.message().to_string()))?;

    super::validation::validate_config(&config)?;

    Ok(config)
}

/// Write the default configuration to `path`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn save_default_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(&TrackerConfig::default())
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    fs::write(path.as_ref(), content).map_err(|e| {
        ConfigError::IoError(format!("{}: {}", path.as_ref().display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[azimuth]
name = "azimuth"
steps_per_revolution = 200
microsteps = 16
gear_ratio = 50.0
min_degrees = 0.0
max_degrees = 360.0
max_velocity_deg_per_sec = 5.0
acceleration_deg_per_sec2 = 2.0

[azimuth.pins]
step = 19
direction = 13
enable = 12

[elevation]
name = "elevation"
steps_per_revolution = 200
microsteps = 16
gear_ratio = 50.0
min_degrees = 0.0
max_degrees = 90.0
max_velocity_deg_per_sec = 5.0
acceleration_deg_per_sec2 = 2.0

[elevation.pins]
step = 18
direction = 24
enable = 4
home_switch = 6
"#;

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config(MINIMAL).unwrap();

        assert_eq!(config.azimuth.name.as_str(), "azimuth");
        assert_eq!(config.azimuth.pins.home_switch, None);
        assert!(config.elevation.pins.home_switch.is_some());
        assert_eq!(config.server.port, 4533);
        assert_eq!(config.park.elevation.0, 90.0);
    }

    #[test]
    fn test_default_config_round_trips_through_toml() {
        let text = toml::to_string_pretty(&TrackerConfig::default()).unwrap();
        let parsed = parse_config(&text).unwrap();

        assert_eq!(parsed, TrackerConfig::default());
    }

    #[test]
    fn test_parse_rejects_invalid_microsteps() {
        let bad = MINIMAL.replacen("microsteps = 16", "microsteps = 0", 1);

        assert!(matches!(parse_config(&bad), Err(ConfigError::ParseError(_))));
    }
}
