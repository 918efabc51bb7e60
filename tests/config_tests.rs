//! Integration tests for configuration loading and derived constants.
//!
//! These tests go from TOML text to the values the axis engine works with.

use altaz_rotator::config::{
    load_config, parse_config, save_default_config, BackendKind, Degrees, MechanicalConstraints,
    Microsteps, TrackerConfig,
};
use altaz_rotator::error::ConfigError;
use altaz_rotator::PinId;

// =============================================================================
// Test configuration data
// =============================================================================

const FULL_CONFIG: &str = r#"
[azimuth]
name = "azimuth"
steps_per_revolution = 200
microsteps = 16
gear_ratio = 50.0
min_degrees = 0.0
max_degrees = 360.0
max_velocity_deg_per_sec = 5.0
acceleration_deg_per_sec2 = 2.0
home_offset_deg = 0.0
invert_direction = false
enable_active_low = true

[azimuth.pins]
step = 19
direction = 13
enable = 12
home_switch = 5

[azimuth.home_switch]
enabled = true
active_low = true

[elevation]
name = "elevation"
steps_per_revolution = 200
microsteps = 32
gear_ratio = 100.0
min_degrees = -5.0
max_degrees = 95.0
max_velocity_deg_per_sec = 3.0
acceleration_deg_per_sec2 = 1.5
home_offset_deg = -5.0
invert_direction = true

[elevation.pins]
step = 18
direction = 24
enable = 4

[tracking]
interval_secs = 0.5
position_tolerance_deg = 0.05

[park]
azimuth_deg = 180.0
elevation_deg = 90.0

[server]
host = "127.0.0.1"
port = 4600

[backend]
kind = "simulation"
pigpiod_addr = "10.0.0.2:8888"
"#;

// =============================================================================
// Parsing
// =============================================================================

/// Every section of a complete file is honored.
#[test]
fn test_parse_full_config() {
    let config = parse_config(FULL_CONFIG).unwrap();

    assert_eq!(config.azimuth.pins.home_switch, Some(PinId(5)));
    assert_eq!(config.elevation.microsteps, Microsteps::THIRTY_SECOND);
    assert!(config.elevation.invert_direction);
    assert_eq!(config.elevation.limits.min, Degrees(-5.0));
    assert_eq!(config.elevation.home_offset, Degrees(-5.0));
    assert_eq!(config.elevation.pins.home_switch, None);

    assert_eq!(config.tracking.interval_secs, 0.5);
    assert_eq!(config.tracking.position_tolerance, Degrees(0.05));
    assert_eq!(config.park.azimuth, Degrees(180.0));
    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 4600);
    assert_eq!(config.backend.kind, BackendKind::Simulation);
    assert_eq!(config.backend.pigpiod_addr, "10.0.0.2:8888");
}

/// Derived constants match the documented 50:1 rig.
#[test]
fn test_derived_constants() {
    let config = parse_config(FULL_CONFIG).unwrap();

    let az = MechanicalConstraints::from_config(&config.azimuth);
    assert!((az.steps_per_degree - 444.444).abs() < 0.001);
    assert!((config.azimuth.resolution_arcsec() - 8.1).abs() < 0.001);
    assert!((az.max_velocity_steps_per_sec - 2222.22).abs() < 0.01);

    // 200 * 32 * 100 / 360
    let el = MechanicalConstraints::from_config(&config.elevation);
    assert!((el.steps_per_degree - 1777.777).abs() < 0.001);
}

// =============================================================================
// Validation
// =============================================================================

/// Inverted limits abort loading.
#[test]
fn test_inverted_limits_rejected() {
    let bad = FULL_CONFIG.replacen("max_degrees = 360.0", "max_degrees = -1.0", 1);

    assert!(matches!(
        parse_config(&bad),
        Err(ConfigError::InvalidLimits { .. })
    ));
}

/// Zero gear ratio aborts loading.
#[test]
fn test_zero_gear_ratio_rejected() {
    let bad = FULL_CONFIG.replacen("gear_ratio = 100.0", "gear_ratio = 0.0", 1);

    assert!(matches!(
        parse_config(&bad),
        Err(ConfigError::InvalidGearRatio { .. })
    ));
}

/// Pins must be header GPIOs.
#[test]
fn test_pin_beyond_header_rejected() {
    let bad = FULL_CONFIG.replacen("step = 19", "step = 40", 1);

    assert!(matches!(
        parse_config(&bad),
        Err(ConfigError::InvalidPin { pin: 40, .. })
    ));
}

/// Park position must be reachable.
#[test]
fn test_unreachable_park_rejected() {
    let bad = FULL_CONFIG.replacen("elevation_deg = 90.0", "elevation_deg = 120.0", 1);

    assert!(matches!(
        parse_config(&bad),
        Err(ConfigError::OutsideLimits { .. })
    ));
}

/// Unknown backend kinds are a parse error.
#[test]
fn test_unknown_backend_kind_rejected() {
    let bad = FULL_CONFIG.replacen("kind = \"simulation\"", "kind = \"stepper-hat\"", 1);

    assert!(matches!(parse_config(&bad), Err(ConfigError::ParseError(_))));
}

// =============================================================================
// Files
// =============================================================================

/// The default configuration written to disk loads back unchanged.
#[test]
fn test_save_and_load_default() {
    let path = std::env::temp_dir().join(format!("altaz-rotator-{}.toml", std::process::id()));

    save_default_config(&path).unwrap();
    let loaded = load_config(&path);
    let _ = std::fs::remove_file(&path);

    assert_eq!(loaded.unwrap(), TrackerConfig::default());
}

/// A missing file is an I/O error naming the path.
#[test]
fn test_missing_file() {
    let err = load_config("/nonexistent/rotator.toml").unwrap_err();

    match err {
        ConfigError::IoError(message) => assert!(message.contains("/nonexistent/rotator.toml")),
        other => panic!("unexpected error: {other:?}"),
    }
}
