//! Configuration module.
//!
//! Provides types for loading and validating axis, tracking and server
//! configuration from TOML files.

mod axis;
mod limits;
mod loader;
mod mechanical;
mod tracker;
pub mod units;
mod validation;

pub use axis::{AxisConfig, AxisPins, HomeSwitchConfig};
pub use limits::AngleLimits;
pub use loader::{load_config, parse_config, save_default_config};
pub use mechanical::MechanicalConstraints;
pub use tracker::{
    BackendConfig, BackendKind, ParkConfig, ServerConfig, TrackerConfig, TrackingConfig,
};
pub use validation::{validate_axis, validate_config};

// Re-export unit types at config level
pub use units::{Degrees, DegreesPerSec, DegreesPerSecSquared, Microsteps, Steps};
