//! # altaz-rotator
//!
//! Two-axis alt-azimuth antenna rotator control over step/direction drivers.
//!
//! ## Features
//!
//! - **Configuration-driven**: Define both axes, tracking and park position in TOML
//! - **Trapezoidal motion**: Acceleration-limited pulse trains, triangular for short moves
//! - **Parallel axes**: Slew time is that of the slower axis
//! - **Three pulse backends**: pigpiod waveforms, software-timed GPIO, simulation
//! - **Homing**: Limit-switch search with a bounded step budget
//! - **Rotator protocols**: EasyComm2 and a rotctld subset over TCP
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use altaz_rotator::{backend, Degrees, Tracker, TrackerConfig};
//!
//! let config = TrackerConfig::default();
//! let pulses = backend::select(&config.backend);
//! let tracker = Tracker::new(config, pulses)?;
//!
//! tracker.goto(Degrees(180.0), Degrees(45.0));
//! println!("{:?}", tracker.position());
//! # Ok::<(), altaz_rotator::Error>(())
//! ```
//!
//! ## Feature Flags
//!
//! - `gpio-hardware`: Enables the sysfs GPIO provider for software-timed pulses

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]

pub mod axis;
pub mod backend;
pub mod config;
pub mod error;
pub mod logging;
pub mod motion;
pub mod server;
pub mod tracker;

// Re-exports for ergonomic API
pub use axis::{AxisEngine, MoveHandle};
pub use backend::{Level, PinId, PulseBackend};
pub use config::{load_config, validate_config, AxisConfig, TrackerConfig};
pub use error::{BackendError, ConfigError, Error, HomingError, ProtocolError, Result};
pub use motion::{Direction, MotionPhase, MotionProfile};
pub use tracker::{TargetFeed, Tracker, TrackerMode, TrackerStatus};

// Unit types
pub use config::units::{Degrees, DegreesPerSec, DegreesPerSecSquared, Microsteps, Steps};
