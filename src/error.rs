//! Error types for the rotator controller.
//!
//! Provides unified error handling across configuration, pulse backends and homing.

use thiserror::Error;

use crate::backend::PinId;

/// Result type alias using the crate's Error type.
pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for all controller operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration parsing or validation error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Pulse backend error
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
    /// Homing sequence failed
    #[error("Homing error: {0}")]
    Homing(#[from] HomingError),
}

/// Configuration-related errors.
///
/// All of these are fatal at startup.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Failed to parse TOML configuration
    #[error("Parse error: {0}")]
    ParseError(String),
    /// File I/O error
    #[error("I/O error: {0}")]
    IoError(String),
    /// Invalid microstep value (must be power of 2: 1, 2, 4, 8, 16, 32, 64, 128, 256)
    #[error("Invalid microsteps: {0}. Valid values: 1, 2, 4, 8, 16, 32, 64, 128, 256")]
    InvalidMicrosteps(u16),
    /// Invalid steps per revolution (must be > 0)
    #[error("{axis}: invalid steps per revolution: {value}. Must be > 0")]
    InvalidStepsPerRevolution {
        /// Axis name
        axis: String,
        /// Offending value
        value: u16,
    },
    /// Invalid gear ratio (must be > 0)
    #[error("{axis}: invalid gear ratio: {value}. Must be > 0")]
    InvalidGearRatio {
        /// Axis name
        axis: String,
        /// Offending value
        value: f64,
    },
    /// Invalid max velocity (must be > 0)
    #[error("{axis}: invalid max velocity: {value}. Must be > 0")]
    InvalidMaxVelocity {
        /// Axis name
        axis: String,
        /// Offending value
        value: f64,
    },
    /// Invalid acceleration (must be > 0)
    #[error("{axis}: invalid acceleration: {value}. Must be > 0")]
    InvalidAcceleration {
        /// Axis name
        axis: String,
        /// Offending value
        value: f64,
    },
    /// Invalid angle limits (min must be < max)
    #[error("{axis}: invalid limits: min ({min}) must be < max ({max})")]
    InvalidLimits {
        /// Axis name
        axis: String,
        /// Minimum limit value
        min: f64,
        /// Maximum limit value
        max: f64,
    },
    /// A configured angle lies outside the axis limits
    #[error("{axis}: {what} ({value}) lies outside [{min}, {max}]")]
    OutsideLimits {
        /// Axis name
        axis: String,
        /// Which setting is out of range
        what: &'static str,
        /// Offending value
        value: f64,
        /// Minimum limit value
        min: f64,
        /// Maximum limit value
        max: f64,
    },
    /// Pin is not a header GPIO
    #[error("{axis}: pin {pin} is outside GPIO0-GPIO27")]
    InvalidPin {
        /// Axis name
        axis: String,
        /// Offending pin
        pin: u8,
    },
    /// Two signals of one axis share a pin
    #[error("{axis}: pin {pin} is assigned twice")]
    DuplicatePin {
        /// Axis name
        axis: String,
        /// Shared pin
        pin: u8,
    },
    /// Tracking loop interval must be positive
    #[error("Invalid tracking interval: {0}s. Must be > 0")]
    InvalidTrackingInterval(f64),
    /// Position tolerance must not be negative
    #[error("Invalid position tolerance: {0}. Must be >= 0")]
    InvalidTolerance(f64),
}

/// Pulse backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend cannot be used on this machine
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Socket or GPIO file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// pigpiod rejected a command
    #[error("pigpiod command {command} failed with code {code}")]
    Pigpio {
        /// Command number
        command: u32,
        /// Negative pigpio error code
        code: i32,
    },
    /// Pin was used before being configured
    #[error("pin {0} is not configured")]
    PinNotConfigured(PinId),
    /// Pin has no bit in the 32-bit GPIO mask
    #[error("pin {0} cannot be driven by waves")]
    PinOutOfRange(PinId),
    /// Pin driver reported an error
    #[error("pin {0} operation failed")]
    PinError(PinId),
    /// Wave scheduler thread is gone
    #[error("wave scheduler stopped")]
    SchedulerStopped,
}

/// Homing failures.
///
/// Recoverable: the axis is left stopped and not homed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HomingError {
    /// Switch never triggered within the step budget
    #[error("{axis}: home switch not found within {steps} steps")]
    SwitchNotFound {
        /// Axis name
        axis: String,
        /// Steps searched
        steps: u64,
    },
    /// Homing was cancelled by `stop()`
    #[error("{axis}: homing cancelled")]
    Cancelled {
        /// Axis name
        axis: String,
    },
    /// Pin I/O failed while homing
    #[error("{axis}: hardware error while homing: {message}")]
    Hardware {
        /// Axis name
        axis: String,
        /// Backend error text
        message: String,
    },
    /// Controller has been shut down
    #[error("controller is shut down")]
    ShutDown,
}

/// Rotator protocol errors. Answered on the wire, never fatal to a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// A numeric argument is missing or not a number
    #[error("malformed command: {0}")]
    Malformed(String),
    /// Command not recognized
    #[error("unknown command: {0}")]
    Unknown(String),
    /// Line exceeded the session buffer before a newline arrived
    #[error("line too long")]
    LineTooLong,
}

impl ProtocolError {
    /// Hamlib `RPRT` code for this error.
    pub fn code(&self) -> i32 {
        match self {
            ProtocolError::Malformed(_) | ProtocolError::LineTooLong => -1,
            ProtocolError::Unknown(_) => -4,
        }
    }
}
