//! Tracker configuration - root configuration structure.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::axis::AxisConfig;
use super::units::Degrees;

/// Tracking loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TrackingConfig {
    /// Polling interval of the target feed, in seconds.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: f64,

    /// Error on either axis above which a corrective move is issued.
    #[serde(default = "default_tolerance", rename = "position_tolerance_deg")]
    pub position_tolerance: Degrees,
}

fn default_interval_secs() -> f64 {
    1.0
}

fn default_tolerance() -> Degrees {
    Degrees(0.1)
}

impl TrackingConfig {
    /// Polling interval as a Duration.
    ///
    /// Only meaningful after validation (interval > 0).
    pub fn interval(&self) -> Duration {
        Duration::from_secs_f64(self.interval_secs.max(0.0))
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            position_tolerance: default_tolerance(),
        }
    }
}

/// Safe stow position.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ParkConfig {
    /// Park azimuth.
    #[serde(rename = "azimuth_deg")]
    pub azimuth: Degrees,
    /// Park elevation.
    #[serde(rename = "elevation_deg")]
    pub elevation: Degrees,
}

impl Default for ParkConfig {
    fn default() -> Self {
        Self {
            azimuth: Degrees(0.0),
            elevation: Degrees(90.0),
        }
    }
}

/// Rotator protocol listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// TCP port (rotctld default is 4533).
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    crate::server::DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which pulse backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Probe hardware-timed, then software-timed, then simulate.
    #[default]
    Auto,
    /// pigpiod wave generation only (simulate if unavailable).
    Waveform,
    /// Software-timed GPIO only (simulate if unavailable).
    Gpio,
    /// Never touch hardware.
    Simulation,
}

/// Pulse backend selection.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Strategy preference.
    #[serde(default)]
    pub kind: BackendKind,
    /// pigpiod socket address.
    #[serde(default = "default_pigpiod_addr")]
    pub pigpiod_addr: String,
}

fn default_pigpiod_addr() -> String {
    "127.0.0.1:8888".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::Auto,
            pigpiod_addr: default_pigpiod_addr(),
        }
    }
}

/// Root configuration structure from TOML.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TrackerConfig {
    /// Azimuth axis.
    pub azimuth: AxisConfig,
    /// Elevation axis.
    pub elevation: AxisConfig,
    /// Tracking loop.
    #[serde(default)]
    pub tracking: TrackingConfig,
    /// Park position.
    #[serde(default)]
    pub park: ParkConfig,
    /// Protocol server.
    #[serde(default)]
    pub server: ServerConfig,
    /// Pulse backend.
    #[serde(default)]
    pub backend: BackendConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            azimuth: AxisConfig::default_azimuth(),
            elevation: AxisConfig::default_elevation(),
            tracking: TrackingConfig::default(),
            park: ParkConfig::default(),
            server: ServerConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}
