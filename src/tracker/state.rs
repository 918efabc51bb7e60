//! Tracker modes and status snapshot.

use core::fmt;

use serde::Serialize;

use crate::config::Degrees;

/// Coordinator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackerMode {
    /// Not started, or shut down.
    Uninitialized,
    /// Ready for commands.
    Idle,
    /// Homing both axes.
    Homing,
    /// Point-to-point slew in progress.
    Slewing,
    /// Tracking loop running.
    Tracking,
    /// Stowed with drivers disabled.
    Parked,
    /// Emergency stop in progress.
    Stopped,
}

impl TrackerMode {
    /// Lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            TrackerMode::Uninitialized => "uninitialized",
            TrackerMode::Idle => "idle",
            TrackerMode::Homing => "homing",
            TrackerMode::Slewing => "slewing",
            TrackerMode::Tracking => "tracking",
            TrackerMode::Parked => "parked",
            TrackerMode::Stopped => "stopped",
        }
    }
}

impl fmt::Display for TrackerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinator bookkeeping that is not derived from the axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bookkeeping {
    pub mode: TrackerMode,
    pub az_target: Degrees,
    pub el_target: Degrees,
    pub homed: bool,
    pub parked: bool,
}

impl Default for Bookkeeping {
    fn default() -> Self {
        Self {
            mode: TrackerMode::Uninitialized,
            az_target: Degrees(0.0),
            el_target: Degrees(0.0),
            homed: false,
            parked: false,
        }
    }
}

/// Flat status record for any consumer (protocol, CLI, dashboard).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackerStatus {
    /// Coordinator mode.
    pub mode: TrackerMode,
    /// Azimuth in degrees.
    pub az_position: f64,
    /// Elevation in degrees.
    pub el_position: f64,
    /// Raw azimuth step count.
    pub az_steps: i64,
    /// Raw elevation step count.
    pub el_steps: i64,
    /// Last commanded azimuth.
    pub az_target: f64,
    /// Last commanded elevation.
    pub el_target: f64,
    /// Azimuth driver enabled.
    pub az_enabled: bool,
    /// Elevation driver enabled.
    pub el_enabled: bool,
    /// Tracking loop running.
    pub is_tracking: bool,
    /// Slew in progress.
    pub is_slewing: bool,
    /// Both axes homed.
    pub is_homed: bool,
    /// Parked since the last goto.
    pub is_parked: bool,
    /// Both drivers enabled.
    pub motors_enabled: bool,
    /// Azimuth resolution.
    pub az_resolution_arcsec: f64,
    /// Elevation resolution.
    pub el_resolution_arcsec: f64,
    /// Active pulse backend.
    pub backend: &'static str,
    /// True when no hardware is driven.
    pub simulated: bool,
}

impl TrackerStatus {
    /// Single-line JSON record, as logged by the daemon.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
