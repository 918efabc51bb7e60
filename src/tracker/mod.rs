//! Tracker coordinator.
//!
//! Drives the two axes, runs the tracking loop and derives status.

mod coordinator;
mod state;
mod tracking;

pub use coordinator::{Tracker, STOP_TRACKING_TIMEOUT};
pub use state::{TrackerMode, TrackerStatus};
pub use tracking::{TargetFeed, TrackingLoop};
