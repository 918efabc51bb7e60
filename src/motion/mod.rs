//! Motion module.
//!
//! Provides trapezoidal profile calculation and step-by-step execution.

mod executor;
mod profile;

pub use executor::MotionExecutor;
pub use profile::{Direction, MotionPhase, MotionProfile, START_SPEED};
