//! Axis motion engine.
//!
//! One [`AxisEngine`] per physical axis; the two axes share a pulse backend
//! but have independent locks and run fully in parallel.

mod engine;
mod gate;
mod position;

pub use engine::{
    AxisEngine, MoveHandle, DIRECTION_SETTLE, HOMING_BACKOFF, HOMING_BUDGET_FACTOR,
    HOMING_DIRECTION, HOMING_SPEED,
};
pub use gate::{ActiveMotion, StopGate};
pub use position::AxisPosition;
