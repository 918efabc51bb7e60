//! Position tracking for an axis.
//!
//! Provides absolute position tracking in steps with unit conversions.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::config::units::{Degrees, Steps};

/// Axis position tracker.
///
/// Steps are the only stored quantity; degrees are always derived. Reads are
/// lock-free so status queries never wait for a move.
#[derive(Debug, Default)]
pub struct AxisPosition {
    /// Current position in steps (from origin)
    steps: AtomicI64,
    /// Steps per degree for conversions
    steps_per_degree: f64,
}

impl AxisPosition {
    /// Create a position tracker at the origin.
    #[inline]
    pub fn new(steps_per_degree: f64) -> Self {
        Self::at(Steps(0), steps_per_degree)
    }

    /// Create a position tracker at a specific position.
    #[inline]
    pub fn at(steps: Steps, steps_per_degree: f64) -> Self {
        Self {
            steps: AtomicI64::new(steps.0),
            steps_per_degree,
        }
    }

    /// Get current position in steps.
    #[inline]
    pub fn steps(&self) -> Steps {
        Steps(self.steps.load(Ordering::Acquire))
    }

    /// Get current position in degrees.
    #[inline]
    pub fn degrees(&self) -> Degrees {
        self.steps().to_degrees(self.steps_per_degree)
    }

    /// Set position in steps.
    #[inline]
    pub fn set_steps(&self, steps: Steps) {
        self.steps.store(steps.0, Ordering::Release);
    }

    /// Set position in degrees (nearest step).
    #[inline]
    pub fn set_degrees(&self, degrees: Degrees) {
        self.set_steps(Steps::from_degrees(degrees, self.steps_per_degree));
    }

    /// Move by a number of steps.
    #[inline]
    pub fn move_steps(&self, delta: i64) {
        self.steps.fetch_add(delta, Ordering::AcqRel);
    }

    /// Steps needed to reach an angle from here.
    #[inline]
    pub fn steps_to(&self, target: Degrees) -> i64 {
        Steps::from_degrees(target, self.steps_per_degree).0 - self.steps().0
    }
}
