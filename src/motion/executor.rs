//! Motion execution - walks a profile step by step.

use std::time::Duration;

use super::profile::{MotionPhase, MotionProfile};

/// Runtime state while walking a motion profile.
///
/// Yields the delay that follows each step's pulse.
#[derive(Debug, Clone)]
pub struct MotionExecutor {
    /// The computed profile being executed.
    profile: MotionProfile,

    /// Index of the next step to emit.
    current_step: u64,
}

impl MotionExecutor {
    /// Create a new executor for a motion profile.
    pub fn new(profile: MotionProfile) -> Self {
        Self {
            profile,
            current_step: 0,
        }
    }

    /// Check if motion is complete.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current_step >= self.profile.total_steps
    }

    /// Get the current step number.
    #[inline]
    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    /// Get the total number of steps.
    #[inline]
    pub fn total_steps(&self) -> u64 {
        self.profile.total_steps
    }

    /// Get steps remaining.
    #[inline]
    pub fn steps_remaining(&self) -> u64 {
        self.profile.total_steps.saturating_sub(self.current_step)
    }

    /// Get the current phase.
    #[inline]
    pub fn phase(&self) -> MotionPhase {
        self.profile.phase_at(self.current_step)
    }

    /// Delay following the current step.
    #[inline]
    pub fn current_interval(&self) -> Duration {
        self.profile.interval_at(self.current_step)
    }

    /// Get the motion profile.
    #[inline]
    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    /// Reset the executor to the beginning.
    pub fn reset(&mut self) {
        self.current_step = 0;
    }

    /// Get progress as a fraction (0.0 to 1.0).
    #[inline]
    pub fn progress(&self) -> f64 {
        if self.profile.total_steps == 0 {
            1.0
        } else {
            self.current_step as f64 / self.profile.total_steps as f64
        }
    }
}

impl Iterator for MotionExecutor {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.is_complete() {
            return None;
        }

        let interval = self.current_interval();
        self.current_step += 1;
        Some(interval)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.steps_remaining()).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MotionExecutor {}
