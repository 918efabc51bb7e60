//! Motion profile calculation.
//!
//! Symmetric trapezoidal profiles that start from a fixed minimum speed,
//! accelerate at a constant rate, cruise, and mirror the ramp on the way
//! down. Short moves degenerate to a triangle with no cruise plateau.

use std::time::Duration;

use super::executor::MotionExecutor;

/// Speed of the first and last step of every move, in steps/s.
///
/// Starting from zero would make the first interval infinite.
pub const START_SPEED: f64 = 100.0;

/// Direction of axis motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Increasing angle (positive step count).
    Positive,
    /// Decreasing angle (negative step count).
    Negative,
}

impl Direction {
    /// Get direction from signed step count.
    #[inline]
    pub fn from_steps(steps: i64) -> Self {
        if steps >= 0 {
            Direction::Positive
        } else {
            Direction::Negative
        }
    }

    /// Get the sign multiplier.
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Direction::Positive => 1,
            Direction::Negative => -1,
        }
    }

    /// The opposite direction.
    #[inline]
    pub fn reversed(self) -> Self {
        match self {
            Direction::Positive => Direction::Negative,
            Direction::Negative => Direction::Positive,
        }
    }
}

/// Phase of a step within a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    /// Accelerating from the start speed toward cruise speed.
    Accelerating,
    /// Moving at constant cruise speed.
    Cruising,
    /// Decelerating back to the start speed.
    Decelerating,
    /// Motion complete.
    Complete,
}

/// Computed motion profile for a move.
///
/// Immutable once built: a move in flight can be cancelled, never retargeted.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionProfile {
    /// Total steps to move (absolute value).
    pub total_steps: u64,

    /// Direction of motion.
    pub direction: Direction,

    /// Steps in each of the ramp-up and ramp-down phases.
    pub ramp_steps: u64,

    /// Speed of the first step in steps/sec.
    pub start_speed: f64,

    /// Cruise speed in steps/sec.
    pub max_speed: f64,

    /// Acceleration in steps/sec².
    pub acceleration: f64,

    triangular: bool,
}

impl MotionProfile {
    /// Create a trapezoidal profile.
    ///
    /// # Arguments
    ///
    /// * `total_steps` - Signed step count (sign gives the direction)
    /// * `max_speed` - Cruise speed in steps/sec
    /// * `acceleration` - Acceleration rate in steps/sec²
    pub fn trapezoidal(total_steps: i64, max_speed: f64, acceleration: f64) -> Self {
        let direction = Direction::from_steps(total_steps);
        let steps = total_steps.unsigned_abs();

        if steps == 0 || !(max_speed > 0.0) || !(acceleration > 0.0) {
            return Self::zero();
        }

        let start_speed = START_SPEED.min(max_speed);

        // Steps needed to reach cruise speed from the start speed
        let full_ramp = ((max_speed * max_speed - start_speed * start_speed)
            / (2.0 * acceleration))
            .floor();
        let full_ramp = if full_ramp.is_finite() && full_ramp >= 1.0 {
            full_ramp.min(u64::MAX as f64) as u64
        } else {
            1
        };

        let triangular = full_ramp.saturating_mul(2) >= steps;
        let ramp_steps = if triangular { steps / 2 } else { full_ramp };

        Self {
            total_steps: steps,
            direction,
            ramp_steps,
            start_speed,
            max_speed,
            acceleration,
            triangular,
        }
    }

    /// Create a constant-speed profile with no ramps (homing search).
    pub fn constant(total_steps: u64, direction: Direction, speed: f64) -> Self {
        if total_steps == 0 || !(speed > 0.0) {
            return Self::zero();
        }

        Self {
            total_steps,
            direction,
            ramp_steps: 0,
            start_speed: speed,
            max_speed: speed,
            acceleration: 0.0,
            triangular: false,
        }
    }

    /// Create a zero-length profile (no motion).
    pub fn zero() -> Self {
        Self {
            total_steps: 0,
            direction: Direction::Positive,
            ramp_steps: 0,
            start_speed: START_SPEED,
            max_speed: START_SPEED,
            acceleration: 0.0,
            triangular: false,
        }
    }

    /// Check if this is a zero-length profile.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.total_steps == 0
    }

    /// True when the move is too short to reach cruise speed.
    #[inline]
    pub fn is_triangular(&self) -> bool {
        self.triangular
    }

    /// Number of steps run at cruise speed.
    pub fn plateau_steps(&self) -> u64 {
        if self.triangular {
            0
        } else {
            self.total_steps.saturating_sub(2 * self.ramp_steps)
        }
    }

    /// Get the phase at a given step index.
    pub fn phase_at(&self, step: u64) -> MotionPhase {
        if step >= self.total_steps {
            MotionPhase::Complete
        } else if self.triangular {
            if step < self.total_steps - 1 - step {
                MotionPhase::Accelerating
            } else {
                MotionPhase::Decelerating
            }
        } else if step < self.ramp_steps {
            MotionPhase::Accelerating
        } else if step >= self.total_steps - self.ramp_steps {
            MotionPhase::Decelerating
        } else {
            MotionPhase::Cruising
        }
    }

    /// Instantaneous speed of a step in steps/sec.
    pub fn speed_at(&self, step: u64) -> f64 {
        if step >= self.total_steps {
            return 0.0;
        }

        let ramp_speed = |n: u64| {
            (self.start_speed * self.start_speed + 2.0 * self.acceleration * n as f64).sqrt()
        };
        let from_end = self.total_steps - 1 - step;

        if self.triangular {
            return ramp_speed(step.min(from_end)).clamp(self.start_speed, self.max_speed);
        }

        match self.phase_at(step) {
            MotionPhase::Accelerating => ramp_speed(step).min(self.max_speed),
            MotionPhase::Decelerating => {
                ramp_speed(from_end).clamp(self.start_speed, self.max_speed)
            }
            _ => self.max_speed,
        }
    }

    /// Delay between this step's pulse and the next.
    pub fn interval_at(&self, step: u64) -> Duration {
        let speed = self.speed_at(step);
        if speed > 0.0 {
            Duration::from_secs_f64(1.0 / speed)
        } else {
            Duration::ZERO
        }
    }

    /// Full per-step delay table, computed before the move starts.
    pub fn delay_table(&self) -> Vec<Duration> {
        MotionExecutor::new(self.clone()).collect()
    }

    /// Total duration of the move.
    pub fn duration(&self) -> Duration {
        (0..self.total_steps).map(|i| self.interval_at(i)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trapezoidal_profile() {
        // 2222 steps/s, 888 steps/s² -> ramp of 2772 steps
        let profile = MotionProfile::trapezoidal(40_000, 2222.22, 888.89);

        assert_eq!(profile.total_steps, 40_000);
        assert_eq!(profile.direction, Direction::Positive);
        assert!(!profile.is_triangular());
        assert_eq!(profile.ramp_steps, 2772);
        assert_eq!(profile.plateau_steps(), 40_000 - 2 * 2772);
        assert_eq!(profile.phase_at(20_000), MotionPhase::Cruising);
        assert!((profile.speed_at(20_000) - 2222.22).abs() < 1e-9);
    }

    #[test]
    fn test_first_and_last_step_at_start_speed() {
        let profile = MotionProfile::trapezoidal(10_000, 2000.0, 1000.0);

        assert!((profile.speed_at(0) - START_SPEED).abs() < 1e-9);
        assert!((profile.speed_at(9_999) - START_SPEED).abs() < 1e-9);
        assert!((profile.interval_at(0).as_secs_f64() - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_triangle_profile() {
        let profile = MotionProfile::trapezoidal(100, 10_000.0, 1000.0);

        assert!(profile.is_triangular());
        assert_eq!(profile.ramp_steps, 50);
        assert_eq!(profile.plateau_steps(), 0);
        assert_eq!(profile.speed_at(10), profile.speed_at(89));
    }

    #[test]
    fn test_direction() {
        let pos = MotionProfile::trapezoidal(100, 1000.0, 2000.0);
        let neg = MotionProfile::trapezoidal(-100, 1000.0, 2000.0);

        assert_eq!(pos.direction, Direction::Positive);
        assert_eq!(neg.direction, Direction::Negative);
        assert_eq!(pos.total_steps, neg.total_steps);
        assert_eq!(pos.delay_table(), neg.delay_table());
    }

    #[test]
    fn test_max_speed_below_start_speed() {
        let profile = MotionProfile::trapezoidal(10, 50.0, 100.0);

        assert_eq!(profile.start_speed, 50.0);
        assert!(profile
            .delay_table()
            .iter()
            .all(|d| (d.as_secs_f64() - 0.02).abs() < 1e-9));
    }

    #[test]
    fn test_zero_profile() {
        let profile = MotionProfile::trapezoidal(0, 1000.0, 1000.0);

        assert!(profile.is_zero());
        assert!(profile.delay_table().is_empty());
        assert_eq!(profile.duration(), Duration::ZERO);
    }

    #[test]
    fn test_constant_profile() {
        let profile = MotionProfile::constant(5, Direction::Negative, 250.0);

        let table = profile.delay_table();
        assert_eq!(table.len(), 5);
        assert!(table.iter().all(|d| (d.as_secs_f64() - 0.004).abs() < 1e-9));
        assert_eq!(profile.phase_at(2), MotionPhase::Cruising);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn delay_table_shape(
            steps in 1i64..20_000,
            max_speed in 10.0f64..20_000.0,
            accel in 10.0f64..50_000.0,
        ) {
            let profile = MotionProfile::trapezoidal(steps, max_speed, accel);
            let table = profile.delay_table();
            let ramp = profile.ramp_steps as usize;
            let total = steps as usize;

            prop_assert_eq!(table.len(), total);
            prop_assert!(table.iter().all(|d| *d > Duration::ZERO));

            let (up_end, down_start) = if profile.is_triangular() {
                let mid = (total - 1) / 2;
                (mid + 1, mid)
            } else {
                (ramp, total - ramp)
            };

            for w in table[..up_end].windows(2) {
                prop_assert!(w[1] <= w[0]);
            }
            for w in table[down_start..].windows(2) {
                prop_assert!(w[1] >= w[0]);
            }

            if !profile.is_triangular() {
                let cruise = Duration::from_secs_f64(1.0 / max_speed);
                for d in &table[ramp..total - ramp] {
                    prop_assert_eq!(*d, cruise);
                }
            }
        }

        #[test]
        fn short_moves_are_symmetric_triangles(
            steps in 1i64..400,
            max_speed in 2_000.0f64..20_000.0,
            accel in 100.0f64..1_000.0,
        ) {
            // Ramp to cruise needs > 1900 steps here
            let profile = MotionProfile::trapezoidal(steps, max_speed, accel);
            let table = profile.delay_table();

            prop_assert!(profile.is_triangular());
            prop_assert_eq!(profile.plateau_steps(), 0);
            let reversed: Vec<_> = table.iter().rev().copied().collect();
            prop_assert_eq!(table, reversed);
        }
    }
}
