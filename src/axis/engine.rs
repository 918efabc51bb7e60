//! Axis motion engine.
//!
//! Owns one physical axis: turns angle requests into acceleration-bounded
//! pulse trains, keeps the authoritative step position, homes against a
//! limit switch and supports synchronous cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::backend::{Level, PinId, PulseBackend, PULSE_HIGH};
use crate::config::units::{Degrees, DegreesPerSec, Steps};
use crate::config::{AngleLimits, AxisConfig, MechanicalConstraints};
use crate::error::{BackendError, HomingError};
use crate::motion::{Direction, MotionProfile};

use super::gate::StopGate;
use super::position::AxisPosition;

/// Wait after writing DIR before the first step.
pub const DIRECTION_SETTLE: Duration = Duration::from_millis(1);

/// The home switch sits at the low end of travel.
pub const HOMING_DIRECTION: Direction = Direction::Negative;

/// Search speed toward the home switch.
pub const HOMING_SPEED: DegreesPerSec = DegreesPerSec(0.5);

/// Distance backed off the switch once it triggers (at half homing speed).
pub const HOMING_BACKOFF: Degrees = Degrees(0.5);

/// Homing searches at most this many times the upper travel limit.
pub const HOMING_BUDGET_FACTOR: f64 = 1.1;

/// A move running on its own thread.
#[derive(Debug)]
pub struct MoveHandle {
    axis: &'static str,
    handle: JoinHandle<u64>,
}

impl MoveHandle {
    /// True once the move loop has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the move and return the number of steps emitted.
    pub fn join(self) -> u64 {
        self.handle.join().unwrap_or_else(|_| {
            error!(axis = self.axis, "Move thread panicked");
            0
        })
    }
}

/// Motion engine for one axis.
pub struct AxisEngine {
    name: &'static str,
    config: AxisConfig,
    constraints: MechanicalConstraints,
    backend: Arc<dyn PulseBackend>,
    position: AxisPosition,
    gate: StopGate,
    /// Serializes everything that emits pulses.
    motion: Mutex<()>,
    enabled: AtomicBool,
    homed: AtomicBool,
}

impl AxisEngine {
    /// Claim the axis pins and leave the driver disabled at position 0.
    pub fn new(
        name: &'static str,
        config: AxisConfig,
        backend: Arc<dyn PulseBackend>,
    ) -> Result<Self, BackendError> {
        let pins = config.pins;
        backend.configure_output(pins.step)?;
        backend.configure_output(pins.direction)?;
        backend.configure_output(pins.enable)?;
        if let Some(switch) = config.home_switch_pin() {
            backend.configure_input_pulled_up(switch)?;
        }
        backend.write(pins.step, Level::Low)?;

        let constraints = MechanicalConstraints::from_config(&config);
        let engine = Self {
            name,
            position: AxisPosition::new(constraints.steps_per_degree),
            constraints,
            config,
            backend,
            gate: StopGate::new(),
            motion: Mutex::new(()),
            enabled: AtomicBool::new(false),
            homed: AtomicBool::new(false),
        };
        engine.write_enable(false)?;

        debug!(
            axis = name,
            steps_per_degree = engine.constraints.steps_per_degree,
            resolution_arcsec = engine.resolution_arcsec(),
            "Axis initialized"
        );
        Ok(engine)
    }

    /// Axis name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Axis configuration.
    #[inline]
    pub fn config(&self) -> &AxisConfig {
        &self.config
    }

    /// Travel limits.
    #[inline]
    pub fn limits(&self) -> AngleLimits {
        self.config.limits
    }

    /// Derived mechanical constants.
    #[inline]
    pub fn constraints(&self) -> &MechanicalConstraints {
        &self.constraints
    }

    /// Current position in steps. Never blocks.
    #[inline]
    pub fn position_steps(&self) -> Steps {
        self.position.steps()
    }

    /// Current position in degrees. Never blocks.
    #[inline]
    pub fn position_degrees(&self) -> Degrees {
        self.position.degrees()
    }

    /// Angular resolution in arcseconds.
    #[inline]
    pub fn resolution_arcsec(&self) -> f64 {
        self.config.resolution_arcsec()
    }

    /// True when the position equals `target`, clamped, to the step.
    pub fn is_at(&self, target: Degrees) -> bool {
        let target = self.config.limits.clamp(target);
        self.position_steps().0 == self.constraints.degrees_to_steps(target)
    }

    /// True while a move or homing run is emitting pulses.
    #[inline]
    pub fn is_moving(&self) -> bool {
        self.gate.is_active()
    }

    /// True while the driver is enabled.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// True after a successful homing run.
    #[inline]
    pub fn is_homed(&self) -> bool {
        self.homed.load(Ordering::Acquire)
    }

    /// Enable the driver.
    pub fn enable(&self) {
        match self.write_enable(true) {
            Ok(()) => debug!(axis = self.name, "Driver enabled"),
            Err(e) => error!(axis = self.name, error = %e, "Failed to enable driver"),
        }
    }

    /// Disable the driver. Call `stop()` first if the axis may be moving.
    pub fn disable(&self) {
        match self.write_enable(false) {
            Ok(()) => debug!(axis = self.name, "Driver disabled"),
            Err(e) => error!(axis = self.name, error = %e, "Failed to disable driver"),
        }
    }

    /// Move to an angle, clamped into the travel limits. Blocks until done.
    ///
    /// Cancels a move already in flight on this axis first. Returns the
    /// number of steps emitted.
    pub fn move_to(&self, target: Degrees) -> u64 {
        let ticket = self.preempt();
        self.run_move(ticket, target)
    }

    /// Start a move on its own thread and return immediately.
    pub fn spawn_move(self: &Arc<Self>, target: Degrees) -> MoveHandle {
        let ticket = self.preempt();
        let engine = Arc::clone(self);
        MoveHandle {
            axis: self.name,
            handle: thread::spawn(move || engine.run_move(ticket, target)),
        }
    }

    /// Jog a fixed number of steps. Limits are not applied.
    pub fn step(&self, count: u64, direction: Direction) -> u64 {
        let ticket = self.preempt();
        let delta = i64::try_from(count).unwrap_or(i64::MAX) * direction.sign();

        let _lock = self.lock_motion();
        let Some(_active) = self.gate.begin(ticket) else {
            return 0;
        };
        self.execute(ticket, &self.profile(delta))
    }

    /// Cancel the running move and block until it has exited.
    ///
    /// No pulse is emitted on this axis after `stop()` returns.
    pub fn stop(&self) {
        self.gate.stop();
    }

    /// Re-reference the axis without moving it.
    pub fn set_position(&self, position: Degrees) {
        let _lock = self.lock_motion();
        self.position.set_degrees(position);
        debug!(axis = self.name, position = %position, "Position set");
    }

    /// Home against the limit switch.
    ///
    /// Drives toward decreasing angle at [`HOMING_SPEED`] until the switch
    /// triggers, backs off [`HOMING_BACKOFF`], then declares the position to
    /// be the configured home offset. Without a switch the current position
    /// is simply declared to be the home offset.
    pub fn home(&self) -> Result<(), HomingError> {
        let ticket = self.preempt();
        let _lock = self.lock_motion();
        let Some(_active) = self.gate.begin(ticket) else {
            return Err(self.cancelled());
        };

        self.homed.store(false, Ordering::Release);
        self.enable();

        let Some(switch) = self.config.home_switch_pin() else {
            self.position.set_degrees(self.config.home_offset);
            self.homed.store(true, Ordering::Release);
            info!(axis = self.name, offset = %self.config.home_offset, "Software homing (no switch)");
            return Ok(());
        };

        info!(axis = self.name, "Homing");
        self.set_direction(HOMING_DIRECTION)
            .map_err(|e| self.hardware(e))?;
        self.backend.delay(DIRECTION_SETTLE);

        let speed = HOMING_SPEED.to_steps_per_sec(self.constraints.steps_per_degree);
        let interval = Duration::from_secs_f64(1.0 / speed);
        let budget = self.homing_budget_steps();

        for _ in 0..budget {
            if self.gate.is_cancelled(ticket) {
                info!(axis = self.name, "Homing cancelled");
                return Err(self.cancelled());
            }

            if self.switch_triggered(switch).map_err(|e| self.hardware(e))? {
                self.back_off(ticket, speed / 2.0)?;
                self.position.set_degrees(self.config.home_offset);
                self.homed.store(true, Ordering::Release);
                info!(axis = self.name, offset = %self.config.home_offset, "Homed");
                return Ok(());
            }

            self.backend
                .pulse(self.config.pins.step, PULSE_HIGH)
                .map_err(|e| self.hardware(e))?;
            self.position.move_steps(HOMING_DIRECTION.sign());
            self.backend.delay(interval.saturating_sub(PULSE_HIGH));
        }

        warn!(axis = self.name, steps = budget, "Home switch not found");
        Err(HomingError::SwitchNotFound {
            axis: self.name.to_string(),
            steps: budget,
        })
    }

    /// Largest number of steps the homing search will take.
    pub fn homing_budget_steps(&self) -> u64 {
        (self.config.limits.max.0 * HOMING_BUDGET_FACTOR * self.constraints.steps_per_degree)
            .round()
            .max(0.0) as u64
    }

    /// Worst-case wall-clock time of a homing run.
    ///
    /// The search itself is bounded only by the step budget: for a 360°
    /// axis at 0.5°/s this is 792 s before failure is reported. Cancellation
    /// latency during the search is one homing step.
    pub fn homing_time_bound(&self) -> Duration {
        let search = self.config.limits.max.0.max(0.0) * HOMING_BUDGET_FACTOR / HOMING_SPEED.0;
        let backoff = HOMING_BACKOFF.0 / (HOMING_SPEED.0 / 2.0);
        Duration::from_secs_f64(search + backoff) + DIRECTION_SETTLE * 2
    }

    /// Pulse-train profile for a signed step delta.
    fn profile(&self, delta: i64) -> MotionProfile {
        MotionProfile::trapezoidal(
            delta,
            self.constraints.max_velocity_steps_per_sec,
            self.constraints.acceleration_steps_per_sec2,
        )
    }

    /// Cancel whatever runs and return a fresh ticket.
    fn preempt(&self) -> u64 {
        self.gate.stop();
        self.gate.ticket()
    }

    fn run_move(&self, ticket: u64, target: Degrees) -> u64 {
        let target = self.config.limits.clamp(target);

        let _lock = self.lock_motion();
        let Some(_active) = self.gate.begin(ticket) else {
            debug!(axis = self.name, target = %target, "Move cancelled before start");
            return 0;
        };

        let delta = self.position.steps_to(target);
        if delta == 0 {
            return 0;
        }

        debug!(axis = self.name, target = %target, steps = delta, "Move");
        self.execute(ticket, &self.profile(delta))
    }

    /// Emit a profile. Caller holds the motion lock and an active ticket.
    fn execute(&self, ticket: u64, profile: &MotionProfile) -> u64 {
        if profile.is_zero() {
            return 0;
        }

        if let Err(e) = self.set_direction(profile.direction) {
            error!(axis = self.name, error = %e, "Failed to set direction");
            return 0;
        }
        self.backend.delay(DIRECTION_SETTLE);

        let intervals = profile.delay_table();
        let sign = profile.direction.sign();
        let result = self.backend.pulse_train(
            self.config.pins.step,
            &intervals,
            &|| self.gate.is_cancelled(ticket),
            &mut || self.position.move_steps(sign),
        );

        match result {
            Ok(emitted) => {
                if emitted < profile.total_steps {
                    debug!(
                        axis = self.name,
                        emitted,
                        planned = profile.total_steps,
                        "Move cancelled"
                    );
                }
                emitted
            }
            Err(e) => {
                error!(axis = self.name, error = %e, "Pulse train failed");
                0
            }
        }
    }

    fn back_off(&self, ticket: u64, speed: f64) -> Result<(), HomingError> {
        let steps = (HOMING_BACKOFF.0 * self.constraints.steps_per_degree).round() as u64;
        let profile = MotionProfile::constant(steps, HOMING_DIRECTION.reversed(), speed);
        self.execute(ticket, &profile);

        if self.gate.is_cancelled(ticket) {
            Err(self.cancelled())
        } else {
            Ok(())
        }
    }

    fn switch_triggered(&self, switch: PinId) -> Result<bool, BackendError> {
        let level = self.backend.read(switch)?;
        let active = if self.config.home_switch.active_low {
            Level::Low
        } else {
            Level::High
        };
        Ok(level == active)
    }

    fn set_direction(&self, direction: Direction) -> Result<(), BackendError> {
        let positive = direction == Direction::Positive;
        let level = Level::from_bool(positive != self.config.invert_direction);
        self.backend.write(self.config.pins.direction, level)
    }

    fn write_enable(&self, enabled: bool) -> Result<(), BackendError> {
        let level = Level::from_bool(enabled != self.config.enable_active_low);
        self.backend.write(self.config.pins.enable, level)?;
        self.enabled.store(enabled, Ordering::Release);
        Ok(())
    }

    fn lock_motion(&self) -> MutexGuard<'_, ()> {
        self.motion.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn cancelled(&self) -> HomingError {
        HomingError::Cancelled {
            axis: self.name.to_string(),
        }
    }

    fn hardware(&self, e: BackendError) -> HomingError {
        error!(axis = self.name, error = %e, "Homing I/O failed");
        HomingError::Hardware {
            axis: self.name.to_string(),
            message: e.to_string(),
        }
    }
}

impl core::fmt::Debug for AxisEngine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AxisEngine")
            .field("name", &self.name)
            .field("position_steps", &self.position_steps())
            .field("enabled", &self.is_enabled())
            .field("moving", &self.is_moving())
            .finish()
    }
}
