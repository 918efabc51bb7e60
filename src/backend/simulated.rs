//! Simulation backend - no hardware, logs intent.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, trace};

use crate::error::BackendError;

use super::{Level, PinId, PulseBackend};

/// How simulated delays behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// Delays return immediately.
    Instant,
    /// Delays sleep for their real duration.
    RealTime,
}

/// Input level that changes once another pin has seen enough pulses.
#[derive(Debug, Clone, Copy)]
struct Trigger {
    watch: PinId,
    after_pulses: u64,
    level: Level,
}

#[derive(Debug, Default)]
struct SimState {
    outputs: HashSet<PinId>,
    inputs: HashSet<PinId>,
    levels: HashMap<PinId, Level>,
    pulses: HashMap<PinId, u64>,
    triggers: HashMap<PinId, Trigger>,
}

/// Backend used when no pulse hardware is present.
///
/// Inputs read high ("switch not triggered" for active-low wiring) unless a
/// level was injected with [`SimulatedBackend::set_input`] or
/// [`SimulatedBackend::trigger_after`].
#[derive(Debug)]
pub struct SimulatedBackend {
    pacing: Pacing,
    state: Mutex<SimState>,
    released: AtomicBool,
}

impl SimulatedBackend {
    /// Create a simulation backend.
    pub fn new(pacing: Pacing) -> Self {
        Self {
            pacing,
            state: Mutex::new(SimState::default()),
            released: AtomicBool::new(false),
        }
    }

    /// Force the level read from an input pin.
    pub fn set_input(&self, pin: PinId, level: Level) {
        let mut state = self.lock();
        state.triggers.remove(&pin);
        state.levels.insert(pin, level);
    }

    /// Make `input` read `level` once `watch` has emitted `after_pulses` more pulses.
    pub fn trigger_after(&self, input: PinId, watch: PinId, after_pulses: u64, level: Level) {
        let mut state = self.lock();
        let base = state.pulses.get(&watch).copied().unwrap_or(0);
        state.triggers.insert(
            input,
            Trigger {
                watch,
                after_pulses: base + after_pulses,
                level,
            },
        );
    }

    /// Pulses emitted on a pin so far.
    pub fn pulse_count(&self, pin: PinId) -> u64 {
        self.lock().pulses.get(&pin).copied().unwrap_or(0)
    }

    /// Last level written to a pin.
    pub fn level(&self, pin: PinId) -> Option<Level> {
        self.lock().levels.get(&pin).copied()
    }

    /// True once [`PulseBackend::release`] has run.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        // State stays consistent even if a holder panicked
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(Pacing::Instant)
    }
}

impl PulseBackend for SimulatedBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn is_simulated(&self) -> bool {
        true
    }

    fn configure_output(&self, pin: PinId) -> Result<(), BackendError> {
        if self.lock().outputs.insert(pin) {
            debug!(%pin, "sim: configure output");
        }
        Ok(())
    }

    fn configure_input_pulled_up(&self, pin: PinId) -> Result<(), BackendError> {
        if self.lock().inputs.insert(pin) {
            debug!(%pin, "sim: configure input with pull-up");
        }
        Ok(())
    }

    fn write(&self, pin: PinId, level: Level) -> Result<(), BackendError> {
        trace!(%pin, ?level, "sim: write");
        self.lock().levels.insert(pin, level);
        Ok(())
    }

    fn pulse(&self, pin: PinId, high_hold: Duration) -> Result<(), BackendError> {
        trace!(%pin, "sim: pulse");
        *self.lock().pulses.entry(pin).or_insert(0) += 1;
        self.delay(high_hold);
        Ok(())
    }

    fn read(&self, pin: PinId) -> Result<Level, BackendError> {
        let state = self.lock();
        if let Some(trigger) = state.triggers.get(&pin) {
            let pulses = state.pulses.get(&trigger.watch).copied().unwrap_or(0);
            if pulses >= trigger.after_pulses {
                return Ok(trigger.level);
            }
        }
        Ok(state.levels.get(&pin).copied().unwrap_or(Level::High))
    }

    fn delay(&self, duration: Duration) {
        if self.pacing == Pacing::RealTime && !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::AcqRel) {
            let mut state = self.lock();
            debug!(
                outputs = state.outputs.len(),
                inputs = state.inputs.len(),
                "sim: release pins"
            );
            state.outputs.clear();
            state.inputs.clear();
        }
    }
}
