//! Software-timed GPIO backend.
//!
//! Generic over an `embedded-hal` 1.0 pin provider. Pulses and the waits
//! between them are timed on the calling thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use tracing::debug;

use crate::error::BackendError;

use super::{Level, PinId, PulseBackend};

/// Provider of `embedded-hal` pins by BCM number.
pub trait GpioChip: Send + Sync + 'static {
    /// Output pin type.
    type Output: OutputPin + Send + 'static;
    /// Input pin type.
    type Input: InputPin + Send + 'static;

    /// Name reported by the backend.
    fn name(&self) -> &'static str;

    /// Claim a pin as a push-pull output, initially low.
    fn claim_output(&self, pin: PinId) -> Result<Self::Output, BackendError>;

    /// Claim a pin as an input with pull-up.
    fn claim_input_pulled_up(&self, pin: PinId) -> Result<Self::Input, BackendError>;

    /// Give a pin back to the system.
    fn unclaim(&self, _pin: PinId) {}
}

/// `DelayNs` on the host: spins for short waits, sleeps for long ones.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl StdDelay {
    /// Below this the scheduler wakes us too late, so spin instead.
    const SPIN_THRESHOLD: Duration = Duration::from_micros(200);

    /// Wait for `duration`.
    pub fn wait(duration: Duration) {
        if duration < Self::SPIN_THRESHOLD {
            let deadline = Instant::now() + duration;
            while Instant::now() < deadline {
                std::hint::spin_loop();
            }
        } else {
            std::thread::sleep(duration);
        }
    }
}

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        Self::wait(Duration::from_nanos(ns as u64));
    }
}

type Shared<P> = Arc<Mutex<P>>;

/// Software-timed backend over a [`GpioChip`].
///
/// Every pin sits behind its own lock so two axes never contend.
pub struct SoftwareBackend<C: GpioChip> {
    chip: C,
    outputs: RwLock<HashMap<PinId, Shared<C::Output>>>,
    inputs: RwLock<HashMap<PinId, Shared<C::Input>>>,
    released: AtomicBool,
}

impl<C: GpioChip> SoftwareBackend<C> {
    /// Create a backend over a pin provider.
    pub fn new(chip: C) -> Self {
        Self {
            chip,
            outputs: RwLock::new(HashMap::new()),
            inputs: RwLock::new(HashMap::new()),
            released: AtomicBool::new(false),
        }
    }

    fn output(&self, pin: PinId) -> Result<Shared<C::Output>, BackendError> {
        self.outputs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&pin)
            .cloned()
            .ok_or(BackendError::PinNotConfigured(pin))
    }

    fn input(&self, pin: PinId) -> Result<Shared<C::Input>, BackendError> {
        self.inputs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&pin)
            .cloned()
            .ok_or(BackendError::PinNotConfigured(pin))
    }

    fn set(output: &mut C::Output, pin: PinId, level: Level) -> Result<(), BackendError> {
        let result = match level {
            Level::High => output.set_high(),
            Level::Low => output.set_low(),
        };
        result.map_err(|_| BackendError::PinError(pin))
    }
}

impl<C: GpioChip> PulseBackend for SoftwareBackend<C> {
    fn name(&self) -> &'static str {
        self.chip.name()
    }

    fn is_simulated(&self) -> bool {
        false
    }

    fn configure_output(&self, pin: PinId) -> Result<(), BackendError> {
        let mut outputs = self.outputs.write().unwrap_or_else(|e| e.into_inner());
        if outputs.contains_key(&pin) {
            return Ok(());
        }
        let claimed = self.chip.claim_output(pin)?;
        outputs.insert(pin, Arc::new(Mutex::new(claimed)));
        debug!(%pin, "Configured output");
        Ok(())
    }

    fn configure_input_pulled_up(&self, pin: PinId) -> Result<(), BackendError> {
        let mut inputs = self.inputs.write().unwrap_or_else(|e| e.into_inner());
        if inputs.contains_key(&pin) {
            return Ok(());
        }
        let claimed = self.chip.claim_input_pulled_up(pin)?;
        inputs.insert(pin, Arc::new(Mutex::new(claimed)));
        debug!(%pin, "Configured input with pull-up");
        Ok(())
    }

    fn write(&self, pin: PinId, level: Level) -> Result<(), BackendError> {
        let output = self.output(pin)?;
        let mut output = output.lock().unwrap_or_else(|e| e.into_inner());
        Self::set(&mut output, pin, level)
    }

    fn pulse(&self, pin: PinId, high_hold: Duration) -> Result<(), BackendError> {
        let output = self.output(pin)?;
        let mut output = output.lock().unwrap_or_else(|e| e.into_inner());
        Self::set(&mut output, pin, Level::High)?;
        StdDelay::wait(high_hold);
        Self::set(&mut output, pin, Level::Low)
    }

    fn read(&self, pin: PinId) -> Result<Level, BackendError> {
        let input = self.input(pin)?;
        let mut input = input.lock().unwrap_or_else(|e| e.into_inner());
        input
            .is_high()
            .map(Level::from_bool)
            .map_err(|_| BackendError::PinError(pin))
    }

    fn delay(&self, duration: Duration) {
        StdDelay::wait(duration);
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        let outputs: Vec<_> = self
            .outputs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();
        // Levels are left as they are: EN is usually active-low
        for (pin, _) in outputs {
            self.chip.unclaim(pin);
        }

        let inputs: Vec<_> = self
            .inputs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .drain()
            .collect();
        for (pin, _) in inputs {
            self.chip.unclaim(pin);
        }

        debug!(backend = self.chip.name(), "Released GPIO pins");
    }
}

impl<C: GpioChip> Drop for SoftwareBackend<C> {
    fn drop(&mut self) {
        self.release();
    }
}
