//! Pulse backends.
//!
//! A [`PulseBackend`] turns a logical pin and level into a physical effect
//! and emits step pulses. Three strategies exist:
//!
//! - [`WaveformBackend`]: hardware-timed pulse trains through pigpiod
//! - [`SoftwareBackend`]: software-timed GPIO over an `embedded-hal` pin provider
//! - [`SimulatedBackend`]: no hardware, logs intent
//!
//! [`select`] probes them once at startup. Callers only ever see
//! [`PulseBackend::name`] and [`PulseBackend::is_simulated`].

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{BackendConfig, BackendKind};
use crate::error::BackendError;

mod pigpio;
mod simulated;
mod software;
#[cfg(feature = "gpio-hardware")]
mod sysfs;
mod waveform;

pub use pigpio::PigpioClient;
pub use simulated::{Pacing, SimulatedBackend};
pub use software::{GpioChip, SoftwareBackend, StdDelay};
#[cfg(feature = "gpio-hardware")]
pub use sysfs::SysfsChip;
pub use waveform::{merge_windows, WaveformBackend, WavePulse};

/// High time of a step pulse. TMC2209 and A4988 need at least 1-2 us.
pub const PULSE_HIGH: Duration = Duration::from_micros(10);

/// BCM GPIO number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PinId(pub u8);

impl PinId {
    /// Highest GPIO on the Raspberry Pi header.
    pub const MAX_BCM: u8 = 27;

    /// True for GPIO0 to GPIO27.
    #[inline]
    pub fn is_header_gpio(self) -> bool {
        self.0 <= Self::MAX_BCM
    }

    /// Bit of this pin in a 32-bit GPIO mask, 0 above GPIO31.
    #[inline]
    pub fn mask(self) -> u32 {
        1u32.checked_shl(self.0 as u32).unwrap_or(0)
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPIO{}", self.0)
    }
}

/// Logical pin level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Driven or read low.
    Low,
    /// Driven or read high.
    High,
}

impl Level {
    /// Level from a boolean (`true` = high).
    #[inline]
    pub fn from_bool(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }

    /// True for [`Level::High`].
    #[inline]
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

/// Strategy interface for pin output, input and step pulses.
///
/// Implementations must be callable from both axis threads at once as long
/// as the calls address different pins.
pub trait PulseBackend: Send + Sync {
    /// Short backend name reported in status.
    fn name(&self) -> &'static str;

    /// True when no hardware is driven.
    fn is_simulated(&self) -> bool;

    /// Claim a pin as output. Configuring a pin twice is a no-op.
    fn configure_output(&self, pin: PinId) -> Result<(), BackendError>;

    /// Claim a pin as input with pull-up. Configuring a pin twice is a no-op.
    fn configure_input_pulled_up(&self, pin: PinId) -> Result<(), BackendError>;

    /// Drive an output pin.
    fn write(&self, pin: PinId, level: Level) -> Result<(), BackendError>;

    /// Raise the pin, hold it for `high_hold`, lower it.
    fn pulse(&self, pin: PinId, high_hold: Duration) -> Result<(), BackendError>;

    /// Read an input pin.
    fn read(&self, pin: PinId) -> Result<Level, BackendError>;

    /// Block the calling thread.
    fn delay(&self, duration: Duration);

    /// Emit one pulse per interval. Each interval runs from the rising edge of
    /// its pulse to the rising edge of the next.
    ///
    /// `cancelled` is polled before every pulse; `on_pulse` is called once per
    /// pulse known to have been emitted. Returns the number of pulses emitted.
    fn pulse_train(
        &self,
        pin: PinId,
        intervals: &[Duration],
        cancelled: &dyn Fn() -> bool,
        on_pulse: &mut dyn FnMut(),
    ) -> Result<u64, BackendError> {
        let mut emitted = 0;
        for interval in intervals {
            if cancelled() {
                break;
            }
            self.pulse(pin, PULSE_HIGH)?;
            emitted += 1;
            on_pulse();
            self.delay(interval.saturating_sub(PULSE_HIGH));
        }
        Ok(emitted)
    }

    /// Release every claimed pin. Only the first call has an effect.
    fn release(&self);
}

/// Probe the configured backend once.
///
/// Never fails: anything unavailable degrades to simulation with a warning.
pub fn select(config: &BackendConfig) -> Arc<dyn PulseBackend> {
    let try_waveform = matches!(config.kind, BackendKind::Auto | BackendKind::Waveform);
    let try_gpio = matches!(config.kind, BackendKind::Auto | BackendKind::Gpio);

    let mut reasons = Vec::new();

    if try_waveform {
        match WaveformBackend::connect(&config.pigpiod_addr) {
            Ok(backend) => {
                info!(addr = %config.pigpiod_addr, "Using hardware-timed pigpiod backend");
                return Arc::new(backend);
            }
            Err(e) => reasons.push(format!("pigpiod: {e}")),
        }
    }

    if try_gpio {
        match probe_gpio() {
            Ok(backend) => {
                info!("Using software-timed GPIO backend");
                return backend;
            }
            Err(e) => reasons.push(format!("gpio: {e}")),
        }
    }

    if config.kind != BackendKind::Simulation {
        warn!(
            reasons = %reasons.join("; "),
            "No pulse hardware available, running in simulation"
        );
    } else {
        info!("Simulation backend selected");
    }

    Arc::new(SimulatedBackend::new(Pacing::RealTime))
}

#[cfg(feature = "gpio-hardware")]
fn probe_gpio() -> Result<Arc<dyn PulseBackend>, BackendError> {
    let chip = SysfsChip::probe()?;
    Ok(Arc::new(SoftwareBackend::new(chip)))
}

#[cfg(not(feature = "gpio-hardware"))]
fn probe_gpio() -> Result<Arc<dyn PulseBackend>, BackendError> {
    Err(BackendError::Unavailable(
        "built without the gpio-hardware feature".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_mask() {
        assert_eq!(PinId(0).mask(), 1);
        assert_eq!(PinId(18).mask(), 1 << 18);
        assert_eq!(PinId(40).mask(), 0);
    }

    #[test]
    fn test_default_pulse_train_counts_and_cancels() {
        let backend = SimulatedBackend::new(Pacing::Instant);
        backend.configure_output(PinId(18)).unwrap();

        let intervals = vec![Duration::from_millis(1); 10];
        let mut seen = 0;
        let emitted = backend
            .pulse_train(PinId(18), &intervals, &|| seen_limit(&backend), &mut || seen += 1)
            .unwrap();

        assert_eq!(emitted, 4);
        assert_eq!(seen, 4);
        assert_eq!(backend.pulse_count(PinId(18)), 4);
    }

    fn seen_limit(backend: &SimulatedBackend) -> bool {
        backend.pulse_count(PinId(18)) >= 4
    }

    #[test]
    fn test_select_simulation() {
        let config = BackendConfig {
            kind: BackendKind::Simulation,
            ..BackendConfig::default()
        };

        let backend = select(&config);
        assert!(backend.is_simulated());
        assert_eq!(backend.name(), "simulation");
    }

    #[test]
    fn test_select_degrades_when_pigpiod_is_absent() {
        let config = BackendConfig {
            kind: BackendKind::Waveform,
            // Reserved port, nothing listens there
            pigpiod_addr: "127.0.0.1:1".to_string(),
        };

        assert!(select(&config).is_simulated());
    }
}
