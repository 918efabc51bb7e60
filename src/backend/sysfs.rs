//! Linux sysfs GPIO pin provider.

use std::path::Path;

use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};
use sysfs_gpio::{Direction, Pin};
use tracing::{debug, warn};

use crate::error::BackendError;

use super::software::GpioChip;
use super::PinId;

const EXPORT: &str = "/sys/class/gpio/export";

/// Error from the sysfs GPIO interface.
#[derive(Debug)]
pub struct SysfsPinError(sysfs_gpio::Error);

impl digital::Error for SysfsPinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// An exported sysfs GPIO.
#[derive(Debug)]
pub struct SysfsPin(Pin);

impl ErrorType for SysfsPin {
    type Error = SysfsPinError;
}

impl OutputPin for SysfsPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.set_value(0).map_err(SysfsPinError)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.set_value(1).map_err(SysfsPinError)
    }
}

impl InputPin for SysfsPin {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.0.get_value().map(|v| v != 0).map_err(SysfsPinError)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.is_high().map(|high| !high)
    }
}

/// Pin provider backed by `/sys/class/gpio`.
#[derive(Debug)]
pub struct SysfsChip;

impl SysfsChip {
    /// Check that the sysfs GPIO interface exists.
    pub fn probe() -> Result<Self, BackendError> {
        if Path::new(EXPORT).exists() {
            Ok(Self)
        } else {
            Err(BackendError::Unavailable(format!("{EXPORT} not found")))
        }
    }

    fn export(pin: PinId, direction: Direction) -> Result<SysfsPin, BackendError> {
        let gpio = Pin::new(pin.0 as u64);
        gpio.export().map_err(|e| {
            debug!(%pin, error = %e, "sysfs export failed");
            BackendError::PinError(pin)
        })?;
        gpio.set_direction(direction)
            .map_err(|_| BackendError::PinError(pin))?;
        Ok(SysfsPin(gpio))
    }
}

impl GpioChip for SysfsChip {
    type Output = SysfsPin;
    type Input = SysfsPin;

    fn name(&self) -> &'static str {
        "sysfs-gpio"
    }

    fn claim_output(&self, pin: PinId) -> Result<SysfsPin, BackendError> {
        Self::export(pin, Direction::Low)
    }

    fn claim_input_pulled_up(&self, pin: PinId) -> Result<SysfsPin, BackendError> {
        // sysfs cannot set pulls; the Pi's default pull-up on these pins or an
        // external resistor is assumed
        Self::export(pin, Direction::In)
    }

    fn unclaim(&self, pin: PinId) {
        if let Err(e) = Pin::new(pin.0 as u64).unexport() {
            warn!(%pin, error = %e, "sysfs unexport failed");
        }
    }
}
