//! Hardware seams of the controller.
//!
//! The control logic reaches every peripheral through one of these traits, so
//! it runs unchanged against real pins, the host simulation, or test fakes.
//!
//! - `hbridge`: `Actuator` over embedded-hal direction, PWM and enable pins
//! - `watchdog`: `SoftWatchdog`, a software countdown implementing `Watchdog`

pub mod hbridge;
pub mod watchdog;

use embassy_time::{Duration, Instant};
use embedded_hal::{digital, pwm};

pub use hbridge::HBridge;
pub use watchdog::{SoftWatchdog, WatchdogStarved};

/// Errors surfaced by the driver when a peripheral rejects an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// A direction or enable pin could not be written.
    Pin(digital::ErrorKind),
    /// The PWM channel rejected a duty cycle.
    Pwm(pwm::ErrorKind),
    /// The position feedback input could not be read.
    Sensor,
}

/// Direction of travel on the H-bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward `UPPER_LIMIT` (INA high, INB low).
    Extend,
    /// Toward `LOWER_LIMIT` (INA low, INB high).
    Retract,
    /// Both inputs low, no drive.
    Stop,
}

/// Monotonic time source.
pub trait Clock {
    fn now(&self) -> Instant;
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

/// Clock backed by the embassy time driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Single-channel analog position feedback.
pub trait PositionSensor {
    type Error: core::fmt::Debug;

    /// Read one raw 10-bit sample.
    fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

/// Hardware watchdog capability.
pub trait Watchdog {
    /// Start enforcing `timeout`; the countdown starts full.
    fn arm(
        &mut self,
        timeout: Duration,
    );
    /// Stop enforcement.
    fn disarm(&mut self);
    /// Restart the countdown.
    fn feed(&mut self);
}

/// Direction + PWM output stage with a driver-enable line.
pub trait Actuator {
    /// Put every output in its safe state: no drive, zero duty, driver off.
    fn configure(&mut self) -> Result<(), DriverError>;

    /// Assert or release the driver-enable line.
    fn set_enabled(
        &mut self,
        enabled: bool,
    ) -> Result<(), DriverError>;

    /// Drive in `direction` with `duty` out of `full_scale`.
    fn drive(
        &mut self,
        direction: Direction,
        duty: u16,
        full_scale: u16,
    ) -> Result<(), DriverError>;
}
