//! Utility re-exports and helper macros for the actuator controller.
//!
//! - `config`: tuning constants and `DriverConfig`
//! - `controllers`: `MotorDriver` and the periodic `ControlLoop`
//! - `hal`: hardware capability traits, H-bridge and software watchdog
//! - `math`: rolling average filter and PID law
//!
//! The `mk_static!` macro simplifies static initialization in no-std contexts.

pub mod config;
pub mod controllers;
pub mod hal;
pub mod math;

pub use config::DriverConfig;
pub use controllers::{ActuatorCommand, CommandStatus, ControlLoop, MotorDriver, ACTUATOR_CHANNEL};
pub use embassy_time::*;
pub use hal::{EmbassyClock, HBridge, SoftWatchdog};
pub use math::rolling_average::RollingAverage;

#[macro_export]
/// Initialize a no-std static cell and write the given value into it.
///
/// This macro creates a `static_cell::StaticCell` for type `$t` and initializes
/// it with `$val`, returning a mutable reference to the stored value.
macro_rules! mk_static {
    ($t:ty, $val:expr) => {{
        static STATIC_CELL: static_cell::StaticCell<$t> = static_cell::StaticCell::new();
        STATIC_CELL.uninit().write($val)
    }};
}
