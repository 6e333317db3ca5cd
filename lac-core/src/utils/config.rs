//! Tuning constants and runtime configuration for the actuator controller.
//!
//! The constants describe the reference board (10-bit potentiometer feedback,
//! 8-bit PWM, 250 ms watchdog). `DriverConfig` carries the same values so a
//! board with a shorter stroke or a finer PWM can override them.

use embassy_time::Duration;
use serde::Deserialize;

/// Samples held by the position and velocity filters.
pub const BUF_LEN: usize = 3;
/// Samples held by the derivative-term filter.
pub const D_BUFFER_LEN: usize = 10;
/// Analog reads averaged into one raw position sample.
pub const AVG_NUM: u8 = 4;

/// Highest raw position the actuator may be driven toward.
pub const UPPER_LIMIT: u16 = 1023;
/// Lowest raw position the actuator may be driven toward.
pub const LOWER_LIMIT: u16 = 0;
/// Margin inside the travel limits where outward motion is suppressed.
pub const STOP_BUFFER: u16 = 0;
/// Largest value the 10-bit feedback ADC reports.
pub const ADC_MAX: u16 = 1023;

/// Velocity commands below this magnitude are treated as stop.
pub const MIN_VEL: f32 = 30.0;
/// Full-scale duty used by the control law (8-bit PWM).
pub const PWM_MAX: u16 = 255;

/// Watchdog timeout armed by `MotorDriver::enable`.
pub const WD_TIME: Duration = Duration::from_millis(250);
/// Period of the control loop task.
pub const CONTROL_PERIOD: Duration = Duration::from_millis(10);

/// Runtime parameters of a `MotorDriver`.
///
/// Deserializes from a partial object; missing fields keep their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    pub upper_limit: u16,
    pub lower_limit: u16,
    pub stop_buffer: u16,
    /// Dead-band threshold, in raw counts per second.
    pub min_velocity: f32,
    pub watchdog_timeout_ms: u64,
    pub pwm_max: u16,
    /// Counts/s of velocity setpoint per count of position error.
    pub position_gain: f32,
    pub oversample: u8,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            upper_limit: UPPER_LIMIT,
            lower_limit: LOWER_LIMIT,
            stop_buffer: STOP_BUFFER,
            min_velocity: MIN_VEL,
            watchdog_timeout_ms: WD_TIME.as_millis(),
            pwm_max: PWM_MAX,
            position_gain: 1.0,
            oversample: AVG_NUM,
        }
    }
}

impl DriverConfig {
    /// Set the travel limits and the stop buffer inside them.
    pub fn with_limits(
        mut self,
        lower: u16,
        upper: u16,
        stop_buffer: u16,
    ) -> Self {
        self.lower_limit = lower;
        self.upper_limit = upper;
        self.stop_buffer = stop_buffer;
        self
    }

    /// Set the dead-band threshold.
    pub fn with_dead_band(
        mut self,
        min_velocity: f32,
    ) -> Self {
        self.min_velocity = min_velocity;
        self
    }

    /// Set the position-to-velocity gain used by `pos_command`.
    pub fn with_position_gain(
        mut self,
        gain: f32,
    ) -> Self {
        self.position_gain = gain;
        self
    }

    pub fn watchdog_timeout(&self) -> Duration {
        Duration::from_millis(self.watchdog_timeout_ms)
    }

    /// Raw position at or above which motion toward the upper limit stops.
    pub fn upper_stop(&self) -> u16 {
        self.upper_limit.saturating_sub(self.stop_buffer)
    }

    /// Raw position at or below which motion toward the lower limit stops.
    pub fn lower_stop(&self) -> u16 {
        self.lower_limit.saturating_add(self.stop_buffer)
    }
}
