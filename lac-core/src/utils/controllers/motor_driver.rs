//! Closed-loop driver for one linear actuator.
//!
//! `MotorDriver` filters the potentiometer feedback, estimates velocity,
//! runs a PID velocity loop and writes direction + PWM to an H-bridge. While
//! enabled it holds the watchdog armed: `speed_command` or `pos_command` must
//! then run at least once per watchdog timeout (250 ms by default) or the MCU
//! is reset.
//!
//! # Example
//! ```rust,ignore
//! let mut driver = MotorDriver::new(1.0, 0.0, 0.0, bridge, adc, wdt, EmbassyClock);
//! driver.init()?;
//! driver.enable()?;
//! loop {
//!     driver.pos_command(512)?;
//!     Timer::after_millis(10).await;
//! }
//! ```

use crate::utils::{
    config::{DriverConfig, ADC_MAX},
    hal::{Actuator, Clock, Direction, DriverError, PositionSensor, Watchdog},
    math::{pid::PidController, rolling_average::RollingAverage},
};

/// Enable state of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Motor power off, watchdog disarmed.
    Disabled,
    /// Motor power on, watchdog armed.
    Enabled,
}

/// Outcome of a command call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    /// The control output was written to the bridge.
    Applied,
    /// The command fell inside the dead-band; the motor was stopped.
    DeadBand,
    /// Motion toward a travel limit was suppressed.
    Limited,
    /// The driver is disabled; outputs held at stop.
    Disabled,
}

/// Feedback sampled at the start of a command.
#[derive(Debug, Clone, Copy)]
struct Measurement {
    /// Filtered position, raw counts.
    position: f32,
    /// Smoothed velocity, counts per second.
    velocity: f32,
    /// Seconds since the previous sample, zero on the first one.
    dt: f32,
}

/// Velocity/position controller for an H-bridge driven actuator.
pub struct MotorDriver<A, S, W, C> {
    /// Timestamp of the latest sample, microseconds.
    pub micro: u64,
    /// Latest raw position sample.
    pub raw_pos: u16,

    bridge: A,
    sensor: S,
    watchdog: W,
    clock: C,
    config: DriverConfig,
    state: DriverState,
    pid: PidController,

    prev_micro: Option<u64>,
    prev_pos: f32,
    vel_buffer: RollingAverage,
    pos_buffer: RollingAverage,
    output: (Direction, u16),
}

impl<A, S, W, C> MotorDriver<A, S, W, C>
where
    A: Actuator,
    S: PositionSensor,
    W: Watchdog,
    C: Clock,
{
    /// Create a disabled driver with the given velocity-loop gains.
    pub fn new(
        k_p: f32,
        k_i: f32,
        k_d: f32,
        bridge: A,
        sensor: S,
        watchdog: W,
        clock: C,
    ) -> Self {
        Self {
            micro: 0,
            raw_pos: 0,
            bridge,
            sensor,
            watchdog,
            clock,
            config: DriverConfig::default(),
            state: DriverState::Disabled,
            pid: PidController::new(k_p, k_i, k_d)
                .with_integral_limit(f32::from(DriverConfig::default().pwm_max)),
            prev_micro: None,
            prev_pos: 0.0,
            vel_buffer: RollingAverage::new(),
            pos_buffer: RollingAverage::new(),
            output: (Direction::Stop, 0),
        }
    }

    /// Replace the default configuration.
    pub fn with_config(
        mut self,
        config: DriverConfig,
    ) -> Self {
        self.config = config;
        self.pid.set_integral_limit(f32::from(config.pwm_max));
        self
    }

    /// Put the bridge in its safe state and read the feedback input once.
    ///
    /// Leaves the driver disabled. Safe to retry after an error.
    #[tracing::instrument(skip(self))]
    pub fn init(&mut self) -> Result<(), DriverError> {
        self.bridge.configure()?;
        self.output = (Direction::Stop, 0);
        self.raw_pos = self.read_position()?;
        tracing::info!(raw_pos = self.raw_pos, "actuator driver initialized");
        Ok(())
    }

    /// Power the motor and arm the watchdog.
    ///
    /// Coming from `Disabled`, the PID state and both filters restart empty,
    /// so motion while disabled is not read as velocity. Calling it while
    /// enabled only re-arms the watchdog.
    pub fn enable(&mut self) -> Result<(), DriverError> {
        if self.state == DriverState::Disabled {
            self.bridge.set_enabled(true)?;
            self.pid.reset();
            self.vel_buffer.clear();
            self.pos_buffer.clear();
            self.prev_micro = None;
            self.state = DriverState::Enabled;
            tracing::info!(
                timeout_ms = self.config.watchdog_timeout_ms,
                "actuator enabled, watchdog armed"
            );
        }
        self.watchdog.arm(self.config.watchdog_timeout());
        Ok(())
    }

    /// Stop and de-energize the motor, then disarm the watchdog.
    ///
    /// If an output cannot be written the driver stays enabled and armed.
    pub fn disable(&mut self) -> Result<(), DriverError> {
        self.stop()?;
        self.bridge.set_enabled(false)?;
        self.watchdog.disarm();
        if self.state == DriverState::Enabled {
            tracing::info!("actuator disabled, watchdog disarmed");
        }
        self.state = DriverState::Disabled;
        Ok(())
    }

    /// `true` while enabled.
    pub fn status(&self) -> bool {
        self.state == DriverState::Enabled
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Run one velocity-loop step toward `velocity_command` (counts/s).
    ///
    /// Must be called at least once per watchdog timeout while enabled.
    pub fn speed_command(
        &mut self,
        velocity_command: f32,
    ) -> Result<CommandStatus, DriverError> {
        let m = self.measure()?;
        self.control(velocity_command, m)
    }

    /// Run one step toward the 10-bit position `target`.
    ///
    /// The position error is turned into a velocity setpoint and handed to
    /// the velocity loop, so the same dead-band, limits and watchdog cadence
    /// apply.
    pub fn pos_command(
        &mut self,
        target: u16,
    ) -> Result<CommandStatus, DriverError> {
        let target = target
            .min(ADC_MAX)
            .min(self.config.upper_limit)
            .max(self.config.lower_limit);
        let m = self.measure()?;
        let error = f32::from(target) - m.position;
        let velocity = self.config.position_gain * error;
        tracing::trace!(goal = target, error, setpoint = velocity, "position step");
        self.control(velocity, m)
    }

    /// Last direction and duty (out of `pwm_max`) written to the bridge.
    pub fn output(&self) -> (Direction, u16) {
        self.output
    }

    /// Filtered position, raw counts.
    pub fn position(&self) -> f32 {
        self.pos_buffer.average()
    }

    /// Smoothed velocity, counts per second.
    pub fn velocity(&self) -> f32 {
        self.vel_buffer.average()
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn watchdog(&self) -> &W {
        &self.watchdog
    }

    fn control(
        &mut self,
        velocity_command: f32,
        m: Measurement,
    ) -> Result<CommandStatus, DriverError> {
        if self.state == DriverState::Disabled {
            self.stop()?;
            return Ok(CommandStatus::Disabled);
        }

        let status = if libm::fabsf(velocity_command) < self.config.min_velocity {
            self.pid.reset();
            self.stop()?;
            CommandStatus::DeadBand
        } else {
            let error = velocity_command - m.velocity;
            let full = f32::from(self.config.pwm_max);
            let out = self.pid.update(error, m.dt).clamp(-full, full);
            let direction = if out > 0.0 {
                Direction::Extend
            } else if out < 0.0 {
                Direction::Retract
            } else {
                Direction::Stop
            };

            if self.toward_limit(direction) {
                tracing::warn!(
                    raw_pos = self.raw_pos,
                    ?direction,
                    "travel limit reached, motion suppressed"
                );
                self.pid.reset();
                self.stop()?;
                CommandStatus::Limited
            } else {
                let duty = libm::roundf(libm::fabsf(out)) as u16;
                self.write(direction, duty)?;
                CommandStatus::Applied
            }
        };

        self.watchdog.feed();
        tracing::trace!(
            command = velocity_command,
            position = m.position,
            velocity = m.velocity,
            duty = self.output.1,
            ?status,
            "control step"
        );
        Ok(status)
    }

    fn toward_limit(
        &self,
        direction: Direction,
    ) -> bool {
        match direction {
            Direction::Extend => self.raw_pos >= self.config.upper_stop(),
            Direction::Retract => self.raw_pos <= self.config.lower_stop(),
            Direction::Stop => false,
        }
    }

    /// Sample position and time, update both filters.
    fn measure(&mut self) -> Result<Measurement, DriverError> {
        let raw = match self.read_position() {
            Ok(raw) => raw,
            Err(e) => {
                // No feedback: stop driving, leave the watchdog unfed.
                if let Err(stop_err) = self.stop() {
                    tracing::warn!("failed to stop after feedback loss: {:?}", stop_err);
                }
                return Err(e);
            }
        };
        let now = self.clock.now().as_micros();
        self.raw_pos = raw;
        self.micro = now;

        let position = self.pos_buffer.average_with(f32::from(raw));
        let dt = match self.prev_micro {
            Some(prev) if now > prev => (now - prev) as f32 / 1_000_000.0,
            _ => 0.0,
        };
        let velocity = if dt > 0.0 {
            self.vel_buffer
                .average_with((position - self.prev_pos) / dt)
        } else {
            self.vel_buffer.average()
        };

        self.prev_micro = Some(now);
        self.prev_pos = position;
        Ok(Measurement {
            position,
            velocity,
            dt,
        })
    }

    /// Average `oversample` analog reads into one raw sample.
    fn read_position(&mut self) -> Result<u16, DriverError> {
        let n = self.config.oversample.max(1);
        let mut sum: u32 = 0;
        for _ in 0..n {
            let raw = self.sensor.read_raw().map_err(|e| {
                tracing::warn!("position feedback read failed: {:?}", e);
                DriverError::Sensor
            })?;
            sum += u32::from(raw.min(ADC_MAX));
        }
        Ok((sum / u32::from(n)) as u16)
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        self.write(Direction::Stop, 0)
    }

    fn write(
        &mut self,
        direction: Direction,
        duty: u16,
    ) -> Result<(), DriverError> {
        let direction = if duty == 0 { Direction::Stop } else { direction };
        self.bridge
            .drive(direction, duty, self.config.pwm_max)?;
        self.output = (direction, duty);
        Ok(())
    }
}
