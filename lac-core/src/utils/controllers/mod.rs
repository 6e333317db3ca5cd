//! Actuator control.
//!
//! - `motor_driver`: closed-loop driver for one H-bridge actuator
//!
//! `ControlLoop` wraps a `MotorDriver` with a held setpoint and services it on
//! a fixed period, so the watchdog is fed as long as the task keeps running.
//! Commands reach it through `ACTUATOR_CHANNEL`.

pub mod motor_driver;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Ticker;
use serde::{Deserialize, Serialize};

use crate::utils::{
    config::CONTROL_PERIOD,
    hal::{Actuator, Clock, DriverError, PositionSensor, Watchdog},
};
pub use motor_driver::{CommandStatus, DriverState, MotorDriver};

/// Channel used to receive actuator commands (`ActuatorCommand` messages).
pub static ACTUATOR_CHANNEL: embassy_sync::channel::Channel<
    CriticalSectionRawMutex,
    ActuatorCommand,
    16,
> = embassy_sync::channel::Channel::new();

/// Commands accepted by the control loop.
///
/// Serialized as JSON with tag `"ac"`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(tag = "ac", rename_all = "snake_case")] // ac = actuator command
pub enum ActuatorCommand {
    /// Hold a velocity, raw counts per second.
    Speed { v: f32 },
    /// Move to a 10-bit position and hold it.
    Position { p: u16 },
    /// Hold still (zero velocity, watchdog still fed).
    Stop,
    Enable,
    Disable,
}

/// What the loop drives toward on every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    Idle,
    Velocity(f32),
    Position(u16),
}

/// Periodic servicing of a `MotorDriver`.
pub struct ControlLoop<A, S, W, C> {
    pub driver: MotorDriver<A, S, W, C>,
    setpoint: Setpoint,
}

impl<A, S, W, C> ControlLoop<A, S, W, C>
where
    A: Actuator,
    S: PositionSensor,
    W: Watchdog,
    C: Clock,
{
    pub fn new(driver: MotorDriver<A, S, W, C>) -> Self {
        Self {
            driver,
            setpoint: Setpoint::Idle,
        }
    }

    pub fn setpoint(&self) -> Setpoint {
        self.setpoint
    }

    /// Update the held setpoint or the driver state.
    pub fn apply(
        &mut self,
        command: ActuatorCommand,
    ) -> Result<(), DriverError> {
        tracing::debug!(?command, "actuator command");
        match command {
            ActuatorCommand::Speed { v } => self.setpoint = Setpoint::Velocity(v),
            ActuatorCommand::Position { p } => self.setpoint = Setpoint::Position(p),
            ActuatorCommand::Stop => self.setpoint = Setpoint::Idle,
            ActuatorCommand::Enable => self.driver.enable()?,
            ActuatorCommand::Disable => {
                self.setpoint = Setpoint::Idle;
                self.driver.disable()?;
            }
        }
        Ok(())
    }

    /// Apply `command` if any, then run one driver step toward the setpoint.
    pub fn step(
        &mut self,
        command: Option<ActuatorCommand>,
    ) -> Result<CommandStatus, DriverError> {
        if let Some(command) = command {
            self.apply(command)?;
        }
        match self.setpoint {
            Setpoint::Idle => self.driver.speed_command(0.0),
            Setpoint::Velocity(v) => self.driver.speed_command(v),
            Setpoint::Position(p) => self.driver.pos_command(p),
        }
    }

    /// Service the driver every `CONTROL_PERIOD`, draining `ACTUATOR_CHANNEL`
    /// before each step.
    pub async fn run(&mut self) -> ! {
        let mut ticker = Ticker::every(CONTROL_PERIOD);
        loop {
            while let Ok(command) = ACTUATOR_CHANNEL.try_receive() {
                if let Err(e) = self.apply(command) {
                    tracing::error!("actuator command {:?} failed: {:?}", command, e);
                }
            }
            match self.step(None) {
                Ok(status) => tracing::trace!(?status, "tick"),
                Err(e) => tracing::error!("control step failed: {:?}", e),
            }
            ticker.next().await;
        }
    }
}
