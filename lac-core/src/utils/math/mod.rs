//! Signal-processing utilities for the actuator controller.
//!
//! - `rolling_average`: fixed-window smoothing of position and velocity
//! - `pid`: discrete PID law used by the velocity loop

pub mod pid;
pub mod rolling_average;
