//! Closed-loop controller for a single-axis linear actuator on no-std embedded platforms.
//!
//! For a host-side simulation, see the `lac-app/mock-mcu` binary.
#![no_std]

pub mod utils;
