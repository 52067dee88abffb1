//! Simulation backend module.
//!
//! This module provides a software timer family for development and testing
//! without physical hardware.

mod backend;
mod dshot;
mod timer;

pub use backend::SimulationBackend;
pub use dshot::{DshotFrame, DshotProbe, SimDshotEncoder};
pub use timer::{SimProbe, SimTimerChannel};

use motor_common::output::channel::TimerBackend;

/// Factory function to create a simulation backend instance.
pub fn create_backend() -> Box<dyn TimerBackend> {
    Box::new(SimulationBackend::new())
}
