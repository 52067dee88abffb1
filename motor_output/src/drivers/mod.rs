//! Timer backend implementations.
//!
//! - [`simulation`] - Software timer family for development and testing
//!
//! # Adding New Backends
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement `TimerBackend` (and optionally `DigitalEncoder`) from
//!    `motor_common::output`
//! 3. Register the factory in `BackendRegistry::with_builtin()`

pub mod simulation;
