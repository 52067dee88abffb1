//! Timer backends selectable by name.
//!
//! The `backend` key of the output configuration names the hardware family
//! whose timers drive the outputs. `BackendRegistry` maps those names to
//! factories; the binary builds one with `with_builtin()` and may register
//! board-specific families before opening the configured one.

use motor_common::output::channel::{BackendFactory, OutputError, TimerBackend};
use std::collections::BTreeMap;

use crate::drivers::simulation;

/// Timer backend factories keyed by configuration name.
pub struct BackendRegistry {
    factories: BTreeMap<&'static str, BackendFactory>,
}

impl BackendRegistry {
    /// Registry with no backends.
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with the backends compiled into this crate
    /// (`"simulation"`).
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("simulation", simulation::create_backend);
        registry
    }

    /// Add a hardware family under `name`.
    ///
    /// # Panics
    /// Two families cannot share a configuration name.
    pub fn register(&mut self, name: &'static str, factory: BackendFactory) {
        if self.factories.insert(name, factory).is_some() {
            panic!("Timer backend '{name}' registered twice");
        }
    }

    /// Open a fresh backend for the configured `name`.
    ///
    /// # Errors
    /// `OutputError::BackendNotFound` for unknown names.
    pub fn create_backend(&self, name: &str) -> Result<Box<dyn TimerBackend>, OutputError> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| OutputError::BackendNotFound(name.to_string()))
    }

    /// Configuration names accepted by `create_backend`, sorted.
    pub fn backend_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
