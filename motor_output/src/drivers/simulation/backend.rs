//! Simulation backend implementation.
//!
//! The `SimulationBackend` implements the `TimerBackend` trait on top of a
//! software model of the board's timers, so the output subsystem can run and
//! be tested without hardware.

use super::dshot::{DshotProbe, SimDshotEncoder};
use super::timer::{SimBus, SimProbe};
use motor_common::output::channel::{TimerBackend, TimerChannel};
use motor_common::output::digital::DigitalEncoder;
use motor_common::output::types::{IoTag, TimerHardware};
use std::sync::Arc;
use tracing::{debug, warn};

/// Simulated hardware family.
pub struct SimulationBackend {
    bus: Arc<SimBus>,
    dshot: Option<SimDshotEncoder>,
    dshot_probe: DshotProbe,
    faulty: Vec<IoTag>,
}

impl SimulationBackend {
    /// Backend driving every channel of the timer map, with a DShot encoder.
    pub fn new() -> Self {
        let (encoder, dshot_probe) = SimDshotEncoder::new();
        Self {
            bus: Arc::new(SimBus::default()),
            dshot: Some(encoder),
            dshot_probe,
            faulty: Vec::new(),
        }
    }

    /// Backend without a DShot encoder.
    pub fn without_dshot() -> Self {
        Self {
            dshot: None,
            ..Self::new()
        }
    }

    /// Refuse to open the channel on `tag`.
    pub fn with_faulty_pin(mut self, tag: IoTag) -> Self {
        self.faulty.push(tag);
        self
    }

    /// Register probe shared with every channel opened by this backend.
    pub fn probe(&self) -> SimProbe {
        SimProbe::new(Arc::clone(&self.bus))
    }

    /// Transmission log of the DShot encoder.
    pub fn dshot_probe(&self) -> DshotProbe {
        self.dshot_probe.clone()
    }
}

impl Default for SimulationBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerBackend for SimulationBackend {
    fn name(&self) -> &'static str {
        "simulation"
    }

    fn open_channel(&mut self, hardware: &TimerHardware) -> Option<Box<dyn TimerChannel>> {
        if self.faulty.contains(&hardware.tag) {
            warn!("Simulated fault on {} ({} CH{})", hardware.tag, hardware.timer, hardware.channel);
            return None;
        }
        let channel = self.bus.open(hardware)?;
        debug!("Opened {} CH{} on {}", hardware.timer, hardware.channel, hardware.tag);
        Some(Box::new(channel))
    }

    fn digital_encoder(&mut self) -> Option<Box<dyn DigitalEncoder>> {
        self.dshot
            .take()
            .map(|encoder| Box::new(encoder) as Box<dyn DigitalEncoder>)
    }
}
