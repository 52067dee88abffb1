//! Cross-thread disarm.
//!
//! The control loop owns `MotorOutput` mutably, so fault and arming paths
//! running elsewhere use a `DisarmHandle` instead. The handle shares the
//! arming gate and the motor timer channels; `disable()` neither blocks nor
//! allocates.

use heapless::Vec;
use motor_common::consts::{INVERTER_PHASES, MAX_SUPPORTED_MOTORS};
use motor_common::output::channel::TimerChannel;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::port::OutputTable;

/// Timer channels reachable from a handle.
const MAX_DISARM_CHANNELS: usize = MAX_SUPPORTED_MOTORS * INVERTER_PHASES;

/// Cloneable kill switch for the motor outputs.
#[derive(Clone)]
pub struct DisarmHandle {
    enabled: Arc<AtomicBool>,
    channels: Vec<Arc<dyn TimerChannel>, MAX_DISARM_CHANNELS>,
}

impl DisarmHandle {
    /// Handle over the analog channels of `motors`, sharing `enabled`.
    ///
    /// DShot ports have no compare register and are skipped.
    pub(crate) fn new<const N: usize>(enabled: Arc<AtomicBool>, motors: &OutputTable<N>) -> Self {
        let mut channels = Vec::new();
        for timer in motors
            .iter()
            .flat_map(|port| port.channels())
            .filter_map(|channel| channel.timer())
        {
            // INVERTER_PHASES channels per motor at most.
            let _ = channels.push(Arc::clone(timer));
        }
        Self { enabled, channels }
    }

    /// Close the arming gate, then zero and latch every motor channel.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        for channel in &self.channels {
            channel.set_compare(0);
            channel.latch();
        }
    }

    /// True while the arming gate is open.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Number of timer channels the handle zeroes.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}

impl fmt::Debug for DisarmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisarmHandle")
            .field("enabled", &self.is_enabled())
            .field("channels", &self.channels.len())
            .finish()
    }
}
