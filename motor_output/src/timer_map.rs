//! Board timer map.
//!
//! Resolves a configured pin tag to the timer channel wired to it, filtered
//! by the kind of output asking. Built once from the `[[timers]]` section.

use heapless::Vec;
use motor_common::consts::MAX_TIMER_CHANNELS;
use motor_common::output::config::TimerHardwareConfig;
use motor_common::output::types::{IoTag, TimerHardware, TimerUsage};
use tracing::warn;

/// Timer channel definitions of the target board.
#[derive(Debug, Clone, Default)]
pub struct TimerMap {
    entries: Vec<TimerHardware, MAX_TIMER_CHANNELS>,
}

impl TimerMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the map from validated configuration entries.
    ///
    /// Entries beyond `MAX_TIMER_CHANNELS` are dropped with a warning.
    pub fn from_config(entries: &[TimerHardwareConfig]) -> Self {
        let mut map = Self::new();
        for entry in entries {
            if map.insert(entry.to_hardware()).is_err() {
                warn!(
                    "Timer map full, ignoring {} ({} CH{})",
                    entry.tag, entry.timer, entry.channel
                );
            }
        }
        map
    }

    /// Add a channel definition.
    ///
    /// # Errors
    /// Returns the definition back if the map is full.
    pub fn insert(&mut self, hardware: TimerHardware) -> Result<(), TimerHardware> {
        self.entries.push(hardware)
    }

    /// Find the channel driving `tag` that `usage` may claim.
    pub fn find(&self, tag: IoTag, usage: TimerUsage) -> Option<&TimerHardware> {
        if tag.is_none() {
            return None;
        }
        self.entries
            .iter()
            .find(|hw| hw.tag == tag && hw.usage.intersects(usage))
    }

    /// Number of channel definitions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
