//! Timer channel binder.
//!
//! Resolves logical output slots to board timer channels, enforces exclusive
//! channel ownership and records which slot claimed each physical timer
//! first. Only that first claimant may restart the timer during a one-shot
//! commit, so a timer shared by several motors is restarted once per cycle.

use heapless::{LinearMap, Vec};
use motor_common::consts::{MAX_TIMER_CHANNELS, MAX_TIMERS};
use motor_common::output::channel::{OutputError, OutputMode, TimeBase, TimerBackend};
use motor_common::output::types::{IoTag, TimerHardware, TimerId, TimerUsage};
use tracing::{debug, warn};

use crate::port::BoundChannel;

/// Channels claimed by any output table.
///
/// Shared by the motor, servo and beeper binders so a channel is never
/// claimed twice.
#[derive(Debug, Default)]
pub struct ChannelClaims {
    claimed: Vec<(TimerId, u8), MAX_TIMER_CHANNELS>,
}

impl ChannelClaims {
    /// No channel claimed.
    pub fn new() -> Self {
        Self::default()
    }

    /// True if the channel of `hardware` is already owned.
    pub fn is_claimed(&self, hardware: &TimerHardware) -> bool {
        self.claimed.contains(&(hardware.timer, hardware.channel))
    }

    fn claim(&mut self, hardware: &TimerHardware) -> bool {
        if self.is_claimed(hardware) {
            return false;
        }
        self.claimed.push((hardware.timer, hardware.channel)).is_ok()
    }

    /// Give the channel of `hardware` back.
    pub fn release(&mut self, hardware: &TimerHardware) {
        self.claimed
            .retain(|&(timer, channel)| (timer, channel) != (hardware.timer, hardware.channel));
    }

    /// Number of claimed channels.
    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    /// True if nothing is claimed.
    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}

/// Result of resolving one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Board definition of the claimed channel.
    pub hardware: TimerHardware,
    /// The slot is the first claimant of the channel's timer.
    pub force_overflow: bool,
}

/// Binds the slots of one output table.
pub struct Binder<'a> {
    map: &'a crate::timer_map::TimerMap,
    claims: &'a mut ChannelClaims,
    first_claimant: LinearMap<TimerId, usize, MAX_TIMERS>,
}

impl<'a> Binder<'a> {
    /// Binder resolving through `map`, recording ownership in `claims`.
    pub fn new(map: &'a crate::timer_map::TimerMap, claims: &'a mut ChannelClaims) -> Self {
        Self {
            map,
            claims,
            first_claimant: LinearMap::new(),
        }
    }

    /// Resolve `tag` for `slot` and claim its channel.
    ///
    /// # Errors
    /// Returns `OutputError::InsufficientHardware` if no channel drives `tag`
    /// for `usage`, or the channel is already claimed.
    pub fn bind(&mut self, slot: usize, tag: IoTag, usage: TimerUsage) -> Result<Binding, OutputError> {
        let insufficient = OutputError::InsufficientHardware { slot, tag };

        let hardware = *self.map.find(tag, usage).ok_or_else(|| insufficient.clone())?;
        if !self.claims.claim(&hardware) {
            debug!("Slot {} pin {}: {} CH{} already claimed", slot, tag, hardware.timer, hardware.channel);
            return Err(insufficient);
        }

        let force_overflow = match self.first_claimant.get(&hardware.timer) {
            Some(_) => false,
            None => {
                if self.first_claimant.insert(hardware.timer, slot).is_err() {
                    // More distinct timers than the board can have; never restart it.
                    warn!("Timer claimant map full, {} will not be restarted", hardware.timer);
                    false
                } else {
                    true
                }
            }
        };

        debug!(
            "Slot {} bound to {} CH{} (pin {}, force_overflow={})",
            slot, hardware.timer, hardware.channel, tag, force_overflow
        );

        Ok(Binding {
            hardware,
            force_overflow,
        })
    }

    /// Open the claimed channel on `backend` and configure it once.
    ///
    /// The compare register is zeroed right after configuration.
    ///
    /// # Errors
    /// Returns `OutputError::InsufficientHardware` and releases the claim if
    /// the backend cannot drive the channel.
    pub fn open(
        &mut self,
        backend: &mut dyn TimerBackend,
        slot: usize,
        binding: Binding,
        time_base: TimeBase,
        mode: OutputMode,
    ) -> Result<BoundChannel, OutputError> {
        let Some(mut timer) = backend.open_channel(&binding.hardware) else {
            self.claims.release(&binding.hardware);
            return Err(OutputError::InsufficientHardware {
                slot,
                tag: binding.hardware.tag,
            });
        };

        timer.configure(time_base, mode);
        timer.set_compare(0);

        Ok(BoundChannel::new(binding.hardware, binding.force_overflow, timer))
    }

    /// Slot that first claimed `timer`, if any.
    pub fn first_claimant(&self, timer: TimerId) -> Option<usize> {
        self.first_claimant.get(&timer).copied()
    }
}
