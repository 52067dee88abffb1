//! Timer channel capability traits and error types.
//!
//! This module defines:
//! - `TimerChannel` trait - Register-level access to one bound timer channel
//! - `TimerBackend` trait - Hardware family that opens channels by definition
//! - `OutputMode` / `TimeBase` - Channel configuration applied once at bind
//! - `OutputError` enum - Error types for output operations

use crate::output::digital::DigitalEncoder;
use crate::output::types::{IoTag, OutputFlags, TimerHardware, TimerId};
use thiserror::Error;

/// Error types for output operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// No usable timer channel exists for a configured slot.
    #[error("Insufficient hardware: slot {slot} has no free timer channel for {tag}")]
    InsufficientHardware {
        /// Logical slot that could not be bound.
        slot: usize,
        /// Pin requested for the slot.
        tag: IoTag,
    },

    /// Slot index or value outside the configured bounds.
    #[error("Precondition violation: {0}")]
    PreconditionViolation(String),

    /// Command value above the DShot command range.
    #[error("Invalid DShot command: {0} (max 47)")]
    InvalidCommand(u8),

    /// Command injection requested for a non-digital protocol.
    #[error("Configured motor protocol is not digital")]
    NotDigital,

    /// Timer backend not found in the registry.
    #[error("Timer backend not found: {0}")]
    BackendNotFound(String),
}

/// Output polarity of the active pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Pin is high while the counter is below the compare value.
    ActiveHigh,
    /// Pin is low while the counter is below the compare value.
    ActiveLow,
}

/// Counter clock and period of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    /// Counter ticks per microsecond.
    pub mhz: u32,
    /// Counter period in ticks.
    pub period: u32,
}

impl TimeBase {
    /// Period for a free-running output at `rate_hz`.
    pub const fn for_rate(mhz: u32, rate_hz: u32) -> Self {
        Self {
            mhz,
            period: mhz * 1_000_000 / rate_hz,
        }
    }
}

/// Compare-output configuration of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputMode {
    /// Pulse polarity.
    pub polarity: Polarity,
    /// Channel drives the complementary (N) pin of a bridge.
    pub complementary: bool,
    /// Pin level while the output is idle.
    pub idle_high: bool,
    /// Dead-time inserted between complementary edges, in timer ticks.
    pub dead_time: u16,
    /// Compare value loaded at configuration time.
    pub initial_pulse: u32,
}

impl OutputMode {
    /// Derive the output mode from the pin wiring and the configured inversion.
    ///
    /// Inversion toggles the wiring's own `INVERTED` flag. Complementary outputs
    /// idle low with opposite pulse polarity.
    pub fn new(output: OutputFlags, invert: bool, dead_time: u16, initial_pulse: u32) -> Self {
        let output = if invert {
            output ^ OutputFlags::INVERTED
        } else {
            output
        };
        let inverted = output.contains(OutputFlags::INVERTED);
        let complementary = output.contains(OutputFlags::N_CHANNEL);
        let polarity = match (complementary, inverted) {
            (true, true) | (false, false) => Polarity::ActiveHigh,
            (true, false) | (false, true) => Polarity::ActiveLow,
        };

        Self {
            polarity,
            complementary,
            idle_high: !complementary,
            dead_time,
            initial_pulse,
        }
    }
}

/// Register-level access to one bound timer channel.
///
/// Implemented once per hardware family. Register writes take `&self`: they
/// model memory-mapped stores, so a fault handler holding a shared reference
/// can still zero outputs.
///
/// # Timing Contracts
///
/// | Operation | Context | Constraint |
/// |-----------|---------|------------|
/// | `configure()` | init | once per channel |
/// | `set_compare()` | control loop, fault path | no blocking, no allocation |
/// | `force_overflow()` | control loop | no blocking |
/// | `latch()` | control loop, fault path | no blocking |
pub trait TimerChannel: Send + Sync {
    /// Physical timer this channel belongs to.
    fn timer(&self) -> TimerId;

    /// Program time base and output mode. Called exactly once after opening.
    fn configure(&mut self, time_base: TimeBase, mode: OutputMode);

    /// Write the compare register. The value is picked up by hardware at the
    /// next latch point (period rollover, forced overflow or shadow transfer).
    fn set_compare(&self, ticks: u32);

    /// Restart the timer counter immediately, generating an update event.
    fn force_overflow(&self);

    /// Request a shadow transfer on families with double-buffered modules.
    ///
    /// Default: no-op, for families that latch on their own.
    fn latch(&self) {}

    /// Configured period in ticks.
    fn period_ticks(&self) -> u32;
}

/// A hardware family able to open timer channels.
pub trait TimerBackend: Send {
    /// Backend identifier (e.g., "simulation").
    fn name(&self) -> &'static str;

    /// Open the channel described by `hardware`, or `None` if the family
    /// cannot drive it.
    fn open_channel(&mut self, hardware: &TimerHardware) -> Option<Box<dyn TimerChannel>>;

    /// Encoder for the DShot family, if the backend has one.
    ///
    /// Called once when a digital protocol is selected.
    fn digital_encoder(&mut self) -> Option<Box<dyn DigitalEncoder>> {
        None
    }
}

/// Factory function type for creating backend instances.
pub type BackendFactory = fn() -> Box<dyn TimerBackend>;
