//! Output port table.
//!
//! An `OutputPort` is one motor, servo or beeper output. It owns the timer
//! channels it was bound to and the protocol-specific state the writers and
//! the commit step need. `OutputTable` is the fixed-capacity collection of
//! ports filled once by the binder.

use heapless::Vec;
use motor_common::consts::INVERTER_PHASES;
use motor_common::output::channel::TimerChannel;
use motor_common::output::types::TimerHardware;
use std::fmt;
use std::sync::Arc;

// ─── BoundChannel ───────────────────────────────────────────────────

/// A timer channel claimed by a port.
///
/// Digital ports record the binding but leave the register access to the
/// digital encoder, so `timer` is `None` for them.
pub struct BoundChannel {
    hardware: TimerHardware,
    force_overflow: bool,
    timer: Option<Arc<dyn TimerChannel>>,
}

impl BoundChannel {
    /// Channel driven through the timer capability.
    pub fn new(hardware: TimerHardware, force_overflow: bool, timer: Box<dyn TimerChannel>) -> Self {
        Self {
            hardware,
            force_overflow,
            timer: Some(Arc::from(timer)),
        }
    }

    /// Channel handed over to the digital encoder.
    pub fn digital(hardware: TimerHardware, force_overflow: bool) -> Self {
        Self {
            hardware,
            force_overflow,
            timer: None,
        }
    }

    /// Board definition of the channel.
    pub fn hardware(&self) -> &TimerHardware {
        &self.hardware
    }

    /// First channel (in binding order) on its physical timer.
    pub fn force_overflow(&self) -> bool {
        self.force_overflow
    }

    /// Register access, shared with disarm handles. `None` for digital
    /// channels.
    pub fn timer(&self) -> Option<&Arc<dyn TimerChannel>> {
        self.timer.as_ref()
    }

    /// Configured period, 0 for digital channels.
    pub fn period_ticks(&self) -> u32 {
        self.timer.as_ref().map_or(0, |t| t.period_ticks())
    }

    #[inline]
    fn set_compare(&self, ticks: u32) {
        if let Some(timer) = &self.timer {
            timer.set_compare(ticks);
        }
    }

    #[inline]
    fn restart(&self) {
        if self.force_overflow {
            if let Some(timer) = &self.timer {
                timer.force_overflow();
            }
        }
    }

    #[inline]
    fn latch(&self) {
        if let Some(timer) = &self.timer {
            timer.latch();
        }
    }
}

impl fmt::Debug for BoundChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundChannel")
            .field("hardware", &self.hardware)
            .field("force_overflow", &self.force_overflow)
            .field("digital", &self.timer.is_none())
            .finish()
    }
}

// ─── Protocol metadata ──────────────────────────────────────────────

/// Bridge state of an onboard-ESC inverter.
///
/// Reset when the motor is bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InverterState {
    /// Current output pattern.
    pub pattern: u8,
    /// Steps taken in the current pattern.
    pub pattern_count: u8,
    /// Bridge forced off.
    pub emergency_stop: bool,
    /// Consecutive emergency-stop cycles.
    pub emergency_stop_count: u8,
    /// Dead-time between complementary edges in ticks.
    pub deadtime: u16,
}

impl InverterState {
    /// Fresh state for a bridge with the given dead-time.
    pub fn new(deadtime: u16) -> Self {
        Self {
            deadtime,
            ..Self::default()
        }
    }
}

/// Protocol-specific per-port state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolMeta {
    /// Pulse protocols without extra state.
    None,
    /// Onboard-ESC bridge drive.
    Inverter(InverterState),
    /// DShot family.
    Digital {
        /// Next frame asks the ESC for a telemetry reply.
        telemetry_request: bool,
    },
}

// ─── OutputPort ─────────────────────────────────────────────────────

/// One motor, servo or beeper output.
#[derive(Debug)]
pub struct OutputPort {
    channels: Vec<BoundChannel, INVERTER_PHASES>,
    period: u32,
    enabled: bool,
    meta: ProtocolMeta,
}

impl OutputPort {
    /// Unbound port with the given period and protocol state.
    pub fn new(period: u32, meta: ProtocolMeta) -> Self {
        Self {
            channels: Vec::new(),
            period,
            enabled: false,
            meta,
        }
    }

    /// Attach a bound channel (one per inverter phase at most).
    ///
    /// # Errors
    /// Returns the channel back if the port already holds `INVERTER_PHASES`.
    pub fn attach(&mut self, channel: BoundChannel) -> Result<(), BoundChannel> {
        self.channels.push(channel)
    }

    /// Mark the port as participating in output generation.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// True once all channels are bound.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cycle length in ticks.
    pub fn period(&self) -> u32 {
        self.period
    }

    /// Bound channels, primary first.
    pub fn channels(&self) -> &[BoundChannel] {
        &self.channels
    }

    /// Whether the primary channel is the first claimant of its timer.
    pub fn force_overflow(&self) -> bool {
        self.channels.first().is_some_and(BoundChannel::force_overflow)
    }

    /// Protocol-specific state.
    pub fn meta(&self) -> &ProtocolMeta {
        &self.meta
    }

    /// Write the compare register of every channel.
    #[inline]
    pub fn set_compare(&self, ticks: u32) {
        for channel in &self.channels {
            channel.set_compare(ticks);
        }
    }

    /// Neutral output.
    #[inline]
    pub fn zero(&self) {
        self.set_compare(0);
    }

    /// Restart the timers this port is the first claimant of.
    #[inline]
    pub fn restart_timers(&self) {
        for channel in &self.channels {
            channel.restart();
        }
    }

    /// Shadow-transfer every channel.
    #[inline]
    pub fn latch(&self) {
        for channel in &self.channels {
            channel.latch();
        }
    }

    /// Ask the ESC for a telemetry reply with the next frame.
    pub fn request_telemetry(&mut self) {
        if let ProtocolMeta::Digital { telemetry_request } = &mut self.meta {
            *telemetry_request = true;
        }
    }

    /// Consume the pending telemetry request.
    #[inline]
    pub fn take_telemetry_request(&mut self) -> bool {
        match &mut self.meta {
            ProtocolMeta::Digital { telemetry_request } => std::mem::take(telemetry_request),
            _ => false,
        }
    }
}

// ─── OutputTable ────────────────────────────────────────────────────

/// Fixed-capacity port table, filled once at initialization.
#[derive(Debug, Default)]
pub struct OutputTable<const N: usize> {
    ports: Vec<OutputPort, N>,
}

impl<const N: usize> OutputTable<N> {
    /// Empty table.
    pub fn new() -> Self {
        Self { ports: Vec::new() }
    }

    /// Append a bound port.
    ///
    /// # Errors
    /// Returns the port back if the table is full.
    pub fn push(&mut self, port: OutputPort) -> Result<(), OutputPort> {
        self.ports.push(port)
    }

    /// Port at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&OutputPort> {
        self.ports.get(index)
    }

    /// Mutable port at `index`.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut OutputPort> {
        self.ports.get_mut(index)
    }

    /// Number of bound ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// True if no port is bound.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Iterate over bound ports in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &OutputPort> {
        self.ports.iter()
    }

    /// Drop every port.
    pub fn clear(&mut self) {
        self.ports.clear();
    }

    /// Zero and latch the first `count` ports.
    pub fn shutdown_pulses(&self, count: usize) {
        for port in self.ports.iter().take(count) {
            port.zero();
            port.latch();
        }
    }
}
