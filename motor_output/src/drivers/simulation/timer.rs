//! Simulated timer peripherals.
//!
//! Each physical timer has a counter, a period and a list of channels. A
//! channel has a preload register (what software writes) and an active
//! register (what the pin currently emits). An update event copies preload
//! into active for every channel of the timer; shadowed channels only copy
//! when a transfer was requested with `latch()`. Update events come from
//! `force_overflow()` or from the counter rolling over in `advance()`.

use motor_common::output::channel::{OutputMode, TimeBase, TimerChannel};
use motor_common::output::types::{IoTag, TimerHardware, TimerId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use tracing::debug;

// ─── Shared state ───────────────────────────────────────────────────

#[derive(Debug)]
pub(super) struct SimChannelState {
    hardware: TimerHardware,
    preload: AtomicU32,
    active: AtomicU32,
    mode: OnceLock<OutputMode>,
    configure_count: AtomicU32,
    transfer_pending: AtomicBool,
}

impl SimChannelState {
    fn new(hardware: TimerHardware) -> Self {
        Self {
            hardware,
            preload: AtomicU32::new(0),
            active: AtomicU32::new(0),
            mode: OnceLock::new(),
            configure_count: AtomicU32::new(0),
            transfer_pending: AtomicBool::new(false),
        }
    }

    fn update_event(&self) {
        if !self.hardware.shadowed || self.transfer_pending.swap(false, Ordering::Relaxed) {
            self.active
                .store(self.preload.load(Ordering::Relaxed), Ordering::Relaxed);
        }
    }
}

#[derive(Debug)]
pub(super) struct SimTimerState {
    id: TimerId,
    mhz: AtomicU32,
    period: AtomicU32,
    counter: AtomicU32,
    restarts: AtomicU32,
    channels: Mutex<Vec<Arc<SimChannelState>>>,
}

impl SimTimerState {
    fn new(id: TimerId) -> Self {
        Self {
            id,
            mhz: AtomicU32::new(0),
            period: AtomicU32::new(0),
            counter: AtomicU32::new(0),
            restarts: AtomicU32::new(0),
            channels: Mutex::new(Vec::new()),
        }
    }

    fn update_event(&self) {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        for channel in channels.iter() {
            channel.update_event();
        }
    }

    fn force_overflow(&self) {
        self.counter.store(0, Ordering::Relaxed);
        self.restarts.fetch_add(1, Ordering::Relaxed);
        self.update_event();
    }

    fn advance(&self, ticks: u32) {
        let period = self.period.load(Ordering::Relaxed);
        if period == 0 {
            return;
        }
        let counter = u64::from(self.counter.load(Ordering::Relaxed)) + u64::from(ticks);
        let period = u64::from(period);
        self.counter.store((counter % period) as u32, Ordering::Relaxed);
        if counter >= period {
            self.update_event();
        }
    }
}

/// All timers of one simulated board.
#[derive(Debug, Default)]
pub(super) struct SimBus {
    timers: Mutex<BTreeMap<TimerId, Arc<SimTimerState>>>,
    channels: Mutex<HashMap<IoTag, Arc<SimChannelState>>>,
}

impl SimBus {
    /// Open the channel for `hardware`; `None` if its pin is already open.
    pub(super) fn open(&self, hardware: &TimerHardware) -> Option<SimTimerChannel> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if channels.contains_key(&hardware.tag) {
            return None;
        }

        let timer = {
            let mut timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                timers
                    .entry(hardware.timer)
                    .or_insert_with(|| Arc::new(SimTimerState::new(hardware.timer))),
            )
        };

        let state = Arc::new(SimChannelState::new(*hardware));
        timer
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&state));
        channels.insert(hardware.tag, Arc::clone(&state));

        Some(SimTimerChannel { state, timer })
    }

    fn channel(&self, tag: IoTag) -> Option<Arc<SimChannelState>> {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels.get(&tag).cloned()
    }

    fn timer(&self, timer: TimerId) -> Option<Arc<SimTimerState>> {
        let timers = self.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers.get(&timer).cloned()
    }
}

// ─── Channel ────────────────────────────────────────────────────────

/// One simulated timer channel.
pub struct SimTimerChannel {
    state: Arc<SimChannelState>,
    timer: Arc<SimTimerState>,
}

impl TimerChannel for SimTimerChannel {
    fn timer(&self) -> TimerId {
        self.timer.id
    }

    fn configure(&mut self, time_base: TimeBase, mode: OutputMode) {
        let previous = self.timer.period.swap(time_base.period, Ordering::Relaxed);
        if previous != 0 && previous != time_base.period {
            debug!(
                "{} period changed from {} to {} by CH{}",
                self.timer.id, previous, time_base.period, self.state.hardware.channel
            );
        }
        self.timer.mhz.store(time_base.mhz, Ordering::Relaxed);

        let _ = self.state.mode.set(mode);
        self.state.configure_count.fetch_add(1, Ordering::Relaxed);
        self.state.preload.store(mode.initial_pulse, Ordering::Relaxed);
        self.state.active.store(mode.initial_pulse, Ordering::Relaxed);
    }

    #[inline]
    fn set_compare(&self, ticks: u32) {
        self.state.preload.store(ticks, Ordering::Relaxed);
    }

    #[inline]
    fn force_overflow(&self) {
        self.timer.force_overflow();
    }

    #[inline]
    fn latch(&self) {
        if self.state.hardware.shadowed {
            self.state.transfer_pending.store(true, Ordering::Relaxed);
        }
    }

    fn period_ticks(&self) -> u32 {
        self.timer.period.load(Ordering::Relaxed)
    }
}

// ─── Probe ──────────────────────────────────────────────────────────

/// Read access to the simulated registers, plus the passage of time.
#[derive(Debug, Clone)]
pub struct SimProbe {
    bus: Arc<SimBus>,
}

impl SimProbe {
    pub(super) fn new(bus: Arc<SimBus>) -> Self {
        Self { bus }
    }

    /// Compare (preload) register of the channel on `tag`.
    pub fn compare(&self, tag: IoTag) -> Option<u32> {
        self.bus
            .channel(tag)
            .map(|c| c.preload.load(Ordering::Relaxed))
    }

    /// Pulse width currently emitted on `tag`.
    pub fn active(&self, tag: IoTag) -> Option<u32> {
        self.bus
            .channel(tag)
            .map(|c| c.active.load(Ordering::Relaxed))
    }

    /// Output mode the channel on `tag` was configured with.
    pub fn mode(&self, tag: IoTag) -> Option<OutputMode> {
        self.bus.channel(tag).and_then(|c| c.mode.get().copied())
    }

    /// How many times the channel on `tag` was configured.
    pub fn configure_count(&self, tag: IoTag) -> u32 {
        self.bus
            .channel(tag)
            .map_or(0, |c| c.configure_count.load(Ordering::Relaxed))
    }

    /// True if a channel on `tag` was opened.
    pub fn is_open(&self, tag: IoTag) -> bool {
        self.bus.channel(tag).is_some()
    }

    /// Forced overflows of `timer`.
    pub fn restarts(&self, timer: TimerId) -> u32 {
        self.bus
            .timer(timer)
            .map_or(0, |t| t.restarts.load(Ordering::Relaxed))
    }

    /// Configured period of `timer`.
    pub fn period(&self, timer: TimerId) -> Option<u32> {
        self.bus.timer(timer).map(|t| t.period.load(Ordering::Relaxed))
    }

    /// Configured clock of `timer` in MHz.
    pub fn mhz(&self, timer: TimerId) -> Option<u32> {
        self.bus.timer(timer).map(|t| t.mhz.load(Ordering::Relaxed))
    }

    /// Let `ticks` counter ticks elapse on `timer`.
    pub fn advance(&self, timer: TimerId, ticks: u32) {
        if let Some(timer) = self.bus.timer(timer) {
            timer.advance(ticks);
        }
    }

    /// Let `ticks` counter ticks elapse on every timer.
    pub fn advance_all(&self, ticks: u32) {
        let timers: Vec<_> = {
            let timers = self.bus.timers.lock().unwrap_or_else(PoisonError::into_inner);
            timers.values().cloned().collect()
        };
        for timer in timers {
            timer.advance(ticks);
        }
    }

    /// Total forced overflows across all timers.
    pub fn total_restarts(&self) -> u32 {
        let timers = self.bus.timers.lock().unwrap_or_else(PoisonError::into_inner);
        timers
            .values()
            .map(|t| t.restarts.load(Ordering::Relaxed))
            .sum()
    }
}
