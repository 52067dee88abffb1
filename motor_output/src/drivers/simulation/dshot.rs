//! Simulated DShot bitstream encoder.
//!
//! Builds the 16-bit frame for every staged value and records what would
//! have been clocked out on commit.

use motor_common::consts::{DSHOT_MAX_VALUE, MAX_SUPPORTED_MOTORS};
use motor_common::output::channel::OutputError;
use motor_common::output::digital::DigitalEncoder;
use motor_common::output::types::{MotorProtocol, OutputFlags, TimerHardware};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};

/// One transmitted DShot frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DshotFrame {
    /// Motor slot.
    pub slot: usize,
    /// 11-bit throttle or command value.
    pub value: u16,
    /// Telemetry request bit.
    pub telemetry: bool,
    /// Wire frame: value, telemetry bit, 4-bit checksum.
    pub bits: u16,
}

impl DshotFrame {
    /// Build the frame for `value` (masked to 11 bits).
    pub fn new(slot: usize, value: u16, telemetry: bool) -> Self {
        let value = value & DSHOT_MAX_VALUE;
        let packet = (value << 1) | u16::from(telemetry);
        let crc = (packet ^ (packet >> 4) ^ (packet >> 8)) & 0x0F;
        Self {
            slot,
            value,
            telemetry,
            bits: (packet << 4) | crc,
        }
    }
}

#[derive(Debug, Default)]
struct DshotLog {
    configured: Vec<(usize, MotorProtocol)>,
    frames: Vec<DshotFrame>,
    commits: u32,
}

/// Simulated encoder handed out by the simulation backend.
pub struct SimDshotEncoder {
    staged: [Option<DshotFrame>; MAX_SUPPORTED_MOTORS],
    log: Arc<Mutex<DshotLog>>,
}

impl SimDshotEncoder {
    pub(super) fn new() -> (Self, DshotProbe) {
        let log = Arc::new(Mutex::new(DshotLog::default()));
        (
            Self {
                staged: [None; MAX_SUPPORTED_MOTORS],
                log: Arc::clone(&log),
            },
            DshotProbe { log },
        )
    }
}

impl DigitalEncoder for SimDshotEncoder {
    fn configure(
        &mut self,
        slot: usize,
        hardware: &TimerHardware,
        protocol: MotorProtocol,
        output: OutputFlags,
    ) -> Result<(), OutputError> {
        if slot >= MAX_SUPPORTED_MOTORS {
            return Err(OutputError::InsufficientHardware {
                slot,
                tag: hardware.tag,
            });
        }
        debug!(
            "DShot slot {} on {} CH{} ({}, inverted={})",
            slot,
            hardware.timer,
            hardware.channel,
            protocol,
            output.contains(OutputFlags::INVERTED)
        );
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.configured.push((slot, protocol));
        Ok(())
    }

    fn write(&mut self, slot: usize, value: u16, request_telemetry: bool) {
        if let Some(staged) = self.staged.get_mut(slot) {
            *staged = Some(DshotFrame::new(slot, value, request_telemetry));
        }
    }

    fn commit(&mut self, motor_count: usize) {
        let mut log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.commits += 1;
        for staged in self.staged.iter_mut().take(motor_count) {
            if let Some(frame) = staged.take() {
                trace!("DShot slot {} frame {:#06x}", frame.slot, frame.bits);
                log.frames.push(frame);
            }
        }
    }
}

/// Read access to what the simulated encoder transmitted.
#[derive(Debug, Clone)]
pub struct DshotProbe {
    log: Arc<Mutex<DshotLog>>,
}

impl DshotProbe {
    /// Every transmitted frame, oldest first.
    pub fn frames(&self) -> Vec<DshotFrame> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .frames
            .clone()
    }

    /// Frames transmitted on `slot`.
    pub fn frames_for(&self, slot: usize) -> Vec<DshotFrame> {
        self.frames().into_iter().filter(|f| f.slot == slot).collect()
    }

    /// Number of commit calls.
    pub fn commits(&self) -> u32 {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).commits
    }

    /// Protocol `slot` was configured for.
    pub fn configured(&self, slot: usize) -> Option<MotorProtocol> {
        let log = self.log.lock().unwrap_or_else(PoisonError::into_inner);
        log.configured
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, protocol)| *protocol)
    }
}
