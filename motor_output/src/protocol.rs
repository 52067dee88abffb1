//! Protocol selection.
//!
//! Maps the configured motor protocol to the writer and commit strategy used
//! every cycle, plus the timer clock and time base the binder programs.
//! Selection is total over `MotorProtocol` and happens once at init.

use motor_common::consts::ONESHOT_PERIOD_TICKS;
use motor_common::output::channel::TimeBase;
use motor_common::output::config::MotorDevConfig;
use motor_common::output::types::{MotorProtocol, TimerClocks};

use crate::coordinator::CommitMode;
use crate::encoder::PulseEncoding;

/// Per-slot write strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseWriter {
    /// Outputs unusable; writes are dropped.
    Disabled,
    /// Encode and write the compare register.
    Analog(PulseEncoding),
    /// Forward the value to the digital encoder.
    Digital,
}

/// Outcome of protocol selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtocolSelection {
    /// Configured protocol.
    pub protocol: MotorProtocol,
    /// Write strategy.
    pub writer: PulseWriter,
    /// Commit strategy.
    pub commit: CommitMode,
    /// Timer ticks per µs.
    pub timer_mhz: u32,
    /// Outputs run free at `pwm_rate`.
    pub unsynced: bool,
    /// Compare value loaded when a channel is configured.
    pub idle_pulse: u16,
}

impl ProtocolSelection {
    /// Selection with both strategies disabled.
    pub const fn disabled(protocol: MotorProtocol) -> Self {
        Self {
            protocol,
            writer: PulseWriter::Disabled,
            commit: CommitMode::Disabled,
            timer_mhz: 0,
            unsynced: false,
            idle_pulse: 0,
        }
    }

    /// True if writes reach the hardware.
    pub fn is_usable(&self) -> bool {
        self.writer != PulseWriter::Disabled
    }

    /// Time base the binder programs on each motor channel.
    pub fn time_base(&self, pwm_rate: u16) -> TimeBase {
        let rate = u32::from(pwm_rate.max(1));
        match self.protocol {
            // Center-aligned counting halves the period.
            MotorProtocol::OnboardEsc => TimeBase {
                mhz: self.timer_mhz,
                period: self.timer_mhz * 1_000_000 / (2 * rate),
            },
            _ if self.unsynced => TimeBase::for_rate(self.timer_mhz, rate),
            _ => TimeBase {
                mhz: self.timer_mhz,
                period: ONESHOT_PERIOD_TICKS,
            },
        }
    }
}

/// Pick writer, commit strategy and timing for `config.protocol`.
pub fn select_protocol(config: &MotorDevConfig, clocks: &TimerClocks) -> ProtocolSelection {
    let protocol = config.protocol;
    let one_shot = |encoding, mhz| ProtocolSelection {
        protocol,
        writer: PulseWriter::Analog(encoding),
        commit: if config.use_unsynced_pwm {
            CommitMode::FreeRunning
        } else {
            CommitMode::OneShot
        },
        timer_mhz: mhz,
        unsynced: config.use_unsynced_pwm,
        idle_pulse: config.idle_pulse,
    };

    match protocol {
        MotorProtocol::Standard => ProtocolSelection {
            protocol,
            writer: PulseWriter::Analog(PulseEncoding::Standard),
            commit: CommitMode::FreeRunning,
            timer_mhz: clocks.standard_mhz,
            unsynced: true,
            idle_pulse: 0,
        },
        MotorProtocol::Brushed => ProtocolSelection {
            protocol,
            writer: PulseWriter::Analog(PulseEncoding::Duty),
            commit: CommitMode::FreeRunning,
            timer_mhz: clocks.brushed_mhz,
            unsynced: true,
            idle_pulse: 0,
        },
        MotorProtocol::OnboardEsc => ProtocolSelection {
            protocol,
            writer: PulseWriter::Analog(PulseEncoding::Duty),
            commit: CommitMode::ShadowTransfer,
            timer_mhz: clocks.onboard_esc_mhz,
            unsynced: true,
            idle_pulse: config.idle_pulse,
        },
        MotorProtocol::OneShot125 => one_shot(PulseEncoding::OneShot125, clocks.oneshot125_mhz),
        MotorProtocol::OneShot42 => one_shot(PulseEncoding::OneShot42, clocks.oneshot42_mhz),
        MotorProtocol::MultiShot => one_shot(PulseEncoding::MultiShot, clocks.multishot_mhz),
        MotorProtocol::Dshot150
        | MotorProtocol::Dshot300
        | MotorProtocol::Dshot600
        | MotorProtocol::Dshot1200 => ProtocolSelection {
            protocol,
            writer: PulseWriter::Digital,
            commit: CommitMode::Digital,
            timer_mhz: protocol.dshot_speed().map_or(0, |speed| speed.timer_mhz()),
            unsynced: false,
            idle_pulse: 0,
        },
    }
}
