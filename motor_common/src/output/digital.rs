//! Digital (DShot) encoder interface and command set.

use crate::consts::DSHOT_MAX_COMMAND;
use crate::output::channel::OutputError;
use crate::output::types::{MotorProtocol, OutputFlags, TimerHardware};

/// Bitstream encoder for the DShot family.
///
/// Owns the timer/DMA hardware of digital motor slots. The output subsystem
/// forwards logical values verbatim and uses `write`/`commit` as its
/// per-cycle pair.
pub trait DigitalEncoder: Send {
    /// Take over the timer channel of `slot` for `protocol`.
    ///
    /// # Errors
    /// Return `OutputError::InsufficientHardware` if the channel cannot carry
    /// a DShot bitstream.
    fn configure(
        &mut self,
        slot: usize,
        hardware: &TimerHardware,
        protocol: MotorProtocol,
        output: OutputFlags,
    ) -> Result<(), OutputError>;

    /// Stage a frame value (0-2047) for `slot`. `request_telemetry` sets the
    /// frame's telemetry bit.
    fn write(&mut self, slot: usize, value: u16, request_telemetry: bool);

    /// Start transmission of all staged frames.
    fn commit(&mut self, motor_count: usize);
}

/// Named DShot special commands (frame values 0-47).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DshotCommand {
    /// Stop the motor.
    MotorStop = 0,
    /// Beep tone 1.
    Beep1 = 1,
    /// Beep tone 2.
    Beep2 = 2,
    /// Beep tone 3.
    Beep3 = 3,
    /// Beep tone 4.
    Beep4 = 4,
    /// Beep tone 5.
    Beep5 = 5,
    /// Request ESC information.
    EscInfo = 6,
    /// Spin in one direction.
    SpinDirection1 = 7,
    /// Spin in the other direction.
    SpinDirection2 = 8,
    /// Leave 3D mode.
    ThreeDModeOff = 9,
    /// Enter 3D mode.
    ThreeDModeOn = 10,
    /// Request current settings.
    SettingsRequest = 11,
    /// Persist settings in the ESC.
    SaveSettings = 12,
    /// Normal rotation direction.
    SpinDirectionNormal = 20,
    /// Reversed rotation direction.
    SpinDirectionReversed = 21,
    /// LED 0 on.
    Led0On = 22,
    /// LED 1 on.
    Led1On = 23,
    /// LED 2 on.
    Led2On = 24,
    /// LED 3 on.
    Led3On = 25,
    /// LED 0 off.
    Led0Off = 26,
    /// LED 1 off.
    Led1Off = 27,
    /// LED 2 off.
    Led2Off = 28,
    /// LED 3 off.
    Led3Off = 29,
}

impl From<DshotCommand> for u8 {
    fn from(cmd: DshotCommand) -> Self {
        cmd as u8
    }
}

/// Number of transmissions required for a raw command value.
///
/// Direction, 3D-mode and save-settings commands must be latched by the ESC
/// and are repeated 10 times; every other command is sent once. Values above
/// 47 are not commands.
pub const fn command_repeats(command: u8) -> Option<u8> {
    if command > DSHOT_MAX_COMMAND {
        return None;
    }
    match command {
        7..=10 | 12 | 20 | 21 => Some(crate::consts::DSHOT_COMMAND_REPEATS),
        _ => Some(1),
    }
}
