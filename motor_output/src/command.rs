//! DShot command injection.
//!
//! Special commands (beeps, spin direction, 3D mode, settings) are sent as
//! ordinary frames with values 0-47 outside the control loop. Commands the
//! ESC must latch are repeated, each transmission followed by a fixed delay.

use motor_common::output::channel::OutputError;
use motor_common::output::digital::{DigitalEncoder, command_repeats};
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::port::{OutputPort, OutputTable};

/// Stage `value` for `slot`, consuming the port's telemetry request.
#[inline]
pub(crate) fn stage_digital(
    port: &mut OutputPort,
    encoder: &mut dyn DigitalEncoder,
    slot: usize,
    value: u16,
) {
    let telemetry = port.take_telemetry_request();
    encoder.write(slot, value, telemetry);
}

/// Sends DShot commands with the configured inter-transmission delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandInjector {
    delay: Duration,
}

impl CommandInjector {
    /// Injector sleeping `delay` after every transmission.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Delay after every transmission.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Transmit `command` on `slot` and return the number of transmissions.
    ///
    /// Every transmission requests telemetry and commits all bound motors.
    ///
    /// # Errors
    /// - `OutputError::InvalidCommand` if `command` > 47; nothing is sent.
    /// - `OutputError::PreconditionViolation` if `slot` is not bound.
    pub fn send<const N: usize>(
        &self,
        motors: &mut OutputTable<N>,
        encoder: &mut dyn DigitalEncoder,
        slot: usize,
        command: u8,
    ) -> Result<u8, OutputError> {
        let repeats = command_repeats(command).ok_or(OutputError::InvalidCommand(command))?;
        let count = motors.len();
        let port = motors.get_mut(slot).ok_or_else(|| {
            OutputError::PreconditionViolation(format!(
                "motor slot {slot} out of range ({count} bound)"
            ))
        })?;

        debug!("DShot command {} on motor {} x{}", command, slot, repeats);
        for _ in 0..repeats {
            port.request_telemetry();
            stage_digital(port, encoder, slot, u16::from(command));
            encoder.commit(count);
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }

        Ok(repeats)
    }
}
