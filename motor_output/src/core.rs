//! Motor output core.
//!
//! `MotorOutput` is the main entry point: it binds motor, servo and beeper
//! pins at init, then turns mixer values into timer compare values every
//! control cycle and commits them with the strategy of the configured
//! protocol.

use motor_common::consts::{DSHOT_MAX_VALUE, MAX_SUPPORTED_MOTORS, PULSE_MAX, PULSE_MIN};
use motor_common::output::channel::{OutputError, OutputMode, TimerBackend};
use motor_common::output::config::{MotorDevConfig, OutputConfig};
use motor_common::output::digital::DigitalEncoder;
use motor_common::output::types::{IoTag, MotorProtocol, OutputFlags, TimerUsage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::beeper::BeeperOutput;
use crate::binder::{Binder, ChannelClaims};
use crate::command::{CommandInjector, stage_digital};
use crate::disarm::DisarmHandle;
use crate::encoder::encode;
use crate::port::{BoundChannel, InverterState, OutputPort, OutputTable, ProtocolMeta};
use crate::protocol::{ProtocolSelection, PulseWriter, select_protocol};
use crate::servo::ServoOutputs;
use crate::timer_map::TimerMap;

/// Motor table type.
pub type MotorTable = OutputTable<MAX_SUPPORTED_MOTORS>;

/// Motor, servo and beeper outputs of one board.
pub struct MotorOutput {
    /// Bound motor ports, slot order
    motors: MotorTable,
    /// Bound servo ports
    servos: ServoOutputs,
    /// Beeper, if fitted and bound
    beeper: Option<BeeperOutput>,
    /// Writer / commit strategy chosen at init
    selection: ProtocolSelection,
    /// DShot encoder for digital protocols
    digital: Option<Box<dyn DigitalEncoder>>,
    /// DShot command sender
    injector: CommandInjector,
    /// Motors the mixer drives
    motor_count: usize,
    /// Global arming gate, shared with disarm handles
    enabled: Arc<AtomicBool>,
}

impl MotorOutput {
    /// Bind every configured output on `backend`.
    ///
    /// Never fails on missing hardware: if any motor cannot be bound the
    /// motor table is cleared, the disabled strategies are selected and
    /// `are_enabled()` stays false.
    pub fn init(config: &OutputConfig, backend: &mut dyn TimerBackend) -> Self {
        let map = TimerMap::from_config(&config.timers);
        let mut claims = ChannelClaims::new();
        let motor = &config.motor;
        let mut selection = select_protocol(motor, &config.clocks);

        let mut digital = if selection.writer == PulseWriter::Digital {
            backend.digital_encoder()
        } else {
            None
        };

        let motors = {
            let mut binder = Binder::new(&map, &mut claims);
            bind_motors(motor, &selection, &mut binder, backend, digital.as_mut())
        };
        let motors = match motors {
            Ok(motors) => motors,
            Err(e) => {
                warn!("Motor outputs disabled: {}", e);
                selection = ProtocolSelection::disabled(motor.protocol);
                digital = None;
                MotorTable::new()
            }
        };

        let servos = match &config.servo {
            Some(servo) => ServoOutputs::init(servo, &mut Binder::new(&map, &mut claims), backend),
            None => ServoOutputs::default(),
        };

        let beeper = config.beeper.as_ref().and_then(|beeper| {
            BeeperOutput::init(beeper, &mut Binder::new(&map, &mut claims), backend)
        });

        let enabled = selection.is_usable();
        info!(
            "Motor output on '{}': {} x {} ({}), {} servo(s), beeper {}",
            backend.name(),
            motors.len(),
            motor.protocol,
            if selection.unsynced { "free-running" } else { "synced" },
            servos.len(),
            if beeper.is_some() { "present" } else { "absent" },
        );

        Self {
            motors,
            servos,
            beeper,
            selection,
            digital,
            injector: CommandInjector::new(Duration::from_micros(motor.command_delay_us)),
            motor_count: usize::from(motor.motor_count),
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    // ─── Per-cycle path ─────────────────────────────────────────────

    /// Stage `value` for motor `slot`.
    ///
    /// No-op while outputs are disabled. `slot` must be bound and `value`
    /// in range for the protocol (1000-2000, or 0-2047 for DShot); both are
    /// only checked in debug builds, see `try_write`.
    #[inline]
    pub fn write(&mut self, slot: usize, value: u16) {
        if !self.are_enabled() {
            return;
        }
        debug_assert!(slot < self.motors.len(), "motor slot {slot} not bound");
        debug_assert!(
            self.value_in_range(value),
            "motor value {value} out of range for {}",
            self.selection.protocol
        );

        match self.selection.writer {
            PulseWriter::Disabled => {}
            PulseWriter::Analog(encoding) => {
                if let Some(port) = self.motors.get(slot) {
                    let ticks = encode(encoding, self.selection.timer_mhz, value, port.period());
                    port.set_compare(ticks);
                }
            }
            PulseWriter::Digital => {
                if let (Some(port), Some(encoder)) =
                    (self.motors.get_mut(slot), self.digital.as_deref_mut())
                {
                    stage_digital(port, encoder, slot, value);
                }
            }
        }
    }

    /// Checked `write`.
    ///
    /// # Errors
    /// Returns `OutputError::PreconditionViolation` if `slot` is not bound or
    /// `value` is out of range; nothing is written.
    pub fn try_write(&mut self, slot: usize, value: u16) -> Result<(), OutputError> {
        if slot >= self.motors.len() {
            return Err(OutputError::PreconditionViolation(format!(
                "motor slot {slot} out of range ({} bound)",
                self.motors.len()
            )));
        }
        if !self.value_in_range(value) {
            return Err(OutputError::PreconditionViolation(format!(
                "motor value {value} out of range for {}",
                self.selection.protocol
            )));
        }
        self.write(slot, value);
        Ok(())
    }

    /// Commit the values staged for the first `count` motors.
    #[inline]
    pub fn complete_update(&mut self, count: usize) {
        if !self.are_enabled() {
            return;
        }
        self.selection
            .commit
            .complete(&self.motors, count, self.digital.as_mut());
    }

    fn value_in_range(&self, value: u16) -> bool {
        match self.selection.writer {
            PulseWriter::Digital => value <= DSHOT_MAX_VALUE,
            _ => (PULSE_MIN..=PULSE_MAX).contains(&value),
        }
    }

    // ─── Arming gate ────────────────────────────────────────────────

    /// Open the arming gate, if the motors are usable.
    pub fn enable(&self) {
        if self.selection.is_usable() {
            self.enabled.store(true, Ordering::Release);
        }
    }

    /// Close the arming gate and zero every motor output.
    ///
    /// Neither blocks nor allocates. DShot ports have no compare register;
    /// their ESCs stop once frames stop arriving. Use `disarm_handle()` to
    /// disable from another thread.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        self.motors.shutdown_pulses(self.motors.len());
    }

    /// `Send + Sync` handle whose `disable()` acts like `MotorOutput::disable`
    /// without access to `self`.
    pub fn disarm_handle(&self) -> DisarmHandle {
        DisarmHandle::new(Arc::clone(&self.enabled), &self.motors)
    }

    /// True while writes reach the hardware.
    pub fn are_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Zero the first `count` motor outputs.
    pub fn shutdown_pulses(&self, count: usize) {
        self.motors.shutdown_pulses(count);
    }

    // ─── DShot commands ─────────────────────────────────────────────

    /// Send DShot `command` to motor `slot`, ignoring the arming gate.
    ///
    /// Blocks for the command delay after every transmission. Returns the
    /// number of transmissions.
    ///
    /// # Errors
    /// - `OutputError::NotDigital` for analog protocols
    /// - `OutputError::InvalidCommand` for commands above 47
    /// - `OutputError::PreconditionViolation` if `slot` is not bound
    pub fn send_command(&mut self, slot: usize, command: u8) -> Result<u8, OutputError> {
        if !self.selection.protocol.is_digital() {
            return Err(OutputError::NotDigital);
        }
        let Some(encoder) = self.digital.as_deref_mut() else {
            return Err(OutputError::PreconditionViolation(
                "no digital encoder bound".to_string(),
            ));
        };
        self.injector.send(&mut self.motors, encoder, slot, command)
    }

    // ─── Servos and beeper ──────────────────────────────────────────

    /// Set servo `slot` to `value` µs. Unbound slots are ignored.
    #[inline]
    pub fn write_servo(&self, slot: usize, value: u16) {
        self.servos.write(slot, value);
    }

    /// Start or stop the beeper tone. No-op without a beeper.
    pub fn write_beeper(&mut self, on: bool) {
        if let Some(beeper) = &mut self.beeper {
            beeper.write(on);
        }
    }

    /// Flip the beeper tone. No-op without a beeper.
    pub fn toggle_beeper(&mut self) {
        if let Some(beeper) = &mut self.beeper {
            beeper.toggle();
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// Bound motor ports.
    pub fn motors(&self) -> &MotorTable {
        &self.motors
    }

    /// Bound servo ports.
    pub fn servos(&self) -> &ServoOutputs {
        &self.servos
    }

    /// Beeper, if bound.
    pub fn beeper(&self) -> Option<&BeeperOutput> {
        self.beeper.as_ref()
    }

    /// Protocol selection in effect.
    pub fn selection(&self) -> &ProtocolSelection {
        &self.selection
    }

    /// Configured motor count.
    pub fn motor_count(&self) -> usize {
        self.motor_count
    }

    /// Delay after every DShot command transmission.
    pub fn command_delay(&self) -> Duration {
        self.injector.delay()
    }
}

/// Bind `config.motor_count` motors, all or nothing.
fn bind_motors(
    config: &MotorDevConfig,
    selection: &ProtocolSelection,
    binder: &mut Binder<'_>,
    backend: &mut dyn TimerBackend,
    mut digital: Option<&mut Box<dyn DigitalEncoder>>,
) -> Result<MotorTable, OutputError> {
    let protocol = config.protocol;
    let phases = protocol.phases();
    let time_base = selection.time_base(config.pwm_rate);
    let mut table = MotorTable::new();

    for slot in 0..usize::from(config.motor_count) {
        let tag_at = |phase: usize| {
            config
                .io_tags
                .get(slot * phases + phase)
                .copied()
                .unwrap_or(IoTag::NONE)
        };
        let insufficient = || OutputError::InsufficientHardware {
            slot,
            tag: tag_at(0),
        };

        let (period, meta) = match protocol {
            MotorProtocol::OnboardEsc => (
                time_base.period,
                ProtocolMeta::Inverter(InverterState::new(config.deadtime)),
            ),
            _ if protocol.is_digital() => (
                0,
                ProtocolMeta::Digital {
                    telemetry_request: false,
                },
            ),
            _ => (time_base.period, ProtocolMeta::None),
        };
        let mut port = OutputPort::new(period, meta);

        for phase in 0..phases {
            let binding = binder.bind(slot, tag_at(phase), TimerUsage::MOTOR)?;

            let channel = if protocol.is_digital() {
                let encoder = digital.as_deref_mut().ok_or_else(insufficient)?;
                let output = if config.inversion {
                    binding.hardware.output ^ OutputFlags::INVERTED
                } else {
                    binding.hardware.output
                };
                encoder.configure(slot, &binding.hardware, protocol, output)?;
                BoundChannel::digital(binding.hardware, binding.force_overflow)
            } else {
                let dead_time = match protocol {
                    MotorProtocol::OnboardEsc => config.deadtime,
                    _ => 0,
                };
                let mode = OutputMode::new(
                    binding.hardware.output,
                    config.inversion,
                    dead_time,
                    u32::from(selection.idle_pulse),
                );
                binder.open(backend, slot, binding, time_base, mode)?
            };

            port.attach(channel).map_err(|_| insufficient())?;
        }

        port.enable();
        debug!(
            "Motor {} bound ({} channel(s), force_overflow={})",
            slot,
            port.channels().len(),
            port.force_overflow()
        );
        table.push(port).map_err(|_| insufficient())?;
    }

    Ok(table)
}
