//! Servo outputs.
//!
//! Servos run free at the servo PWM rate on a 1 MHz timer, so a value in µs
//! is written to the compare register as is. Binding stops at the first
//! empty tag or unbindable pin; the servos bound before that stay usable.

use motor_common::consts::{MAX_SUPPORTED_SERVOS, PWM_TIMER_MHZ};
use motor_common::output::channel::{OutputMode, TimeBase, TimerBackend};
use motor_common::output::config::ServoDevConfig;
use motor_common::output::types::TimerUsage;
use tracing::{info, warn};

use crate::binder::Binder;
use crate::port::{OutputPort, OutputTable, ProtocolMeta};

/// Bound servo ports.
#[derive(Debug, Default)]
pub struct ServoOutputs {
    table: OutputTable<MAX_SUPPORTED_SERVOS>,
}

impl ServoOutputs {
    /// Bind the configured servo pins.
    pub fn init(config: &ServoDevConfig, binder: &mut Binder<'_>, backend: &mut dyn TimerBackend) -> Self {
        let mut table = OutputTable::new();
        let time_base = TimeBase::for_rate(PWM_TIMER_MHZ, u32::from(config.pwm_rate.max(1)));

        for (slot, &tag) in config.io_tags.iter().take(MAX_SUPPORTED_SERVOS).enumerate() {
            if tag.is_none() {
                break;
            }

            let channel = binder.bind(slot, tag, TimerUsage::SERVO).and_then(|binding| {
                let mode = OutputMode::new(
                    binding.hardware.output,
                    false,
                    0,
                    u32::from(config.center_pulse),
                );
                binder.open(backend, slot, binding, time_base, mode)
            });
            let channel = match channel {
                Ok(channel) => channel,
                Err(e) => {
                    warn!("Servo binding stopped: {}", e);
                    break;
                }
            };

            let mut port = OutputPort::new(time_base.period, ProtocolMeta::None);
            if let Err(channel) = port.attach(channel) {
                warn!("Servo {} rejected channel {:?}", slot, channel);
                break;
            }
            port.enable();
            if table.push(port).is_err() {
                break;
            }
        }

        info!("{} servo(s) bound at {} Hz", table.len(), config.pwm_rate);
        Self { table }
    }

    /// Set the pulse of `slot` in µs. Unbound slots are ignored.
    #[inline]
    pub fn write(&self, slot: usize, value: u16) {
        if let Some(port) = self.table.get(slot).filter(|p| p.is_enabled()) {
            port.set_compare(u32::from(value));
        }
    }

    /// Bound servo ports.
    pub fn table(&self) -> &OutputTable<MAX_SUPPORTED_SERVOS> {
        &self.table
    }

    /// Number of bound servos.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True if no servo is bound.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
