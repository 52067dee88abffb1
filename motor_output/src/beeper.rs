//! PWM beeper.
//!
//! A square wave at the configured tone frequency on a 1 MHz timer. On is a
//! 50 % duty cycle, off is a zero compare value.

use motor_common::consts::PWM_TIMER_MHZ;
use motor_common::output::channel::{OutputMode, TimeBase, TimerBackend};
use motor_common::output::config::BeeperConfig;
use motor_common::output::types::TimerUsage;
use tracing::{info, warn};

use crate::binder::Binder;
use crate::port::{OutputPort, ProtocolMeta};

/// Bound beeper output.
#[derive(Debug)]
pub struct BeeperOutput {
    port: OutputPort,
    on_ticks: u32,
    on: bool,
}

impl BeeperOutput {
    /// Bind the beeper pin, or `None` if no timer channel drives it.
    pub fn init(
        config: &BeeperConfig,
        binder: &mut Binder<'_>,
        backend: &mut dyn TimerBackend,
    ) -> Option<Self> {
        let time_base = TimeBase::for_rate(PWM_TIMER_MHZ, u32::from(config.frequency.max(1)));
        let on_ticks = time_base.period / 2;

        let channel = binder
            .bind(0, config.io_tag, TimerUsage::BEEPER)
            .and_then(|binding| {
                let mode = OutputMode::new(binding.hardware.output, false, 0, on_ticks);
                binder.open(backend, 0, binding, time_base, mode)
            });
        let channel = match channel {
            Ok(channel) => channel,
            Err(e) => {
                warn!("Beeper not available: {}", e);
                return None;
            }
        };

        let mut port = OutputPort::new(time_base.period, ProtocolMeta::None);
        port.attach(channel).ok()?;
        port.enable();
        info!("Beeper on {} at {} Hz", config.io_tag, config.frequency);

        Some(Self {
            port,
            on_ticks,
            on: false,
        })
    }

    /// Start (half-period duty) or stop the tone.
    pub fn write(&mut self, on: bool) {
        self.port.set_compare(if on { self.on_ticks } else { 0 });
        self.on = on;
    }

    /// Flip the tone state.
    pub fn toggle(&mut self) {
        self.write(!self.on);
    }

    /// True while the tone is on.
    pub fn is_on(&self) -> bool {
        self.on
    }

    /// Bound port.
    pub fn port(&self) -> &OutputPort {
        &self.port
    }
}
