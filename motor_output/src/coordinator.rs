//! Per-cycle commit strategies.
//!
//! Runs once per control loop after every motor has been written. Hot path:
//! no logging, no allocation.

use motor_common::output::digital::DigitalEncoder;

use crate::port::OutputTable;

/// How staged motor values reach the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    /// Outputs unusable.
    Disabled,
    /// Timers free-run; compare writes latch at period rollover.
    FreeRunning,
    /// Shadowed modules latch together on request.
    ShadowTransfer,
    /// Restart shared timers, then neutralize every port.
    OneShot,
    /// Hand the staged frames to the digital encoder.
    Digital,
}

impl CommitMode {
    /// Commit the first `count` motor ports.
    ///
    /// One-shot restarts must all happen before any port is zeroed: the
    /// forced overflow is what loads the written pulse into the active
    /// register, and zeroing afterwards only touches the preload, so a late
    /// next cycle emits nothing.
    #[inline]
    pub fn complete<const N: usize>(
        self,
        motors: &OutputTable<N>,
        count: usize,
        digital: Option<&mut Box<dyn DigitalEncoder>>,
    ) {
        match self {
            Self::Disabled | Self::FreeRunning => {}
            Self::ShadowTransfer => {
                for port in motors.iter().take(count) {
                    port.latch();
                }
            }
            Self::OneShot => {
                for port in motors.iter().take(count) {
                    port.restart_timers();
                }
                for port in motors.iter().take(count) {
                    port.zero();
                }
            }
            Self::Digital => {
                if let Some(encoder) = digital {
                    encoder.commit(count.min(motors.len()));
                }
            }
        }
    }
}
