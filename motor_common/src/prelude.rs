//! Prelude module for common re-exports.
//!
//! ```rust
//! use motor_common::prelude::*;
//! ```

use std::time::Duration;

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::output::config::{
    BeeperConfig, MotorDevConfig, OutputConfig, ServoDevConfig, TimerHardwareConfig,
};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_SUPPORTED_MOTORS, MAX_SUPPORTED_SERVOS};

// ─── Hardware ───────────────────────────────────────────────────────
pub use crate::output::channel::{
    BackendFactory, OutputError, OutputMode, Polarity, TimeBase, TimerBackend, TimerChannel,
};
pub use crate::output::digital::{DigitalEncoder, DshotCommand};
pub use crate::output::types::{
    DshotSpeed, IoTag, MotorProtocol, OutputFlags, TimerClocks, TimerHardware, TimerId,
    TimerUsage,
};

/// Default control loop period in microseconds (1 kHz).
pub const DEFAULT_LOOP_TIME_US: u32 = 1000;

/// Default control loop period as Duration.
pub const DEFAULT_LOOP_TIME: Duration = Duration::from_micros(DEFAULT_LOOP_TIME_US as u64);
