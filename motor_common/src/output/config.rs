//! Output configuration types.
//!
//! This module contains the configuration loaded from `output.toml`:
//! - `OutputConfig` - Top-level file
//! - `MotorDevConfig` / `ServoDevConfig` / `BeeperConfig` - Per-table settings
//! - `TimerHardwareConfig` - One entry of the board timer map
//!
//! # TOML Example
//!
//! ```toml
//! backend = "simulation"
//!
//! [shared]
//! service_name = "quad-bench"
//!
//! [motor]
//! protocol = "oneshot125"
//! motor_count = 4
//! io_tags = ["PA8", "PA9", "PB6", "PB7"]
//!
//! [[timers]]
//! tag = "PA8"
//! timer = 1
//! channel = 1
//! usage = ["motor"]
//! ```

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    DEFAULT_MOTOR_PWM_RATE, DEFAULT_SERVO_CENTER_PULSE, DEFAULT_SERVO_PWM_RATE,
    DSHOT_COMMAND_DELAY_US, MAX_SUPPORTED_MOTORS, MAX_SUPPORTED_SERVOS, MAX_TIMER_CHANNELS,
    MAX_TIMERS,
};
use crate::output::types::{
    IoTag, MotorProtocol, OutputFlags, TimerClocks, TimerHardware, TimerId, TimerUsage,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

fn default_backend() -> String {
    "simulation".to_string()
}

fn default_motor_pwm_rate() -> u16 {
    DEFAULT_MOTOR_PWM_RATE
}

fn default_command_delay_us() -> u64 {
    DSHOT_COMMAND_DELAY_US
}

fn default_servo_pwm_rate() -> u16 {
    DEFAULT_SERVO_PWM_RATE
}

fn default_servo_center_pulse() -> u16 {
    DEFAULT_SERVO_CENTER_PULSE
}

fn default_usage() -> Vec<UsageKind> {
    vec![UsageKind::Any]
}

/// Main configuration loaded from `output.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Logging and instance naming.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Timer backend (hardware family) to open channels with.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Motor outputs.
    pub motor: MotorDevConfig,

    /// Servo outputs, if the board drives any.
    #[serde(default)]
    pub servo: Option<ServoDevConfig>,

    /// PWM beeper, if fitted.
    #[serde(default)]
    pub beeper: Option<BeeperConfig>,

    /// Per-protocol timer clocks of the target.
    #[serde(default)]
    pub clocks: TimerClocks,

    /// Board timer map.
    #[serde(default)]
    pub timers: Vec<TimerHardwareConfig>,
}

/// Motor output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotorDevConfig {
    /// ESC protocol.
    #[serde(default)]
    pub protocol: MotorProtocol,

    /// Number of motors the mixer drives.
    pub motor_count: u8,

    /// Pins in slot order. Onboard ESC uses three consecutive pins per motor.
    #[serde(default)]
    pub io_tags: Vec<IoTag>,

    /// Update rate in Hz for free-running outputs.
    #[serde(default = "default_motor_pwm_rate")]
    pub pwm_rate: u16,

    /// Run one-shot protocols free-running instead of once per loop.
    #[serde(default)]
    pub use_unsynced_pwm: bool,

    /// Invert every motor pin.
    #[serde(default)]
    pub inversion: bool,

    /// Bridge dead-time in timer ticks (onboard ESC).
    #[serde(default)]
    pub deadtime: u16,

    /// Compare value loaded when a channel is configured.
    #[serde(default)]
    pub idle_pulse: u16,

    /// Delay between DShot command transmissions in microseconds.
    #[serde(default = "default_command_delay_us")]
    pub command_delay_us: u64,
}

impl Default for MotorDevConfig {
    fn default() -> Self {
        Self {
            protocol: MotorProtocol::default(),
            motor_count: 0,
            io_tags: Vec::new(),
            pwm_rate: DEFAULT_MOTOR_PWM_RATE,
            use_unsynced_pwm: false,
            inversion: false,
            deadtime: 0,
            idle_pulse: 0,
            command_delay_us: DSHOT_COMMAND_DELAY_US,
        }
    }
}

/// Servo output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServoDevConfig {
    /// Pins in slot order; binding stops at the first empty tag.
    #[serde(default)]
    pub io_tags: Vec<IoTag>,

    /// Update rate in Hz.
    #[serde(default = "default_servo_pwm_rate")]
    pub pwm_rate: u16,

    /// Pulse loaded at configuration time in µs.
    #[serde(default = "default_servo_center_pulse")]
    pub center_pulse: u16,
}

impl Default for ServoDevConfig {
    fn default() -> Self {
        Self {
            io_tags: Vec::new(),
            pwm_rate: DEFAULT_SERVO_PWM_RATE,
            center_pulse: DEFAULT_SERVO_CENTER_PULSE,
        }
    }
}

/// PWM beeper settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeeperConfig {
    /// Beeper pin.
    pub io_tag: IoTag,

    /// Tone frequency in Hz.
    pub frequency: u16,
}

/// Allowed user of a timer channel, as written in TOML.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsageKind {
    /// Motor outputs.
    Motor,
    /// Servo outputs.
    Servo,
    /// Beeper output.
    Beeper,
    /// Any user.
    Any,
}

impl From<UsageKind> for TimerUsage {
    fn from(kind: UsageKind) -> Self {
        match kind {
            UsageKind::Motor => TimerUsage::MOTOR,
            UsageKind::Servo => TimerUsage::SERVO,
            UsageKind::Beeper => TimerUsage::BEEPER,
            UsageKind::Any => TimerUsage::ANY,
        }
    }
}

/// One timer channel of the board timer map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerHardwareConfig {
    /// Pin driven by the channel.
    pub tag: IoTag,

    /// Physical timer number.
    pub timer: TimerId,

    /// Channel number on the timer (1-based).
    pub channel: u8,

    /// Pin is wired inverted.
    #[serde(default)]
    pub inverted: bool,

    /// Pin is the complementary output.
    #[serde(default)]
    pub n_channel: bool,

    /// Allowed users.
    #[serde(default = "default_usage")]
    pub usage: Vec<UsageKind>,

    /// Compare writes need an explicit shadow transfer.
    #[serde(default)]
    pub shadowed: bool,
}

impl TimerHardwareConfig {
    /// Convert to the runtime representation.
    pub fn to_hardware(&self) -> TimerHardware {
        let mut output = OutputFlags::empty();
        output.set(OutputFlags::INVERTED, self.inverted);
        output.set(OutputFlags::N_CHANNEL, self.n_channel);

        let usage = self
            .usage
            .iter()
            .fold(TimerUsage::empty(), |acc, kind| acc | TimerUsage::from(*kind));

        TimerHardware {
            tag: self.tag,
            timer: self.timer,
            channel: self.channel,
            output,
            usage,
            shadowed: self.shadowed,
        }
    }
}

impl OutputConfig {
    /// Validate the output configuration.
    ///
    /// # Validation Rules
    /// 1. `motor_count` <= MAX_SUPPORTED_MOTORS, servo tags <= MAX_SUPPORTED_SERVOS
    /// 2. PWM rates, timer clocks and beeper frequency > 0
    /// 3. Timer map: no empty tags, channels >= 1, no duplicate tags or
    ///    timer/channel pairs, at most MAX_TIMERS distinct timers
    ///
    /// A `motor_count` larger than the available hardware is not a
    /// configuration error; it is handled at bind time by disabling motors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        let motor = &self.motor;
        if usize::from(motor.motor_count) > MAX_SUPPORTED_MOTORS {
            return Err(ConfigError::ValidationError(format!(
                "Too many motors: {} (max {})",
                motor.motor_count, MAX_SUPPORTED_MOTORS
            )));
        }
        if motor.pwm_rate == 0 {
            return Err(ConfigError::ValidationError(
                "motor.pwm_rate must be greater than 0".to_string(),
            ));
        }
        if motor.command_delay_us == 0 {
            return Err(ConfigError::ValidationError(
                "motor.command_delay_us must be greater than 0".to_string(),
            ));
        }

        let clocks = &self.clocks;
        if [
            clocks.standard_mhz,
            clocks.oneshot125_mhz,
            clocks.oneshot42_mhz,
            clocks.multishot_mhz,
            clocks.brushed_mhz,
            clocks.onboard_esc_mhz,
        ]
        .contains(&0)
        {
            return Err(ConfigError::ValidationError(
                "timer clocks must be greater than 0".to_string(),
            ));
        }

        if let Some(servo) = &self.servo {
            if servo.io_tags.len() > MAX_SUPPORTED_SERVOS {
                return Err(ConfigError::ValidationError(format!(
                    "Too many servos: {} (max {})",
                    servo.io_tags.len(),
                    MAX_SUPPORTED_SERVOS
                )));
            }
            if servo.pwm_rate == 0 {
                return Err(ConfigError::ValidationError(
                    "servo.pwm_rate must be greater than 0".to_string(),
                ));
            }
        }

        if let Some(beeper) = &self.beeper {
            if beeper.frequency == 0 {
                return Err(ConfigError::ValidationError(
                    "beeper.frequency must be greater than 0".to_string(),
                ));
            }
        }

        self.validate_timers()
    }

    fn validate_timers(&self) -> Result<(), ConfigError> {
        if self.timers.len() > MAX_TIMER_CHANNELS {
            return Err(ConfigError::ValidationError(format!(
                "Too many timer channels: {} (max {})",
                self.timers.len(),
                MAX_TIMER_CHANNELS
            )));
        }

        let mut tags = HashSet::new();
        let mut channels = HashSet::new();
        let mut timers = HashSet::new();
        for entry in &self.timers {
            if entry.tag.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "Timer {} channel {} has no pin",
                    entry.timer, entry.channel
                )));
            }
            if entry.channel == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "Timer channel numbers start at 1 ({})",
                    entry.tag
                )));
            }
            if !tags.insert(entry.tag) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate timer pin: {}",
                    entry.tag
                )));
            }
            if !channels.insert((entry.timer, entry.channel)) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate timer channel: {} CH{}",
                    entry.timer, entry.channel
                )));
            }
            timers.insert(entry.timer);
        }

        if timers.len() > MAX_TIMERS {
            return Err(ConfigError::ValidationError(format!(
                "Too many timers: {} (max {})",
                timers.len(),
                MAX_TIMERS
            )));
        }

        Ok(())
    }
}
