//! System-wide constants for the motor output workspace.
//!
//! Single source of truth for table capacities, timer clock defaults and
//! DShot limits. Imported by all crates.

use static_assertions::const_assert;

/// Maximum number of motor outputs.
pub const MAX_SUPPORTED_MOTORS: usize = 12;

/// Maximum number of servo outputs.
pub const MAX_SUPPORTED_SERVOS: usize = 8;

/// Number of half-bridge phases driven per onboard-ESC motor.
pub const INVERTER_PHASES: usize = 3;

/// Maximum number of distinct physical timers on a board.
pub const MAX_TIMERS: usize = 16;

/// Maximum number of timer channel definitions in a board timer map.
pub const MAX_TIMER_CHANNELS: usize = 64;

/// Timer clock for standard PWM and servos (1 tick = 1 µs).
pub const PWM_TIMER_MHZ: u32 = 1;

/// Default timer clock for OneShot125.
pub const ONESHOT125_TIMER_MHZ: u32 = 8;

/// Default timer clock for OneShot42.
pub const ONESHOT42_TIMER_MHZ: u32 = 24;

/// Default timer clock for MultiShot.
pub const MULTISHOT_TIMER_MHZ: u32 = 72;

/// Default timer clock for brushed motors.
pub const PWM_BRUSHED_TIMER_MHZ: u32 = 24;

/// Default timer clock for onboard-ESC bridge drive.
pub const PWM_TIMER_MHZ_MAX: u32 = 72;

/// Timer period used by synced one-shot outputs (restarted every cycle).
pub const ONESHOT_PERIOD_TICKS: u32 = 0xFFFF;

/// Highest DShot special command value.
pub const DSHOT_MAX_COMMAND: u8 = 47;

/// Highest DShot frame value (11 bits).
pub const DSHOT_MAX_VALUE: u16 = 2047;

/// Transmissions for commands the ESC must latch.
pub const DSHOT_COMMAND_REPEATS: u8 = 10;

/// Default delay between two command transmissions in microseconds.
pub const DSHOT_COMMAND_DELAY_US: u64 = 1000;

/// Lowest legal pulse command for analog protocols.
pub const PULSE_MIN: u16 = 1000;

/// Highest legal pulse command for analog protocols.
pub const PULSE_MAX: u16 = 2000;

/// Default motor update rate for free-running protocols in Hz.
pub const DEFAULT_MOTOR_PWM_RATE: u16 = 400;

/// Default servo update rate in Hz.
pub const DEFAULT_SERVO_PWM_RATE: u16 = 50;

/// Default servo center pulse in µs.
pub const DEFAULT_SERVO_CENTER_PULSE: u16 = 1500;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/motor_output/output.toml";

const_assert!(MAX_SUPPORTED_MOTORS <= u8::MAX as usize);
const_assert!(MAX_SUPPORTED_SERVOS <= u8::MAX as usize);
const_assert!(MAX_SUPPORTED_MOTORS * INVERTER_PHASES <= MAX_TIMER_CHANNELS);
