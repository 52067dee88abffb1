//! Output hardware and protocol types.
//!
//! This module defines:
//! - `IoTag` - Packed pin identifier selected by configuration
//! - `TimerId` - Identity of a physical timer
//! - `OutputFlags` / `TimerUsage` - Channel wiring and allowed users
//! - `TimerHardware` - One entry of the board timer map
//! - `MotorProtocol` / `DshotSpeed` - The closed set of ESC protocols

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::consts::{
    MULTISHOT_TIMER_MHZ, ONESHOT42_TIMER_MHZ, ONESHOT125_TIMER_MHZ, PWM_BRUSHED_TIMER_MHZ,
    PWM_TIMER_MHZ, PWM_TIMER_MHZ_MAX,
};

/// Packed pin identifier: `((port + 1) << 4) | pin`, 0 means "no pin".
///
/// Parsed from and printed as `P<port><pin>`, e.g. `"PA8"` or `"PB10"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IoTag(u8);

impl IoTag {
    /// The empty tag.
    pub const NONE: IoTag = IoTag(0);

    /// Build a tag from a zero-based GPIO port index (A = 0) and pin number.
    pub const fn new(port: u8, pin: u8) -> Option<Self> {
        if port >= 15 || pin >= 16 {
            return None;
        }
        Some(Self(((port + 1) << 4) | pin))
    }

    /// Raw packed value.
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// True for [`IoTag::NONE`].
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Zero-based GPIO port index.
    pub const fn port(self) -> u8 {
        (self.0 >> 4).saturating_sub(1)
    }

    /// Pin number within the port.
    pub const fn pin(self) -> u8 {
        self.0 & 0x0F
    }
}

impl fmt::Display for IoTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "NONE");
        }
        write!(f, "P{}{}", char::from(b'A' + self.port()), self.pin())
    }
}

impl FromStr for IoTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Self::NONE);
        }
        let upper = s.to_ascii_uppercase();
        let bytes = upper.as_bytes();
        if bytes.len() < 3 || bytes[0] != b'P' || !bytes[1].is_ascii_uppercase() {
            return Err(format!("invalid pin tag '{s}' (expected e.g. PA8)"));
        }
        let pin: u8 = upper[2..]
            .parse()
            .map_err(|_| format!("invalid pin number in tag '{s}'"))?;
        IoTag::new(bytes[1] - b'A', pin).ok_or_else(|| format!("pin tag '{s}' out of range"))
    }
}

impl TryFrom<String> for IoTag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<IoTag> for String {
    fn from(tag: IoTag) -> Self {
        tag.to_string()
    }
}

/// Identity of a physical timer. Channels with equal ids share one counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(pub u8);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TIM{}", self.0)
    }
}

bitflags! {
    /// How a timer channel is wired to its pin.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct OutputFlags: u8 {
        /// Pin is driven with inverted polarity.
        const INVERTED  = 0x01;
        /// Pin is the complementary (N) output of the channel.
        const N_CHANNEL = 0x02;
    }
}

bitflags! {
    /// Which outputs may claim a timer channel.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TimerUsage: u8 {
        /// Motor outputs.
        const MOTOR  = 0x01;
        /// Servo outputs.
        const SERVO  = 0x02;
        /// Beeper output.
        const BEEPER = 0x04;
        /// Any user.
        const ANY    = Self::MOTOR.bits() | Self::SERVO.bits() | Self::BEEPER.bits();
    }
}

/// One timer channel of the board timer map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHardware {
    /// Pin this channel drives.
    pub tag: IoTag,
    /// Physical timer.
    pub timer: TimerId,
    /// Channel number on the timer (1-based).
    pub channel: u8,
    /// Pin wiring.
    pub output: OutputFlags,
    /// Allowed users.
    pub usage: TimerUsage,
    /// Compare writes only take effect after an explicit shadow transfer.
    pub shadowed: bool,
}

/// ESC wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MotorProtocol {
    /// 1000-2000 µs pulses at the configured PWM rate.
    #[serde(rename = "standard")]
    Standard,
    /// 125-250 µs pulses, one per control loop.
    #[default]
    #[serde(rename = "oneshot125")]
    OneShot125,
    /// ~42-83 µs pulses, one per control loop.
    #[serde(rename = "oneshot42")]
    OneShot42,
    /// 5-25 µs pulses, one per control loop.
    #[serde(rename = "multishot")]
    MultiShot,
    /// Duty-cycle drive of brushed motors.
    #[serde(rename = "brushed")]
    Brushed,
    /// Duty-cycle drive of an on-board three-phase inverter.
    #[serde(rename = "onboard_esc")]
    OnboardEsc,
    /// DShot at 150 kbit/s.
    #[serde(rename = "dshot150")]
    Dshot150,
    /// DShot at 300 kbit/s.
    #[serde(rename = "dshot300")]
    Dshot300,
    /// DShot at 600 kbit/s.
    #[serde(rename = "dshot600")]
    Dshot600,
    /// DShot at 1200 kbit/s.
    #[serde(rename = "dshot1200")]
    Dshot1200,
}

impl MotorProtocol {
    /// DShot bit rate for digital protocols.
    pub const fn dshot_speed(self) -> Option<DshotSpeed> {
        match self {
            Self::Dshot150 => Some(DshotSpeed::DShot150),
            Self::Dshot300 => Some(DshotSpeed::DShot300),
            Self::Dshot600 => Some(DshotSpeed::DShot600),
            Self::Dshot1200 => Some(DshotSpeed::DShot1200),
            _ => None,
        }
    }

    /// True for the DShot family.
    pub const fn is_digital(self) -> bool {
        self.dshot_speed().is_some()
    }

    /// Number of timer channels one motor occupies.
    pub const fn phases(self) -> usize {
        match self {
            Self::OnboardEsc => crate::consts::INVERTER_PHASES,
            _ => 1,
        }
    }
}

impl fmt::Display for MotorProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Standard => "standard",
            Self::OneShot125 => "oneshot125",
            Self::OneShot42 => "oneshot42",
            Self::MultiShot => "multishot",
            Self::Brushed => "brushed",
            Self::OnboardEsc => "onboard_esc",
            Self::Dshot150 => "dshot150",
            Self::Dshot300 => "dshot300",
            Self::Dshot600 => "dshot600",
            Self::Dshot1200 => "dshot1200",
        };
        f.write_str(name)
    }
}

/// DShot speed variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DshotSpeed {
    /// 150 kbit/s.
    DShot150,
    /// 300 kbit/s.
    DShot300,
    /// 600 kbit/s.
    DShot600,
    /// 1200 kbit/s.
    DShot1200,
}

impl DshotSpeed {
    /// Bit rate in bits per second.
    pub const fn baud_rate(self) -> u32 {
        match self {
            Self::DShot150 => 150_000,
            Self::DShot300 => 300_000,
            Self::DShot600 => 600_000,
            Self::DShot1200 => 1_200_000,
        }
    }

    /// Timer clock driving the bit encoder (20 ticks per bit).
    pub const fn timer_mhz(self) -> u32 {
        self.baud_rate() * 20 / 1_000_000
    }

    /// Timer clock in Hz.
    pub const fn timer_hz(self) -> u32 {
        self.timer_mhz() * 1_000_000
    }
}

/// Timer clock (ticks per µs) used by each analog protocol.
///
/// Defaults match the common F3-class targets; faster parts override them
/// in the `[clocks]` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerClocks {
    /// Standard PWM.
    pub standard_mhz: u32,
    /// OneShot125.
    pub oneshot125_mhz: u32,
    /// OneShot42.
    pub oneshot42_mhz: u32,
    /// MultiShot.
    pub multishot_mhz: u32,
    /// Brushed.
    pub brushed_mhz: u32,
    /// Onboard ESC.
    pub onboard_esc_mhz: u32,
}

impl Default for TimerClocks {
    fn default() -> Self {
        Self {
            standard_mhz: PWM_TIMER_MHZ,
            oneshot125_mhz: ONESHOT125_TIMER_MHZ,
            oneshot42_mhz: ONESHOT42_TIMER_MHZ,
            multishot_mhz: MULTISHOT_TIMER_MHZ,
            brushed_mhz: PWM_BRUSHED_TIMER_MHZ,
            onboard_esc_mhz: PWM_TIMER_MHZ_MAX,
        }
    }
}

impl TimerClocks {
    /// Every protocol counts at the same rate.
    pub const fn uniform(mhz: u32) -> Self {
        Self {
            standard_mhz: mhz,
            oneshot125_mhz: mhz,
            oneshot42_mhz: mhz,
            multishot_mhz: mhz,
            brushed_mhz: mhz,
            onboard_esc_mhz: mhz,
        }
    }
}
