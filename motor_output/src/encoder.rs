//! Pulse encoders for the analog protocols.
//!
//! Pure functions mapping a logical command (legacy 1000-2000 µs range) to a
//! compare-register tick count. Rounding follows C `lrintf` (ties to even).
//! No clamping is performed: values outside the documented range are a
//! caller precondition violation and yield unspecified tick counts.

/// Encoding applied by an analog motor writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseEncoding {
    /// `value` µs.
    Standard,
    /// `value / 8` µs.
    OneShot125,
    /// `value / 24` µs.
    OneShot42,
    /// 5-25 µs window.
    MultiShot,
    /// Linear duty across the whole period (brushed, onboard ESC).
    Duty,
}

/// Encode `value` into compare ticks for a timer counting `mhz` ticks per µs
/// with the given `period`.
#[inline]
pub fn encode(encoding: PulseEncoding, mhz: u32, value: u16, period: u32) -> u32 {
    match encoding {
        PulseEncoding::Standard => u32::from(value) * mhz,
        PulseEncoding::OneShot125 => round_ticks(f32::from(value) * mhz as f32 / 8.0),
        PulseEncoding::OneShot42 => round_ticks(f32::from(value) * mhz as f32 / 24.0),
        PulseEncoding::MultiShot => {
            let window = mhz as f32 * 20.0 / 1000.0;
            let base = (mhz * 5) as f32;
            round_ticks((f32::from(value) - 1000.0) * window + base)
        }
        PulseEncoding::Duty => {
            let ticks = (i64::from(value) - 1000) * i64::from(period) / 1000;
            ticks as u32
        }
    }
}

#[inline]
fn round_ticks(ticks: f32) -> u32 {
    ticks.round_ties_even() as u32
}
