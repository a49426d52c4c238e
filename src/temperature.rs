//! Fixed-point temperature values and reading status codes

use core::fmt;

use serde::{Deserialize, Serialize};

/// Largest magnitude (in hundredths) that is rendered as a number.
const DISPLAY_LIMIT: i32 = 99_999;

/// Temperature in hundredths of a degree Fahrenheit.
///
/// `Temperature::NO_VALUE` is reserved and means "no valid reading". It is
/// never produced by the decoder.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Temperature(i32);

impl Temperature {
    /// Sentinel for "no valid reading".
    pub const NO_VALUE: Self = Self(i32::MIN);

    pub const fn from_hundredths(hundredths: i32) -> Self {
        Self(hundredths)
    }

    /// Raw hundredths, including the sentinel.
    pub const fn hundredths(self) -> i32 {
        self.0
    }

    pub const fn is_valid(self) -> bool {
        self.0 != Self::NO_VALUE.0
    }

    /// The reading in hundredths, or `None` for the sentinel.
    pub const fn value(self) -> Option<i32> {
        if self.is_valid() { Some(self.0) } else { None }
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Self::NO_VALUE
    }
}

/// Renders as `[-]W.FF`. Anything outside ±999.99, the sentinel included,
/// renders as `-.--`.
impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !(-DISPLAY_LIMIT..=DISPLAY_LIMIT).contains(&self.0) {
            return f.write_str("-.--");
        }

        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, magnitude / 100, magnitude % 100)
    }
}

/// Outcome attached to the last reading.
///
/// Discriminants are stable and may be shown to users as numeric codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ErrorCode {
    #[default]
    Ok = 0,
    /// Bus timeout or NACK during the poll
    SensorFailure = 1,
    /// The state lock could not be taken in time
    LockTimeout = 10,
}

impl ErrorCode {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::SensorFailure => "sensor failure",
            Self::LockTimeout => "lock timeout",
        }
    }
}
