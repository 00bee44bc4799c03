//! Validated blind position

use crate::error::DecodeError;
use std::fmt;

/// Target blind openness in percent, always within `0..=100`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlindPosition(u8);

impl BlindPosition {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 100;

    /// Fully closed
    pub const CLOSED: BlindPosition = BlindPosition(Self::MIN);
    /// Fully open
    pub const OPEN: BlindPosition = BlindPosition(Self::MAX);

    /// Returns `None` when `percent` is above 100
    pub const fn new(percent: u8) -> Option<Self> {
        if percent <= Self::MAX {
            Some(Self(percent))
        } else {
            None
        }
    }

    /// Validate an integer read from a payload; values are rejected, never clamped
    pub fn from_integer(value: i128) -> Result<Self, DecodeError> {
        if (i128::from(Self::MIN)..=i128::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(DecodeError::OutOfRange { value })
        }
    }

    pub const fn percent(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for BlindPosition {
    type Error = DecodeError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_integer(i128::from(value))
    }
}

impl TryFrom<u64> for BlindPosition {
    type Error = DecodeError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::from_integer(i128::from(value))
    }
}

impl From<BlindPosition> for u8 {
    fn from(position: BlindPosition) -> Self {
        position.0
    }
}

impl fmt::Display for BlindPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}
