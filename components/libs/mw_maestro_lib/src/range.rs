//! Accepted pulse-width window.
//!
//! The controller itself accepts anything that fits in 14 bits. This is the
//! narrower window a deployment is willing to drive its servos into; targets
//! outside it are refused, never clamped.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command::{MAX_TARGET_QUS, Target};

/// Default window, in µs. Wide enough for typical hobby servos at both ends.
pub const DEFAULT_MIN_US: f64 = 500.0;
pub const DEFAULT_MAX_US: f64 = 2500.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RangeError {
    #[error("pulse range bounds must be finite and non-negative, got {min_us}..={max_us}")]
    NotFinite { min_us: f64, max_us: f64 },
    #[error("pulse range is inverted: min {min_us} µs > max {max_us} µs")]
    Inverted { min_us: f64, max_us: f64 },
    #[error("pulse range max {max_us} µs exceeds the encodable {limit_us} µs")]
    Unencodable { max_us: f64, limit_us: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPulseRange")]
pub struct PulseRange {
    min_us: f64,
    max_us: f64,
}

#[derive(Deserialize)]
#[serde(default)]
struct RawPulseRange {
    min_us: f64,
    max_us: f64,
}

impl Default for RawPulseRange {
    fn default() -> Self {
        Self {
            min_us: DEFAULT_MIN_US,
            max_us: DEFAULT_MAX_US,
        }
    }
}

impl TryFrom<RawPulseRange> for PulseRange {
    type Error = RangeError;

    fn try_from(raw: RawPulseRange) -> Result<Self, Self::Error> {
        Self::new(raw.min_us, raw.max_us)
    }
}

impl Default for PulseRange {
    fn default() -> Self {
        Self {
            min_us: DEFAULT_MIN_US,
            max_us: DEFAULT_MAX_US,
        }
    }
}

impl PulseRange {
    pub fn new(min_us: f64, max_us: f64) -> Result<Self, RangeError> {
        if !min_us.is_finite() || !max_us.is_finite() || min_us < 0.0 {
            return Err(RangeError::NotFinite { min_us, max_us });
        }
        if min_us > max_us {
            return Err(RangeError::Inverted { min_us, max_us });
        }
        let limit_us = f64::from(MAX_TARGET_QUS) / 4.0;
        if max_us > limit_us {
            return Err(RangeError::Unencodable { max_us, limit_us });
        }
        Ok(Self { min_us, max_us })
    }

    pub fn min_us(&self) -> f64 {
        self.min_us
    }

    pub fn max_us(&self) -> f64 {
        self.max_us
    }

    /// Bounds are inclusive and compared before quantisation.
    pub fn contains(&self, us: f64) -> bool {
        us >= self.min_us && us <= self.max_us
    }

    /// Quantised target for `us` if it lies in the window.
    pub fn target(&self, us: f64) -> Option<Target> {
        if self.contains(us) {
            Target::from_micros(us)
        } else {
            None
        }
    }
}
