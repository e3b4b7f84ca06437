//! Typed servo commands.
//!
//! A command is built once per client request and consumed by
//! [`crate::encode`]. Both the channel id and the pulse width are validated
//! at construction, which is what lets the encoder skip all checks.

use core::fmt;

/// Highest channel id that still fits a protocol data byte.
pub const MAX_CHANNEL: u8 = 0x7F;

/// Largest pulse width the two 7-bit data bytes can carry, in quarter-µs.
pub const MAX_TARGET_QUS: u16 = 0x3FFF;

/// Servo output on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    /// Returns `None` when `id` has its high bit set.
    pub const fn new(id: u8) -> Option<Self> {
        if id <= MAX_CHANNEL {
            Some(Self(id))
        } else {
            None
        }
    }

    pub(crate) const fn from_data_byte(byte: u8) -> Self {
        Self(byte & MAX_CHANNEL)
    }

    pub const fn id(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pulse width quantised to the protocol's native quarter-microsecond unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target(u16);

impl Target {
    pub const fn from_quarter_micros(qus: u16) -> Option<Self> {
        if qus <= MAX_TARGET_QUS {
            Some(Self(qus))
        } else {
            None
        }
    }

    pub(crate) const fn from_data_bytes(qus: u16) -> Self {
        Self(qus & MAX_TARGET_QUS)
    }

    /// Quantise a microsecond value with `round(us * 4)`.
    ///
    /// Returns `None` for negative or non-finite input and for anything that
    /// would not fit in 14 bits once quantised. Never truncates.
    pub fn from_micros(us: f64) -> Option<Self> {
        if !us.is_finite() || us < 0.0 {
            return None;
        }
        let qus = (us * 4.0).round();
        if qus > f64::from(MAX_TARGET_QUS) {
            return None;
        }
        Some(Self(qus as u16))
    }

    pub const fn quarter_micros(self) -> u16 {
        self.0
    }

    pub fn micros(self) -> f64 {
        f64::from(self.0) / 4.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}µs", self.micros())
    }
}

/// One logical command for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoCommand {
    /// Drive `channel` to `target`.
    SetTarget { channel: Channel, target: Target },
    /// Every channel returns to its configured home position. Broadcast, so
    /// no channel id is carried.
    GoHome,
}

impl fmt::Display for ServoCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SetTarget { channel, target } => write!(f, "set target ch{channel} -> {target}"),
            Self::GoHome => f.write_str("go home"),
        }
    }
}
