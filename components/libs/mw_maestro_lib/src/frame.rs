//! Byte framing for the compact protocol.
//!
//! | command    | bytes                                      |
//! |------------|--------------------------------------------|
//! | set target | `0x84, channel, qus & 0x7F, (qus >> 7) & 0x7F` |
//! | go home    | `0xA2`                                     |
//!
//! There are no delimiters on the wire. Both ends stay in sync only because
//! they agree on the length implied by each command byte.

use core::fmt;

use thiserror::Error;

use crate::command::{Channel, ServoCommand, Target};

pub const CMD_SET_TARGET: u8 = 0x84;
pub const CMD_GO_HOME: u8 = 0xA2;

const DATA_BITS: u16 = 7;
const DATA_MASK: u16 = 0x7F;

/// Exact byte sequence for one command. Never mutated once built.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    buf: [u8; Frame::MAX_LEN],
    len: u8,
}

impl Frame {
    pub const MAX_LEN: usize = 4;

    fn from_slice(bytes: &[u8]) -> Self {
        let mut buf = [0u8; Self::MAX_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Self {
            buf,
            len: bytes.len() as u8,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false; kept for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl AsRef<[u8]> for Frame {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Frame[")?;
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{b:02X}")?;
        }
        f.write_str("]")
    }
}

/// Encode a command into its wire frame.
pub fn encode(cmd: ServoCommand) -> Frame {
    match cmd {
        ServoCommand::SetTarget { channel, target } => {
            let qus = target.quarter_micros();
            Frame::from_slice(&[
                CMD_SET_TARGET,
                channel.id(),
                (qus & DATA_MASK) as u8,
                ((qus >> DATA_BITS) & DATA_MASK) as u8,
            ])
        }
        ServoCommand::GoHome => Frame::from_slice(&[CMD_GO_HOME]),
    }
}

/// Total frame length implied by a command byte, or `None` if unknown.
pub fn frame_len(command: u8) -> Option<usize> {
    match command {
        CMD_SET_TARGET => Some(4),
        CMD_GO_HOME => Some(1),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty frame")]
    Empty,
    #[error("unknown command byte 0x{0:02X}")]
    UnknownCommand(u8),
    #[error("frame for command 0x{command:02X} needs {expected} bytes, got {got}")]
    Length {
        command: u8,
        expected: usize,
        got: usize,
    },
    #[error("data byte {index} is 0x{byte:02X}, high bit must be clear")]
    HighBitSet { index: usize, byte: u8 },
}

/// Parse exactly one frame.
pub fn decode(bytes: &[u8]) -> Result<ServoCommand, DecodeError> {
    let (&command, data) = bytes.split_first().ok_or(DecodeError::Empty)?;
    let expected = frame_len(command).ok_or(DecodeError::UnknownCommand(command))?;
    if bytes.len() != expected {
        return Err(DecodeError::Length {
            command,
            expected,
            got: bytes.len(),
        });
    }
    if let Some((index, &byte)) = data.iter().enumerate().find(|(_, b)| **b > DATA_MASK as u8) {
        return Err(DecodeError::HighBitSet {
            index: index + 1,
            byte,
        });
    }

    match command {
        CMD_SET_TARGET => {
            let qus = u16::from(data[1]) | (u16::from(data[2]) << DATA_BITS);
            let channel = Channel::from_data_byte(data[0]);
            let target = Target::from_data_bytes(qus);
            Ok(ServoCommand::SetTarget { channel, target })
        }
        _ => Ok(ServoCommand::GoHome),
    }
}
