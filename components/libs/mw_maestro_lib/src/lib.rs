//! Pololu Maestro compact protocol.
//!
//! This crate only knows about bytes: it turns a typed [`ServoCommand`] into
//! the exact [`Frame`] the controller expects and parses frames back. It
//! never touches a serial port; see `mw-maestro-bridge` for the transport.
//!
//! Every byte after the command byte is a *data byte* and must keep its high
//! bit clear, otherwise the controller's frame parser resynchronises on it.
//! The types in [`command`] make such values unrepresentable, so [`encode`]
//! is total.
//!
//! ```
//! use mw_maestro_lib::{encode, Channel, ServoCommand, Target};
//!
//! let channel = Channel::new(3).unwrap();
//! let target = Target::from_micros(1500.0).unwrap();
//! let frame = encode(ServoCommand::SetTarget { channel, target });
//! assert_eq!(frame.as_bytes(), &[0x84, 0x03, 0x70, 0x2E]);
//! ```

pub mod command;
pub mod frame;
pub mod range;

pub use command::{Channel, MAX_CHANNEL, MAX_TARGET_QUS, ServoCommand, Target};
pub use frame::{CMD_GO_HOME, CMD_SET_TARGET, DecodeError, Frame, decode, encode, frame_len};
pub use range::{PulseRange, RangeError};
