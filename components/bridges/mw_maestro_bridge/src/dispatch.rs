//! From client text to controller bytes.
//!
//! A request is parsed and range-checked completely before anything touches
//! the transport, so a rejected request never puts a byte on the wire. An
//! accepted one produces exactly one frame write.

use std::io::Write;

use log::{debug, warn};
use mw_maestro_lib::{Channel, PulseRange, ServoCommand, encode};

use crate::error::DispatchError;
use crate::transport::SerialTransport;

pub struct Dispatcher<W: Write + Send> {
    transport: SerialTransport<W>,
    range: PulseRange,
}

impl<W: Write + Send> Dispatcher<W> {
    pub fn new(transport: SerialTransport<W>, range: PulseRange) -> Self {
        Self { transport, range }
    }

    pub fn range(&self) -> PulseRange {
        self.range
    }

    pub fn transport(&self) -> &SerialTransport<W> {
        &self.transport
    }

    /// Turn a (channel, value) text pair into a validated command.
    pub fn parse(&self, channel_raw: &str, value_raw: &str) -> Result<ServoCommand, DispatchError> {
        let channel = channel_raw
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(Channel::new)
            .ok_or_else(|| DispatchError::BadChannel(channel_raw.to_string()))?;

        let micros = value_raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|us| us.is_finite())
            .ok_or_else(|| DispatchError::BadTarget(value_raw.to_string()))?;

        let target = self.range.target(micros).ok_or(DispatchError::TargetOutOfRange {
            micros,
            min_us: self.range.min_us(),
            max_us: self.range.max_us(),
        })?;

        Ok(ServoCommand::SetTarget { channel, target })
    }

    /// Validate, encode and send one set-target request.
    pub fn dispatch(&self, channel_raw: &str, value_raw: &str) -> Result<(), DispatchError> {
        let cmd = self.parse(channel_raw, value_raw).inspect_err(|e| {
            warn!("rejected command {channel_raw:?}={value_raw:?}: {e}");
        })?;
        self.submit(cmd)
    }

    /// Send every channel to its home position.
    pub fn go_home(&self) -> Result<(), DispatchError> {
        self.submit(ServoCommand::GoHome)
    }

    /// Encode and send an already validated command.
    pub fn submit(&self, cmd: ServoCommand) -> Result<(), DispatchError> {
        let frame = encode(cmd);
        self.transport.write(&frame)?;
        debug!("{cmd} sent as {frame:?}");
        Ok(())
    }

    pub fn close(&self) -> Result<(), DispatchError> {
        Ok(self.transport.close()?)
    }
}
