use std::io;

use mw_maestro_lib::Frame;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The device is absent or not accessible. Nothing can be sent without
    /// it, so this is fatal for the service.
    #[error("cannot open serial device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: io::Error,
    },
    /// The frame may have been partially sent; the controller's framing state
    /// is unknown. Never resent automatically.
    #[error("write of {frame:?} failed: {source}")]
    WriteFailed {
        frame: Frame,
        #[source]
        source: io::Error,
    },
    #[error("flush on close failed: {0}")]
    Close(#[source] io::Error),
    #[error("serial transport is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("bad channel {0:?}: expected an integer id in 0..=127")]
    BadChannel(String),
    #[error("bad target {0:?}: expected a finite number of microseconds")]
    BadTarget(String),
    #[error("target {micros} µs outside the accepted {min_us}..={max_us} µs")]
    TargetOutOfRange { micros: f64, min_us: f64, max_us: f64 },
    #[error(transparent)]
    TransportFailure(#[from] TransportError),
}

impl DispatchError {
    /// Malformed or out-of-range input from the client, as opposed to a
    /// device-side failure.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::TransportFailure(_))
    }
}
