//! The one serial handle of the process.
//!
//! All writers share a [`SerialTransport`] through `&self`; the port lives
//! behind a mutex held for the whole frame, so two frames never interleave on
//! the wire. The blocking write is bounded by the port timeout set at open.

use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, info, warn};
use mw_linux_resources::{LinuxSerialPort, SerialConfig};
use mw_maestro_lib::Frame;

use crate::error::TransportError;

pub struct SerialTransport<W: Write + Send> {
    name: String,
    port: Mutex<Option<W>>,
}

impl SerialTransport<LinuxSerialPort> {
    /// Open the configured device at 8-N-1, no flow control.
    pub fn open(config: &SerialConfig) -> Result<Self, TransportError> {
        let port = LinuxSerialPort::open_with(config).map_err(|source| TransportError::Open {
            device: config.device.clone(),
            source,
        })?;
        match port.baud() {
            Ok(baud) if baud != config.baud => {
                warn!("{}: asked for {} baud, driver applied {baud}", port.device(), config.baud)
            }
            Ok(baud) => info!("serial transport open on {} at {baud} baud", port.device()),
            Err(e) => warn!("{}: cannot read back the baud rate: {e}", port.device()),
        }
        let name = port.device().to_string();
        Ok(Self::new(name, port))
    }
}

impl<W: Write + Send> SerialTransport<W> {
    /// Wrap an already open writer.
    pub fn new(name: impl Into<String>, port: W) -> Self {
        Self {
            name: name.into(),
            port: Mutex::new(Some(port)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Option<W>> {
        self.port.lock().unwrap_or_else(|poisoned| {
            warn!("{}: a writer panicked mid-frame, controller framing may be off", self.name);
            PoisonError::into_inner(poisoned)
        })
    }

    /// Send one whole frame and flush it. Not retried on failure.
    pub fn write(&self, frame: &Frame) -> Result<(), TransportError> {
        let mut guard = self.lock();
        let port = guard.as_mut().ok_or(TransportError::Closed)?;
        port.write_all(frame.as_bytes())
            .and_then(|()| port.flush())
            .map_err(|source| TransportError::WriteFailed {
                frame: *frame,
                source,
            })?;
        debug!("{}: wrote {frame:?}", self.name);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Flush and release the handle. Later writes fail with
    /// [`TransportError::Closed`]; closing twice is a no-op.
    pub fn close(&self) -> Result<(), TransportError> {
        let Some(mut port) = self.lock().take() else {
            return Ok(());
        };
        info!("closing serial transport {}", self.name);
        port.flush().map_err(TransportError::Close)
    }
}

impl<W: Write + Send> Drop for SerialTransport<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("{}: flush on close failed: {e}", self.name);
        }
    }
}
