//! Serial line to the servo controller.
//!
//! The line settings are fixed at open: 8 data bits, no parity, one stop
//! bit, no flow control. Only the device path, baud rate and I/O timeout are
//! configurable, and none of them can change while the port is open.

use std::io::{self, Write};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};

pub const DEFAULT_DEVICE: &str = "/dev/ttyACM0";
pub const DEFAULT_BAUD: u32 = 9600;
pub const DEFAULT_TIMEOUT_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub device: String,
    pub baud: u32,
    /// Bound on every blocking read or write, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            baud: DEFAULT_BAUD,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// An open 8-N-1 serial port.
pub struct LinuxSerialPort {
    device: String,
    port: Box<dyn SerialPort>,
}

impl LinuxSerialPort {
    /// Open `device` and flush whatever the kernel buffered before us.
    pub fn open(device: &str, baud: u32, timeout_ms: u64) -> io::Result<Self> {
        let port = serialport::new(device, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(Duration::from_millis(timeout_ms))
            .open()?;
        port.clear(ClearBuffer::All)?;
        debug!("opened serial port {device} at {baud} baud, timeout {timeout_ms} ms");
        Ok(Self {
            device: device.to_string(),
            port,
        })
    }

    pub fn open_with(config: &SerialConfig) -> io::Result<Self> {
        Self::open(&config.device, config.baud, config.timeout_ms)
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Rate the driver actually applied, which may differ from the one asked for.
    pub fn baud(&self) -> io::Result<u32> {
        Ok(self.port.baud_rate()?)
    }
}

impl Write for LinuxSerialPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }
}

impl Drop for LinuxSerialPort {
    fn drop(&mut self) {
        debug!("closing serial port {}", self.device);
    }
}
