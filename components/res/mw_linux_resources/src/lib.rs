//! Host resources shared by the relay and the pin-control driver.
//!
//! Each resource is opened once, owned by exactly one object, and released
//! when that object is dropped.

pub mod serial;

/// Physical memory device mapped by [`PhysMemWindow`].
pub const DEV_MEM: &str = "/dev/mem";

#[cfg(target_os = "linux")]
pub mod physmem;

#[cfg(target_os = "linux")]
pub use physmem::PhysMemWindow;
pub use serial::{LinuxSerialPort, SerialConfig};
