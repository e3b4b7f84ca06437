//! Direct-register GPIO for bank 0 of the i.MX23 pin-control block
//! (`GPMI_D00`..`GPMI_D07`, connector P200 on the Chumby boards).
//!
//! Bring-up order on the hardware:
//!
//! 1. MUXSEL: switch the pins to GPIO (done by [`GpioBank::new`]).
//! 2. DRIVE: pick 4/8/12 mA per pin ([`GpioBank::set_drive`]).
//! 3. PULL: enable pull-ups ([`GpioBank::set_pullup`]).
//! 4. DOUT: initial levels ([`GpioBank::write_output`]).
//! 5. DOE: make pins outputs ([`GpioBank::set_direction`]).
//!
//! After that, drive DOUT and sample DIN.
//!
//! The `mock` feature exposes [`SimulatedWindow`] for running the driver
//! without `/dev/mem`.

pub mod bank;
pub mod error;
pub mod registers;
pub mod window;

pub use bank::{DriveStrength, GpioBank, OUTPUT_PRESERVED, drive_codes, parse_mask};
pub use error::{GpioError, MaskError};
pub use window::RegisterWindow;

#[cfg(any(test, feature = "mock"))]
pub use window::SimulatedWindow;
