//! Command path from network clients to a Maestro servo controller.
//!
//! ```text
//! (channel, value) text ──► Dispatcher ──► encode ──► SerialTransport ──► tty
//!                            parse/validate           one mutex, whole frames
//! ```
//!
//! One [`Dispatcher`] owns the process's only [`SerialTransport`]. Share it
//! between connection threads with an `Arc`; there is no global handle.

pub mod dispatch;
pub mod error;
pub mod transport;

pub use dispatch::Dispatcher;
pub use error::{DispatchError, TransportError};
pub use transport::SerialTransport;
