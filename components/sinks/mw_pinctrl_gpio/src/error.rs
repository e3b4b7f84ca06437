use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpioError {
    /// The register window could not be opened or mapped. Fatal for the
    /// driver: nothing else can work without it.
    #[error("cannot map pin-control registers from {path} at {base:#010x}: {source}")]
    Map {
        path: PathBuf,
        base: u64,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MaskError {
    #[error("empty pin mask")]
    Empty,
    #[error("invalid pin mask {0:?}, expected decimal, 0x hex or 0b binary")]
    Invalid(String),
    #[error("pin mask {0:#x} does not fit the 8-pin bank")]
    TooWide(u32),
}
