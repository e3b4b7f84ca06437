use std::io::{self, Write};

use log::info;
use mw_maestro_lib::decode;

/// Stands in for the serial port when no controller is attached: every frame
/// is decoded and logged instead of sent.
#[derive(Debug, Default)]
pub struct DryRunPort;

impl Write for DryRunPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match decode(buf) {
            Ok(cmd) => info!("dry run: {cmd}"),
            Err(e) => info!("dry run: {buf:02X?} ({e})"),
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
