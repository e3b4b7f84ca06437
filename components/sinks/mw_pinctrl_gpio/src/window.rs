//! Access to the mapped register block.

#[cfg(any(test, feature = "mock"))]
use crate::registers::{self, Access};

/// 32-bit register access at byte offsets from the pin-control base.
///
/// Implementations must not cache: every `read` observes the device and every
/// `write` reaches it.
pub trait RegisterWindow: Send {
    fn read(&self, offset: usize) -> u32;
    fn write(&mut self, offset: usize, value: u32);
}

#[cfg(target_os = "linux")]
impl RegisterWindow for mw_linux_resources::PhysMemWindow {
    fn read(&self, offset: usize) -> u32 {
        self.read_u32(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.write_u32(offset, value)
    }
}

/// In-memory stand-in for the pin-control block.
///
/// Writes to a SET/CLR/TOG alias are applied to the base register the way the
/// silicon does. Every bus write is logged so callers can check how many
/// transactions an operation took.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Clone)]
pub struct SimulatedWindow {
    words: Vec<u32>,
    writes: Vec<(usize, u32)>,
}

#[cfg(any(test, feature = "mock"))]
impl Default for SimulatedWindow {
    fn default() -> Self {
        Self {
            words: vec![0; registers::WINDOW_LEN / 4],
            writes: Vec::new(),
        }
    }
}

#[cfg(any(test, feature = "mock"))]
impl SimulatedWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force a register value without logging a bus write, e.g. to model
    /// input levels or bits owned by other banks.
    pub fn preload(&mut self, offset: usize, value: u32) {
        self.words[offset / 4] = value;
    }

    pub fn word(&self, offset: usize) -> u32 {
        self.words[offset / 4]
    }

    pub fn writes(&self) -> &[(usize, u32)] {
        &self.writes
    }
}

#[cfg(any(test, feature = "mock"))]
impl RegisterWindow for SimulatedWindow {
    fn read(&self, offset: usize) -> u32 {
        self.word(offset)
    }

    fn write(&mut self, offset: usize, value: u32) {
        self.writes.push((offset, value));
        let Some((reg, delta)) = registers::owner_of(offset) else {
            self.words[offset / 4] = value;
            return;
        };
        let base = &mut self.words[reg.offset / 4];
        match Access::from_delta(delta) {
            Some(Access::Set) => *base |= value,
            Some(Access::Clear) => *base &= !value,
            Some(Access::Toggle) => *base ^= value,
            Some(Access::Base) | None => *base = value,
        }
    }
}
