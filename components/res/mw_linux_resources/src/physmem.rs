//! Window onto physical memory through `/dev/mem`.
//!
//! The file is opened with `O_SYNC` so the kernel maps the range uncached,
//! and every access goes through a volatile 32-bit load or store. There is no
//! copy of the contents anywhere: the device registers are the state.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::ptr;

use log::debug;
use memmap2::{MmapMut, MmapOptions};

pub struct PhysMemWindow {
    map: MmapMut,
    phys_base: u64,
}

impl PhysMemWindow {
    /// Map `len` bytes of `path` starting at `phys_base`.
    pub fn open(path: &Path, phys_base: u64, len: usize) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)?;
        // SAFETY: the mapping is private to this object and only accessed
        // through the bounds-checked volatile accessors below.
        let map = unsafe { MmapOptions::new().offset(phys_base).len(len).map_mut(&file)? };
        debug!(
            "mapped {len:#x} bytes of {} at {phys_base:#010x}",
            path.display()
        );
        Ok(Self { map, phys_base })
    }

    fn check(&self, offset: usize) {
        assert!(
            offset % 4 == 0 && offset + 4 <= self.map.len(),
            "register offset {offset:#x} outside the {:#x}-byte window or misaligned",
            self.map.len()
        );
    }

    pub fn read_u32(&self, offset: usize) -> u32 {
        self.check(offset);
        // SAFETY: `check` keeps the access aligned and inside the mapping.
        unsafe { ptr::read_volatile(self.map.as_ptr().add(offset).cast::<u32>()) }
    }

    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.check(offset);
        // SAFETY: `check` keeps the access aligned and inside the mapping.
        unsafe { ptr::write_volatile(self.map.as_mut_ptr().add(offset).cast::<u32>(), value) }
    }

    /// Unmap now rather than at end of scope.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for PhysMemWindow {
    fn drop(&mut self) {
        debug!("unmapping physical window at {:#010x}", self.phys_base);
    }
}
