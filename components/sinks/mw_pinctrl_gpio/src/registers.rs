//! `HW_PINCTRL` register map for bank 0 (`GPMI_D00`..`GPMI_D07`).
//!
//! Offsets are relative to the start of the pin-control block. Aliased
//! registers have SET, CLR and TOG variants at `+0x4`, `+0x8` and `+0xC`
//! that apply OR, AND-NOT and XOR in a single bus write.
//!
//! | register | offset  | bits/pin | aliases used |
//! |----------|---------|----------|--------------|
//! | MUXSEL0  | `0x100` | 2        | yes          |
//! | DRIVE0   | `0x200` | 2        | yes          |
//! | PULL0    | `0x400` | 1        | no           |
//! | DOUT0    | `0x500` | 1        | yes          |
//! | DIN0     | `0x600` | 1        | no           |
//! | DOE0     | `0x700` | 1        | yes          |

/// Physical address of the pin-control block.
pub const PINCTRL_BASE: u64 = 0x8001_8000;

/// One page covers every register of the bank.
pub const WINDOW_LEN: usize = 0x1000;

pub const BANK_PINS: u32 = 8;

const SET: usize = 0x4;
const CLR: usize = 0x8;
const TOG: usize = 0xC;

/// Mux code selecting the GPIO function.
pub const MUX_GPIO: u32 = 0b11;

/// Drive strength codes; `0b00` is the 4 mA reset default, `0b11` reserved.
pub const DRIVE_4MA: u32 = 0b00;
pub const DRIVE_8MA: u32 = 0b01;
pub const DRIVE_12MA: u32 = 0b10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub name: &'static str,
    pub offset: usize,
    pub bits_per_pin: u32,
    pub aliased: bool,
}

impl Register {
    const fn new(name: &'static str, offset: usize, bits_per_pin: u32, aliased: bool) -> Self {
        Self {
            name,
            offset,
            bits_per_pin,
            aliased,
        }
    }

    pub const fn set(&self) -> usize {
        assert!(self.aliased, "register has no SET alias");
        self.offset + SET
    }

    pub const fn clr(&self) -> usize {
        assert!(self.aliased, "register has no CLR alias");
        self.offset + CLR
    }

    pub const fn tog(&self) -> usize {
        assert!(self.aliased, "register has no TOG alias");
        self.offset + TOG
    }

    /// Bits of the register word that belong to this bank's pins.
    pub const fn bank_mask(&self) -> u32 {
        let bits = BANK_PINS * self.bits_per_pin;
        if bits >= u32::BITS {
            u32::MAX
        } else {
            (1 << bits) - 1
        }
    }
}

pub const MUXSEL0: Register = Register::new("HW_PINCTRL_MUXSEL0", 0x100, 2, true);
pub const DRIVE0: Register = Register::new("HW_PINCTRL_DRIVE0", 0x200, 2, true);
pub const PULL0: Register = Register::new("HW_PINCTRL_PULL0", 0x400, 1, false);
pub const DOUT0: Register = Register::new("HW_PINCTRL_DOUT0", 0x500, 1, true);
pub const DIN0: Register = Register::new("HW_PINCTRL_DIN0", 0x600, 1, false);
pub const DOE0: Register = Register::new("HW_PINCTRL_DOE0", 0x700, 1, true);

pub const REGISTERS: [Register; 6] = [MUXSEL0, DRIVE0, PULL0, DOUT0, DIN0, DOE0];

/// Register that owns `offset`, either as base or as one of its aliases.
pub fn owner_of(offset: usize) -> Option<(Register, usize)> {
    REGISTERS.iter().find_map(|reg| {
        let delta = offset.checked_sub(reg.offset)?;
        match delta {
            0 => Some((*reg, 0)),
            SET | CLR | TOG if reg.aliased => Some((*reg, delta)),
            _ => None,
        }
    })
}

/// Alias kind for a delta returned by [`owner_of`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Base,
    Set,
    Clear,
    Toggle,
}

impl Access {
    pub fn from_delta(delta: usize) -> Option<Self> {
        match delta {
            0 => Some(Self::Base),
            SET => Some(Self::Set),
            CLR => Some(Self::Clear),
            TOG => Some(Self::Toggle),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_register_and_alias_fits_the_window() {
        for reg in REGISTERS {
            let last = if reg.aliased { reg.tog() } else { reg.offset };
            assert!(last + 4 <= WINDOW_LEN, "{} past window", reg.name);
            assert_eq!(reg.offset % 0x10, 0, "{} not on a 16-byte boundary", reg.name);
        }
    }

    #[test]
    fn bank_masks_follow_pin_width() {
        assert_eq!(MUXSEL0.bank_mask(), 0xFFFF);
        assert_eq!(DRIVE0.bank_mask(), 0xFFFF);
        assert_eq!(DOUT0.bank_mask(), 0xFF);
        assert_eq!(DIN0.bank_mask(), 0xFF);
    }

    #[test]
    fn alias_addresses() {
        assert_eq!(DOUT0.set(), 0x504);
        assert_eq!(DOUT0.clr(), 0x508);
        assert_eq!(DOUT0.tog(), 0x50C);
        assert_eq!(DOE0.set(), 0x704);
    }

    #[test]
    #[should_panic(expected = "no SET alias")]
    fn alias_less_register_refuses_alias() {
        let _ = PULL0.set();
    }

    #[test]
    fn owner_lookup_resolves_aliases_only_where_present() {
        assert_eq!(owner_of(0x508), Some((DOUT0, 0x8)));
        assert_eq!(owner_of(0x400), Some((PULL0, 0)));
        assert_eq!(owner_of(0x404), None);
        assert_eq!(owner_of(0x300), None);
        assert_eq!(Access::from_delta(0x8), Some(Access::Clear));
    }
}
