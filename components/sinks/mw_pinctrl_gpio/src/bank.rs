//! Driver for one 8-pin GPIO bank.
//!
//! Every method takes or returns a mask where bit *i* is pin *i*. The bank
//! keeps no copy of any register; reads go to the hardware and writes go
//! straight through.
//!
//! The SET/CLR/TOG aliases are atomic for one bus write only. Anything that
//! takes more than one access (the drive clear-then-set pair, the DOUT
//! read-modify-write) runs under the bank lock, as does every single access,
//! so two threads never interleave their sequences.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::error::MaskError;
use crate::registers::{
    BANK_PINS, DIN0, DOE0, DOUT0, DRIVE_4MA, DRIVE_8MA, DRIVE_12MA, DRIVE0, MUX_GPIO, MUXSEL0,
    PULL0,
};
use crate::window::RegisterWindow;

const MUXSEL_SET: usize = MUXSEL0.set();
const DRIVE_SET: usize = DRIVE0.set();
const DRIVE_CLR: usize = DRIVE0.clr();
const DOUT_SET: usize = DOUT0.set();
const DOUT_CLR: usize = DOUT0.clr();
const DOUT_TOG: usize = DOUT0.tog();
const DOE_SET: usize = DOE0.set();

/// DOUT bits that belong to other banks and must survive a full-word write.
pub const OUTPUT_PRESERVED: u32 = !DOUT0.bank_mask();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveStrength {
    Ma4,
    Ma8,
    Ma12,
    Reserved,
}

impl DriveStrength {
    fn from_code(code: u32) -> Self {
        match code {
            DRIVE_4MA => Self::Ma4,
            DRIVE_8MA => Self::Ma8,
            DRIVE_12MA => Self::Ma12,
            _ => Self::Reserved,
        }
    }
}

/// Two-bit drive codes for the whole bank. A pin listed in both masks gets
/// 8 mA.
pub fn drive_codes(drive8ma: u8, drive12ma: u8) -> u32 {
    (0..BANK_PINS).fold(0, |acc, pin| {
        let bit = 1u8 << pin;
        let code = if drive8ma & bit != 0 {
            DRIVE_8MA
        } else if drive12ma & bit != 0 {
            DRIVE_12MA
        } else {
            DRIVE_4MA
        };
        acc | (code << (pin * DRIVE0.bits_per_pin))
    })
}

/// Parse a pin mask written as decimal, `0x` hex or `0b` binary.
pub fn parse_mask(text: &str) -> Result<u8, MaskError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(MaskError::Empty);
    }
    let parsed = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        u32::from_str_radix(bin, 2)
    } else {
        text.parse::<u32>()
    };
    let value = parsed.map_err(|_| MaskError::Invalid(text.to_string()))?;
    u8::try_from(value).map_err(|_| MaskError::TooWide(value))
}

pub struct GpioBank<W: RegisterWindow> {
    window: Mutex<W>,
}

impl<W: RegisterWindow> GpioBank<W> {
    /// Take ownership of the register window and switch all eight pins to
    /// the GPIO function. No other operation is reachable before this.
    pub fn new(mut window: W) -> Self {
        let mux = (0..BANK_PINS).fold(0, |acc, pin| acc | (MUX_GPIO << (pin * MUXSEL0.bits_per_pin)));
        window.write(MUXSEL_SET, mux);
        debug!("{}: bank 0 pins switched to GPIO ({mux:#06x})", MUXSEL0.name);
        Self {
            window: Mutex::new(window),
        }
    }

    // A panic while holding the lock leaves no torn software state behind:
    // the hardware is the only state.
    fn regs(&self) -> MutexGuard<'_, W> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the pins in `mask` outputs. Other pins keep their direction.
    pub fn set_direction(&self, mask: u8) {
        self.regs().write(DOE_SET, u32::from(mask));
    }

    /// Live output-enable mask.
    pub fn direction(&self) -> u8 {
        (self.regs().read(DOE0.offset) & DOE0.bank_mask()) as u8
    }

    /// Assign the whole pull-up register: exactly the pins in `mask` get a
    /// pull-up.
    pub fn set_pullup(&self, mask: u8) {
        self.regs().write(PULL0.offset, u32::from(mask));
    }

    /// Reset every pin to 4 mA, then raise the pins in `drive8ma` to 8 mA and
    /// those in `drive12ma` to 12 mA. 8 mA wins when a pin is in both.
    pub fn set_drive(&self, drive8ma: u8, drive12ma: u8) {
        let codes = drive_codes(drive8ma, drive12ma);
        let mut regs = self.regs();
        regs.write(DRIVE_CLR, DRIVE0.bank_mask());
        regs.write(DRIVE_SET, codes);
    }

    /// Live per-pin drive strength, pin 0 first.
    pub fn drive_strengths(&self) -> [DriveStrength; BANK_PINS as usize] {
        let word = self.regs().read(DRIVE0.offset);
        core::array::from_fn(|pin| {
            DriveStrength::from_code((word >> (pin as u32 * DRIVE0.bits_per_pin)) & 0b11)
        })
    }

    pub fn read_input(&self) -> u8 {
        (self.regs().read(DIN0.offset) & DIN0.bank_mask()) as u8
    }

    /// Live output latch for this bank.
    pub fn output(&self) -> u8 {
        (self.regs().read(DOUT0.offset) & DOUT0.bank_mask()) as u8
    }

    /// Set the bank's eight output bits to exactly `mask`, leaving the
    /// [`OUTPUT_PRESERVED`] bits of the shared DOUT word untouched.
    pub fn write_output(&self, mask: u8) {
        let mut regs = self.regs();
        let preserved = regs.read(DOUT0.offset) & OUTPUT_PRESERVED;
        regs.write(DOUT0.offset, preserved | u32::from(mask));
    }

    pub fn set_output(&self, mask: u8) {
        self.regs().write(DOUT_SET, u32::from(mask));
    }

    pub fn clear_output(&self, mask: u8) {
        self.regs().write(DOUT_CLR, u32::from(mask));
    }

    pub fn toggle_output(&self, mask: u8) {
        self.regs().write(DOUT_TOG, u32::from(mask));
    }

    /// Give the window back, e.g. to inspect a simulated one.
    pub fn into_inner(self) -> W {
        self.window.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Release the register window. Pin states persist in hardware.
    pub fn close(self) {
        drop(self.into_inner());
        debug!("GPIO bank released");
    }
}

#[cfg(target_os = "linux")]
impl GpioBank<mw_linux_resources::PhysMemWindow> {
    /// Map the pin-control block from `mem_device`, normally
    /// [`mw_linux_resources::DEV_MEM`].
    pub fn open(mem_device: &std::path::Path) -> Result<Self, crate::GpioError> {
        use crate::registers::{PINCTRL_BASE, WINDOW_LEN};

        let window = mw_linux_resources::PhysMemWindow::open(mem_device, PINCTRL_BASE, WINDOW_LEN)
            .map_err(|source| crate::GpioError::Map {
                path: mem_device.to_path_buf(),
                base: PINCTRL_BASE,
                source,
            })?;
        Ok(Self::new(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::SimulatedWindow;
    use std::sync::Arc;
    use std::thread;

    fn bank() -> GpioBank<SimulatedWindow> {
        GpioBank::new(SimulatedWindow::new())
    }

    fn bank_with(setup: impl FnOnce(&mut SimulatedWindow)) -> GpioBank<SimulatedWindow> {
        let mut window = SimulatedWindow::new();
        setup(&mut window);
        GpioBank::new(window)
    }

    #[test]
    fn construction_muxes_all_pins_to_gpio_first() {
        let window = bank_with(|w| w.preload(MUXSEL0.offset, 0xA5A5_0000)).into_inner();
        assert_eq!(window.writes()[0], (MUXSEL0.set(), 0xFFFF));
        // other banks' mux bits are left alone
        assert_eq!(window.word(MUXSEL0.offset), 0xA5A5_FFFF);
    }

    #[test]
    fn drive_8ma_wins_over_12ma() {
        let bank = bank();
        bank.set_drive(1 << 2, 1 << 2);
        let strengths = bank.drive_strengths();
        assert_eq!(strengths[2], DriveStrength::Ma8);
        assert_eq!(strengths[0], DriveStrength::Ma4);
        assert_eq!(bank.into_inner().word(DRIVE0.offset), 0b01 << 4);
    }

    #[test]
    fn set_drive_resets_previous_codes() {
        let bank = bank();
        bank.set_drive(0, 0xFF);
        assert!(bank.drive_strengths().iter().all(|s| *s == DriveStrength::Ma12));
        bank.set_drive(0b0000_0001, 0b1000_0000);
        let strengths = bank.drive_strengths();
        assert_eq!(strengths[0], DriveStrength::Ma8);
        assert_eq!(strengths[7], DriveStrength::Ma12);
        assert!(strengths[1..7].iter().all(|s| *s == DriveStrength::Ma4));
    }

    #[test]
    fn drive_sequence_is_clear_then_set() {
        let bank = bank();
        bank.set_drive(0b11, 0b1100);
        let window = bank.into_inner();
        assert_eq!(
            &window.writes()[1..],
            &[(DRIVE0.clr(), 0xFFFF), (DRIVE0.set(), 0b1010_0101)]
        );
    }

    #[test]
    fn write_output_keeps_foreign_bits() {
        let bank = bank_with(|w| w.preload(DOUT0.offset, 0xABCD_EF00 | 0x55));
        bank.write_output(0x0F);
        assert_eq!(bank.output(), 0x0F);
        assert_eq!(bank.into_inner().word(DOUT0.offset), 0xABCD_EF0F);
    }

    #[test]
    fn set_clear_toggle_are_single_alias_writes() {
        let bank = bank();
        bank.set_output(0b1100);
        bank.clear_output(0b0100);
        bank.toggle_output(0b0011);
        assert_eq!(bank.output(), 0b1011);
        let window = bank.into_inner();
        assert_eq!(
            &window.writes()[1..],
            &[(DOUT0.set(), 0b1100), (DOUT0.clr(), 0b0100), (DOUT0.tog(), 0b0011)]
        );
    }

    #[test]
    fn direction_only_adds_outputs() {
        let bank = bank();
        bank.set_direction(0b0001);
        bank.set_direction(0b1000);
        assert_eq!(bank.direction(), 0b1001);
    }

    #[test]
    fn pullup_is_whole_register_assignment() {
        let bank = bank_with(|w| w.preload(PULL0.offset, 0xFFFF_FFFF));
        bank.set_pullup(0b0101);
        assert_eq!(bank.into_inner().word(PULL0.offset), 0b0101);
    }

    #[test]
    fn input_is_reread_every_time() {
        let bank = bank_with(|w| w.preload(DIN0.offset, 0xFFFF_FF3C));
        assert_eq!(bank.read_input(), 0x3C);
        let mut window = bank.into_inner();
        window.preload(DIN0.offset, 0x01);
        let bank = GpioBank::new(window);
        assert_eq!(bank.read_input(), 0x01);
    }

    #[test]
    fn concurrent_drive_updates_never_mix() {
        let bank = Arc::new(bank());
        let handles: Vec<_> = (0..8u8)
            .map(|pin| {
                let bank = Arc::clone(&bank);
                thread::spawn(move || {
                    for _ in 0..200 {
                        bank.set_drive(1 << pin, !(1 << pin));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let word = Arc::into_inner(bank).unwrap().into_inner().word(DRIVE0.offset);
        let winners: Vec<u8> = (0..8u8)
            .filter(|pin| word == drive_codes(1 << pin, !(1 << pin)))
            .collect();
        assert_eq!(winners.len(), 1, "drive word {word:#06x} is a mix of updates");
    }

    #[test]
    fn mask_parsing() {
        assert_eq!(parse_mask("15"), Ok(15));
        assert_eq!(parse_mask("0x0F"), Ok(0x0F));
        assert_eq!(parse_mask(" 0b1010 "), Ok(0b1010));
        assert_eq!(parse_mask(""), Err(MaskError::Empty));
        assert_eq!(parse_mask("0x100"), Err(MaskError::TooWide(0x100)));
        assert!(matches!(parse_mask("pin3"), Err(MaskError::Invalid(_))));
    }
}
