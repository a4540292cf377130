// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pin configuration through the Tangier FLIS pad controller.
//!
//! Pads are grouped into families, each with its own 1 KiB bank of BUFCFG
//! registers. Some families can be read but not written from the CPU; those
//! are updated by asking the SCU to perform an indirect write to the BUFCFG
//! register's physical address.

#![cfg_attr(not(test), no_std)]

use drv_tangier_scu_ipc_api::{ScuIpc, ScuIpcError};
use drv_tangier_sys::RegisterWindow;
use ringbuf::{ringbuf_entry, Ringbuf};

/// Physical base of the FLIS block.
pub const FLIS_BASE: u64 = 0xff0c_0000;
/// Size of the FLIS block.
pub const FLIS_LENGTH: usize = 0x8000;

const FAMILY_LEN: usize = 0x400;
const BUFCFG_OFFSET: usize = 0x100;

pub const BUFCFG_PINMODE_SHIFT: u32 = 0;
pub const BUFCFG_PINMODE_MASK: u32 = 0b111 << BUFCFG_PINMODE_SHIFT;

pub const I2C6_SCL: u32 = 111;
pub const I2C6_SDA: u32 = 112;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Protection {
    None,
    /// BUFCFG is readable but only the SCU may write it.
    Write,
    /// BUFCFG can be neither read nor written from the CPU.
    Full,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Family {
    pub bar: u32,
    pub pin_base: u32,
    pub npins: u32,
    pub protection: Protection,
}

const fn family(
    bar: u32,
    first: u32,
    last: u32,
    protection: Protection,
) -> Family {
    Family {
        bar,
        pin_base: first,
        npins: last - first + 1,
        protection,
    }
}

pub static FAMILIES: [Family; 15] = [
    family(1, 0, 12, Protection::None),
    family(2, 13, 36, Protection::None),
    family(3, 37, 56, Protection::None),
    family(4, 57, 64, Protection::None),
    family(5, 65, 78, Protection::None),
    family(6, 79, 100, Protection::None),
    family(7, 101, 114, Protection::Write),
    family(8, 115, 126, Protection::None),
    family(9, 127, 145, Protection::None),
    family(10, 146, 157, Protection::None),
    family(11, 158, 179, Protection::None),
    family(12, 180, 194, Protection::Full),
    family(13, 195, 214, Protection::None),
    family(14, 215, 227, Protection::None),
    family(15, 228, 232, Protection::None),
];

impl Family {
    pub fn contains(&self, pin: u32) -> bool {
        pin >= self.pin_base && pin - self.pin_base < self.npins
    }

    /// Offset of `pin`'s BUFCFG register within the FLIS block.
    fn bufcfg_offset(&self, pin: u32) -> usize {
        self.bar as usize * FAMILY_LEN
            + BUFCFG_OFFSET
            + (pin - self.pin_base) as usize * 4
    }
}

pub fn family_of(pin: u32) -> Option<&'static Family> {
    FAMILIES.iter().find(|f| f.contains(pin))
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PinmuxError {
    UnknownPin(u32),
    /// The pin's BUFCFG cannot be read, so it cannot be updated in place.
    ReadProtected(u32),
    Ipc { pin: u32, err: ScuIpcError },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Direct { pin: u32, value: u32 },
    ViaScu { pin: u32, value: u32 },
    Failed(PinmuxError),
}

pub struct Pinmux<S, W> {
    scu: S,
    flis: W,
    flis_base: u64,
    trace: Ringbuf<Trace, 8>,
}

impl<S: ScuIpc, W: RegisterWindow> Pinmux<S, W> {
    /// `flis` must be a window onto the whole FLIS block, which sits at
    /// physical address `flis_base` (normally [`FLIS_BASE`]). The SCU is
    /// handed addresses relative to `flis_base`.
    pub fn new(scu: S, flis: W, flis_base: u64) -> Self {
        Self {
            scu,
            flis,
            flis_base,
            trace: Ringbuf::new(Trace::None),
        }
    }

    /// Replaces the bits of `pin`'s BUFCFG selected by `mask` with `bits`.
    pub fn update_pin(
        &mut self,
        pin: u32,
        bits: u32,
        mask: u32,
    ) -> Result<u32, PinmuxError> {
        let r = self.do_update(pin, bits, mask);
        if let Err(e) = r {
            ringbuf_entry!(self.trace, Trace::Failed(e));
        }
        r
    }

    fn do_update(
        &mut self,
        pin: u32,
        bits: u32,
        mask: u32,
    ) -> Result<u32, PinmuxError> {
        let family = family_of(pin).ok_or(PinmuxError::UnknownPin(pin))?;
        if family.protection == Protection::Full {
            return Err(PinmuxError::ReadProtected(pin));
        }

        let offset = family.bufcfg_offset(pin);
        let current = self.flis.read32(offset);

        if family.protection == Protection::Write {
            let phys = self.flis_base + offset as u64;
            let value = self
                .scu
                .indirect_write(phys, current, bits, mask)
                .map_err(|err| PinmuxError::Ipc { pin, err })?;
            ringbuf_entry!(self.trace, Trace::ViaScu { pin, value });
            Ok(value)
        } else {
            let value = (current & !mask) | (bits & mask);
            self.flis.write32(offset, value);
            ringbuf_entry!(self.trace, Trace::Direct { pin, value });
            Ok(value)
        }
    }

    /// Puts both I2C6 pads into their I2C function.
    ///
    /// Both pads are attempted even if the first fails; the first error is
    /// what gets reported.
    pub fn i2c6_setup(&mut self) -> Result<(), PinmuxError> {
        let bits = 1 << BUFCFG_PINMODE_SHIFT;
        let scl = self.update_pin(I2C6_SCL, bits, BUFCFG_PINMODE_MASK);
        let sda = self.update_pin(I2C6_SDA, bits, BUFCFG_PINMODE_MASK);
        scl.and(sda).map(|_| ())
    }

    pub fn into_inner(self) -> (S, W) {
        (self.scu, self.flis)
    }
}
