// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::RegisterWindow;

/// Reasons a register window could not be bound.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BindError {
    /// The device has no address, or the address cannot name a register.
    InvalidAddress,
    /// The requested region cannot be mapped.
    AllocationFailed,
}

/// A memory-mapped register window.
///
/// The boot stage runs identity-mapped, so binding is a matter of checking
/// that the physical range is representable and then using it directly.
#[derive(Debug)]
pub struct MmioWindow {
    base: usize,
    len: usize,
}

impl MmioWindow {
    /// Binds a window of `len` bytes at physical address `base`.
    ///
    /// `base` is `None` when the device description carries no address.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be device memory that is safe to access with
    /// 32-bit volatile loads and stores for as long as the window exists, and
    /// nothing else may be relying on the contents of that region behaving
    /// like normal memory.
    pub unsafe fn bind(
        base: Option<u64>,
        len: usize,
    ) -> Result<Self, BindError> {
        let base = base.ok_or(BindError::InvalidAddress)?;
        if base == 0 || base % 4 != 0 {
            return Err(BindError::InvalidAddress);
        }
        let base =
            usize::try_from(base).map_err(|_| BindError::AllocationFailed)?;
        if len < 4 || base.checked_add(len).is_none() {
            return Err(BindError::AllocationFailed);
        }
        Ok(Self { base, len })
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn reg(&self, offset: usize) -> *mut u32 {
        assert!(offset % 4 == 0 && offset + 4 <= self.len);
        (self.base + offset) as *mut u32
    }
}

impl RegisterWindow for MmioWindow {
    fn read32(&self, offset: usize) -> u32 {
        let reg = self.reg(offset);
        // Safety: `bind` established that the window is device memory and
        // `reg` checked that the access falls inside it.
        unsafe { core::ptr::read_volatile(reg) }
    }

    fn write32(&self, offset: usize, value: u32) {
        let reg = self.reg(offset);
        // Safety: as for `read32`.
        unsafe { core::ptr::write_volatile(reg, value) }
    }
}
