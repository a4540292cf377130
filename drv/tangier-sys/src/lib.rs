// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Low-level access to Tangier SoC register blocks.
//!
//! Every block the boot stage talks to (the SCU IPC mailbox, the PMU, the
//! FLIS pad controller) is a window of 32-bit registers. Drivers are written
//! against [`RegisterWindow`] so that tests can substitute a fake block, and
//! against [`Delay`]/[`Clock`] so that busy-waits never depend on wall-clock
//! time in a test.

#![cfg_attr(not(test), no_std)]

mod mmio;
mod poll;
mod tsc;

pub use mmio::{BindError, MmioWindow};
pub use poll::wait_while_set;
pub use tsc::TscDelay;

/// A block of 32-bit registers addressed by byte offset.
///
/// Offsets must be 4-byte aligned; the blocks on this SoC do not accept
/// narrower accesses.
pub trait RegisterWindow {
    fn read32(&self, offset: usize) -> u32;
    fn write32(&self, offset: usize, value: u32);
}

impl<W: RegisterWindow + ?Sized> RegisterWindow for &W {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

/// Busy-wait for a number of microseconds without yielding.
pub trait Delay {
    fn delay_us(&self, us: u32);
}

/// A free-running microsecond counter.
pub trait Clock {
    fn now_us(&self) -> u64;
}
