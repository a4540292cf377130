// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{Clock, Delay};

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        fn ticks() -> u64 {
            // Safety: RDTSC has no preconditions on any x86_64 part.
            unsafe { core::arch::x86_64::_rdtsc() }
        }
    } else if #[cfg(target_arch = "x86")] {
        fn ticks() -> u64 {
            // Safety: every Tangier core implements RDTSC.
            unsafe { core::arch::x86::_rdtsc() }
        }
    } else {
        use core::sync::atomic::{AtomicU64, Ordering};

        // No time-stamp counter: advance a counter once per query so that
        // delays still terminate.
        static FAKE_TSC: AtomicU64 = AtomicU64::new(0);

        fn ticks() -> u64 {
            FAKE_TSC.fetch_add(1, Ordering::Relaxed)
        }
    }
}

/// Delay and clock source backed by the CPU time-stamp counter.
///
/// Tangier's TSC is invariant, so a fixed ticks-per-microsecond ratio taken
/// from the core frequency is good enough for the boot stage.
#[derive(Copy, Clone, Debug)]
pub struct TscDelay {
    ticks_per_us: u64,
}

impl TscDelay {
    pub const fn new(ticks_per_us: u64) -> Self {
        // A zero ratio would make every delay return immediately and the
        // clock divide by zero.
        let ticks_per_us = if ticks_per_us == 0 { 1 } else { ticks_per_us };
        Self { ticks_per_us }
    }
}

impl Delay for TscDelay {
    fn delay_us(&self, us: u32) {
        let start = ticks();
        let wait = u64::from(us) * self.ticks_per_us;
        while ticks().wrapping_sub(start) < wait {
            core::hint::spin_loop();
        }
    }
}

impl Clock for TscDelay {
    fn now_us(&self) -> u64 {
        ticks() / self.ticks_per_us
    }
}
