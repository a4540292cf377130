// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{Delay, RegisterWindow};

/// Polls the register at `offset` until every bit in `mask` reads as clear.
///
/// The register is read at most `retries` times, with a 1us delay after each
/// read that still shows a bit of `mask` set. On success returns the status
/// word that showed the bits clear; on exhaustion returns the last word read
/// (or 0 if `retries` is 0).
///
/// The bound is a count of reads, not a duration: how long this actually
/// spins depends on how accurate `delay` is.
pub fn wait_while_set<W, D>(
    window: &W,
    offset: usize,
    mask: u32,
    retries: u32,
    delay: &D,
) -> Result<u32, u32>
where
    W: RegisterWindow + ?Sized,
    D: Delay + ?Sized,
{
    let mut status = 0;
    for _ in 0..retries {
        status = window.read32(offset);
        if status & mask == 0 {
            return Ok(status);
        }
        delay.delay_us(1);
    }
    Err(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct Scripted<'a> {
        script: &'a [u32],
        reads: Cell<usize>,
    }

    impl RegisterWindow for Scripted<'_> {
        fn read32(&self, offset: usize) -> u32 {
            assert_eq!(offset, 0x4);
            let n = self.reads.get();
            self.reads.set(n + 1);
            let last = self.script.len() - 1;
            self.script[n.min(last)]
        }

        fn write32(&self, _offset: usize, _value: u32) {
            panic!("poller must not write");
        }
    }

    #[derive(Default)]
    struct CountingDelay(Cell<u64>);

    impl Delay for CountingDelay {
        fn delay_us(&self, us: u32) {
            self.0.set(self.0.get() + u64::from(us));
        }
    }

    #[test]
    fn returns_first_clear_status() {
        let w = Scripted {
            script: &[0x1, 0x1, 0x1, 0x2],
            reads: Cell::new(0),
        };
        let d = CountingDelay::default();
        assert_eq!(wait_while_set(&w, 0x4, 0x1, 100, &d), Ok(0x2));
        assert_eq!(w.reads.get(), 4);
        assert_eq!(d.0.get(), 3);
    }

    #[test]
    fn gives_up_after_exactly_retries_reads() {
        let w = Scripted {
            script: &[0x101],
            reads: Cell::new(0),
        };
        let d = CountingDelay::default();
        assert_eq!(wait_while_set(&w, 0x4, 0x1, 25, &d), Err(0x101));
        assert_eq!(w.reads.get(), 25);
        assert_eq!(d.0.get(), 25);
    }

    #[test]
    fn zero_retries_never_reads() {
        let w = Scripted {
            script: &[0x0],
            reads: Cell::new(0),
        };
        let d = CountingDelay::default();
        assert_eq!(wait_while_set(&w, 0x4, 0x1, 0, &d), Err(0));
        assert_eq!(w.reads.get(), 0);
    }
}
