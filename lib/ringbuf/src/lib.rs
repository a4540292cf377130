// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ring buffer for instrumenting boot-stage drivers
//!
//! A boot stage has no console worth trusting while the SoC is half brought
//! up, so drivers record what they did into a small fixed-size ring instead.
//! The ring can be dumped from a debugger, or inspected directly by tests.
//!
//! Unlike a `static` ring, a [`Ringbuf`] here is a plain value that lives
//! inside the driver that owns it. Two instances of a driver therefore never
//! share a trace, and nothing needs to be borrowed through a global cell.
//!
//! ## Constraints
//!
//! The payload type must implement both `Copy` and `PartialEq`. When an entry
//! is recorded with the same `line` and `payload` as the most recent entry,
//! the count of that entry is bumped instead of consuming a new slot.
//!
//! ## Recording entries
//!
//! ```
//! use ringbuf::{ringbuf_entry, Ringbuf};
//!
//! #[derive(Copy, Clone, PartialEq)]
//! enum Trace {
//!     None,
//!     Status(u32),
//! }
//!
//! let mut trace: Ringbuf<Trace, 8> = Ringbuf::new(Trace::None);
//! ringbuf_entry!(trace, Trace::Status(0x1));
//! ```

#![cfg_attr(not(test), no_std)]

/// Inserts `payload` into the ring buffer `buf`, tagged with the current
/// source line.
///
/// `buf` is any place expression that evaluates to a [`Ringbuf`], typically
/// a field such as `self.trace`.
#[cfg(not(feature = "disabled"))]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        // Evaluate the payload first so it may freely borrow whatever the
        // ring buffer is a field of.
        let p = $payload;
        $crate::Ringbuf::entry(&mut $buf, line!() as u16, p);
    }};
}

#[cfg(feature = "disabled")]
#[macro_export]
macro_rules! ringbuf_entry {
    ($buf:expr, $payload:expr) => {{
        let _ = &$buf;
        let _ = &$payload;
    }};
}

/// A single [`Ringbuf`] entry, carrying a payload of arbitrary type.
#[derive(Debug, Copy, Clone)]
pub struct RingbufEntry<T: Copy + PartialEq> {
    pub line: u16,
    pub generation: u16,
    pub count: u32,
    pub payload: T,
}

/// A ring buffer of parametrized type and size.
#[derive(Debug)]
pub struct Ringbuf<T: Copy + PartialEq, const N: usize> {
    pub last: Option<usize>,
    pub buffer: [RingbufEntry<T>; N],
}

impl<T: Copy + PartialEq, const N: usize> Ringbuf<T, { N }> {
    /// Creates an empty ring with every slot holding `init`.
    pub const fn new(init: T) -> Self {
        Self {
            last: None,
            buffer: [RingbufEntry {
                line: 0,
                generation: 0,
                count: 0,
                payload: init,
            }; N],
        }
    }

    pub fn entry(&mut self, line: u16, payload: T) {
        // A fresh ring has no last entry; treating that as an out-of-range
        // index means the first insertion lands in slot 0 and never bumps
        // the count of a placeholder.
        let last = self.last.unwrap_or(usize::MAX);

        if let Some(ent) = self.buffer.get_mut(last) {
            if ent.line == line && ent.payload == payload {
                if let Some(new_count) = ent.count.checked_add(1) {
                    ent.count = new_count;
                    return;
                }
            }
        }

        // usize::MAX wraps to 0 here, which is also where we start.
        let ndx = {
            let last_plus_1 = last.wrapping_add(1);
            if last_plus_1 >= self.buffer.len() {
                0
            } else {
                last_plus_1
            }
        };

        let Some(ent) = self.buffer.get_mut(ndx) else {
            // Zero-sized ring.
            return;
        };
        *ent = RingbufEntry {
            line,
            payload,
            count: 1,
            generation: ent.generation.wrapping_add(1),
        };

        self.last = Some(ndx);
    }

    /// Returns the most recently recorded entry, if any.
    pub fn latest(&self) -> Option<&RingbufEntry<T>> {
        self.last.and_then(|ndx| self.buffer.get(ndx))
    }

    /// Iterates over recorded entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &RingbufEntry<T>> {
        let start = match self.last {
            Some(last) => last + 1,
            None => N,
        };
        self.buffer[start.min(N)..]
            .iter()
            .chain(self.buffer[..start.min(N)].iter())
            .filter(|ent| ent.count != 0)
    }
}
