// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A scriptable stand-in for the SCU register block.
//!
//! Status reads walk through a script, repeating its final entry forever, so
//! `[BUSY]` models an SCU that never answers. Every write is logged, and the
//! read buffer can be preset before the command goes out.

extern crate std;

use core::cell::{Cell, RefCell};
use std::vec::Vec;

use drv_tangier_sys::{Delay, RegisterWindow};

use crate::regs;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Write {
    pub offset: usize,
    pub value: u32,
}

pub struct FakeScu {
    regs: RefCell<[u32; regs::WINDOW_SIZE / 4]>,
    script: Vec<u32>,
    status_reads: Cell<usize>,
    read_buffer_reads: Cell<usize>,
    writes: RefCell<Vec<Write>>,
}

impl FakeScu {
    /// `script` must not be empty.
    pub fn new(script: &[u32]) -> Self {
        assert!(!script.is_empty());
        Self {
            regs: RefCell::new([0; regs::WINDOW_SIZE / 4]),
            script: script.to_vec(),
            status_reads: Cell::new(0),
            read_buffer_reads: Cell::new(0),
            writes: RefCell::new(Vec::new()),
        }
    }

    pub fn preset_read_buffer(&self, words: &[u32]) {
        let mut regs = self.regs.borrow_mut();
        for (i, w) in words.iter().enumerate() {
            regs[regs::IPC_READ_BUFFER / 4 + i] = *w;
        }
    }

    pub fn status_reads(&self) -> usize {
        self.status_reads.get()
    }

    pub fn read_buffer_reads(&self) -> usize {
        self.read_buffer_reads.get()
    }

    pub fn writes(&self) -> Vec<Write> {
        self.writes.borrow().clone()
    }

    /// Values written to the doorbell, in order.
    pub fn doorbells(&self) -> Vec<u32> {
        self.writes_to(|off| off == regs::IPC_CMD)
    }

    /// Values written to the write buffer, in order.
    pub fn write_buffer_writes(&self) -> Vec<u32> {
        self.writes_to(|off| {
            (regs::IPC_WRITE_BUFFER..regs::IPC_READ_BUFFER).contains(&off)
        })
    }

    fn writes_to(&self, f: impl Fn(usize) -> bool) -> Vec<u32> {
        self.writes
            .borrow()
            .iter()
            .filter(|w| f(w.offset))
            .map(|w| w.value)
            .collect()
    }
}

impl RegisterWindow for FakeScu {
    fn read32(&self, offset: usize) -> u32 {
        assert_eq!(offset % 4, 0);
        if offset == regs::IPC_STATUS {
            let n = self.status_reads.get();
            self.status_reads.set(n + 1);
            return self.script[n.min(self.script.len() - 1)];
        }
        if (regs::IPC_READ_BUFFER..regs::IPC_READ_BUFFER + 16)
            .contains(&offset)
        {
            self.read_buffer_reads.set(self.read_buffer_reads.get() + 1);
        }
        self.regs.borrow()[offset / 4]
    }

    fn write32(&self, offset: usize, value: u32) {
        assert_eq!(offset % 4, 0);
        self.writes.borrow_mut().push(Write { offset, value });
        self.regs.borrow_mut()[offset / 4] = value;
    }
}

/// Delay that only counts how long it was asked to wait.
#[derive(Default)]
pub struct FakeDelay {
    total: Cell<u64>,
}

impl FakeDelay {
    pub fn total_us(&self) -> u64 {
        self.total.get()
    }
}

impl Delay for FakeDelay {
    fn delay_us(&self, us: u32) {
        self.total.set(self.total.get() + u64::from(us));
    }
}
