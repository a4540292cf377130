// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Driver for the Tangier SCU IPC mailbox.
//!
//! A command goes out in four steps: the pointer registers and up to 16
//! bytes of input are written into the mailbox, the doorbell word is written
//! to interrupt the SCU, the status register is polled until the busy bit
//! drops, and finally the read buffer is copied out. There is only ever one
//! command in flight and nothing here is interrupt-driven.

#![cfg_attr(not(test), no_std)]

use drv_tangier_scu_ipc_api::{
    IpcCommand, ScuIpc, ScuIpcError, MAX_INPUT_LEN, MAX_OUTPUT_WORDS,
    MAX_SUBCOMMAND,
};
use drv_tangier_sys::{wait_while_set, Delay, MmioWindow, RegisterWindow};
use ringbuf::{ringbuf_entry, Ringbuf};

#[cfg(any(test, feature = "fake"))]
pub mod fake;
pub mod regs;

use regs::Status;

/// Physical base of the mailbox on Edison.
pub const SCU_IPC_BASE: u64 = 0xff00_9000;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScuConfig {
    /// Number of status reads, 1us apart, before a command is declared
    /// timed out.
    pub retries: u32,
}

impl ScuConfig {
    pub const DEFAULT: Self = Self { retries: 3_000_000 };
}

impl Default for ScuConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Trace {
    None,
    Bound { base: usize },
    Doorbell(u32),
    BadArgument { cmd: u8, sub: u8, len: usize },
    Timeout { cmd: u8, status: u32 },
    CommandFailed { cmd: u8, status: u32 },
}

const TRACE_DEPTH: usize = 16;

/// Owned handle on one SCU mailbox.
pub struct ScuIpcTransport<W, D> {
    window: W,
    delay: D,
    config: ScuConfig,
    trace: Ringbuf<Trace, TRACE_DEPTH>,
}

impl<D: Delay> ScuIpcTransport<MmioWindow, D> {
    /// Binds the mailbox at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the physical address of the SCU IPC block, and no other
    /// transport may be bound to it for the lifetime of this one.
    pub unsafe fn bind(
        base: Option<u64>,
        delay: D,
        config: ScuConfig,
    ) -> Result<Self, ScuIpcError> {
        let window = MmioWindow::bind(base, regs::WINDOW_SIZE)?;
        let base = window.base();
        let mut scu = Self::new(window, delay, config);
        ringbuf_entry!(scu.trace, Trace::Bound { base });
        Ok(scu)
    }
}

impl<W: RegisterWindow, D: Delay> ScuIpcTransport<W, D> {
    /// Wraps an already-bound register window.
    pub fn new(window: W, delay: D, config: ScuConfig) -> Self {
        Self {
            window,
            delay,
            config,
            trace: Ringbuf::new(Trace::None),
        }
    }

    pub fn trace(&self) -> &Ringbuf<Trace, TRACE_DEPTH> {
        &self.trace
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    fn send_command(&mut self, word: u32) {
        ringbuf_entry!(self.trace, Trace::Doorbell(word));
        self.window.write32(regs::IPC_CMD, word);
    }

    fn check_status(&mut self, cmd: u8) -> Result<(), ScuIpcError> {
        let status = wait_while_set(
            &self.window,
            regs::IPC_STATUS,
            Status::BUSY.bits(),
            self.config.retries,
            &self.delay,
        );
        let status = match status {
            Ok(status) => status,
            Err(status) => {
                ringbuf_entry!(self.trace, Trace::Timeout { cmd, status });
                return Err(ScuIpcError::Timeout);
            }
        };
        if Status::from_bits_retain(status).contains(Status::ERROR) {
            ringbuf_entry!(self.trace, Trace::CommandFailed { cmd, status });
            return Err(ScuIpcError::IoError { status });
        }
        Ok(())
    }

    fn reject(&mut self, cmd: u8, sub: u8, len: usize) -> ScuIpcError {
        ringbuf_entry!(self.trace, Trace::BadArgument { cmd, sub, len });
        ScuIpcError::InvalidArgument
    }
}

/// The length field the firmware expects for `len` bytes of input to `cmd`.
///
/// The watchdog command has always counted its input in 32-bit words, and
/// the firmware still does; every other command counts bytes.
///
/// `len` must already be checked against [`MAX_INPUT_LEN`].
fn encoded_len(cmd: u8, len: usize) -> u8 {
    debug_assert!(len <= MAX_INPUT_LEN);
    let len = if cmd == u8::from(IpcCommand::WatchdogTimer) {
        len.div_ceil(4)
    } else {
        len
    };
    len as u8
}

impl<W: RegisterWindow, D: Delay> ScuIpc for ScuIpcTransport<W, D> {
    fn simple_command(&mut self, cmd: u8, sub: u8) -> Result<(), ScuIpcError> {
        if sub > MAX_SUBCOMMAND {
            return Err(self.reject(cmd, sub, 0));
        }
        self.send_command(regs::doorbell(cmd, sub, 0));
        self.check_status(cmd)
    }

    fn raw_command(
        &mut self,
        cmd: u8,
        sub: u8,
        input: &[u8],
        output: &mut [u32],
        dptr: u32,
        sptr: u32,
    ) -> Result<(), ScuIpcError> {
        if input.len() > MAX_INPUT_LEN
            || output.len() > MAX_OUTPUT_WORDS
            || sub > MAX_SUBCOMMAND
        {
            return Err(self.reject(cmd, sub, input.len()));
        }

        self.window.write32(regs::IPC_DPTR, dptr);
        self.window.write32(regs::IPC_SPTR, sptr);

        // A trailing partial word goes out zero-padded; the firmware uses the
        // length field to know how much of it is real.
        for (i, chunk) in input.chunks(4).enumerate() {
            let mut word = [0u8; 4];
            word[..chunk.len()].copy_from_slice(chunk);
            self.window.write32(
                regs::IPC_WRITE_BUFFER + 4 * i,
                u32::from_le_bytes(word),
            );
        }

        self.send_command(regs::doorbell(
            cmd,
            sub,
            encoded_len(cmd, input.len()),
        ));
        self.check_status(cmd)?;

        for (i, out) in output.iter_mut().enumerate() {
            *out = self.window.read32(regs::IPC_READ_BUFFER + 4 * i);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{FakeDelay, FakeScu, Write};
    use proptest::prelude::*;

    const BUSY: u32 = 0x1;
    const DONE: u32 = 0x0;
    const FAILED: u32 = 0x0000_f102;

    fn transport(
        fake: &FakeScu,
        retries: u32,
    ) -> ScuIpcTransport<&FakeScu, FakeDelay> {
        ScuIpcTransport::new(fake, FakeDelay::default(), ScuConfig { retries })
    }

    #[test]
    fn watchdog_length_counts_words() {
        assert_eq!(encoded_len(0xf8, 0), 0);
        assert_eq!(encoded_len(0xf8, 5), 2);
        assert_eq!(encoded_len(0xf8, MAX_INPUT_LEN), 4);
        assert_eq!(encoded_len(0xf4, 5), 5);
        assert_eq!(encoded_len(0x05, MAX_INPUT_LEN), 16);
    }

    #[test]
    fn cold_reset_rings_doorbell_only() {
        let fake = FakeScu::new(&[BUSY, BUSY, BUSY, DONE]);
        let mut scu = transport(&fake, 100);

        scu.simple_command(IpcCommand::ColdReset.into(), 0).unwrap();

        assert_eq!(
            fake.writes(),
            vec![Write { offset: regs::IPC_CMD, value: 0xf1 | regs::IPC_IOC }]
        );
        assert_eq!(fake.status_reads(), 4);
        assert_eq!(scu.delay.total_us(), 3);
    }

    #[test]
    fn never_clearing_busy_times_out_at_the_bound() {
        let fake = FakeScu::new(&[BUSY]);
        let mut scu = transport(&fake, 500);

        let err = scu.simple_command(IpcCommand::ColdReset.into(), 0);

        assert_eq!(err, Err(ScuIpcError::Timeout));
        assert_eq!(fake.status_reads(), 500);
        assert_eq!(
            scu.trace().latest().map(|e| e.payload),
            Some(Trace::Timeout { cmd: 0xf1, status: BUSY })
        );
    }

    #[test]
    fn error_bit_is_io_error_and_skips_read_back() {
        let fake = FakeScu::new(&[BUSY, FAILED]);
        fake.preset_read_buffer(&[0x1111_1111, 0x2222_2222]);
        let mut scu = transport(&fake, 100);

        let mut out = [0xdead_beef; 2];
        let err =
            scu.command(IpcCommand::GetFwRevision.into(), 1, &[], &mut out);

        assert_eq!(err, Err(ScuIpcError::IoError { status: FAILED }));
        assert_eq!(out, [0xdead_beef; 2]);
        assert_eq!(fake.read_buffer_reads(), 0);
        assert_eq!(
            scu.trace().latest().map(|e| e.payload),
            Some(Trace::CommandFailed { cmd: 0xf4, status: FAILED })
        );
    }

    #[test]
    fn firmware_revision_reads_back_four_words() {
        let fake = FakeScu::new(&[BUSY, DONE]);
        let words = [0x7856_3412, 0xf0de_bc9a, 0x0403_0201, 0x0807_0605];
        fake.preset_read_buffer(&words);
        let mut scu = transport(&fake, 100);

        let mut out = [0u32; 4];
        scu.command(IpcCommand::GetFwRevision.into(), 1, &[], &mut out)
            .unwrap();

        assert_eq!(out, words);
        assert_eq!(&out[0].to_le_bytes(), &[0x12, 0x34, 0x56, 0x78]);
        assert_eq!(fake.doorbells(), vec![0x0000_11f4]);
    }

    #[test]
    fn pointers_are_written_before_the_doorbell() {
        let fake = FakeScu::new(&[DONE]);
        let mut scu = transport(&fake, 10);

        scu.indirect_write(0xff0c_1d3c, 0x0000_3000, 0x1, 0b111).unwrap();

        assert_eq!(
            fake.writes(),
            vec![
                Write { offset: regs::IPC_DPTR, value: 0xff0c_1d3c },
                Write { offset: regs::IPC_SPTR, value: 0 },
                Write { offset: regs::IPC_WRITE_BUFFER, value: 0x0000_3001 },
                Write { offset: regs::IPC_CMD, value: 0x0004_0105 },
            ]
        );
    }

    #[test]
    fn watchdog_length_is_in_words() {
        let fake = FakeScu::new(&[DONE]);
        let mut scu = transport(&fake, 10);

        scu.command(IpcCommand::WatchdogTimer.into(), 0, &[0; 8], &mut [])
            .unwrap();
        scu.command(IpcCommand::WatchdogTimer.into(), 0, &[0; 5], &mut [])
            .unwrap();

        let lens: Vec<u8> = fake
            .doorbells()
            .into_iter()
            .map(|w| regs::decode_doorbell(w).2)
            .collect();
        assert_eq!(lens, vec![2, 2]);
    }

    #[test]
    fn oversized_output_is_rejected() {
        let fake = FakeScu::new(&[DONE]);
        let mut scu = transport(&fake, 10);

        let mut out = [0u32; 5];
        let err = scu.command(0xf4, 1, &[], &mut out);

        assert_eq!(err, Err(ScuIpcError::InvalidArgument));
        assert!(fake.writes().is_empty());
    }

    #[test]
    fn wide_subcommand_is_rejected() {
        let fake = FakeScu::new(&[DONE]);
        let mut scu = transport(&fake, 10);

        assert_eq!(
            scu.simple_command(0xf8, 0x10),
            Err(ScuIpcError::InvalidArgument)
        );
        assert!(fake.writes().is_empty());
        assert_eq!(fake.status_reads(), 0);
    }

    #[test]
    fn bind_rejects_missing_address() {
        let delay = FakeDelay::default();
        let config = ScuConfig::DEFAULT;
        let r = unsafe { ScuIpcTransport::bind(None, delay, config) };
        assert_eq!(r.err(), Some(ScuIpcError::InvalidAddress));
    }

    #[test]
    fn bind_rejects_unmappable_window() {
        let r = unsafe {
            ScuIpcTransport::bind(
                Some(u64::MAX & !0x3),
                FakeDelay::default(),
                ScuConfig::DEFAULT,
            )
        };
        assert_eq!(r.err(), Some(ScuIpcError::AllocationFailed));
    }

    #[test]
    fn bind_drives_real_memory() {
        let mut backing = vec![0u32; regs::WINDOW_SIZE / 4];
        backing[regs::IPC_READ_BUFFER / 4] = 0x0102_0304;
        let base = backing.as_mut_ptr() as u64;

        let mut out = [0u32; 1];
        {
            let mut scu = unsafe {
                ScuIpcTransport::bind(
                    Some(base),
                    FakeDelay::default(),
                    ScuConfig { retries: 1 },
                )
            }
            .unwrap();
            scu.command(0xf4, 1, &[0xaa, 0xbb], &mut out).unwrap();
            assert_eq!(
                scu.trace().iter().next().map(|e| e.payload),
                Some(Trace::Bound { base: base as usize })
            );
        }

        assert_eq!(out, [0x0102_0304]);
        assert_eq!(backing[regs::IPC_WRITE_BUFFER / 4], 0x0000_bbaa);
        assert_eq!(backing[regs::IPC_CMD / 4], 0x0002_11f4);
    }

    proptest! {
        #[test]
        fn input_goes_out_as_padded_le_words(
            input in proptest::collection::vec(any::<u8>(), 0..=MAX_INPUT_LEN),
            cmd in any::<u8>(),
        ) {
            let fake = FakeScu::new(&[DONE]);
            let mut scu = transport(&fake, 10);

            scu.command(cmd, 0, &input, &mut []).unwrap();

            let words = fake.write_buffer_writes();
            prop_assert_eq!(words.len(), input.len().div_ceil(4));
            let mut bytes: Vec<u8> =
                words.iter().flat_map(|w| w.to_le_bytes()).collect();
            prop_assert!(bytes[input.len()..].iter().all(|&b| b == 0));
            bytes.truncate(input.len());
            prop_assert_eq!(bytes, input.clone());

            let (_, _, len) = regs::decode_doorbell(fake.doorbells()[0]);
            let expected = if cmd == 0xf8 {
                input.len().div_ceil(4)
            } else {
                input.len()
            };
            prop_assert_eq!(usize::from(len), expected);
        }

        #[test]
        fn oversized_input_touches_nothing(
            input in proptest::collection::vec(any::<u8>(), 17..64),
        ) {
            let fake = FakeScu::new(&[DONE]);
            let mut scu = transport(&fake, 10);

            let err = scu.raw_command(0x05, 0, &input, &mut [], 0x1000, 0);

            prop_assert_eq!(err, Err(ScuIpcError::InvalidArgument));
            prop_assert!(fake.writes().is_empty());
            prop_assert_eq!(fake.status_reads(), 0);
        }
    }
}
