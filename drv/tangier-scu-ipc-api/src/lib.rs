// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client API for the Tangier SCU IPC mailbox.
//!
//! The System Controller Unit is an on-die microcontroller that owns power,
//! reset and watchdog functions. Everything else in the boot stage reaches
//! it through the [`ScuIpc`] trait: pick a command id and sub-code, hand
//! over at most 16 bytes of input, and get back some number of 32-bit words.

#![cfg_attr(not(test), no_std)]

use drv_tangier_sys::BindError;
use zerocopy::byteorder::little_endian::U16;

mod shared;

pub use shared::Shared;

/// The mailbox write buffer holds this many bytes of command input.
pub const MAX_INPUT_LEN: usize = 16;

/// The mailbox read buffer holds this many words of command output.
pub const MAX_OUTPUT_WORDS: usize = 4;

/// Sub-command ids occupy a 4-bit field of the doorbell word.
pub const MAX_SUBCOMMAND: u8 = 0xf;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScuIpcError {
    /// Input longer than [`MAX_INPUT_LEN`], output longer than
    /// [`MAX_OUTPUT_WORDS`], a sub-command that does not fit its field, or a
    /// pointer that does not fit its 32-bit register.
    InvalidArgument,
    /// The SCU has no usable address.
    InvalidAddress,
    /// The SCU register window could not be mapped.
    AllocationFailed,
    /// The SCU never cleared its busy bit.
    Timeout,
    /// The SCU completed the command with its error bit set.
    IoError { status: u32 },
}

impl From<BindError> for ScuIpcError {
    fn from(err: BindError) -> Self {
        match err {
            BindError::InvalidAddress => ScuIpcError::InvalidAddress,
            BindError::AllocationFailed => ScuIpcError::AllocationFailed,
        }
    }
}

/// Command ids understood by the SCU firmware.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum IpcCommand {
    IndirectRead = 0x02,
    IndirectWrite = 0x05,
    WarmReset = 0xf0,
    ColdReset = 0xf1,
    SoftReset = 0xf2,
    ColdBoot = 0xf3,
    GetFwRevision = 0xf4,
    /// Unlike every other command, this one expresses its input length in
    /// 32-bit words rather than bytes.
    WatchdogTimer = 0xf8,
}

impl From<IpcCommand> for u8 {
    fn from(c: IpcCommand) -> u8 {
        c as u8
    }
}

/// Sub-codes of [`IpcCommand::WatchdogTimer`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum WatchdogSubcommand {
    Start = 0,
    Stop = 1,
    Keepalive = 2,
    SetActionOnTimeout = 3,
}

impl From<WatchdogSubcommand> for u8 {
    fn from(s: WatchdogSubcommand) -> u8 {
        s as u8
    }
}

/// The sub-code of [`IpcCommand::GetFwRevision`] that reports the IFWI
/// version.
pub const FW_REVISION_IFWI: u8 = 1;

/// IFWI version as reported in the first output word of
/// [`IpcCommand::GetFwRevision`].
#[derive(
    Copy,
    Clone,
    Debug,
    Eq,
    PartialEq,
    zerocopy_derive::FromBytes,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
    zerocopy_derive::Unaligned,
)]
#[repr(C)]
pub struct IfwiVersion {
    pub ifwi_minor: U16,
    pub ifwi_major: u8,
    pub hardware_id: u8,
}

static_assertions::assert_eq_size!(IfwiVersion, u32);

impl IfwiVersion {
    /// Decodes the version from the first word of the read buffer.
    pub fn from_word(word: u32) -> Self {
        zerocopy::transmute!(word.to_le_bytes())
    }

    pub fn minor(&self) -> u16 {
        self.ifwi_minor.get()
    }
}

/// Command submission to the SCU.
///
/// Every call is synchronous: it returns once the SCU has finished with the
/// command, reported an error, or failed to respond within the implementor's
/// retry bound. Nothing is retried on the caller's behalf.
pub trait ScuIpc {
    /// Issues `cmd`/`sub` with no data phase.
    fn simple_command(&mut self, cmd: u8, sub: u8) -> Result<(), ScuIpcError>;

    /// Issues `cmd`/`sub` with `input` in the write buffer and `dptr`/`sptr`
    /// in the pointer registers, then fills `output` from the read buffer.
    ///
    /// `input.len()` is in bytes (at most [`MAX_INPUT_LEN`]); `output.len()`
    /// is in words (at most [`MAX_OUTPUT_WORDS`]). `output` is only
    /// meaningful if this returns `Ok`.
    fn raw_command(
        &mut self,
        cmd: u8,
        sub: u8,
        input: &[u8],
        output: &mut [u32],
        dptr: u32,
        sptr: u32,
    ) -> Result<(), ScuIpcError>;

    /// [`ScuIpc::raw_command`] with both pointer registers zeroed.
    fn command(
        &mut self,
        cmd: u8,
        sub: u8,
        input: &[u8],
        output: &mut [u32],
    ) -> Result<(), ScuIpcError> {
        self.raw_command(cmd, sub, input, output, 0, 0)
    }

    /// Has the SCU update the word at physical address `target`, which the
    /// caller cannot write itself.
    ///
    /// The SCU does not read the target first, so the caller supplies the
    /// word's `current` contents. Bits in `mask` are taken from `value` and
    /// the rest from `current`. Returns the word that was written.
    fn indirect_write(
        &mut self,
        target: u64,
        current: u32,
        value: u32,
        mask: u32,
    ) -> Result<u32, ScuIpcError> {
        let dptr =
            u32::try_from(target).map_err(|_| ScuIpcError::InvalidArgument)?;
        let word = (current & !mask) | (value & mask);
        self.raw_command(
            IpcCommand::IndirectWrite.into(),
            0,
            &word.to_le_bytes(),
            &mut [],
            dptr,
            0,
        )?;
        Ok(word)
    }
}

impl<S: ScuIpc + ?Sized> ScuIpc for &mut S {
    fn simple_command(&mut self, cmd: u8, sub: u8) -> Result<(), ScuIpcError> {
        (**self).simple_command(cmd, sub)
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
        (**self).raw_command(cmd, sub, input, output, dptr, sptr)
    }
}
