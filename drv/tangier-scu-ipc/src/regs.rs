// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! SCU IPC mailbox register layout.

use bitflags::bitflags;
use drv_tangier_scu_ipc_api::{MAX_INPUT_LEN, MAX_OUTPUT_WORDS};

/// Command (doorbell) register, write only. Writing it interrupts the SCU.
///
/// `|rfu2(8)|size(8)|sub(4)|rfu1(3)|ioc(1)|command(8)|`
pub const IPC_CMD: usize = 0x00;

/// Status register, read only.
///
/// `|rfu3(8)|error code(8)|initiator id(8)|cmd id(4)|rfu1(2)|error(1)|busy(1)|`
pub const IPC_STATUS: usize = 0x04;

/// Source pointer scratch register.
pub const IPC_SPTR: usize = 0x08;

/// Destination pointer scratch register.
pub const IPC_DPTR: usize = 0x0c;

/// 16-byte write buffer. The SRAM behind it only takes 32-bit stores.
pub const IPC_WRITE_BUFFER: usize = 0x80;

/// 16-byte read buffer.
pub const IPC_READ_BUFFER: usize = 0x90;

/// Size of the mapped register window.
pub const WINDOW_SIZE: usize = 1024;

static_assertions::const_assert_eq!(
    IPC_WRITE_BUFFER + MAX_INPUT_LEN,
    IPC_READ_BUFFER
);
static_assertions::const_assert!(
    IPC_READ_BUFFER + 4 * MAX_OUTPUT_WORDS <= WINDOW_SIZE
);

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct Status: u32 {
        /// Command still in flight.
        const BUSY = 1 << 0;
        /// Command completed with an error.
        const ERROR = 1 << 1;
    }
}

/// Interrupt-on-completion; set on every doorbell write.
pub const IPC_IOC: u32 = 1 << 8;

const SIZE_SHIFT: u32 = 16;
const SUB_SHIFT: u32 = 12;

/// Encodes a doorbell word. `len` is whatever unit the command expects.
pub fn doorbell(cmd: u8, sub: u8, len: u8) -> u32 {
    (u32::from(len) << SIZE_SHIFT)
        | (u32::from(sub & 0xf) << SUB_SHIFT)
        | u32::from(cmd)
        | IPC_IOC
}

/// Splits a doorbell word back into `(cmd, sub, len)`.
pub fn decode_doorbell(word: u32) -> (u8, u8, u8) {
    (
        word as u8,
        ((word >> SUB_SHIFT) & 0xf) as u8,
        (word >> SIZE_SHIFT) as u8,
    )
}
