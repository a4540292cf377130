// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tangier power management unit.
//!
//! Only as much as the boot stage needs: powering up the SDIO0 island so
//! that the SD card slot can be probed.

#![cfg_attr(not(test), no_std)]

use bitflags::bitflags;
use drv_tangier_sys::{
    wait_while_set, BindError, Delay, MmioWindow, RegisterWindow,
};
use ringbuf::{ringbuf_entry, Ringbuf};

/// Physical base of the PMU on Edison.
pub const PMU_BASE: u64 = 0xff00_b000;
pub const PMU_WINDOW_SIZE: usize = 0x100;

pub const PM_STS: usize = 0x00;
pub const PM_CMD: usize = 0x04;

/// Subsystem control register `n`.
pub const fn pm_ssc(n: usize) -> usize {
    0x20 + 4 * n
}

/// Subsystem status register `n`.
pub const fn pm_sss(n: usize) -> usize {
    0x30 + 4 * n
}

bitflags! {
    #[derive(Copy, Clone, Debug, Eq, PartialEq)]
    pub struct PmStatus: u32 {
        const BUSY = 1 << 8;
    }
}

/// Logical subsystem index of SDIO0 within SSC(0)/SSS(0).
const SDIO0_LSS: u32 = 1;
const LSS_STATE_MASK: u32 = 0b11;

/// Apply the new SSC power states with interrupt on completion.
const CMD_SET_CFG: u32 = 0x0000_2201;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PmuConfig {
    pub retries: u32,
}

impl PmuConfig {
    pub const DEFAULT: Self = Self { retries: 500_000 };
}

impl Default for PmuConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PmuError {
    /// The PMU stayed busy for the whole retry bound.
    Busy { status: u32 },
    Bind(BindError),
}

impl From<BindError> for PmuError {
    fn from(e: BindError) -> Self {
        Self::Bind(e)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Ssc(u32),
    Busy(u32),
}

pub struct Pmu<W, D> {
    window: W,
    delay: D,
    config: PmuConfig,
    trace: Ringbuf<Trace, 4>,
}

impl<D: Delay> Pmu<MmioWindow, D> {
    /// # Safety
    ///
    /// `base` must be the physical address of the PMU register block.
    pub unsafe fn bind(
        base: Option<u64>,
        delay: D,
        config: PmuConfig,
    ) -> Result<Self, PmuError> {
        let window = MmioWindow::bind(base, PMU_WINDOW_SIZE)?;
        Ok(Self::new(window, delay, config))
    }
}

impl<W: RegisterWindow, D: Delay> Pmu<W, D> {
    pub fn new(window: W, delay: D, config: PmuConfig) -> Self {
        Self {
            window,
            delay,
            config,
            trace: Ringbuf::new(Trace::None),
        }
    }

    pub fn read_status(&self) -> PmStatus {
        PmStatus::from_bits_retain(self.window.read32(PM_STS))
    }

    pub fn wait_idle(&mut self) -> Result<(), PmuError> {
        match wait_while_set(
            &self.window,
            PM_STS,
            PmStatus::BUSY.bits(),
            self.config.retries,
            &self.delay,
        ) {
            Ok(_) => Ok(()),
            Err(status) => {
                ringbuf_entry!(self.trace, Trace::Busy(status));
                Err(PmuError::Busy { status })
            }
        }
    }

    /// Moves SDIO0 to D0 and waits for the PMU to finish the transition.
    pub fn enable_sdio0(&mut self) -> Result<(), PmuError> {
        self.wait_idle()?;

        let shift = SDIO0_LSS * 2;
        let ssc = self.window.read32(pm_sss(0)) & !(LSS_STATE_MASK << shift);
        self.window.write32(pm_ssc(0), ssc);
        ringbuf_entry!(self.trace, Trace::Ssc(ssc));
        self.window.write32(PM_CMD, CMD_SET_CFG);

        self.wait_idle()
    }
}
