// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edison board bring-up.
//!
//! Powers the SD card island through the PMU, binds the SCU mailbox and the
//! FLIS pad controller, and hands out the collaborators that share the
//! mailbox.

#![cfg_attr(not(test), no_std)]

use core::fmt::Write;

use drv_tangier_pinmux::{Pinmux, FLIS_BASE, FLIS_LENGTH};
use drv_tangier_pmu::{Pmu, PmuConfig, PmuError, PMU_BASE};
use drv_tangier_scu_ipc::{ScuConfig, ScuIpcTransport, SCU_IPC_BASE};
use drv_tangier_scu_ipc_api::{
    IfwiVersion, IpcCommand, ScuIpc, ScuIpcError, Shared, FW_REVISION_IFWI,
    MAX_OUTPUT_WORDS,
};
use drv_tangier_sys::{BindError, MmioWindow, TscDelay};
use drv_tangier_wdt::{Watchdog, WatchdogConfig};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BoardConfig {
    pub scu_base: u64,
    pub pmu_base: u64,
    pub flis_base: u64,
    pub flis_len: usize,
    /// TSC rate; Edison's Silvermont cores run the TSC at 500 MHz.
    pub tsc_ticks_per_us: u64,
    pub scu: ScuConfig,
    pub pmu: PmuConfig,
}

impl BoardConfig {
    pub const DEFAULT: Self = Self {
        scu_base: SCU_IPC_BASE,
        pmu_base: PMU_BASE,
        flis_base: FLIS_BASE,
        flis_len: FLIS_LENGTH,
        tsc_ticks_per_us: 500,
        scu: ScuConfig::DEFAULT,
        pmu: PmuConfig::DEFAULT,
    };
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BoardError {
    Pmu(PmuError),
    Scu(ScuIpcError),
    Flis(BindError),
}

impl From<PmuError> for BoardError {
    fn from(e: PmuError) -> Self {
        Self::Pmu(e)
    }
}

impl From<ScuIpcError> for BoardError {
    fn from(e: ScuIpcError) -> Self {
        Self::Scu(e)
    }
}

impl From<BindError> for BoardError {
    fn from(e: BindError) -> Self {
        Self::Flis(e)
    }
}

/// Resets the whole SoC. Returns only if the SCU refuses.
pub fn reset_cpu<S: ScuIpc>(mut scu: S) -> Result<(), ScuIpcError> {
    scu.simple_command(IpcCommand::ColdReset.into(), 0)
}

pub fn firmware_revision<S: ScuIpc>(
    mut scu: S,
) -> Result<IfwiVersion, ScuIpcError> {
    let mut out = [0u32; MAX_OUTPUT_WORDS];
    scu.command(
        IpcCommand::GetFwRevision.into(),
        FW_REVISION_IFWI,
        &[],
        &mut out,
    )?;
    Ok(IfwiVersion::from_word(out[0]))
}

/// The board's hardware id as two uppercase hex digits.
pub fn hardware_id<S: ScuIpc>(
    scu: S,
) -> Result<heapless::String<2>, ScuIpcError> {
    let rev = firmware_revision(scu)?;
    let mut id = heapless::String::new();
    // Two hex digits of a u8 always fit.
    let _ = write!(id, "{:02X}", rev.hardware_id);
    Ok(id)
}

pub type Scu = ScuIpcTransport<MmioWindow, TscDelay>;

pub struct Board {
    scu: Shared<Scu>,
    flis: MmioWindow,
    flis_base: u64,
    delay: TscDelay,
}

impl Board {
    /// Brings the board up and binds the SCU mailbox.
    ///
    /// The PMU comes first: the SD card island has to be powered before
    /// anything probes the slot, and that does not need the SCU.
    ///
    /// # Safety
    ///
    /// The addresses in `config` must be the board's register blocks, and
    /// this must be called at most once.
    pub unsafe fn bring_up(config: BoardConfig) -> Result<Self, BoardError> {
        let delay = TscDelay::new(config.tsc_ticks_per_us);

        let mut pmu = Pmu::bind(Some(config.pmu_base), delay, config.pmu)?;
        pmu.enable_sdio0()?;

        let scu =
            ScuIpcTransport::bind(Some(config.scu_base), delay, config.scu)?;
        let flis = MmioWindow::bind(Some(config.flis_base), config.flis_len)?;

        Ok(Self {
            scu: Shared::new(scu),
            flis,
            flis_base: config.flis_base,
            delay,
        })
    }

    pub fn scu(&self) -> &Shared<Scu> {
        &self.scu
    }

    pub fn pinmux(&self) -> Pinmux<&Shared<Scu>, &MmioWindow> {
        Pinmux::new(&self.scu, &self.flis, self.flis_base)
    }

    pub fn watchdog(
        &self,
        config: WatchdogConfig,
    ) -> Watchdog<&Shared<Scu>, TscDelay> {
        Watchdog::new(&self.scu, self.delay, config)
    }
}
