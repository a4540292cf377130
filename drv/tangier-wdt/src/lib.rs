// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tangier watchdog, as run by the SCU firmware.
//!
//! The watchdog itself lives in the SCU; all the boot stage can do is ask
//! the SCU to start, stop or feed it. Feeding is best-effort: if the SCU
//! does not answer, the beat is skipped and the next [`Watchdog::pet`] after
//! another heartbeat interval tries again.

#![cfg_attr(not(test), no_std)]

use drv_tangier_scu_ipc_api::{
    IpcCommand, ScuIpc, ScuIpcError, WatchdogSubcommand,
};
use drv_tangier_sys::Clock;
use ringbuf::{ringbuf_entry, Ringbuf};
use zerocopy::byteorder::little_endian::U32;
use zerocopy::IntoBytes;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct WatchdogConfig {
    /// Minimum interval between keepalives sent by [`Watchdog::pet`].
    pub heartbeat_ms: u64,
}

impl WatchdogConfig {
    pub const DEFAULT: Self = Self {
        heartbeat_ms: 60_000,
    };
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Payload of a START that also sets the thresholds, in seconds.
#[derive(
    Copy,
    Clone,
    zerocopy_derive::IntoBytes,
    zerocopy_derive::Immutable,
    zerocopy_derive::KnownLayout,
    zerocopy_derive::Unaligned,
)]
#[repr(C)]
struct StartTimeouts {
    pretimeout: U32,
    timeout: U32,
}

/// What [`Watchdog::pet`] did.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Pet {
    /// Less than a heartbeat since the last attempt; nothing sent.
    Throttled,
    /// Keepalive sent and acknowledged.
    Fed,
    /// Keepalive sent but the SCU failed it. Not retried.
    Missed(ScuIpcError),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Trace {
    None,
    Start,
    Stop,
    Keepalive { now_us: u64 },
    Failed(WatchdogSubcommand, ScuIpcError),
}

pub struct Watchdog<S, C> {
    scu: S,
    clock: C,
    heartbeat_us: u64,
    last_feed_us: u64,
    trace: Ringbuf<Trace, 8>,
}

impl<S: ScuIpc, C: Clock> Watchdog<S, C> {
    pub fn new(scu: S, clock: C, config: WatchdogConfig) -> Self {
        Self {
            scu,
            clock,
            heartbeat_us: config.heartbeat_ms.saturating_mul(1000),
            last_feed_us: 0,
            trace: Ringbuf::new(Trace::None),
        }
    }

    /// Starts the watchdog with whatever thresholds the firmware holds.
    pub fn start(&mut self) -> Result<(), ScuIpcError> {
        ringbuf_entry!(self.trace, Trace::Start);
        self.simple(WatchdogSubcommand::Start)
    }

    /// Starts the watchdog with new thresholds.
    ///
    /// The SCU raises a pre-timeout warning after `pretimeout_s` and resets
    /// the SoC after `timeout_s`.
    pub fn start_with_timeouts(
        &mut self,
        pretimeout_s: u32,
        timeout_s: u32,
    ) -> Result<(), ScuIpcError> {
        ringbuf_entry!(self.trace, Trace::Start);
        let payload = StartTimeouts {
            pretimeout: U32::new(pretimeout_s),
            timeout: U32::new(timeout_s),
        };
        let sub = WatchdogSubcommand::Start;
        let r = self.scu.command(
            IpcCommand::WatchdogTimer.into(),
            sub.into(),
            payload.as_bytes(),
            &mut [],
        );
        if let Err(e) = r {
            ringbuf_entry!(self.trace, Trace::Failed(sub, e));
        }
        r
    }

    pub fn stop(&mut self) -> Result<(), ScuIpcError> {
        ringbuf_entry!(self.trace, Trace::Stop);
        self.simple(WatchdogSubcommand::Stop)
    }

    /// Feeds the watchdog unconditionally.
    pub fn keepalive(&mut self) -> Result<(), ScuIpcError> {
        self.simple(WatchdogSubcommand::Keepalive)
    }

    /// Feeds the watchdog if at least a heartbeat has passed since the last
    /// attempt. Safe to call from any polling loop.
    pub fn pet(&mut self) -> Pet {
        let now_us = self.clock.now_us();
        if now_us.wrapping_sub(self.last_feed_us) <= self.heartbeat_us {
            return Pet::Throttled;
        }
        // The attempt counts as a beat whether or not the SCU answers, so a
        // wedged SCU gets asked at most once per heartbeat.
        self.last_feed_us = now_us;
        ringbuf_entry!(self.trace, Trace::Keepalive { now_us });
        match self.keepalive() {
            Ok(()) => Pet::Fed,
            Err(e) => Pet::Missed(e),
        }
    }

    pub fn into_inner(self) -> (S, C) {
        (self.scu, self.clock)
    }

    fn simple(&mut self, sub: WatchdogSubcommand) -> Result<(), ScuIpcError> {
        let r = self
            .scu
            .simple_command(IpcCommand::WatchdogTimer.into(), sub.into());
        if let Err(e) = r {
            ringbuf_entry!(self.trace, Trace::Failed(sub, e));
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use drv_tangier_scu_ipc::fake::{FakeDelay, FakeScu};
    use drv_tangier_scu_ipc::{regs, ScuConfig, ScuIpcTransport};

    struct FakeClock<'a>(&'a Cell<u64>);

    impl Clock for FakeClock<'_> {
        fn now_us(&self) -> u64 {
            self.0.get()
        }
    }

    #[derive(Default)]
    struct Log {
        calls: Vec<(u8, u8, usize)>,
        fail: Option<ScuIpcError>,
    }

    impl ScuIpc for Log {
        fn simple_command(
            &mut self,
            cmd: u8,
            sub: u8,
        ) -> Result<(), ScuIpcError> {
            self.calls.push((cmd, sub, 0));
            self.fail.map_or(Ok(()), Err)
        }

        fn raw_command(
            &mut self,
            cmd: u8,
            sub: u8,
            input: &[u8],
            _: &mut [u32],
            _: u32,
            _: u32,
        ) -> Result<(), ScuIpcError> {
            self.calls.push((cmd, sub, input.len()));
            self.fail.map_or(Ok(()), Err)
        }
    }

    const HEARTBEAT: WatchdogConfig = WatchdogConfig { heartbeat_ms: 10 };

    #[test]
    fn start_stop_keepalive_subcodes() {
        let now = Cell::new(0);
        let mut wdt = Watchdog::new(Log::default(), FakeClock(&now), HEARTBEAT);
        wdt.start().unwrap();
        wdt.keepalive().unwrap();
        wdt.stop().unwrap();
        let (log, _) = wdt.into_inner();
        assert_eq!(log.calls, vec![(0xf8, 0, 0), (0xf8, 2, 0), (0xf8, 1, 0)]);
    }

    #[test]
    fn pet_is_throttled_to_the_heartbeat() {
        let now = Cell::new(5_000);
        let mut wdt = Watchdog::new(Log::default(), FakeClock(&now), HEARTBEAT);

        // Not yet a full heartbeat past time zero.
        assert_eq!(wdt.pet(), Pet::Throttled);

        now.set(10_001);
        assert_eq!(wdt.pet(), Pet::Fed);
        now.set(20_001);
        assert_eq!(wdt.pet(), Pet::Throttled);
        now.set(20_002);
        assert_eq!(wdt.pet(), Pet::Fed);

        let (log, _) = wdt.into_inner();
        assert_eq!(log.calls, vec![(0xf8, 2, 0), (0xf8, 2, 0)]);
    }

    #[test]
    fn missed_keepalive_waits_for_next_heartbeat() {
        let now = Cell::new(50_000);
        let log = Log {
            fail: Some(ScuIpcError::Timeout),
            ..Default::default()
        };
        let mut wdt = Watchdog::new(log, FakeClock(&now), HEARTBEAT);

        assert_eq!(wdt.pet(), Pet::Missed(ScuIpcError::Timeout));
        now.set(55_000);
        assert_eq!(wdt.pet(), Pet::Throttled);
        assert_eq!(
            wdt.trace.latest().map(|e| e.payload),
            Some(Trace::Failed(
                WatchdogSubcommand::Keepalive,
                ScuIpcError::Timeout
            ))
        );

        let (log, _) = wdt.into_inner();
        assert_eq!(log.calls.len(), 1);
    }

    #[test]
    fn timeouts_go_out_as_two_words() {
        let fake = FakeScu::new(&[0x1, 0x0]);
        let scu = ScuIpcTransport::new(
            &fake,
            FakeDelay::default(),
            ScuConfig { retries: 10 },
        );
        let now = Cell::new(0);
        let mut wdt = Watchdog::new(scu, FakeClock(&now), HEARTBEAT);

        wdt.start_with_timeouts(50, 60).unwrap();

        assert_eq!(fake.write_buffer_writes(), vec![50, 60]);
        assert_eq!(fake.doorbells(), vec![regs::doorbell(0xf8, 0, 2)]);
    }
}
