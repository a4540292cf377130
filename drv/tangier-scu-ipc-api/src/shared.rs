// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::{ScuIpc, ScuIpcError};

/// An SCU handle that several collaborators can hold at once.
///
/// The mailbox can only have one command in flight. Each call through a
/// `&Shared<T>` holds the lock from the doorbell write until the status poll
/// finishes, so a keepalive from a timer tick cannot land in the middle of
/// another caller's command.
pub struct Shared<T> {
    inner: spin::Mutex<T>,
}

impl<T> Shared<T> {
    pub const fn new(inner: T) -> Self {
        Self {
            inner: spin::Mutex::new(inner),
        }
    }

    /// Runs `f` with exclusive access to the handle, for callers that need
    /// several commands to go out back to back.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: ScuIpc> ScuIpc for &Shared<T> {
    fn simple_command(&mut self, cmd: u8, sub: u8) -> Result<(), ScuIpcError> {
        self.inner.lock().simple_command(cmd, sub)
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
        self.inner
            .lock()
            .raw_command(cmd, sub, input, output, dptr, sptr)
    }
}
