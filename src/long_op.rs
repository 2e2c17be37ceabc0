//! Polling firmware operations that keep running after their mailbox
//! command completed (firmware staging, package sparing, address range
//! scrub).

use crate::clock::{Clock, Timer};
use crate::mailbox::RegisterAccess;
use crate::ondisk::LONG_OPERATION_STATUS;
use crate::passthru::{Dimm, FwCommand, GetLogSubOpcode, Opcode};
use crate::types::{Error, FwStatusCode, Result, StatusClass};
use core::time::Duration;
use zerocopy::FromBytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongOpOptions {
    /// How often to ask the DIMM.
    pub interval: Duration,
    /// Zero waits forever.
    pub timeout: Duration,
}

impl Default for LongOpOptions {
    fn default() -> Self {
        Self { interval: Duration::from_secs(1), timeout: Duration::ZERO }
    }
}

impl LongOpOptions {
    pub fn with_interval(mut self, value: Duration) -> Self {
        self.interval = value;
        self
    }
    pub fn with_timeout(mut self, value: Duration) -> Self {
        self.timeout = value;
        self
    }
}

/// Issues GetLog/LongOperationStatus.
pub fn get_long_operation_status<A: RegisterAccess, C: Clock>(
    dimm: &mut Dimm<A, C>,
) -> Result<LONG_OPERATION_STATUS> {
    let output = dimm
        .passthru(FwCommand::get_log(GetLogSubOpcode::LongOperationStatus))?;
    LONG_OPERATION_STATUS::read_from(&output.small[..])
        .ok_or(Error::PayloadTooBig)
}

/// The periodic tick and the optional deadline. Both are released when
/// this goes away.
struct WakeSources<'t, T: Timer> {
    timer: &'t mut T,
    tick: T::Source,
    deadline: Option<T::Source>,
}

impl<'t, T: Timer> WakeSources<'t, T> {
    fn register(timer: &'t mut T, options: &LongOpOptions) -> Result<Self> {
        let tick = timer.periodic(options.interval)?;
        let mut result = Self { timer, tick, deadline: None };
        if !options.timeout.is_zero() {
            result.deadline = Some(result.timer.one_shot(options.timeout)?);
        }
        Ok(result)
    }

    /// Waits for the next wake-up; true if it was the deadline.
    fn wait(&mut self) -> Result<bool> {
        let woke = match self.deadline {
            Some(deadline) => self.timer.wait_any(&[self.tick, deadline])?,
            None => self.timer.wait_any(&[self.tick])?,
        };
        Ok(Some(woke) == self.deadline)
    }
}

impl<'t, T: Timer> Drop for WakeSources<'t, T> {
    fn drop(&mut self) {
        self.timer.release(self.tick);
        if let Some(deadline) = self.deadline {
            self.timer.release(deadline);
        }
    }
}

/// Polls the long operation status of DIMM on every tick until it
/// reports success.
///
/// With EXPECTED set, a status record for another opcode/sub-opcode means
/// the firmware does not track operations per opcode and fails with
/// `IncompatibleVersion`. A long operation status of Busy keeps polling;
/// any other failure status is returned as `Error::Firmware`. Errors of
/// the status command itself end polling immediately.
pub fn poll_long_operation<A, C, T>(
    dimm: &mut Dimm<A, C>,
    timer: &mut T,
    expected: Option<(Opcode, u8)>,
    options: &LongOpOptions,
) -> Result<LONG_OPERATION_STATUS>
where
    A: RegisterAccess,
    C: Clock,
    T: Timer,
{
    let mut sources = WakeSources::register(timer, options)?;
    loop {
        let deadline_passed = sources.wait()?;
        let status = get_long_operation_status(dimm)?;
        if let Some((opcode, sub_opcode)) = expected {
            if status.command_opcode() != opcode as u8
                || status.command_sub_opcode() != sub_opcode
            {
                log::debug!(
                    target: "dcpmm::long_op",
                    "status is for {:#04x}/{:#04x}, not {:#04x}/{:#04x}",
                    status.command_opcode(),
                    status.command_sub_opcode(),
                    opcode as u8,
                    sub_opcode
                );
                return Err(Error::IncompatibleVersion);
            }
        }
        let code = FwStatusCode::from_byte(status.status());
        match code.class() {
            StatusClass::Success | StatusClass::NoResponse => {}
            _ => return Err(Error::Firmware(code)),
        }
        if deadline_passed {
            log::debug!(
                target: "dcpmm::long_op",
                "timed out at {}% complete",
                status.percent_complete()
            );
            return Err(Error::Timeout);
        }
        if code.is_success() {
            return Ok(status);
        }
        log::trace!(
            target: "dcpmm::long_op",
            "{}% complete, about {} s left",
            status.percent_complete(),
            status.estimated_time_left()
        );
    }
}
