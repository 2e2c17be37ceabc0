//! Firmware command submission over the OS mailbox.
//!
//! One command is in flight per DIMM. A command goes through
//! `prepare` (sequence bit, nonce, payload path), `submit` (payload first,
//! command register last) and `poll` (status register until complete or
//! the deadline passes). `Dimm::execute` does all three.

use crate::clock::Clock;
use crate::mailbox::{
    CommandRegister, Mailbox, RegisterAccess, StatusRegister,
    SMALL_PAYLOAD_SIZE,
};
use crate::types::{Error, FwStatusCode, Result};
use alloc::vec;
use alloc::vec::Vec;
use core::sync::atomic::{compiler_fence, Ordering};
use core::time::Duration;
use num_derive::FromPrimitive;
use pre::pre;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Opcode {
    IdentifyDimm = 0x01,
    GetSecurityInfo = 0x02,
    SetSecurityInfo = 0x03,
    GetFeatures = 0x04,
    SetFeatures = 0x05,
    GetAdminFeatures = 0x06,
    SetAdminFeatures = 0x07,
    GetLog = 0x08,
    UpdateFirmware = 0x09,
    InjectError = 0x0A,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum GetLogSubOpcode {
    SmartHealth = 0x00,
    FirmwareImageInfo = 0x01,
    FirmwareDebug = 0x02,
    MemoryInfo = 0x03,
    LongOperationStatus = 0x04,
    ErrorLog = 0x05,
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum SetSecurityInfoSubOpcode {
    Overwrite = 0x01,
    SetMasterPassphrase = 0xF0,
    SetPassphrase = 0xF1,
    DisablePassphrase = 0xF2,
    Unlock = 0xF3,
    SecureErasePrepare = 0xF4,
    SecureErase = 0xF5,
    FreezeLock = 0xF6,
}

/// Sub-opcodes of GetFeatures and SetFeatures.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum FeatureSubOpcode {
    PackageSparing = 0x03,
    AddressRangeScrub = 0x04,
}

/// Where a DIMM's command state machine is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandState {
    Idle,
    Prepared,
    Submitted,
    Polling,
    Completed(FwStatusCode),
    /// The last command never completed; its late response must be
    /// drained before the next one.
    TimedOut,
    DeviceError,
}

/// One firmware command as the caller describes it.
#[derive(Debug, Clone, Copy)]
pub struct FwCommand<'a> {
    opcode: Opcode,
    sub_opcode: u8,
    input: &'a [u8],
    nonce: Option<(u64, u64)>,
    large_output_size: usize,
}

impl<'a> FwCommand<'a> {
    pub fn new(opcode: Opcode, sub_opcode: u8) -> Self {
        Self {
            opcode,
            sub_opcode,
            input: &[],
            nonce: None,
            large_output_size: 0,
        }
    }
    pub fn get_log(sub_opcode: GetLogSubOpcode) -> Self {
        Self::new(Opcode::GetLog, sub_opcode as u8)
    }
    pub fn set_security_info(sub_opcode: SetSecurityInfoSubOpcode) -> Self {
        Self::new(Opcode::SetSecurityInfo, sub_opcode as u8)
    }
    pub fn get_features(sub_opcode: FeatureSubOpcode) -> Self {
        Self::new(Opcode::GetFeatures, sub_opcode as u8)
    }
    pub fn set_features(sub_opcode: FeatureSubOpcode) -> Self {
        Self::new(Opcode::SetFeatures, sub_opcode as u8)
    }

    pub fn with_input(mut self, input: &'a [u8]) -> Self {
        self.input = input;
        self
    }
    /// Security nonce; only SetSecurityInfo sends it.
    pub fn with_nonce(mut self, nonce0: u64, nonce1: u64) -> Self {
        self.nonce = Some((nonce0, nonce1));
        self
    }
    /// Also read SIZE bytes from the large output window on completion.
    pub fn with_large_output(mut self, size: usize) -> Self {
        self.large_output_size = size;
        self
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }
    pub fn sub_opcode(&self) -> u8 {
        self.sub_opcode
    }
    pub fn input(&self) -> &'a [u8] {
        self.input
    }
    pub fn requires_nonce(&self) -> bool {
        self.opcode == Opcode::SetSecurityInfo
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPayload {
    pub small: [u8; SMALL_PAYLOAD_SIZE],
    /// Empty unless the command asked for large output.
    pub large: Vec<u8>,
}

impl Default for OutputPayload {
    fn default() -> Self {
        Self { small: [0; SMALL_PAYLOAD_SIZE], large: Vec::new() }
    }
}

/// A completed command: the firmware status plus whatever the output
/// registers held.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: FwStatusCode,
    pub output: OutputPayload,
}

impl Response {
    pub fn into_result(self) -> Result<OutputPayload> {
        if self.status.is_success() {
            Ok(self.output)
        } else {
            Err(Error::Firmware(self.status))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxOptions {
    pub command_timeout: Duration,
    pub poll_interval: Duration,
    pub aborted_retries: usize,
    pub check_boot_status: bool,
}

impl Default for MailboxOptions {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(1),
            poll_interval: Duration::from_micros(10),
            aborted_retries: 5,
            check_boot_status: true,
        }
    }
}

impl MailboxOptions {
    pub fn with_command_timeout(mut self, value: Duration) -> Self {
        self.command_timeout = value;
        self
    }
    pub fn with_poll_interval(mut self, value: Duration) -> Self {
        self.poll_interval = value;
        self
    }
    pub fn with_aborted_retries(mut self, value: usize) -> Self {
        self.aborted_retries = value;
        self
    }
    pub fn with_check_boot_status(mut self, value: bool) -> Self {
        self.check_boot_status = value;
        self
    }
}

/// A command whose command word is built and whose nonce is written.
#[derive(Debug)]
pub struct PreparedCommand<'a> {
    command: FwCommand<'a>,
    word: CommandRegister,
}

impl<'a> PreparedCommand<'a> {
    pub fn command_word(&self) -> CommandRegister {
        self.word
    }
    pub fn is_large(&self) -> bool {
        self.word.large_payload()
    }
}

/// A command whose doorbell has been rung.
#[derive(Debug, Clone, Copy)]
pub struct SubmittedCommand {
    word: CommandRegister,
    large_output_size: usize,
}

impl SubmittedCommand {
    pub fn command_word(&self) -> CommandRegister {
        self.word
    }
}

#[pre("`payload` fits the large input window")]
fn write_large_payload<A: RegisterAccess>(
    mailbox: &mut Mailbox<A>,
    payload: &[u8],
) -> Result<()> {
    mailbox.write_large_input(payload)
}

/// Connection to one DIMM's mailbox.
#[derive(Debug)]
pub struct Dimm<A: RegisterAccess, C: Clock> {
    mailbox: Mailbox<A>,
    clock: C,
    options: MailboxOptions,
    sequence: bool,
    state: CommandState,
}

impl<A: RegisterAccess, C: Clock> Dimm<A, C> {
    pub fn new(mailbox: Mailbox<A>, clock: C, options: MailboxOptions) -> Self {
        Self {
            mailbox,
            clock,
            options,
            sequence: false,
            state: CommandState::Idle,
        }
    }

    pub fn mailbox(&self) -> &Mailbox<A> {
        &self.mailbox
    }
    pub fn mailbox_mut(&mut self) -> &mut Mailbox<A> {
        &mut self.mailbox
    }
    pub fn clock(&self) -> &C {
        &self.clock
    }
    pub fn options(&self) -> &MailboxOptions {
        &self.options
    }
    pub fn state(&self) -> CommandState {
        self.state
    }
    /// Sequence bit the next prepared command will carry.
    pub fn sequence_bit(&self) -> bool {
        self.sequence
    }

    /// Builds the command word for COMMAND and writes its nonce. Flips the
    /// sequence bit.
    pub fn prepare<'a>(
        &mut self,
        command: FwCommand<'a>,
    ) -> Result<PreparedCommand<'a>> {
        if self.state == CommandState::TimedOut {
            if !self.mailbox.read_status().complete() {
                return Err(Error::Firmware(FwStatusCode::Busy));
            }
            log::debug!(
                target: "dcpmm::passthru",
                "discarding late response to the timed out command"
            );
            self.state = CommandState::Idle;
        }
        if self.options.check_boot_status {
            let bsr = self.mailbox.read_boot_status();
            if bsr.is_unresponsive() || !bsr.mailbox_ready() {
                log::error!(
                    target: "dcpmm::passthru",
                    "mailbox not ready, boot status {:#x}",
                    u64::from(bsr)
                );
                self.state = CommandState::DeviceError;
                return Err(Error::DeviceError);
            }
        }
        let large = command.input.len() > SMALL_PAYLOAD_SIZE;
        if large && command.input.len() > self.mailbox.large_input_capacity()
        {
            return Err(Error::PayloadTooBig);
        }
        if command.large_output_size > self.mailbox.large_output_capacity() {
            return Err(Error::PayloadTooBig);
        }
        if command.requires_nonce() {
            if let Some((nonce0, nonce1)) = command.nonce {
                self.mailbox.write_nonce(nonce0, nonce1);
            }
        }
        let word = CommandRegister::new()
            .with_opcode(command.opcode as u8)
            .with_sub_opcode(command.sub_opcode)
            .with_doorbell(true)
            .with_large_payload(large)
            .with_sequence(self.sequence);
        self.sequence = !self.sequence;
        self.state = CommandState::Prepared;
        Ok(PreparedCommand { command, word })
    }

    /// Writes the payload and then rings the doorbell.
    #[pre]
    pub fn submit(
        &mut self,
        prepared: PreparedCommand<'_>,
    ) -> Result<SubmittedCommand> {
        let input = prepared.command.input;
        if prepared.is_large() {
            match #[assure(
                "`payload` fits the large input window",
                reason = "prepare checked it against the window capacity"
            )]
            write_large_payload(&mut self.mailbox, input)
            {
                Ok(()) => {}
                Err(e) => return Err(e),
            }
            self.mailbox.write_input_payload(&[])?;
        } else {
            self.mailbox.write_input_payload(input)?;
        }
        compiler_fence(Ordering::SeqCst);
        log::debug!(
            target: "dcpmm::passthru",
            "submit opcode {:#04x}/{:#04x}, {} bytes in, sequence {}",
            prepared.word.opcode(),
            prepared.word.sub_opcode(),
            input.len(),
            prepared.word.sequence()
        );
        self.mailbox.write_command(prepared.word);
        self.state = CommandState::Submitted;
        Ok(SubmittedCommand {
            word: prepared.word,
            large_output_size: prepared.command.large_output_size,
        })
    }

    /// Waits for the complete bit and collects the output.
    pub fn poll(&mut self, submitted: SubmittedCommand) -> Result<Response> {
        self.state = CommandState::Polling;
        let deadline = self
            .clock
            .now()
            .checked_add(self.options.command_timeout)
            .ok_or(Error::ArithmeticOverflow)?;
        let status = loop {
            let raw = self.mailbox.read_status_raw();
            if raw == u64::MAX {
                log::error!(
                    target: "dcpmm::passthru",
                    "status register reads all ones"
                );
                self.state = CommandState::DeviceError;
                return Err(Error::DeviceError);
            }
            let status = StatusRegister::from(raw);
            if status.complete() {
                break status;
            }
            if self.clock.now() >= deadline {
                let bsr = self.mailbox.read_boot_status();
                if bsr.is_unresponsive() {
                    log::error!(
                        target: "dcpmm::passthru",
                        "no completion and boot status {:#x}",
                        u64::from(bsr)
                    );
                    self.state = CommandState::DeviceError;
                    return Err(Error::DeviceError);
                }
                log::debug!(
                    target: "dcpmm::passthru",
                    "opcode {:#04x}/{:#04x} timed out",
                    submitted.word.opcode(),
                    submitted.word.sub_opcode()
                );
                self.state = CommandState::TimedOut;
                return Err(Error::Timeout);
            }
            self.clock.stall(self.options.poll_interval);
        };
        let code = FwStatusCode::from_byte(status.fw_status());
        let mut output = OutputPayload {
            small: self.mailbox.read_output_payload(),
            large: Vec::new(),
        };
        if submitted.large_output_size > 0 {
            let mut large = vec![0u8; submitted.large_output_size];
            self.mailbox.read_large_output(&mut large)?;
            output.large = large;
        }
        log::debug!(
            target: "dcpmm::passthru",
            "opcode {:#04x}/{:#04x} completed with {:?}",
            submitted.word.opcode(),
            submitted.word.sub_opcode(),
            code
        );
        self.state = CommandState::Completed(code);
        Ok(Response { status: code, output })
    }

    /// Prepares, submits and polls COMMAND. A firmware error status is
    /// part of the `Response`, not an `Err`.
    pub fn execute(&mut self, command: FwCommand<'_>) -> Result<Response> {
        let prepared = self.prepare(command)?;
        let submitted = self.submit(prepared)?;
        self.poll(submitted)
    }

    /// Executes COMMAND, re-preparing it as long as firmware reports
    /// Aborted, at most MAX_ATTEMPTS times (at least once). Returns the last
    /// response either way.
    pub fn execute_with_aborted_retry(
        &mut self,
        command: FwCommand<'_>,
        max_attempts: usize,
    ) -> Result<Response> {
        let attempts = max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let response = self.execute(command)?;
            if response.status != FwStatusCode::Aborted || attempt >= attempts
            {
                return Ok(response);
            }
            log::warn!(
                target: "dcpmm::passthru",
                "opcode {:#04x}/{:#04x} aborted, attempt {} of {}",
                command.opcode as u8,
                command.sub_opcode,
                attempt,
                attempts
            );
            attempt += 1;
        }
    }

    /// The mailbox entry point: executes COMMAND with the configured
    /// aborted-retry budget and turns a non-success status into an error.
    pub fn passthru(&mut self, command: FwCommand<'_>) -> Result<OutputPayload> {
        let retries = self.options.aborted_retries;
        self.execute_with_aborted_retry(command, retries)?.into_result()
    }
}
