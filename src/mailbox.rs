//! The OS mailbox of a DIMM: command, nonce, status and payload registers
//! plus the large payload windows.

use crate::interleave::{
    read_interleaved, write_interleaved, InterleavedBuffer, MemorySegments,
};
use crate::nfit::{rdpa_to_spa, ParsedFitHeader};
use crate::ondisk::{NFIT_INTERLEAVE, NFIT_NVDIMM_REGION, NFIT_SPA_RANGE};
use crate::acpi::SubTable;
use crate::types::{Error, Result};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};
use modular_bitfield::prelude::*;

pub const OS_MAILBOX_OFFSET: u64 = 0x10_0000;
pub const MAILBOX_COMMAND_OFFSET: u64 = 0x000;
pub const MAILBOX_NONCE0_OFFSET: u64 = 0x040;
pub const MAILBOX_NONCE1_OFFSET: u64 = 0x080;
pub const MAILBOX_INPUT_PAYLOAD_OFFSET: u64 = 0x0C0;
pub const MAILBOX_STATUS_OFFSET: u64 = 0x4C0;
pub const MAILBOX_OUTPUT_PAYLOAD_OFFSET: u64 = 0x500;
/// Payload registers are 8 bytes wide but one cache line apart.
pub const MAILBOX_PAYLOAD_STRIDE: u64 = 0x40;
pub const MAILBOX_PAYLOAD_REGISTERS: usize = 16;
pub const SMALL_PAYLOAD_SIZE: usize = MAILBOX_PAYLOAD_REGISTERS * 8;

pub const BOOT_STATUS_REGISTER_OFFSET: u64 = 0x2_0000;

pub const LARGE_INPUT_OFFSET: u64 = 0x20_0000;
pub const LARGE_OUTPUT_OFFSET: u64 = 0x30_0000;
pub const LARGE_PAYLOAD_SIZE: usize = 0x10_0000;

#[bitfield(bits = 64)]
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandRegister {
    #[skip]
    __: B32,
    pub opcode: B8,
    pub sub_opcode: B8,
    pub doorbell: bool,
    pub large_payload: bool,
    #[skip]
    __: B13,
    pub sequence: bool,
}

#[bitfield(bits = 64)]
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusRegister {
    pub complete: bool,
    #[skip]
    __: B7,
    pub fw_status: B8,
    #[skip]
    __: B48,
}

/// Boot status register.
#[bitfield(bits = 64)]
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BootStatusRegister {
    pub major_checkpoint: B8,
    pub minor_checkpoint: B8,
    pub media_ready: B2,
    pub ddrt_io_init_complete: bool,
    pub pcr_lock: bool,
    pub mailbox_ready: bool,
    pub watchdog_status: bool,
    pub first_fast_refresh_complete: bool,
    pub credit_ready: bool,
    pub media_disabled: bool,
    pub opt_in_enabled: bool,
    pub opt_in_was_enabled: bool,
    pub dram_ready: B2,
    pub reboot_required: bool,
    pub link_failure: bool,
    pub svn_downgrade_opt_in_enabled: bool,
    #[skip]
    __: B2,
    pub dt_status: B2,
    #[skip]
    __: B28,
}

pub const BSR_CHECKPOINT_INIT_COMPLETE: u8 = 0xF0;
pub const BSR_CHECKPOINT_INIT_FAILURE: u8 = 0xA1;
pub const BSR_CHECKPOINT_CPU_EXCEPTION: u8 = 0xE1;
/// `media_ready`/`dram_ready` value for "ready".
pub const BSR_READY: u8 = 1;

impl BootStatusRegister {
    /// A register that reads as all zeroes or all ones is not backed by a
    /// responsive DIMM.
    pub fn is_unresponsive(self) -> bool {
        matches!(u64::from(self), 0 | u64::MAX)
    }

    pub fn init_failed(self) -> bool {
        matches!(
            self.major_checkpoint(),
            BSR_CHECKPOINT_INIT_FAILURE | BSR_CHECKPOINT_CPU_EXCEPTION
        )
    }
}

/// System physical address of every segment of one large payload
/// window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowLayout {
    pub line_size: u64,
    pub segments: Vec<u64>,
}

impl WindowLayout {
    /// Bytes the firmware reads from (or writes to) this window.
    pub fn capacity(&self) -> usize {
        (self.line_size as usize).saturating_mul(self.segments.len())
    }

    /// Buffer in ordinary memory shaped like this window: one line per
    /// mapped segment.
    pub fn buffer(&self) -> MemorySegments {
        let line_size = self.line_size as usize;
        MemorySegments::new(line_size, self.segments.len(), line_size)
    }
}

/// Where the mailbox registers of one DIMM live in the system physical
/// address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxLayout {
    pub command: u64,
    pub nonce0: u64,
    pub nonce1: u64,
    pub input_payload: [u64; MAILBOX_PAYLOAD_REGISTERS],
    pub status: u64,
    pub output_payload: [u64; MAILBOX_PAYLOAD_REGISTERS],
    pub boot_status: u64,
    pub large_input: WindowLayout,
    pub large_output: WindowLayout,
}

fn payload_offsets(first: u64) -> [u64; MAILBOX_PAYLOAD_REGISTERS] {
    let mut result = [0; MAILBOX_PAYLOAD_REGISTERS];
    for (i, offset) in result.iter_mut().enumerate() {
        *offset = OS_MAILBOX_OFFSET + first + (i as u64) * MAILBOX_PAYLOAD_STRIDE;
    }
    result
}

impl MailboxLayout {
    fn from_translation(
        translate: impl Fn(u64) -> Result<u64>,
        line_size: u64,
    ) -> Result<Self> {
        if line_size == 0 {
            return Err(Error::InvalidParameter);
        }
        let window = |offset: u64| -> Result<WindowLayout> {
            let segments = (0..LARGE_PAYLOAD_SIZE as u64 / line_size)
                .map(|i| translate(offset + i * line_size))
                .collect::<Result<Vec<_>>>()?;
            Ok(WindowLayout { line_size, segments })
        };
        let mut input_payload = payload_offsets(MAILBOX_INPUT_PAYLOAD_OFFSET);
        for address in input_payload.iter_mut() {
            *address = translate(*address)?;
        }
        let mut output_payload = payload_offsets(MAILBOX_OUTPUT_PAYLOAD_OFFSET);
        for address in output_payload.iter_mut() {
            *address = translate(*address)?;
        }
        Ok(Self {
            command: translate(OS_MAILBOX_OFFSET + MAILBOX_COMMAND_OFFSET)?,
            nonce0: translate(OS_MAILBOX_OFFSET + MAILBOX_NONCE0_OFFSET)?,
            nonce1: translate(OS_MAILBOX_OFFSET + MAILBOX_NONCE1_OFFSET)?,
            input_payload,
            status: translate(OS_MAILBOX_OFFSET + MAILBOX_STATUS_OFFSET)?,
            output_payload,
            boot_status: translate(BOOT_STATUS_REGISTER_OFFSET)?,
            large_input: window(LARGE_INPUT_OFFSET)?,
            large_output: window(LARGE_OUTPUT_OFFSET)?,
        })
    }

    /// Layout of a control region mapped contiguously at BASE.
    pub fn flat(base: u64) -> Result<Self> {
        Self::from_translation(
            |rdpa| base.checked_add(rdpa).ok_or(Error::ArithmeticOverflow),
            LARGE_PAYLOAD_SIZE as u64,
        )
    }

    /// Layout of the control region REGION maps, translated through its
    /// SPA range and interleave set.
    pub fn from_region(
        region: &NFIT_NVDIMM_REGION,
        spa_range: &NFIT_SPA_RANGE,
        interleave: Option<&SubTable<NFIT_INTERLEAVE>>,
    ) -> Result<Self> {
        let line_size = match interleave {
            Some(interleave) => u64::from(interleave.line_size()),
            None => LARGE_PAYLOAD_SIZE as u64,
        };
        Self::from_translation(
            |rdpa| rdpa_to_spa(rdpa, region, spa_range, interleave),
            line_size,
        )
    }

    pub fn from_nfit(
        nfit: &ParsedFitHeader,
        region: &NFIT_NVDIMM_REGION,
    ) -> Result<Self> {
        let spa_range = nfit
            .spa_range(region.spa_range_index())
            .ok_or(Error::NotFound)?;
        Self::from_region(region, spa_range, nfit.interleave_for_region(region)?)
    }
}

/// Register and window access the platform layer provides.
pub trait RegisterAccess {
    type Window: InterleavedBuffer;

    fn read_register64(&mut self, address: u64) -> u64;
    fn write_register64(&mut self, address: u64, value: u64);
    fn large_input(&mut self) -> &mut Self::Window;
    fn large_output(&mut self) -> &mut Self::Window;
}

/// Typed access to one DIMM's OS mailbox.
#[derive(Debug)]
pub struct Mailbox<A: RegisterAccess> {
    access: A,
    layout: MailboxLayout,
}

impl<A: RegisterAccess> Mailbox<A> {
    pub fn new(access: A, layout: MailboxLayout) -> Self {
        Self { access, layout }
    }

    pub fn layout(&self) -> &MailboxLayout {
        &self.layout
    }
    pub fn access(&self) -> &A {
        &self.access
    }
    pub fn access_mut(&mut self) -> &mut A {
        &mut self.access
    }

    pub fn write_command(&mut self, command: CommandRegister) {
        self.access.write_register64(self.layout.command, command.into())
    }

    pub fn write_nonce(&mut self, nonce0: u64, nonce1: u64) {
        self.access.write_register64(self.layout.nonce0, nonce0);
        self.access.write_register64(self.layout.nonce1, nonce1);
    }

    /// Writes all sixteen input registers; PAYLOAD is zero-padded.
    pub fn write_input_payload(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > SMALL_PAYLOAD_SIZE {
            return Err(Error::PayloadTooBig);
        }
        let mut buf = [0u8; SMALL_PAYLOAD_SIZE];
        buf[..payload.len()].copy_from_slice(payload);
        for (i, chunk) in buf.chunks_exact(8).enumerate() {
            self.access.write_register64(
                self.layout.input_payload[i],
                LittleEndian::read_u64(chunk),
            );
        }
        Ok(())
    }

    pub fn read_output_payload(&mut self) -> [u8; SMALL_PAYLOAD_SIZE] {
        let mut result = [0u8; SMALL_PAYLOAD_SIZE];
        for (i, chunk) in result.chunks_exact_mut(8).enumerate() {
            let value =
                self.access.read_register64(self.layout.output_payload[i]);
            LittleEndian::write_u64(chunk, value);
        }
        result
    }

    pub fn read_status(&mut self) -> StatusRegister {
        StatusRegister::from(self.access.read_register64(self.layout.status))
    }

    /// Raw status word, for telling an unresponsive DIMM apart.
    pub fn read_status_raw(&mut self) -> u64 {
        self.access.read_register64(self.layout.status)
    }

    pub fn read_boot_status(&mut self) -> BootStatusRegister {
        BootStatusRegister::from(
            self.access.read_register64(self.layout.boot_status),
        )
    }

    /// Usable bytes of the large input window: the smaller of what the
    /// layout maps and what the platform buffer holds.
    pub fn large_input_capacity(&mut self) -> usize {
        let mapped = self.layout.large_input.capacity();
        mapped.min(self.access.large_input().capacity())
    }

    pub fn large_output_capacity(&mut self) -> usize {
        let mapped = self.layout.large_output.capacity();
        mapped.min(self.access.large_output().capacity())
    }

    pub fn write_large_input(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.large_input_capacity() {
            return Err(Error::PayloadTooBig);
        }
        write_interleaved(payload, self.access.large_input(), payload.len());
        Ok(())
    }

    pub fn read_large_output(&mut self, dst: &mut [u8]) -> Result<()> {
        if dst.len() > self.large_output_capacity() {
            return Err(Error::PayloadTooBig);
        }
        let window = self.access.large_output();
        let len = dst.len();
        read_interleaved(dst, window, len);
        Ok(())
    }
}
