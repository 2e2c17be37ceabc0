//! In-memory DIMM with scripted firmware, for tests.

use crate::interleave::{
    read_interleaved, write_interleaved, InterleavedBuffer, MemorySegments,
};
use crate::mailbox::{
    BootStatusRegister, CommandRegister, MailboxLayout, RegisterAccess,
    StatusRegister, BSR_CHECKPOINT_INIT_COMPLETE, BSR_READY,
    SMALL_PAYLOAD_SIZE,
};
use crate::types::{FwStatusCode, Result};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};

pub(crate) const MOCK_WINDOW_LINE: usize = 64;
pub(crate) const MOCK_WINDOW_SEGMENTS: usize = 4;
pub(crate) const MOCK_WINDOW_SEGMENT_SIZE: usize = 1024;

/// What the firmware saw when the doorbell rang.
#[derive(Debug, Clone)]
pub(crate) struct Submission {
    pub command: CommandRegister,
    pub nonce: (u64, u64),
    pub input: [u8; SMALL_PAYLOAD_SIZE],
    /// Whole large input window, only captured for large commands.
    pub large_input: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
pub(crate) struct MockReply {
    complete: bool,
    status: u8,
    output: Vec<u8>,
    large_output: Vec<u8>,
}

impl MockReply {
    pub fn status(status: FwStatusCode) -> Self {
        Self {
            complete: true,
            status: status as u8,
            output: Vec::new(),
            large_output: Vec::new(),
        }
    }
    pub fn success() -> Self {
        Self::status(FwStatusCode::Success)
    }
    /// Firmware never sets the complete bit.
    pub fn hang() -> Self {
        Self { complete: false, ..Self::success() }
    }
    pub fn with_output(mut self, output: &[u8]) -> Self {
        self.output = output.to_vec();
        self
    }
    pub fn with_large_output(mut self, output: &[u8]) -> Self {
        self.large_output = output.to_vec();
        self
    }
}

type Responder = Box<dyn FnMut(&Submission) -> MockReply>;

pub(crate) struct MockMailbox {
    layout: MailboxLayout,
    registers: BTreeMap<u64, u64>,
    large_input: MemorySegments,
    large_output: MemorySegments,
    responder: Responder,
    pub submissions: Vec<Submission>,
    /// Command-register writes in order, doorbell or not.
    pub command_writes: Vec<u64>,
}

impl MockMailbox {
    pub fn new(
        responder: impl FnMut(&Submission) -> MockReply + 'static,
    ) -> Result<Self> {
        Ok(Self::with_layout(MailboxLayout::flat(0)?, responder))
    }

    /// Registers answer at the addresses LAYOUT names.
    pub fn with_layout(
        layout: MailboxLayout,
        responder: impl FnMut(&Submission) -> MockReply + 'static,
    ) -> Self {
        let mut registers = BTreeMap::new();
        let bsr = BootStatusRegister::new()
            .with_major_checkpoint(BSR_CHECKPOINT_INIT_COMPLETE)
            .with_media_ready(BSR_READY)
            .with_mailbox_ready(true)
            .with_dram_ready(BSR_READY);
        registers.insert(layout.boot_status, u64::from(bsr));
        let window = || {
            MemorySegments::new(
                MOCK_WINDOW_LINE,
                MOCK_WINDOW_SEGMENTS,
                MOCK_WINDOW_SEGMENT_SIZE,
            )
        };
        Self {
            layout,
            registers,
            large_input: window(),
            large_output: window(),
            responder: Box::new(responder),
            submissions: Vec::new(),
            command_writes: Vec::new(),
        }
    }

    /// Firmware that answers every command with STATUS.
    pub fn answering(status: FwStatusCode) -> Result<Self> {
        Self::new(move |_| MockReply::status(status))
    }

    pub fn layout(&self) -> &MailboxLayout {
        &self.layout
    }

    pub fn set_boot_status(&mut self, value: u64) {
        self.registers.insert(self.layout.boot_status, value);
    }

    pub fn set_status(&mut self, value: u64) {
        self.registers.insert(self.layout.status, value);
    }

    pub fn sequence_bits(&self) -> Vec<bool> {
        self.submissions.iter().map(|s| s.command.sequence()).collect()
    }

    fn register(&self, address: u64) -> u64 {
        self.registers.get(&address).copied().unwrap_or(0)
    }

    fn ring(&mut self, command: CommandRegister) {
        let mut input = [0u8; SMALL_PAYLOAD_SIZE];
        for (i, chunk) in input.chunks_exact_mut(8).enumerate() {
            LittleEndian::write_u64(
                chunk,
                self.register(self.layout.input_payload[i]),
            );
        }
        let large_input = if command.large_payload() {
            let mut buf = vec![0u8; self.large_input.capacity()];
            let len = buf.len();
            read_interleaved(&mut buf, &self.large_input, len);
            Some(buf)
        } else {
            None
        };
        let submission = Submission {
            command,
            nonce: (
                self.register(self.layout.nonce0),
                self.register(self.layout.nonce1),
            ),
            input,
            large_input,
        };
        self.set_status(0);
        let reply = (self.responder)(&submission);
        self.submissions.push(submission);
        if !reply.complete {
            return;
        }
        let mut output = [0u8; SMALL_PAYLOAD_SIZE];
        output[..reply.output.len()].copy_from_slice(&reply.output);
        for (i, chunk) in output.chunks_exact(8).enumerate() {
            self.registers.insert(
                self.layout.output_payload[i],
                LittleEndian::read_u64(chunk),
            );
        }
        let len = reply.large_output.len();
        write_interleaved(&reply.large_output, &mut self.large_output, len);
        let status = StatusRegister::new()
            .with_complete(true)
            .with_fw_status(reply.status);
        self.set_status(status.into());
    }
}

impl RegisterAccess for MockMailbox {
    type Window = MemorySegments;

    fn read_register64(&mut self, address: u64) -> u64 {
        self.register(address)
    }

    fn write_register64(&mut self, address: u64, value: u64) {
        self.registers.insert(address, value);
        if address == self.layout.command {
            self.command_writes.push(value);
            let command = CommandRegister::from(value);
            if command.doorbell() {
                self.ring(command);
            }
        }
    }

    fn large_input(&mut self) -> &mut MemorySegments {
        &mut self.large_input
    }

    fn large_output(&mut self) -> &mut MemorySegments {
        &mut self.large_output
    }
}
