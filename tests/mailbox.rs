use dcpmm::interleave::{
    read_interleaved, write_interleaved, InterleavedBuffer, MemorySegments,
};
use dcpmm::mailbox::{
    BootStatusRegister, CommandRegister, StatusRegister,
    BSR_CHECKPOINT_INIT_COMPLETE, BSR_READY,
};
use dcpmm::passthru::GetLogSubOpcode;
use dcpmm::{
    Dimm, Error, FwCommand, FwStatusCode, Mailbox, MailboxLayout,
    MailboxOptions, ManualClock, Opcode, RegisterAccess, Result,
};
use std::collections::{HashMap, VecDeque};

/// DIMM whose firmware echoes the large input window into the large
/// output window and answers with scripted status codes.
struct EchoDimm {
    layout: MailboxLayout,
    registers: HashMap<u64, u64>,
    large_input: MemorySegments,
    large_output: MemorySegments,
    replies: VecDeque<FwStatusCode>,
    doorbells: Vec<CommandRegister>,
}

impl EchoDimm {
    fn new(replies: &[FwStatusCode], segment_size: usize) -> Result<Self> {
        let layout = MailboxLayout::flat(0x8000_0000)?;
        let mut registers = HashMap::new();
        let bsr = BootStatusRegister::new()
            .with_major_checkpoint(BSR_CHECKPOINT_INIT_COMPLETE)
            .with_media_ready(BSR_READY)
            .with_mailbox_ready(true);
        registers.insert(layout.boot_status, u64::from(bsr));
        Ok(Self {
            layout,
            registers,
            large_input: MemorySegments::new(64, 2, segment_size),
            large_output: MemorySegments::new(64, 2, segment_size),
            replies: replies.iter().copied().collect(),
            doorbells: Vec::new(),
        })
    }

    fn ring(&mut self, command: CommandRegister) {
        self.doorbells.push(command);
        if command.large_payload() {
            let len = self.large_input.capacity();
            let mut staged = vec![0u8; len];
            read_interleaved(&mut staged, &self.large_input, len);
            write_interleaved(&staged, &mut self.large_output, len);
        }
        let status = self.replies.pop_front().unwrap_or(FwStatusCode::Success);
        let value = StatusRegister::new()
            .with_complete(true)
            .with_fw_status(status as u8);
        self.registers.insert(self.layout.status, value.into());
    }
}

impl RegisterAccess for EchoDimm {
    type Window = MemorySegments;

    fn read_register64(&mut self, address: u64) -> u64 {
        self.registers.get(&address).copied().unwrap_or(0)
    }

    fn write_register64(&mut self, address: u64, value: u64) {
        self.registers.insert(address, value);
        if address == self.layout.command {
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

fn echo_dimm(replies: &[FwStatusCode]) -> Result<Dimm<EchoDimm, ManualClock>> {
    echo_dimm_with_segments(replies, 2048)
}

fn echo_dimm_with_segments(
    replies: &[FwStatusCode],
    segment_size: usize,
) -> Result<Dimm<EchoDimm, ManualClock>> {
    let access = EchoDimm::new(replies, segment_size)?;
    let layout = access.layout.clone();
    Ok(Dimm::new(
        Mailbox::new(access, layout),
        ManualClock::new(),
        MailboxOptions::default(),
    ))
}

#[test]
fn sequence_bit_alternates() -> Result<()> {
    let mut dimm = echo_dimm(&[])?;
    for _ in 0..4 {
        dimm.passthru(FwCommand::new(Opcode::IdentifyDimm, 0))?;
    }
    let bits = dimm
        .mailbox()
        .access()
        .doorbells
        .iter()
        .map(|command| command.sequence())
        .collect::<Vec<_>>();
    assert!(bits == [false, true, false, true]);
    Ok(())
}

#[test]
fn aborted_commands_are_retried() -> Result<()> {
    let mut dimm = echo_dimm(&[FwStatusCode::Aborted, FwStatusCode::Aborted])?;
    dimm.passthru(FwCommand::get_log(GetLogSubOpcode::SmartHealth))?;
    assert!(dimm.mailbox().access().doorbells.len() == 3);

    let mut dimm = echo_dimm(&[FwStatusCode::Aborted; 8])?;
    assert!(matches!(
        dimm.passthru(FwCommand::get_log(GetLogSubOpcode::SmartHealth)),
        Err(Error::Firmware(FwStatusCode::Aborted))
    ));
    assert!(dimm.mailbox().access().doorbells.len() == 5);
    Ok(())
}

#[test]
fn large_payload_goes_through_interleaved_windows() -> Result<()> {
    let mut dimm = echo_dimm(&[])?;
    let image = (0..3000u32).map(|i| (i % 251) as u8).collect::<Vec<_>>();
    let output = dimm.passthru(
        FwCommand::new(Opcode::UpdateFirmware, 0)
            .with_input(&image)
            .with_large_output(image.len()),
    )?;
    assert!(output.large == image);
    let doorbells = &dimm.mailbox().access().doorbells;
    assert!(doorbells.len() == 1 && doorbells[0].large_payload());
    Ok(())
}

#[test]
fn payload_larger_than_window_is_refused() -> Result<()> {
    let mut dimm = echo_dimm(&[])?;
    let image = [0u8; 4097];
    assert!(matches!(
        dimm.passthru(FwCommand::new(Opcode::UpdateFirmware, 0).with_input(&image)),
        Err(Error::PayloadTooBig)
    ));
    assert!(dimm.mailbox().access().doorbells.is_empty());
    Ok(())
}

#[test]
fn window_with_ragged_segments_refuses_instead_of_panicking() -> Result<()> {
    // Two 200-byte segments of 64-byte lines hold 384 bytes, not 400.
    let mut dimm = echo_dimm_with_segments(&[], 200)?;
    assert!(matches!(
        dimm.execute(FwCommand::new(Opcode::UpdateFirmware, 0).with_input(&[7; 400])),
        Err(Error::PayloadTooBig)
    ));
    assert!(dimm.mailbox().access().doorbells.is_empty());
    let image = [7u8; 384];
    let output = dimm.passthru(
        FwCommand::new(Opcode::UpdateFirmware, 0)
            .with_input(&image)
            .with_large_output(image.len()),
    )?;
    assert!(output.large[..] == image[..]);
    Ok(())
}
