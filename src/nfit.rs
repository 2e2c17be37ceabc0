//! NVDIMM Firmware Interface Table.

use crate::acpi::{validate_table, SubTable, SubTableWalk};
use crate::ondisk::{
    NfitDeviceHandle, NfitSubTableType, ACPI_TABLE_HEADER, NFIT_BW_REGION,
    NFIT_CONTROL_REGION, NFIT_FLUSH_HINT, NFIT_INTERLEAVE, NFIT_NVDIMM_REGION,
    NFIT_PLATFORM_CAPABILITIES, NFIT_SIGNATURE, NFIT_SMBIOS, NFIT_SPA_RANGE,
    NVM_TABLE_HEADER,
};
use crate::types::{Error, Result, TableError};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};
use core::mem::size_of;
use num_traits::FromPrimitive;

impl SubTable<NFIT_INTERLEAVE> {
    pub fn line_offsets(&self) -> impl Iterator<Item = u32> + '_ {
        self.trailing()
            .chunks_exact(4)
            .take(self.number_of_lines_described() as usize)
            .map(LittleEndian::read_u32)
    }
}

impl SubTable<NFIT_FLUSH_HINT> {
    pub fn flush_hint_addresses(&self) -> impl Iterator<Item = u64> + '_ {
        self.trailing()
            .chunks_exact(8)
            .take(self.number_of_flush_hint_addresses() as usize)
            .map(LittleEndian::read_u64)
    }
}

impl SubTable<NFIT_SMBIOS> {
    pub fn data(&self) -> &[u8] {
        self.trailing()
    }
}

/// Borrowed view of one NFIT sub-table of any kind.
#[derive(Debug, Clone, Copy)]
pub enum NfitEntry<'a> {
    SpaRange(&'a SubTable<NFIT_SPA_RANGE>),
    NvdimmRegion(&'a SubTable<NFIT_NVDIMM_REGION>),
    Interleave(&'a SubTable<NFIT_INTERLEAVE>),
    Smbios(&'a SubTable<NFIT_SMBIOS>),
    ControlRegion(&'a SubTable<NFIT_CONTROL_REGION>),
    BlockWindowRegion(&'a SubTable<NFIT_BW_REGION>),
    FlushHint(&'a SubTable<NFIT_FLUSH_HINT>),
    PlatformCapabilities(&'a SubTable<NFIT_PLATFORM_CAPABILITIES>),
}

fn fixed_size(kind: NfitSubTableType) -> usize {
    match kind {
        NfitSubTableType::SpaRange => size_of::<NFIT_SPA_RANGE>(),
        NfitSubTableType::NvdimmRegion => size_of::<NFIT_NVDIMM_REGION>(),
        NfitSubTableType::Interleave => size_of::<NFIT_INTERLEAVE>(),
        NfitSubTableType::Smbios => size_of::<NFIT_SMBIOS>(),
        NfitSubTableType::ControlRegion => size_of::<NFIT_CONTROL_REGION>(),
        NfitSubTableType::BlockWindowRegion => size_of::<NFIT_BW_REGION>(),
        NfitSubTableType::FlushHint => size_of::<NFIT_FLUSH_HINT>(),
        NfitSubTableType::PlatformCapabilities => {
            size_of::<NFIT_PLATFORM_CAPABILITIES>()
        }
    }
}

/// Checks that a recognized sub-table covers its fixed part and any
/// trailing array it declares.
fn check_sub_table(kind: NfitSubTableType, bytes: &[u8]) -> Result<()> {
    let fixed = fixed_size(kind);
    if bytes.len() < fixed {
        return Err(Error::Table(
            TableError::InconsistentHeader,
            "NFIT sub-table length",
        ));
    }
    let (declared, name) = match kind {
        NfitSubTableType::Interleave => {
            let table = SubTable::<NFIT_INTERLEAVE>::copy_from(
                &bytes[..fixed],
                "NFIT_INTERLEAVE",
            )?;
            (
                (table.number_of_lines_described() as usize).checked_mul(4),
                "NFIT_INTERLEAVE::number_of_lines_described",
            )
        }
        NfitSubTableType::FlushHint => {
            let table = SubTable::<NFIT_FLUSH_HINT>::copy_from(
                &bytes[..fixed],
                "NFIT_FLUSH_HINT",
            )?;
            (
                (table.number_of_flush_hint_addresses() as usize)
                    .checked_mul(8),
                "NFIT_FLUSH_HINT::number_of_flush_hint_addresses",
            )
        }
        _ => (Some(0), "NFIT sub-table"),
    };
    match declared.and_then(|size| size.checked_add(fixed)) {
        Some(size) if size <= bytes.len() => Ok(()),
        _ => Err(Error::Table(TableError::InconsistentHeader, name)),
    }
}

/// Region-relative device address to system physical address.
pub fn rdpa_to_spa(
    rdpa: u64,
    region: &NFIT_NVDIMM_REGION,
    spa_range: &NFIT_SPA_RANGE,
    interleave: Option<&SubTable<NFIT_INTERLEAVE>>,
) -> Result<u64> {
    let start = spa_range
        .system_physical_address_range_base()
        .checked_add(region.region_offset())
        .ok_or(Error::ArithmeticOverflow)?;
    let interleave = match interleave {
        Some(interleave) => interleave,
        None => {
            return start.checked_add(rdpa).ok_or(Error::ArithmeticOverflow)
        }
    };
    let line_size = u64::from(interleave.line_size());
    let rotation_size = line_size
        .checked_mul(u64::from(interleave.number_of_lines_described()))
        .ok_or(Error::ArithmeticOverflow)?;
    if rotation_size == 0 {
        return Err(Error::InvalidParameter);
    }
    let rotation = rdpa / rotation_size;
    let line = ((rdpa % rotation_size) / line_size) as usize;
    let line_offset = interleave.line_offsets().nth(line).ok_or(
        Error::Table(
            TableError::InconsistentHeader,
            "NFIT_INTERLEAVE::line_offsets",
        ),
    )?;
    rotation
        .checked_mul(rotation_size)
        .and_then(|x| x.checked_mul(u64::from(region.interleave_ways())))
        .and_then(|x| {
            x.checked_add(u64::from(line_offset).checked_mul(line_size)?)
        })
        .and_then(|x| x.checked_add(rdpa % line_size))
        .and_then(|x| x.checked_add(start))
        .ok_or(Error::ArithmeticOverflow)
}

/// Parsed NFIT. Every sub-table is an owned copy; nothing points back
/// into the raw bytes.
#[derive(Debug, Clone)]
pub struct ParsedFitHeader {
    header: ACPI_TABLE_HEADER,
    spa_ranges: Vec<SubTable<NFIT_SPA_RANGE>>,
    nvdimm_regions: Vec<SubTable<NFIT_NVDIMM_REGION>>,
    interleaves: Vec<SubTable<NFIT_INTERLEAVE>>,
    smbios: Vec<SubTable<NFIT_SMBIOS>>,
    control_regions: Vec<SubTable<NFIT_CONTROL_REGION>>,
    bw_regions: Vec<SubTable<NFIT_BW_REGION>>,
    flush_hints: Vec<SubTable<NFIT_FLUSH_HINT>>,
    platform_capabilities: Vec<SubTable<NFIT_PLATFORM_CAPABILITIES>>,
}

impl ParsedFitHeader {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let root_size = size_of::<NVM_TABLE_HEADER>();
        let (header, table) = validate_table(raw, NFIT_SIGNATURE, root_size)?;
        let walk = SubTableWalk::new(&table[root_size..], root_size);

        // Framing first, so a bad table never gets as far as copying.
        for item in walk.clone() {
            let (table_type, bytes) = item?;
            if let Some(kind) = NfitSubTableType::from_u16(table_type) {
                check_sub_table(kind, bytes)?;
            }
        }

        let mut result = Self {
            header,
            spa_ranges: Vec::new(),
            nvdimm_regions: Vec::new(),
            interleaves: Vec::new(),
            smbios: Vec::new(),
            control_regions: Vec::new(),
            bw_regions: Vec::new(),
            flush_hints: Vec::new(),
            platform_capabilities: Vec::new(),
        };
        for item in walk {
            let (table_type, bytes) = item?;
            result.push(table_type, bytes)?;
        }
        log::debug!(
            target: "dcpmm::nfit",
            "NFIT: {} SPA ranges, {} region mappings, {} control regions",
            result.spa_ranges.len(),
            result.nvdimm_regions.len(),
            result.control_regions.len()
        );
        Ok(result)
    }

    fn push(&mut self, table_type: u16, bytes: &[u8]) -> Result<()> {
        match NfitSubTableType::from_u16(table_type) {
            Some(NfitSubTableType::SpaRange) => self
                .spa_ranges
                .push(SubTable::copy_from(bytes, "NFIT_SPA_RANGE")?),
            Some(NfitSubTableType::NvdimmRegion) => self
                .nvdimm_regions
                .push(SubTable::copy_from(bytes, "NFIT_NVDIMM_REGION")?),
            Some(NfitSubTableType::Interleave) => self
                .interleaves
                .push(SubTable::copy_from(bytes, "NFIT_INTERLEAVE")?),
            Some(NfitSubTableType::Smbios) => {
                self.smbios.push(SubTable::copy_from(bytes, "NFIT_SMBIOS")?)
            }
            Some(NfitSubTableType::ControlRegion) => self
                .control_regions
                .push(SubTable::copy_from(bytes, "NFIT_CONTROL_REGION")?),
            Some(NfitSubTableType::BlockWindowRegion) => self
                .bw_regions
                .push(SubTable::copy_from(bytes, "NFIT_BW_REGION")?),
            Some(NfitSubTableType::FlushHint) => self
                .flush_hints
                .push(SubTable::copy_from(bytes, "NFIT_FLUSH_HINT")?),
            Some(NfitSubTableType::PlatformCapabilities) => {
                self.platform_capabilities.push(SubTable::copy_from(
                    bytes,
                    "NFIT_PLATFORM_CAPABILITIES",
                )?)
            }
            None => log::warn!(
                target: "dcpmm::nfit",
                "skipping unknown NFIT sub-table type {} ({} bytes)",
                table_type,
                bytes.len()
            ),
        }
        Ok(())
    }

    pub fn header(&self) -> &ACPI_TABLE_HEADER {
        &self.header
    }
    pub fn spa_ranges(&self) -> &[SubTable<NFIT_SPA_RANGE>] {
        &self.spa_ranges
    }
    pub fn nvdimm_regions(&self) -> &[SubTable<NFIT_NVDIMM_REGION>] {
        &self.nvdimm_regions
    }
    pub fn interleaves(&self) -> &[SubTable<NFIT_INTERLEAVE>] {
        &self.interleaves
    }
    pub fn smbios(&self) -> &[SubTable<NFIT_SMBIOS>] {
        &self.smbios
    }
    pub fn control_regions(&self) -> &[SubTable<NFIT_CONTROL_REGION>] {
        &self.control_regions
    }
    pub fn bw_regions(&self) -> &[SubTable<NFIT_BW_REGION>] {
        &self.bw_regions
    }
    pub fn flush_hints(&self) -> &[SubTable<NFIT_FLUSH_HINT>] {
        &self.flush_hints
    }
    pub fn platform_capabilities(
        &self,
    ) -> &[SubTable<NFIT_PLATFORM_CAPABILITIES>] {
        &self.platform_capabilities
    }

    pub fn count(&self, kind: NfitSubTableType) -> usize {
        match kind {
            NfitSubTableType::SpaRange => self.spa_ranges.len(),
            NfitSubTableType::NvdimmRegion => self.nvdimm_regions.len(),
            NfitSubTableType::Interleave => self.interleaves.len(),
            NfitSubTableType::Smbios => self.smbios.len(),
            NfitSubTableType::ControlRegion => self.control_regions.len(),
            NfitSubTableType::BlockWindowRegion => self.bw_regions.len(),
            NfitSubTableType::FlushHint => self.flush_hints.len(),
            NfitSubTableType::PlatformCapabilities => {
                self.platform_capabilities.len()
            }
        }
    }

    pub fn at(&self, kind: NfitSubTableType, index: usize) -> Option<NfitEntry<'_>> {
        Some(match kind {
            NfitSubTableType::SpaRange => {
                NfitEntry::SpaRange(self.spa_ranges.get(index)?)
            }
            NfitSubTableType::NvdimmRegion => {
                NfitEntry::NvdimmRegion(self.nvdimm_regions.get(index)?)
            }
            NfitSubTableType::Interleave => {
                NfitEntry::Interleave(self.interleaves.get(index)?)
            }
            NfitSubTableType::Smbios => {
                NfitEntry::Smbios(self.smbios.get(index)?)
            }
            NfitSubTableType::ControlRegion => {
                NfitEntry::ControlRegion(self.control_regions.get(index)?)
            }
            NfitSubTableType::BlockWindowRegion => {
                NfitEntry::BlockWindowRegion(self.bw_regions.get(index)?)
            }
            NfitSubTableType::FlushHint => {
                NfitEntry::FlushHint(self.flush_hints.get(index)?)
            }
            NfitSubTableType::PlatformCapabilities => {
                NfitEntry::PlatformCapabilities(
                    self.platform_capabilities.get(index)?,
                )
            }
        })
    }

    pub fn spa_range(&self, index: u16) -> Option<&SubTable<NFIT_SPA_RANGE>> {
        self.spa_ranges.iter().find(|t| t.spa_range_index() == index)
    }

    pub fn interleave(&self, index: u16) -> Option<&SubTable<NFIT_INTERLEAVE>> {
        self.interleaves.iter().find(|t| t.interleave_index() == index)
    }

    pub fn control_region(
        &self,
        index: u16,
    ) -> Option<&SubTable<NFIT_CONTROL_REGION>> {
        self.control_regions
            .iter()
            .find(|t| t.control_region_index() == index)
    }

    pub fn control_region_for_region(
        &self,
        region: &NFIT_NVDIMM_REGION,
    ) -> Option<&SubTable<NFIT_CONTROL_REGION>> {
        self.control_region(region.control_region_index())
    }

    pub fn bw_region_for_control_region(
        &self,
        control_region: &NFIT_CONTROL_REGION,
    ) -> Option<&SubTable<NFIT_BW_REGION>> {
        let index = control_region.control_region_index();
        self.bw_regions.iter().find(|t| t.control_region_index() == index)
    }

    pub fn flush_hint_for_device(
        &self,
        handle: NfitDeviceHandle,
    ) -> Option<&SubTable<NFIT_FLUSH_HINT>> {
        self.flush_hints.iter().find(|t| t.device_handle() == handle)
    }

    /// Control regions of every mapping of the DIMM with physical id PID,
    /// each listed once.
    pub fn control_regions_for_physical_id(
        &self,
        pid: u16,
    ) -> Vec<&SubTable<NFIT_CONTROL_REGION>> {
        let mut result: Vec<&SubTable<NFIT_CONTROL_REGION>> = Vec::new();
        for region in
            self.nvdimm_regions.iter().filter(|r| r.nvdimm_physical_id() == pid)
        {
            if let Some(control_region) = self.control_region_for_region(region)
            {
                let index = control_region.control_region_index();
                if !result.iter().any(|c| c.control_region_index() == index) {
                    result.push(control_region);
                }
            }
        }
        result
    }

    /// First mapping of the DIMM with physical id PID, optionally narrowed
    /// to an address range type and to a SPA range index.
    pub fn nvdimm_region_for_physical_id(
        &self,
        pid: u16,
        address_range_type: Option<&[u8; 16]>,
        spa_range_index: Option<u16>,
    ) -> Result<&SubTable<NFIT_NVDIMM_REGION>> {
        self.nvdimm_regions
            .iter()
            .filter(|r| r.nvdimm_physical_id() == pid)
            .filter(|r| match spa_range_index {
                Some(index) => r.spa_range_index() == index,
                None => true,
            })
            .find(|r| match address_range_type {
                Some(guid) => self
                    .spa_range(r.spa_range_index())
                    .map_or(false, |spa| {
                        spa.address_range_type_guid() == *guid
                    }),
                None => true,
            })
            .ok_or(Error::NotFound)
    }

    /// Interleave description of REGION, if it is interleaved at all.
    pub fn interleave_for_region(
        &self,
        region: &NFIT_NVDIMM_REGION,
    ) -> Result<Option<&SubTable<NFIT_INTERLEAVE>>> {
        match region.interleave_index() {
            0 => Ok(None),
            index => self.interleave(index).map(Some).ok_or(Error::NotFound),
        }
    }

    pub fn rdpa_to_spa(
        &self,
        rdpa: u64,
        region: &NFIT_NVDIMM_REGION,
    ) -> Result<u64> {
        let spa_range = self
            .spa_range(region.spa_range_index())
            .ok_or(Error::NotFound)?;
        rdpa_to_spa(rdpa, region, spa_range, self.interleave_for_region(region)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acpi::build_table;
    use zerocopy::AsBytes;

    fn interleave_bytes(index: u16, line_size: u32, offsets: &[u32]) -> Vec<u8> {
        let mut table = NFIT_INTERLEAVE::default();
        table.set_interleave_index(index);
        table.set_line_size(line_size);
        table.set_number_of_lines_described(offsets.len() as u32);
        table.header.set_length((16 + offsets.len() * 4) as u16);
        let mut bytes = table.as_bytes().to_vec();
        for offset in offsets {
            bytes.extend_from_slice(&offset.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn rdpa_translation_follows_interleave() -> Result<()> {
        let mut spa = NFIT_SPA_RANGE::default();
        spa.set_spa_range_index(1);
        spa.set_system_physical_address_range_base(0x1_0000_0000);
        let mut region = NFIT_NVDIMM_REGION::default();
        region.set_spa_range_index(1);
        region.set_interleave_index(1);
        region.set_interleave_ways(2);
        region.set_region_offset(0x1000);
        let mut body = spa.as_bytes().to_vec();
        body.extend_from_slice(region.as_bytes());
        body.extend_from_slice(&interleave_bytes(1, 256, &[0, 2]));
        let nfit = ParsedFitHeader::parse(&build_table(
            NFIT_SIGNATURE,
            1,
            [0; 4],
            &body,
        ))?;
        let region = &nfit.nvdimm_regions()[0];
        let base = 0x1_0000_1000u64;
        // line 0 of rotation 0
        assert!(nfit.rdpa_to_spa(0x10, region)? == base + 0x10);
        // line 1 sits two lines further into the set
        assert!(nfit.rdpa_to_spa(0x110, region)? == base + 0x200 + 0x10);
        // rotation 1 skips a whole rotation per way
        assert!(nfit.rdpa_to_spa(0x204, region)? == base + 0x400 + 0x4);
        Ok(())
    }

    #[test]
    fn rdpa_translation_flat() -> Result<()> {
        let mut spa = NFIT_SPA_RANGE::default();
        spa.set_system_physical_address_range_base(0x8000);
        let mut region = NFIT_NVDIMM_REGION::default();
        region.set_region_offset(0x100);
        assert!(rdpa_to_spa(0x42, &region, &spa, None)? == 0x8142);
        Ok(())
    }

    #[test]
    fn zero_rotation_is_rejected() -> Result<()> {
        let bytes = interleave_bytes(1, 0, &[0]);
        let interleave =
            SubTable::<NFIT_INTERLEAVE>::copy_from(&bytes, "NFIT_INTERLEAVE")?;
        let spa = NFIT_SPA_RANGE::default();
        let region = NFIT_NVDIMM_REGION::default();
        assert!(matches!(
            rdpa_to_spa(0, &region, &spa, Some(&interleave)),
            Err(Error::InvalidParameter)
        ));
        Ok(())
    }

    #[test]
    fn interleave_with_too_many_lines_is_rejected() {
        let mut bytes = interleave_bytes(1, 256, &[0, 1]);
        bytes[8] = 3; // claims three line offsets but carries two
        let raw = build_table(NFIT_SIGNATURE, 1, [0; 4], &bytes);
        assert!(matches!(
            ParsedFitHeader::parse(&raw),
            Err(Error::Table(TableError::InconsistentHeader, _))
        ));
    }

    #[test]
    fn lookups_by_physical_id() -> Result<()> {
        let mut body = Vec::new();
        for (pid, control, spa_index) in [(7u16, 1u16, 1u16), (7, 1, 2), (8, 2, 1)]
        {
            let mut region = NFIT_NVDIMM_REGION::default();
            region.set_nvdimm_physical_id(pid);
            region.set_control_region_index(control);
            region.set_spa_range_index(spa_index);
            body.extend_from_slice(region.as_bytes());
        }
        for index in [1u16, 2] {
            let mut control = NFIT_CONTROL_REGION::default();
            control.set_control_region_index(index);
            body.extend_from_slice(control.as_bytes());
        }
        let mut spa = NFIT_SPA_RANGE::default();
        spa.set_spa_range_index(2);
        spa.set_address_range_type_guid([0x66; 16]);
        body.extend_from_slice(spa.as_bytes());
        let nfit = ParsedFitHeader::parse(&build_table(
            NFIT_SIGNATURE,
            1,
            [0; 4],
            &body,
        ))?;
        assert!(nfit.control_regions_for_physical_id(7).len() == 1);
        let region =
            nfit.nvdimm_region_for_physical_id(7, Some(&[0x66; 16]), None)?;
        assert!(region.spa_range_index() == 2);
        let region = nfit.nvdimm_region_for_physical_id(7, None, Some(1))?;
        assert!(region.control_region_index() == 1);
        assert!(matches!(
            nfit.nvdimm_region_for_physical_id(9, None, None),
            Err(Error::NotFound)
        ));
        Ok(())
    }
}
