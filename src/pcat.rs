//! Platform Configuration Attributes Table.
//!
//! Several sub-tables changed shape between revision 0.1/0.2 and
//! revision 1.1 of the table; each of those is decoded into a sum type
//! chosen by the table revision.

use crate::acpi::{validate_table, SubTable, SubTableWalk};
use crate::ondisk::{
    InterleaveFormat, InterleaveFormat3, PcatSubTableType,
    SupportedMemoryModes, SupportedMemoryModes3, ACPI_REVISION_0_1,
    ACPI_REVISION_0_2, ACPI_REVISION_1_1, ACPI_TABLE_HEADER,
    CONFIG_MANAGEMENT_ATTRIBUTES_EXTENSION, DIE_SKU_INFO,
    MEMORY_INTERLEAVE_CAPABILITY_INFO, MEMORY_INTERLEAVE_CAPABILITY_INFO3,
    NVM_TABLE_HEADER, PCAT_SIGNATURE, PLATFORM_CAPABILITY_INFO,
    PLATFORM_CAPABILITY_INFO3, RECONFIGURATION_INPUT_VALIDATION_INTERFACE,
    SOCKET_SKU_INFO,
};
use crate::types::{Error, Result, TableError};
use alloc::vec::Vec;
use byteorder::{ByteOrder, LittleEndian};
use core::mem::size_of;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum MemoryMode {
    #[cfg_attr(feature = "serde", serde(rename = "1LM"))]
    OneLm,
    #[cfg_attr(feature = "serde", serde(rename = "2LM"))]
    TwoLm,
    AppDirect,
    AppDirectCached,
    Storage,
    #[cfg_attr(feature = "serde", serde(rename = "SubNUMA"))]
    SubNuma,
}

impl MemoryMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::OneLm => "1LM",
            Self::TwoLm => "2LM",
            Self::AppDirect => "AppDirect",
            Self::AppDirectCached => "AppDirectCached",
            Self::Storage => "Storage",
            Self::SubNuma => "SubNUMA",
        }
    }
}

/// Memory modes in capability-bit order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct MemoryModeSet {
    modes: Vec<MemoryMode>,
}

impl MemoryModeSet {
    pub fn contains(&self, mode: MemoryMode) -> bool {
        self.modes.contains(&mode)
    }
    pub fn modes(&self) -> &[MemoryMode] {
        &self.modes
    }
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.modes.iter().map(|mode| mode.name())
    }
    fn with(mut self, present: bool, mode: MemoryMode) -> Self {
        if present {
            self.modes.push(mode);
        }
        self
    }
}

impl From<SupportedMemoryModes> for MemoryModeSet {
    fn from(source: SupportedMemoryModes) -> Self {
        Self::default()
            .with(source.one_lm(), MemoryMode::OneLm)
            .with(source.memory(), MemoryMode::TwoLm)
            .with(source.app_direct(), MemoryMode::AppDirect)
            .with(source.app_direct_cached(), MemoryMode::AppDirectCached)
            .with(source.storage(), MemoryMode::Storage)
            .with(source.sub_numa_cluster(), MemoryMode::SubNuma)
    }
}

impl From<SupportedMemoryModes3> for MemoryModeSet {
    fn from(source: SupportedMemoryModes3) -> Self {
        Self::default()
            .with(source.one_lm(), MemoryMode::OneLm)
            .with(source.memory(), MemoryMode::TwoLm)
            .with(source.app_direct(), MemoryMode::AppDirect)
    }
}

/// Two-bit volatile memory mode as selected by (or allowed in) the BIOS.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum VolatileMemoryMode {
    OneLm = 0,
    TwoLm = 1,
    Mixed = 2,
}

impl VolatileMemoryMode {
    fn decode(value: u8) -> Result<Self> {
        Self::from_u8(value).ok_or(Error::Table(
            TableError::InconsistentHeader,
            "PLATFORM_CAPABILITY_INFO::current_memory_mode",
        ))
    }
}

#[derive(Debug, Clone)]
pub enum PlatformCapabilityInfo {
    V2(SubTable<PLATFORM_CAPABILITY_INFO>),
    V3(SubTable<PLATFORM_CAPABILITY_INFO3>),
}

impl PlatformCapabilityInfo {
    pub fn mgmt_sw_config_input_support(&self) -> bool {
        let value = match self {
            Self::V2(t) => t.mgmt_sw_config_input_support(),
            Self::V3(t) => t.mgmt_sw_config_input_support(),
        };
        value & 1 != 0
    }
    pub fn memory_mode_capabilities(&self) -> MemoryModeSet {
        match self {
            Self::V2(t) => t.memory_mode_capabilities().into(),
            Self::V3(t) => t.memory_mode_capabilities().into(),
        }
    }
    pub fn current_volatile_mode(&self) -> Result<VolatileMemoryMode> {
        VolatileMemoryMode::decode(match self {
            Self::V2(t) => t.current_memory_mode().current_volatile_mode(),
            Self::V3(t) => t.current_memory_mode().current_volatile_mode(),
        })
    }
    pub fn allowed_volatile_mode(&self) -> Result<VolatileMemoryMode> {
        VolatileMemoryMode::decode(match self {
            Self::V2(t) => t.current_memory_mode().allowed_volatile_mode(),
            Self::V3(t) => t.current_memory_mode().allowed_volatile_mode(),
        })
    }
    /// Whether App Direct is the allowed persistent mode.
    pub fn app_direct_allowed(&self) -> bool {
        let mode = match self {
            Self::V2(t) => t.current_memory_mode().persistent_mode(),
            Self::V3(t) => t.current_memory_mode().persistent_mode(),
        };
        mode == 1
    }
}

impl SubTable<MEMORY_INTERLEAVE_CAPABILITY_INFO> {
    pub fn interleave_formats(
        &self,
    ) -> impl Iterator<Item = InterleaveFormat> + '_ {
        self.trailing()
            .chunks_exact(4)
            .take(self.number_of_formats_supported() as usize)
            .map(|x| InterleaveFormat::from(LittleEndian::read_u32(x)))
    }
}

impl SubTable<MEMORY_INTERLEAVE_CAPABILITY_INFO3> {
    pub fn interleave_formats(
        &self,
    ) -> impl Iterator<Item = InterleaveFormat3> + '_ {
        self.trailing()
            .chunks_exact(4)
            .take(self.number_of_formats_supported() as usize)
            .map(|x| InterleaveFormat3::from(LittleEndian::read_u32(x)))
    }
}

#[derive(Debug, Clone)]
pub enum MemoryInterleaveCapabilityInfo {
    V2(SubTable<MEMORY_INTERLEAVE_CAPABILITY_INFO>),
    V3(SubTable<MEMORY_INTERLEAVE_CAPABILITY_INFO3>),
}

impl MemoryInterleaveCapabilityInfo {
    /// One of the PCAT memory mode numbers (0 1LM, 1 2LM, 3 App Direct,
    /// 4 App Direct cached).
    pub fn memory_mode(&self) -> u8 {
        match self {
            Self::V2(t) => t.memory_mode(),
            Self::V3(t) => t.memory_mode(),
        }
    }
    pub fn interleave_alignment_size(&self) -> u16 {
        match self {
            Self::V2(t) => t.interleave_alignment_size(),
            Self::V3(t) => t.interleave_alignment_size(),
        }
    }
    pub fn number_of_formats_supported(&self) -> u16 {
        match self {
            Self::V2(t) => t.number_of_formats_supported(),
            Self::V3(t) => t.number_of_formats_supported(),
        }
    }
}

/// Memory SKU limits, per socket before revision 1.1 and per die after.
#[derive(Debug, Clone)]
pub enum SkuInfo {
    Socket(SubTable<SOCKET_SKU_INFO>),
    Die(SubTable<DIE_SKU_INFO>),
}

impl SkuInfo {
    pub fn socket_id(&self) -> u16 {
        match self {
            Self::Socket(t) => t.socket_id(),
            Self::Die(t) => t.socket_id(),
        }
    }
    pub fn die_id(&self) -> Option<u16> {
        match self {
            Self::Socket(_) => None,
            Self::Die(t) => Some(t.die_id()),
        }
    }
    pub fn mapped_memory_size_limit(&self) -> u64 {
        match self {
            Self::Socket(t) => t.mapped_memory_size_limit(),
            Self::Die(t) => t.mapped_memory_size_limit(),
        }
    }
    pub fn total_memory_size_mapped_to_spa(&self) -> u64 {
        match self {
            Self::Socket(t) => t.total_memory_size_mapped_to_spa(),
            Self::Die(t) => t.total_memory_size_mapped_to_spa(),
        }
    }
    pub fn caching_memory_size(&self) -> u64 {
        match self {
            Self::Socket(t) => t.caching_memory_size(),
            Self::Die(t) => t.caching_memory_size(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PcatEntry<'a> {
    PlatformCapabilityInfo(&'a PlatformCapabilityInfo),
    MemoryInterleaveCapabilityInfo(&'a MemoryInterleaveCapabilityInfo),
    RuntimeInterfaceValidation(
        &'a SubTable<RECONFIGURATION_INPUT_VALIDATION_INTERFACE>,
    ),
    ConfigManagementAttributesExtension(
        &'a SubTable<CONFIG_MANAGEMENT_ATTRIBUTES_EXTENSION>,
    ),
    SkuInfo(&'a SkuInfo),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    V2,
    V3,
}

impl Layout {
    fn from_revision(revision: u8) -> Result<Self> {
        match revision {
            ACPI_REVISION_0_1 | ACPI_REVISION_0_2 => Ok(Self::V2),
            ACPI_REVISION_1_1 => Ok(Self::V3),
            _ => Err(Error::Table(
                TableError::UnsupportedRevision,
                "ACPI_TABLE_HEADER::revision",
            )),
        }
    }

    fn fixed_size(self, kind: PcatSubTableType) -> usize {
        match (kind, self) {
            (PcatSubTableType::PlatformCapabilityInfo, Self::V2) => {
                size_of::<PLATFORM_CAPABILITY_INFO>()
            }
            (PcatSubTableType::PlatformCapabilityInfo, Self::V3) => {
                size_of::<PLATFORM_CAPABILITY_INFO3>()
            }
            (PcatSubTableType::MemoryInterleaveCapabilityInfo, Self::V2) => {
                size_of::<MEMORY_INTERLEAVE_CAPABILITY_INFO>()
            }
            (PcatSubTableType::MemoryInterleaveCapabilityInfo, Self::V3) => {
                size_of::<MEMORY_INTERLEAVE_CAPABILITY_INFO3>()
            }
            (PcatSubTableType::RuntimeInterfaceValidation, _) => {
                size_of::<RECONFIGURATION_INPUT_VALIDATION_INTERFACE>()
            }
            (PcatSubTableType::ConfigManagementAttributesExtension, _) => {
                size_of::<CONFIG_MANAGEMENT_ATTRIBUTES_EXTENSION>()
            }
            (PcatSubTableType::SkuInfo, Self::V2) => size_of::<SOCKET_SKU_INFO>(),
            (PcatSubTableType::SkuInfo, Self::V3) => size_of::<DIE_SKU_INFO>(),
        }
    }

    fn check_sub_table(self, kind: PcatSubTableType, bytes: &[u8]) -> Result<()> {
        let fixed = self.fixed_size(kind);
        if bytes.len() < fixed {
            return Err(Error::Table(
                TableError::InconsistentHeader,
                "PCAT sub-table length",
            ));
        }
        if kind != PcatSubTableType::MemoryInterleaveCapabilityInfo {
            return Ok(());
        }
        // The format count is the last field of either layout.
        let formats = LittleEndian::read_u16(&bytes[fixed - 2..fixed]) as usize;
        if fixed + formats * 4 > bytes.len() {
            return Err(Error::Table(
                TableError::InconsistentHeader,
                "MEMORY_INTERLEAVE_CAPABILITY_INFO::number_of_formats_supported",
            ));
        }
        Ok(())
    }
}

/// Parsed PCAT.
#[derive(Debug, Clone)]
pub struct ParsedPcatHeader {
    header: ACPI_TABLE_HEADER,
    platform_capability_info: Vec<PlatformCapabilityInfo>,
    memory_interleave_capability_info: Vec<MemoryInterleaveCapabilityInfo>,
    runtime_interface_validation:
        Vec<SubTable<RECONFIGURATION_INPUT_VALIDATION_INTERFACE>>,
    config_management_attributes:
        Vec<SubTable<CONFIG_MANAGEMENT_ATTRIBUTES_EXTENSION>>,
    sku_info: Vec<SkuInfo>,
}

impl ParsedPcatHeader {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let root_size = size_of::<NVM_TABLE_HEADER>();
        let (header, table) = validate_table(raw, PCAT_SIGNATURE, root_size)?;
        let layout = Layout::from_revision(header.revision())?;
        let walk = SubTableWalk::new(&table[root_size..], root_size);

        for item in walk.clone() {
            let (table_type, bytes) = item?;
            if let Some(kind) = PcatSubTableType::from_u16(table_type) {
                layout.check_sub_table(kind, bytes)?;
            }
        }

        let mut result = Self {
            header,
            platform_capability_info: Vec::new(),
            memory_interleave_capability_info: Vec::new(),
            runtime_interface_validation: Vec::new(),
            config_management_attributes: Vec::new(),
            sku_info: Vec::new(),
        };
        for item in walk {
            let (table_type, bytes) = item?;
            result.push(layout, table_type, bytes)?;
        }
        log::debug!(
            target: "dcpmm::pcat",
            "PCAT revision {:#x}: {} capability, {} interleave, {} SKU tables",
            header.revision(),
            result.platform_capability_info.len(),
            result.memory_interleave_capability_info.len(),
            result.sku_info.len()
        );
        Ok(result)
    }

    fn push(&mut self, layout: Layout, table_type: u16, bytes: &[u8]) -> Result<()> {
        match (PcatSubTableType::from_u16(table_type), layout) {
            (Some(PcatSubTableType::PlatformCapabilityInfo), Layout::V2) => {
                self.platform_capability_info.push(PlatformCapabilityInfo::V2(
                    SubTable::copy_from(bytes, "PLATFORM_CAPABILITY_INFO")?,
                ))
            }
            (Some(PcatSubTableType::PlatformCapabilityInfo), Layout::V3) => {
                self.platform_capability_info.push(PlatformCapabilityInfo::V3(
                    SubTable::copy_from(bytes, "PLATFORM_CAPABILITY_INFO3")?,
                ))
            }
            (Some(PcatSubTableType::MemoryInterleaveCapabilityInfo), Layout::V2) => {
                self.memory_interleave_capability_info.push(
                    MemoryInterleaveCapabilityInfo::V2(SubTable::copy_from(
                        bytes,
                        "MEMORY_INTERLEAVE_CAPABILITY_INFO",
                    )?),
                )
            }
            (Some(PcatSubTableType::MemoryInterleaveCapabilityInfo), Layout::V3) => {
                self.memory_interleave_capability_info.push(
                    MemoryInterleaveCapabilityInfo::V3(SubTable::copy_from(
                        bytes,
                        "MEMORY_INTERLEAVE_CAPABILITY_INFO3",
                    )?),
                )
            }
            (Some(PcatSubTableType::RuntimeInterfaceValidation), _) => {
                self.runtime_interface_validation.push(SubTable::copy_from(
                    bytes,
                    "RECONFIGURATION_INPUT_VALIDATION_INTERFACE",
                )?)
            }
            (Some(PcatSubTableType::ConfigManagementAttributesExtension), _) => {
                self.config_management_attributes.push(SubTable::copy_from(
                    bytes,
                    "CONFIG_MANAGEMENT_ATTRIBUTES_EXTENSION",
                )?)
            }
            (Some(PcatSubTableType::SkuInfo), Layout::V2) => self.sku_info.push(
                SkuInfo::Socket(SubTable::copy_from(bytes, "SOCKET_SKU_INFO")?),
            ),
            (Some(PcatSubTableType::SkuInfo), Layout::V3) => self
                .sku_info
                .push(SkuInfo::Die(SubTable::copy_from(bytes, "DIE_SKU_INFO")?)),
            (None, _) => log::warn!(
                target: "dcpmm::pcat",
                "skipping unknown PCAT sub-table type {} ({} bytes)",
                table_type,
                bytes.len()
            ),
        }
        Ok(())
    }

    pub fn header(&self) -> &ACPI_TABLE_HEADER {
        &self.header
    }
    pub fn platform_capability_info(&self) -> &[PlatformCapabilityInfo] {
        &self.platform_capability_info
    }
    pub fn memory_interleave_capability_info(
        &self,
    ) -> &[MemoryInterleaveCapabilityInfo] {
        &self.memory_interleave_capability_info
    }
    pub fn runtime_interface_validation(
        &self,
    ) -> &[SubTable<RECONFIGURATION_INPUT_VALIDATION_INTERFACE>] {
        &self.runtime_interface_validation
    }
    pub fn config_management_attributes(
        &self,
    ) -> &[SubTable<CONFIG_MANAGEMENT_ATTRIBUTES_EXTENSION>] {
        &self.config_management_attributes
    }
    pub fn sku_info(&self) -> &[SkuInfo] {
        &self.sku_info
    }

    pub fn count(&self, kind: PcatSubTableType) -> usize {
        match kind {
            PcatSubTableType::PlatformCapabilityInfo => {
                self.platform_capability_info.len()
            }
            PcatSubTableType::MemoryInterleaveCapabilityInfo => {
                self.memory_interleave_capability_info.len()
            }
            PcatSubTableType::RuntimeInterfaceValidation => {
                self.runtime_interface_validation.len()
            }
            PcatSubTableType::ConfigManagementAttributesExtension => {
                self.config_management_attributes.len()
            }
            PcatSubTableType::SkuInfo => self.sku_info.len(),
        }
    }

    pub fn at(&self, kind: PcatSubTableType, index: usize) -> Option<PcatEntry<'_>> {
        Some(match kind {
            PcatSubTableType::PlatformCapabilityInfo => {
                PcatEntry::PlatformCapabilityInfo(
                    self.platform_capability_info.get(index)?,
                )
            }
            PcatSubTableType::MemoryInterleaveCapabilityInfo => {
                PcatEntry::MemoryInterleaveCapabilityInfo(
                    self.memory_interleave_capability_info.get(index)?,
                )
            }
            PcatSubTableType::RuntimeInterfaceValidation => {
                PcatEntry::RuntimeInterfaceValidation(
                    self.runtime_interface_validation.get(index)?,
                )
            }
            PcatSubTableType::ConfigManagementAttributesExtension => {
                PcatEntry::ConfigManagementAttributesExtension(
                    self.config_management_attributes.get(index)?,
                )
            }
            PcatSubTableType::SkuInfo => {
                PcatEntry::SkuInfo(self.sku_info.get(index)?)
            }
        })
    }

    /// The platform capability table; the BIOS publishes exactly one.
    fn single_platform_capability_info(&self) -> Result<&PlatformCapabilityInfo> {
        match self.platform_capability_info.as_slice() {
            [info] => Ok(info),
            _ => Err(Error::Table(
                TableError::InconsistentHeader,
                "PLATFORM_CAPABILITY_INFO count",
            )),
        }
    }

    pub fn memory_mode_capabilities(&self) -> Result<MemoryModeSet> {
        Ok(self.single_platform_capability_info()?.memory_mode_capabilities())
    }

    /// Volatile memory mode the BIOS chose at boot.
    pub fn current_memory_mode(&self) -> Result<VolatileMemoryMode> {
        self.single_platform_capability_info()?.current_volatile_mode()
    }

    /// Volatile memory mode selected in BIOS setup. 2LM implies 1LM is
    /// allowed too.
    pub fn allowed_memory_mode(&self) -> Result<VolatileMemoryMode> {
        self.single_platform_capability_info()?.allowed_volatile_mode()
    }

    /// First SKU entry for SOCKET_ID. Die-granular entries match on their
    /// socket.
    pub fn sku_for_socket(&self, socket_id: u16) -> Option<&SkuInfo> {
        self.sku_info.iter().find(|sku| sku.socket_id() == socket_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acpi::build_table;
    use zerocopy::AsBytes;

    fn capability_v2(modes: u8, current: u8) -> PLATFORM_CAPABILITY_INFO {
        let mut table = PLATFORM_CAPABILITY_INFO::default();
        table.set_mgmt_sw_config_input_support(0x01);
        table.set_memory_mode_capabilities(modes);
        table.set_current_memory_mode(current);
        table
    }

    #[test]
    fn capability_bits_decode_in_order() -> Result<()> {
        let raw = build_table(
            PCAT_SIGNATURE,
            ACPI_REVISION_0_1,
            [0; 4],
            capability_v2(0x07, 0).as_bytes(),
        );
        let pcat = ParsedPcatHeader::parse(&raw)?;
        assert!(pcat.count(PcatSubTableType::PlatformCapabilityInfo) == 1);
        let modes = pcat.memory_mode_capabilities()?;
        assert!(modes.names().eq(["1LM", "2LM", "AppDirect"]));
        assert!(pcat.platform_capability_info()[0].mgmt_sw_config_input_support());
        Ok(())
    }

    #[test]
    fn revision_selects_layout() -> Result<()> {
        let mut capability = PLATFORM_CAPABILITY_INFO3::default();
        capability.set_memory_mode_capabilities(0x3F);
        // current 2LM, App Direct, allowed 1LM or 2LM
        capability.set_current_memory_mode(0x15);
        let mut sku = DIE_SKU_INFO::default();
        sku.set_socket_id(1);
        sku.set_die_id(2);
        let mut body = capability.as_bytes().to_vec();
        body.extend_from_slice(sku.as_bytes());
        let raw = build_table(PCAT_SIGNATURE, ACPI_REVISION_1_1, [0; 4], &body);
        let pcat = ParsedPcatHeader::parse(&raw)?;
        assert!(matches!(
            pcat.platform_capability_info()[0],
            PlatformCapabilityInfo::V3(_)
        ));
        // Only three mode bits exist in the 1.1 layout.
        assert!(pcat.memory_mode_capabilities()?.modes().len() == 3);
        assert!(pcat.current_memory_mode()? == VolatileMemoryMode::TwoLm);
        assert!(pcat.allowed_memory_mode()? == VolatileMemoryMode::TwoLm);
        assert!(pcat.platform_capability_info()[0].app_direct_allowed());
        let sku = pcat.sku_for_socket(1).ok_or(Error::NotFound)?;
        assert!(sku.die_id() == Some(2));
        assert!(pcat.sku_for_socket(0).is_none());
        Ok(())
    }

    #[test]
    fn unknown_revision_is_rejected() {
        let raw = build_table(PCAT_SIGNATURE, 0x12, [0; 4], &[]);
        assert!(matches!(
            ParsedPcatHeader::parse(&raw),
            Err(Error::Table(TableError::UnsupportedRevision, _))
        ));
    }

    #[test]
    fn memory_mode_needs_exactly_one_capability_table() -> Result<()> {
        let raw = build_table(PCAT_SIGNATURE, ACPI_REVISION_0_2, [0; 4], &[]);
        let pcat = ParsedPcatHeader::parse(&raw)?;
        assert!(matches!(
            pcat.current_memory_mode(),
            Err(Error::Table(TableError::InconsistentHeader, _))
        ));
        let mut body = capability_v2(1, 0).as_bytes().to_vec();
        body.extend_from_slice(capability_v2(1, 0).as_bytes());
        let raw = build_table(PCAT_SIGNATURE, ACPI_REVISION_0_2, [0; 4], &body);
        let pcat = ParsedPcatHeader::parse(&raw)?;
        assert!(pcat.allowed_memory_mode().is_err());
        Ok(())
    }

    #[test]
    fn interleave_formats_follow_the_fixed_part() -> Result<()> {
        let mut info = MEMORY_INTERLEAVE_CAPABILITY_INFO::default();
        info.set_memory_mode(3);
        info.set_number_of_formats_supported(2);
        info.header.set_length(12 + 8);
        let mut body = info.as_bytes().to_vec();
        body.extend_from_slice(&0x8000_0101u32.to_le_bytes());
        body.extend_from_slice(&0x0000_0202u32.to_le_bytes());
        let raw = build_table(PCAT_SIGNATURE, ACPI_REVISION_0_1, [0; 4], &body);
        let pcat = ParsedPcatHeader::parse(&raw)?;
        match pcat.at(PcatSubTableType::MemoryInterleaveCapabilityInfo, 0) {
            Some(PcatEntry::MemoryInterleaveCapabilityInfo(
                MemoryInterleaveCapabilityInfo::V2(info),
            )) => {
                let formats: Vec<_> = info.interleave_formats().collect();
                assert!(formats.len() == 2);
                assert!(formats[0].recommended());
                assert!(formats[1].channel_interleave_size() == 2);
            }
            _ => return Err(Error::NotFound),
        }

        // Claiming a third format overruns the sub-table.
        let mut broken = body.clone();
        broken[10] = 3;
        let raw = build_table(PCAT_SIGNATURE, ACPI_REVISION_0_1, [0; 4], &broken);
        assert!(matches!(
            ParsedPcatHeader::parse(&raw),
            Err(Error::Table(TableError::InconsistentHeader, _))
        ));
        Ok(())
    }
}
