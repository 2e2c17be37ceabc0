#![allow(non_camel_case_types)]

use crate::struct_accessors::{make_accessors, Getter, Setter};
use byteorder::LittleEndian;
use core::mem::{replace, size_of};
use four_cc::FourCC;
use modular_bitfield::prelude::*;
use num_derive::FromPrimitive;
use paste::paste;
use static_assertions::const_assert_eq;
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned, U16, U32, U64};

/// Given *BUF (a collection of multiple items), retrieves the first of the items and returns it after advancing *BUF to the next item.
/// If the item cannot be parsed, returns None and does not advance.
pub fn take_header_from_collection<'a, T: Sized + FromBytes>(
    buf: &mut &'a [u8],
) -> Option<&'a T> {
    let xbuf = replace(&mut *buf, &mut []);
    match LayoutVerified::<_, T>::new_from_prefix(xbuf) {
        Some((item, xbuf)) => {
            *buf = xbuf;
            Some(item.into_ref())
        }
        None => {
            *buf = xbuf;
            None
        }
    }
}

/// Given *BUF (a collection of multiple items), retrieves the first of the items and returns it after advancing *BUF to the next item.
/// If the item cannot be parsed, returns None and does not advance.
pub fn take_body_from_collection<'a>(
    buf: &mut &'a [u8],
    size: usize,
) -> Option<&'a [u8]> {
    let xbuf = replace(&mut *buf, &mut []);
    if xbuf.len() >= size {
        let (item, xbuf) = xbuf.split_at(size);
        *buf = xbuf;
        Some(item)
    } else {
        *buf = xbuf;
        None
    }
}

pub const NFIT_SIGNATURE: FourCC = FourCC(*b"NFIT");
pub const PCAT_SIGNATURE: FourCC = FourCC(*b"PCAT");
pub const PMTT_SIGNATURE: FourCC = FourCC(*b"PMTT");

/// Revision bytes. 1.1 splits into major (low nibble) and minor (high
/// nibble); 0.1 and 0.2 are only ever compared whole.
pub const ACPI_REVISION_0_1: u8 = 0x01;
pub const ACPI_REVISION_0_2: u8 = 0x02;
pub const ACPI_REVISION_1_1: u8 = 0x11;

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct ACPI_TABLE_HEADER {
        signature: [u8; 4] : pub get FourCC : pub set FourCC,
        length: U32<LittleEndian> : pub get u32 : pub set u32,
        revision: u8 : pub get u8 : pub set u8,
        checksum: u8 : pub get u8 : pub set u8,
        oem_id: [u8; 6] : pub get [u8; 6] : pub set [u8; 6],
        oem_table_id: U64<LittleEndian> : pub get u64 : pub set u64,
        oem_revision: U32<LittleEndian> : pub get u32 : pub set u32,
        creator_id: U32<LittleEndian> : pub get u32 : pub set u32,
        creator_revision: U32<LittleEndian> : pub get u32 : pub set u32,
    }
}

impl ACPI_TABLE_HEADER {
    pub fn revision_major(&self) -> u8 {
        self.revision & 0xF
    }
    pub fn revision_minor(&self) -> u8 {
        self.revision >> 4
    }
}

impl Default for ACPI_TABLE_HEADER {
    fn default() -> Self {
        Self {
            signature: *b"    ", // probably invalid
            length: (size_of::<Self>() as u32).into(),
            revision: ACPI_REVISION_0_1,
            checksum: 0, // probably invalid
            oem_id: *b"INTEL ",
            oem_table_id: 0u64.into(),
            oem_revision: 0u32.into(),
            creator_id: 0u32.into(),
            creator_revision: 0u32.into(),
        }
    }
}

/// Root of NFIT, PCAT and revision 1 PMTT.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug, Default)]
#[repr(C, packed)]
pub struct NVM_TABLE_HEADER {
    pub header: ACPI_TABLE_HEADER,
    _reserved: [u8; 4],
}

make_accessors! {
    /// Root of revision 2 PMTT.
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PMTT_TABLE2_HEADER {
        pub header: ACPI_TABLE_HEADER,
        number_of_memory_devices: U32<LittleEndian> : pub get u32 : pub set u32,
    }
}

make_accessors! {
    /// Leads every NFIT and PCAT sub-table.
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct SUB_TABLE_HEADER {
        table_type: U16<LittleEndian> : pub get u16 : pub set u16,
        length: U16<LittleEndian> : pub get u16 : pub set u16,
    }
}

impl SUB_TABLE_HEADER {
    pub(crate) fn new(table_type: u16, length: usize) -> Self {
        Self {
            table_type: table_type.into(),
            length: (length as u16).into(),
        }
    }
}

#[repr(u16)]
#[derive(Debug, PartialEq, Eq, FromPrimitive, Copy, Clone)]
pub enum NfitSubTableType {
    SpaRange = 0,
    NvdimmRegion = 1,
    Interleave = 2,
    Smbios = 3,
    ControlRegion = 4,
    BlockWindowRegion = 5,
    FlushHint = 6,
    PlatformCapabilities = 7,
}

#[bitfield(bits = 32)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NfitDeviceHandle {
    pub dimm_number: B4,
    pub memory_channel: B4,
    pub memory_controller_id: B4,
    pub socket_id: B4,
    pub node_controller_id: B12,
    #[skip]
    __: B4,
}

impl Getter<NfitDeviceHandle> for U32<LittleEndian> {
    fn get1(self) -> NfitDeviceHandle {
        NfitDeviceHandle::from(self.get())
    }
}
impl Setter<NfitDeviceHandle> for U32<LittleEndian> {
    fn set1(&mut self, value: NfitDeviceHandle) {
        self.set(u32::from(value))
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct NFIT_SPA_RANGE {
        pub header: SUB_TABLE_HEADER,
        spa_range_index: U16<LittleEndian> : pub get u16 : pub set u16,
        flags: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: [u8; 4],
        proximity_domain: U32<LittleEndian> : pub get u32 : pub set u32,
        address_range_type_guid: [u8; 16] : pub get [u8; 16] : pub set [u8; 16],
        system_physical_address_range_base: U64<LittleEndian> : pub get u64 : pub set u64,
        system_physical_address_range_length: U64<LittleEndian> : pub get u64 : pub set u64,
        address_range_memory_mapping_attribute: U64<LittleEndian> : pub get u64 : pub set u64,
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct NFIT_NVDIMM_REGION {
        pub header: SUB_TABLE_HEADER,
        device_handle: U32<LittleEndian> : pub get NfitDeviceHandle : pub set NfitDeviceHandle,
        nvdimm_physical_id: U16<LittleEndian> : pub get u16 : pub set u16,
        nvdimm_region_id: U16<LittleEndian> : pub get u16 : pub set u16,
        spa_range_index: U16<LittleEndian> : pub get u16 : pub set u16,
        control_region_index: U16<LittleEndian> : pub get u16 : pub set u16,
        region_size: U64<LittleEndian> : pub get u64 : pub set u64,
        region_offset: U64<LittleEndian> : pub get u64 : pub set u64,
        physical_address_region_base: U64<LittleEndian> : pub get u64 : pub set u64,
        interleave_index: U16<LittleEndian> : pub get u16 : pub set u16,
        interleave_ways: U16<LittleEndian> : pub get u16 : pub set u16,
        state_flags: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: [u8; 2],
    }
}

make_accessors! {
    /// Followed by `number_of_lines_described` u32 line offsets.
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct NFIT_INTERLEAVE {
        pub header: SUB_TABLE_HEADER,
        interleave_index: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: [u8; 2],
        number_of_lines_described: U32<LittleEndian> : pub get u32 : pub set u32,
        line_size: U32<LittleEndian> : pub get u32 : pub set u32,
    }
}

/// Followed by SMBIOS data.
#[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
#[repr(C, packed)]
pub struct NFIT_SMBIOS {
    pub header: SUB_TABLE_HEADER,
    _reserved: [u8; 4],
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct NFIT_CONTROL_REGION {
        pub header: SUB_TABLE_HEADER,
        control_region_index: U16<LittleEndian> : pub get u16 : pub set u16,
        vendor_id: U16<LittleEndian> : pub get u16 : pub set u16,
        device_id: U16<LittleEndian> : pub get u16 : pub set u16,
        revision_id: U16<LittleEndian> : pub get u16 : pub set u16,
        subsystem_vendor_id: U16<LittleEndian> : pub get u16 : pub set u16,
        subsystem_device_id: U16<LittleEndian> : pub get u16 : pub set u16,
        subsystem_revision_id: U16<LittleEndian> : pub get u16 : pub set u16,
        valid_fields: u8 : pub get u8 : pub set u8,
        manufacturing_location: u8 : pub get u8 : pub set u8,
        manufacturing_date: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: [u8; 2],
        serial_number: U32<LittleEndian> : pub get u32 : pub set u32,
        region_format_interface_code: U16<LittleEndian> : pub get u16 : pub set u16,
        number_of_block_control_windows: U16<LittleEndian> : pub get u16 : pub set u16,
        size_of_block_control_window: U64<LittleEndian> : pub get u64 : pub set u64,
        command_register_offset: U64<LittleEndian> : pub get u64 : pub set u64,
        size_of_command_register: U64<LittleEndian> : pub get u64 : pub set u64,
        status_register_offset: U64<LittleEndian> : pub get u64 : pub set u64,
        size_of_status_register: U64<LittleEndian> : pub get u64 : pub set u64,
        control_region_flag: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved1: [u8; 6],
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct NFIT_BW_REGION {
        pub header: SUB_TABLE_HEADER,
        control_region_index: U16<LittleEndian> : pub get u16 : pub set u16,
        number_of_block_data_windows: U16<LittleEndian> : pub get u16 : pub set u16,
        block_data_window_start_offset: U64<LittleEndian> : pub get u64 : pub set u64,
        size_of_block_data_window: U64<LittleEndian> : pub get u64 : pub set u64,
        block_accessible_memory_capacity: U64<LittleEndian> : pub get u64 : pub set u64,
        beginning_address_of_first_block: U64<LittleEndian> : pub get u64 : pub set u64,
    }
}

make_accessors! {
    /// Followed by `number_of_flush_hint_addresses` u64 addresses.
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct NFIT_FLUSH_HINT {
        pub header: SUB_TABLE_HEADER,
        device_handle: U32<LittleEndian> : pub get NfitDeviceHandle : pub set NfitDeviceHandle,
        number_of_flush_hint_addresses: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: [u8; 6],
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct NFIT_PLATFORM_CAPABILITIES {
        pub header: SUB_TABLE_HEADER,
        highest_valid_capability: u8 : pub get u8 : pub set u8,
        _reserved: [u8; 3],
        capabilities: U32<LittleEndian> : pub get u32 : pub set u32, // bit 0: CPU cache flush; bit 1: memory controller flush; bit 2: mirroring
        _reserved1: [u8; 4],
    }
}

#[repr(u16)]
#[derive(Debug, PartialEq, Eq, FromPrimitive, Copy, Clone)]
pub enum PcatSubTableType {
    PlatformCapabilityInfo = 0,
    MemoryInterleaveCapabilityInfo = 1,
    RuntimeInterfaceValidation = 2,
    ConfigManagementAttributesExtension = 3,
    SkuInfo = 6,
}

/// Memory modes a revision 0.1/0.2 platform supports.
#[bitfield(bits = 8)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupportedMemoryModes {
    pub one_lm: bool,
    pub memory: bool,
    pub app_direct: bool,
    pub app_direct_cached: bool,
    pub storage: bool,
    pub sub_numa_cluster: bool,
    #[skip]
    __: B2,
}

#[bitfield(bits = 8)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupportedMemoryModes3 {
    pub one_lm: bool,
    pub memory: bool,
    pub app_direct: bool,
    #[skip]
    __: B5,
}

#[bitfield(bits = 8)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentMemoryMode {
    pub current_volatile_mode: B2,
    pub persistent_mode: B2,
    pub allowed_volatile_mode: B2,
    #[skip]
    __: B1,
    pub sub_numa_cluster: bool,
}

#[bitfield(bits = 8)]
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CurrentMemoryMode3 {
    pub current_volatile_mode: B2,
    pub persistent_mode: B2,
    pub allowed_volatile_mode: B2,
    #[skip]
    __: B2,
}

/// Zero in either field means no limit.
#[bitfield(bits = 16)]
#[repr(u16)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MaxInterleaveSets {
    pub per_die: B4,
    pub per_dcpmm: B4,
    #[skip]
    __: B8,
}

#[bitfield(bits = 32)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterleaveFormat {
    pub channel_interleave_size: B8,
    pub imc_interleave_size: B8,
    pub number_of_channel_ways: B9,
    #[skip]
    __: B6,
    pub recommended: bool,
}

#[bitfield(bits = 32)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterleaveFormat3 {
    pub interleave_map: B16,
    pub recommended: bool,
    #[skip]
    __: B15,
}

impl Getter<SupportedMemoryModes> for u8 {
    fn get1(self) -> SupportedMemoryModes {
        SupportedMemoryModes::from(self)
    }
}
impl Getter<SupportedMemoryModes3> for u8 {
    fn get1(self) -> SupportedMemoryModes3 {
        SupportedMemoryModes3::from(self)
    }
}
impl Getter<CurrentMemoryMode> for u8 {
    fn get1(self) -> CurrentMemoryMode {
        CurrentMemoryMode::from(self)
    }
}
impl Getter<CurrentMemoryMode3> for u8 {
    fn get1(self) -> CurrentMemoryMode3 {
        CurrentMemoryMode3::from(self)
    }
}
impl Getter<MaxInterleaveSets> for U16<LittleEndian> {
    fn get1(self) -> MaxInterleaveSets {
        MaxInterleaveSets::from(self.get())
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PLATFORM_CAPABILITY_INFO {
        pub header: SUB_TABLE_HEADER,
        mgmt_sw_config_input_support: u8 : pub get u8 : pub set u8,
        memory_mode_capabilities: u8 : pub get SupportedMemoryModes : pub set u8,
        current_memory_mode: u8 : pub get CurrentMemoryMode : pub set u8,
        persistent_memory_ras_capability: u8 : pub get u8 : pub set u8,
        _reserved: [u8; 8],
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PLATFORM_CAPABILITY_INFO3 {
        pub header: SUB_TABLE_HEADER,
        mgmt_sw_config_input_support: u8 : pub get u8 : pub set u8,
        memory_mode_capabilities: u8 : pub get SupportedMemoryModes3 : pub set u8,
        current_memory_mode: u8 : pub get CurrentMemoryMode3 : pub set u8,
        max_pm_interleave_sets: U16<LittleEndian> : pub get MaxInterleaveSets : pub set u16,
        ddr_cache_size: U32<LittleEndian> : pub get u32 : pub set u32, // GiB per DDR DIMM
        _reserved: [u8; 3],
    }
}

make_accessors! {
    /// Followed by `number_of_formats_supported` InterleaveFormat words.
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct MEMORY_INTERLEAVE_CAPABILITY_INFO {
        pub header: SUB_TABLE_HEADER,
        memory_mode: u8 : pub get u8 : pub set u8,
        _reserved: [u8; 3],
        interleave_alignment_size: U16<LittleEndian> : pub get u16 : pub set u16, // 2^n bytes
        number_of_formats_supported: U16<LittleEndian> : pub get u16 : pub set u16,
    }
}

make_accessors! {
    /// Followed by `number_of_formats_supported` InterleaveFormat3 words.
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct MEMORY_INTERLEAVE_CAPABILITY_INFO3 {
        pub header: SUB_TABLE_HEADER,
        memory_mode: u8 : pub get u8 : pub set u8,
        _reserved: [u8; 3],
        interleave_alignment_size: U16<LittleEndian> : pub get u16 : pub set u16,
        interleave_size: U16<LittleEndian> : pub get u16 : pub set u16, // channel in low byte, iMC in high byte
        max_interleave_sets_per_memory_type: U16<LittleEndian> : pub get MaxInterleaveSets : pub set u16,
        number_of_formats_supported: U16<LittleEndian> : pub get u16 : pub set u16,
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct RECONFIGURATION_INPUT_VALIDATION_INTERFACE {
        pub header: SUB_TABLE_HEADER,
        address_space_id: u8 : pub get u8 : pub set u8,
        bit_width: u8 : pub get u8 : pub set u8,
        bit_offset: u8 : pub get u8 : pub set u8,
        access_size: u8 : pub get u8 : pub set u8,
        address: U64<LittleEndian> : pub get u64 : pub set u64,
        trigger_operation_type: u8 : pub get u8 : pub set u8,
        _reserved2: [u8; 7],
        trigger_value: U64<LittleEndian> : pub get u64 : pub set u64,
        trigger_mask: U64<LittleEndian> : pub get u64 : pub set u64,
        gas_structure: [u8; 12] : pub get [u8; 12] : pub set [u8; 12],
        status_operation_type: u8 : pub get u8 : pub set u8,
        _reserved3: [u8; 3],
        status_mask: U64<LittleEndian> : pub get u64 : pub set u64,
    }
}

make_accessors! {
    /// Followed by GUID-specific data.
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct CONFIG_MANAGEMENT_ATTRIBUTES_EXTENSION {
        pub header: SUB_TABLE_HEADER,
        _reserved: [u8; 2],
        vendor_id: U16<LittleEndian> : pub get u16 : pub set u16,
        guid: [u8; 16] : pub get [u8; 16] : pub set [u8; 16],
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct SOCKET_SKU_INFO {
        pub header: SUB_TABLE_HEADER,
        socket_id: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: [u8; 2],
        mapped_memory_size_limit: U64<LittleEndian> : pub get u64 : pub set u64,
        total_memory_size_mapped_to_spa: U64<LittleEndian> : pub get u64 : pub set u64,
        caching_memory_size: U64<LittleEndian> : pub get u64 : pub set u64,
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct DIE_SKU_INFO {
        pub header: SUB_TABLE_HEADER,
        socket_id: U16<LittleEndian> : pub get u16 : pub set u16,
        die_id: U16<LittleEndian> : pub get u16 : pub set u16,
        mapped_memory_size_limit: U64<LittleEndian> : pub get u64 : pub set u64,
        total_memory_size_mapped_to_spa: U64<LittleEndian> : pub get u64 : pub set u64,
        caching_memory_size: U64<LittleEndian> : pub get u64 : pub set u64,
    }
}

#[repr(u8)]
#[derive(Debug, PartialEq, Eq, FromPrimitive, Copy, Clone)]
pub enum PmttDeviceType {
    Socket = 0,
    MemoryController = 1,
    Module = 2,
    VendorSpecific = 0xFF,
}

/// Module flag: set for DCPM, clear for DDR.
pub const PMTT_DDR_DCPM_FLAG: u16 = 1 << 2;
pub const PMTT_INVALID_SMBIOS_HANDLE: u32 = 0xFFFF_FFFF;

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PMTT_COMMON_HEADER {
        device_type: u8 : pub get u8 : pub set u8,
        _reserved1: u8,
        length: U16<LittleEndian> : pub get u16 : pub set u16,
        flags: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved2: U16<LittleEndian>,
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PMTT_SOCKET {
        socket_id: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: U16<LittleEndian>,
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PMTT_IMC {
        read_latency: U32<LittleEndian> : pub get u32 : pub set u32,
        write_latency: U32<LittleEndian> : pub get u32 : pub set u32,
        read_bandwidth: U32<LittleEndian> : pub get u32 : pub set u32,
        write_bandwidth: U32<LittleEndian> : pub get u32 : pub set u32,
        optimal_access_unit: U16<LittleEndian> : pub get u16 : pub set u16,
        optimal_access_alignment: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: U16<LittleEndian>,
        number_of_proximity_domains: U16<LittleEndian> : pub get u16 : pub set u16,
        proximity_domain: U32<LittleEndian> : pub get u32 : pub set u32, // firmware fills one entry only
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PMTT_MODULE {
        physical_component_id: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: U16<LittleEndian>,
        size_of_dimm: U32<LittleEndian> : pub get u32 : pub set u32,
        smbios_handle: U32<LittleEndian> : pub get u32 : pub set u32,
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PMTT_COMMON_HEADER2 {
        device_type: u8 : pub get u8 : pub set u8,
        _reserved1: u8,
        length: U16<LittleEndian> : pub get u16 : pub set u16,
        flags: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved2: U16<LittleEndian>,
        number_of_memory_devices: U32<LittleEndian> : pub get u32 : pub set u32,
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PMTT_SOCKET2 {
        pub header: PMTT_COMMON_HEADER2,
        socket_id: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: U16<LittleEndian>,
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PMTT_IMC2 {
        pub header: PMTT_COMMON_HEADER2,
        memory_controller_id: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: U16<LittleEndian>,
    }
}

make_accessors! {
    /// Stands for a die, a channel or a slot depending on its parent.
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PMTT_VENDOR_SPECIFIC2 {
        pub header: PMTT_COMMON_HEADER2,
        type_uuid: [u8; 16] : pub get [u8; 16] : pub set [u8; 16],
        device_id: U16<LittleEndian> : pub get u16 : pub set u16,
        _reserved: U16<LittleEndian>,
    }
}

make_accessors! {
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct PMTT_MODULE2 {
        pub header: PMTT_COMMON_HEADER2,
        smbios_handle: U32<LittleEndian> : pub get u32 : pub set u32,
    }
}

make_accessors! {
    /// Output of GetLog/LongOperationStatus.
    #[derive(FromBytes, AsBytes, Unaligned, Clone, Copy, Debug)]
    #[repr(C, packed)]
    pub struct LONG_OPERATION_STATUS {
        command_opcode: u8 : pub get u8 : pub set u8,
        command_sub_opcode: u8 : pub get u8 : pub set u8,
        percent_complete: U16<LittleEndian> : pub get u16 : pub set u16,
        estimated_time_left: U32<LittleEndian> : pub get u32 : pub set u32, // s
        status: u8 : pub get u8 : pub set u8,
        command_specific_data: [u8; 119],
    }
}

impl LONG_OPERATION_STATUS {
    pub fn command_specific_data(&self) -> &[u8] {
        &self.command_specific_data
    }
}

macro_rules! impl_sub_table_default {
    ($($struct_name:ident = $table_type:expr),* $(,)?) => {
        $(
            impl Default for $struct_name {
                fn default() -> Self {
                    let mut result = Self::new_zeroed();
                    result.header = SUB_TABLE_HEADER::new(
                        $table_type as u16,
                        size_of::<Self>(),
                    );
                    result
                }
            }
        )*
    };
}

impl_sub_table_default! {
    NFIT_SPA_RANGE = NfitSubTableType::SpaRange,
    NFIT_NVDIMM_REGION = NfitSubTableType::NvdimmRegion,
    NFIT_INTERLEAVE = NfitSubTableType::Interleave,
    NFIT_SMBIOS = NfitSubTableType::Smbios,
    NFIT_CONTROL_REGION = NfitSubTableType::ControlRegion,
    NFIT_BW_REGION = NfitSubTableType::BlockWindowRegion,
    NFIT_FLUSH_HINT = NfitSubTableType::FlushHint,
    NFIT_PLATFORM_CAPABILITIES = NfitSubTableType::PlatformCapabilities,
    PLATFORM_CAPABILITY_INFO = PcatSubTableType::PlatformCapabilityInfo,
    PLATFORM_CAPABILITY_INFO3 = PcatSubTableType::PlatformCapabilityInfo,
    MEMORY_INTERLEAVE_CAPABILITY_INFO = PcatSubTableType::MemoryInterleaveCapabilityInfo,
    MEMORY_INTERLEAVE_CAPABILITY_INFO3 = PcatSubTableType::MemoryInterleaveCapabilityInfo,
    RECONFIGURATION_INPUT_VALIDATION_INTERFACE = PcatSubTableType::RuntimeInterfaceValidation,
    CONFIG_MANAGEMENT_ATTRIBUTES_EXTENSION = PcatSubTableType::ConfigManagementAttributesExtension,
    SOCKET_SKU_INFO = PcatSubTableType::SkuInfo,
    DIE_SKU_INFO = PcatSubTableType::SkuInfo,
}

impl PMTT_COMMON_HEADER {
    pub fn new(device_type: PmttDeviceType, body_size: usize) -> Self {
        let mut result = Self::new_zeroed();
        result.device_type = device_type as u8;
        result.length = ((size_of::<Self>() + body_size) as u16).into();
        result
    }
}

impl PMTT_COMMON_HEADER2 {
    pub fn new(device_type: PmttDeviceType, size: usize) -> Self {
        let mut result = Self::new_zeroed();
        result.device_type = device_type as u8;
        result.length = (size as u16).into();
        result
    }
}

macro_rules! impl_pmtt2_default {
    ($($struct_name:ident = $device_type:expr),* $(,)?) => {
        $(
            impl Default for $struct_name {
                fn default() -> Self {
                    let mut result = Self::new_zeroed();
                    result.header = PMTT_COMMON_HEADER2::new(
                        $device_type,
                        size_of::<Self>(),
                    );
                    result
                }
            }
        )*
    };
}

macro_rules! impl_zeroed_default {
    ($($struct_name:ident),* $(,)?) => {
        $(
            impl Default for $struct_name {
                fn default() -> Self {
                    Self::new_zeroed()
                }
            }
        )*
    };
}

impl_zeroed_default!(PMTT_SOCKET, PMTT_IMC, PMTT_MODULE, LONG_OPERATION_STATUS);

impl Default for PMTT_TABLE2_HEADER {
    fn default() -> Self {
        Self {
            header: ACPI_TABLE_HEADER::default(),
            number_of_memory_devices: 0u32.into(),
        }
    }
}

impl_pmtt2_default! {
    PMTT_SOCKET2 = PmttDeviceType::Socket,
    PMTT_IMC2 = PmttDeviceType::MemoryController,
    PMTT_VENDOR_SPECIFIC2 = PmttDeviceType::VendorSpecific,
    PMTT_MODULE2 = PmttDeviceType::Module,
}

const_assert_eq!(size_of::<ACPI_TABLE_HEADER>(), 36);
const_assert_eq!(size_of::<NVM_TABLE_HEADER>(), 40);
const_assert_eq!(size_of::<PMTT_TABLE2_HEADER>(), 40);
const_assert_eq!(size_of::<NFIT_SPA_RANGE>(), 56);
const_assert_eq!(size_of::<NFIT_NVDIMM_REGION>(), 48);
const_assert_eq!(size_of::<NFIT_CONTROL_REGION>(), 80);
const_assert_eq!(size_of::<NFIT_BW_REGION>(), 40);
const_assert_eq!(size_of::<RECONFIGURATION_INPUT_VALIDATION_INTERFACE>(), 64);
const_assert_eq!(size_of::<PMTT_IMC>(), 28);
const_assert_eq!(size_of::<PMTT_VENDOR_SPECIFIC2>(), 32);
const_assert_eq!(size_of::<LONG_OPERATION_STATUS>(), 128);
