//! Platform Memory Topology Table.
//!
//! Revision 1 is a preorder list of sockets, memory controllers and
//! modules with fixed-size bodies. Revision 2 adds vendor-specific nodes
//! whose meaning (die, channel or slot) depends on the node before them.

use crate::ondisk::{
    take_header_from_collection, PmttDeviceType, ACPI_REVISION_0_1,
    ACPI_REVISION_1_1, ACPI_TABLE_HEADER, NVM_TABLE_HEADER,
    PMTT_COMMON_HEADER, PMTT_COMMON_HEADER2, PMTT_DDR_DCPM_FLAG, PMTT_IMC,
    PMTT_IMC2, PMTT_MODULE, PMTT_MODULE2, PMTT_SIGNATURE, PMTT_SOCKET,
    PMTT_SOCKET2, PMTT_TABLE2_HEADER, PMTT_VENDOR_SPECIFIC2,
};
use crate::acpi::validate_table;
use crate::types::{Error, Result, TableError};
use alloc::vec::Vec;
use core::mem::size_of;
use num_traits::FromPrimitive;

/// What a node stands for once its position in the walk is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PmttNodeKind {
    Socket,
    Die,
    MemoryController,
    Channel,
    Slot,
    Module,
}

impl PmttNodeKind {
    fn depth(self) -> u8 {
        match self {
            Self::Socket => 0,
            Self::Die => 1,
            Self::MemoryController => 2,
            Self::Channel => 3,
            Self::Slot => 4,
            Self::Module => 5,
        }
    }
}

/// Classifies a revision 2 node of DEVICE_TYPE that follows PARENT and
/// returns the parent context for the node after it.
pub fn classify(
    parent: Option<PmttDeviceType>,
    device_type: PmttDeviceType,
) -> Result<(PmttNodeKind, Option<PmttDeviceType>)> {
    match (device_type, parent) {
        (PmttDeviceType::Socket, _) => {
            Ok((PmttNodeKind::Socket, Some(PmttDeviceType::Socket)))
        }
        (PmttDeviceType::MemoryController, _) => Ok((
            PmttNodeKind::MemoryController,
            Some(PmttDeviceType::MemoryController),
        )),
        (PmttDeviceType::VendorSpecific, Some(PmttDeviceType::Socket)) => {
            Ok((PmttNodeKind::Die, parent))
        }
        (
            PmttDeviceType::VendorSpecific,
            Some(PmttDeviceType::MemoryController),
        ) => Ok((PmttNodeKind::Channel, Some(PmttDeviceType::VendorSpecific))),
        (
            PmttDeviceType::VendorSpecific,
            Some(PmttDeviceType::VendorSpecific),
        ) => Ok((PmttNodeKind::Slot, parent)),
        (PmttDeviceType::VendorSpecific, _) => Err(Error::Table(
            TableError::UnexpectedDevice,
            "PMTT_VENDOR_SPECIFIC2 without parent",
        )),
        (PmttDeviceType::Module, _) => Ok((PmttNodeKind::Module, parent)),
    }
}

/// Revision 1 node: common header plus its type's body.
#[derive(Debug, Clone, Copy)]
pub enum Pmtt1Node {
    Socket(PMTT_COMMON_HEADER, PMTT_SOCKET),
    MemoryController(PMTT_COMMON_HEADER, PMTT_IMC),
    Module(PMTT_COMMON_HEADER, PMTT_MODULE),
}

impl Pmtt1Node {
    pub fn header(&self) -> &PMTT_COMMON_HEADER {
        match self {
            Self::Socket(header, _) => header,
            Self::MemoryController(header, _) => header,
            Self::Module(header, _) => header,
        }
    }
    pub fn kind(&self) -> PmttNodeKind {
        match self {
            Self::Socket(..) => PmttNodeKind::Socket,
            Self::MemoryController(..) => PmttNodeKind::MemoryController,
            Self::Module(..) => PmttNodeKind::Module,
        }
    }
    pub fn enabled(&self) -> bool {
        self.header().flags() != 0
    }
}

#[derive(Debug, Clone)]
struct Pmtt1Walk<'a> {
    remaining: &'a [u8],
}

impl<'a> Pmtt1Walk<'a> {
    fn next_item(&mut self) -> Result<Pmtt1Node> {
        let mut buf = self.remaining;
        let header = *take_header_from_collection::<PMTT_COMMON_HEADER>(
            &mut buf,
        )
        .ok_or(Error::Table(TableError::TruncatedTable, "PMTT_COMMON_HEADER"))?;
        let node = match PmttDeviceType::from_u8(header.device_type()) {
            Some(PmttDeviceType::Socket) => Pmtt1Node::Socket(
                header,
                *take_header_from_collection::<PMTT_SOCKET>(&mut buf).ok_or(
                    Error::Table(TableError::TruncatedTable, "PMTT_SOCKET"),
                )?,
            ),
            Some(PmttDeviceType::MemoryController) => {
                Pmtt1Node::MemoryController(
                    header,
                    *take_header_from_collection::<PMTT_IMC>(&mut buf).ok_or(
                        Error::Table(TableError::TruncatedTable, "PMTT_IMC"),
                    )?,
                )
            }
            Some(PmttDeviceType::Module) => Pmtt1Node::Module(
                header,
                *take_header_from_collection::<PMTT_MODULE>(&mut buf).ok_or(
                    Error::Table(TableError::TruncatedTable, "PMTT_MODULE"),
                )?,
            ),
            _ => {
                return Err(Error::Table(
                    TableError::UnexpectedDevice,
                    "PMTT_COMMON_HEADER::device_type",
                ))
            }
        };
        self.remaining = buf;
        Ok(node)
    }
}

impl<'a> Iterator for Pmtt1Walk<'a> {
    type Item = Result<Pmtt1Node>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let item = self.next_item();
        if item.is_err() {
            self.remaining = &[];
        }
        Some(item)
    }
}

#[derive(Debug, Clone)]
pub struct PmttRev1 {
    header: ACPI_TABLE_HEADER,
    nodes: Vec<Pmtt1Node>,
}

#[derive(Debug, Default, Clone, Copy)]
struct ModulePresence {
    ddr: bool,
    dcpm: bool,
}

impl PmttRev1 {
    pub fn header(&self) -> &ACPI_TABLE_HEADER {
        &self.header
    }

    /// All nodes in table order.
    pub fn nodes(&self) -> &[Pmtt1Node] {
        &self.nodes
    }

    /// Whether the topology allows 2LM: every enabled memory controller
    /// that has DDR must also have DCPM, and at least one enabled memory
    /// controller has to be there at all. Anything under a disabled socket
    /// or memory controller is ignored.
    pub fn memory_mode_allowed(&self) -> bool {
        let mut allowed = false;
        let mut skip_deeper_than: Option<u8> = None;
        let mut current: Option<ModulePresence> = None;
        for node in &self.nodes {
            let depth = node.kind().depth();
            if let Some(limit) = skip_deeper_than {
                if depth > limit {
                    continue;
                }
                skip_deeper_than = None;
            }
            if node.kind() != PmttNodeKind::Module {
                if let Some(presence) = current.take() {
                    if presence.ddr && !presence.dcpm {
                        return false;
                    }
                    allowed = true;
                }
            }
            match node {
                Pmtt1Node::Socket(..) | Pmtt1Node::MemoryController(..)
                    if !node.enabled() =>
                {
                    skip_deeper_than = Some(depth);
                }
                Pmtt1Node::Socket(..) => {}
                Pmtt1Node::MemoryController(..) => {
                    current = Some(ModulePresence::default());
                }
                Pmtt1Node::Module(header, module) => {
                    if let Some(presence) = current.as_mut() {
                        if module.size_of_dimm() > 0 {
                            if header.flags() & PMTT_DDR_DCPM_FLAG != 0 {
                                presence.dcpm = true;
                            } else {
                                presence.ddr = true;
                            }
                        }
                    }
                }
            }
        }
        match current {
            Some(presence) if presence.ddr && !presence.dcpm => false,
            Some(_) => true,
            None => allowed,
        }
    }
}

/// Revision 2 walk. The parent context travels with the walk so that
/// every vendor-specific node is classified as it is met.
#[derive(Debug, Clone)]
struct Pmtt2Walk<'a> {
    remaining: &'a [u8],
    parent: Option<PmttDeviceType>,
}

/// Revision 2 node after classification.
#[derive(Debug, Clone, Copy)]
pub enum Pmtt2Node {
    Socket(PMTT_SOCKET2),
    Die(PMTT_VENDOR_SPECIFIC2),
    MemoryController(PMTT_IMC2),
    Channel(PMTT_VENDOR_SPECIFIC2),
    Slot(PMTT_VENDOR_SPECIFIC2),
    Module(PMTT_MODULE2),
}

fn take_node<'a, T: zerocopy::FromBytes + Copy + 'a>(
    buf: &mut &'a [u8],
    name: &'static str,
) -> Result<T> {
    take_header_from_collection::<T>(buf)
        .copied()
        .ok_or(Error::Table(TableError::TruncatedTable, name))
}

impl<'a> Pmtt2Walk<'a> {
    fn next_item(&mut self) -> Result<Pmtt2Node> {
        let header = take_node::<PMTT_COMMON_HEADER2>(
            &mut &self.remaining[..],
            "PMTT_COMMON_HEADER2",
        )?;
        let device_type = PmttDeviceType::from_u8(header.device_type()).ok_or(
            Error::Table(
                TableError::UnexpectedDevice,
                "PMTT_COMMON_HEADER2::device_type",
            ),
        )?;
        let (kind, parent) = classify(self.parent, device_type)?;
        let mut buf = self.remaining;
        let node = match kind {
            PmttNodeKind::Socket => {
                Pmtt2Node::Socket(take_node(&mut buf, "PMTT_SOCKET2")?)
            }
            PmttNodeKind::MemoryController => {
                Pmtt2Node::MemoryController(take_node(&mut buf, "PMTT_IMC2")?)
            }
            PmttNodeKind::Die => {
                Pmtt2Node::Die(take_node(&mut buf, "PMTT_VENDOR_SPECIFIC2")?)
            }
            PmttNodeKind::Channel => {
                Pmtt2Node::Channel(take_node(&mut buf, "PMTT_VENDOR_SPECIFIC2")?)
            }
            PmttNodeKind::Slot => {
                Pmtt2Node::Slot(take_node(&mut buf, "PMTT_VENDOR_SPECIFIC2")?)
            }
            PmttNodeKind::Module => {
                Pmtt2Node::Module(take_node(&mut buf, "PMTT_MODULE2")?)
            }
        };
        log::trace!(
            target: "dcpmm::pmtt",
            "{:?} after {:?}",
            kind,
            self.parent
        );
        self.remaining = buf;
        self.parent = parent;
        Ok(node)
    }
}

impl<'a> Iterator for Pmtt2Walk<'a> {
    type Item = Result<Pmtt2Node>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.is_empty() {
            return None;
        }
        let item = self.next_item();
        if item.is_err() {
            self.remaining = &[];
        }
        Some(item)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PmttMemoryType {
    #[default]
    Ddr,
    Dcpm,
}

impl PmttMemoryType {
    pub fn from_flags(flags: u16) -> Self {
        if flags & PMTT_DDR_DCPM_FLAG != 0 {
            Self::Dcpm
        } else {
            Self::Ddr
        }
    }
}

/// Where a module sits: ids of the closest enclosing nodes seen before
/// it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PmttModuleInfo {
    pub memory_type: PmttMemoryType,
    pub socket_id: Option<u16>,
    pub die_id: Option<u16>,
    /// Table-order index of the enclosing die, or of the enclosing
    /// socket when the platform lists no dies.
    pub cpu_id: Option<u16>,
    pub memory_controller_id: Option<u16>,
    pub channel_id: Option<u16>,
    pub slot_id: Option<u16>,
    pub smbios_handle: u32,
    pub flags: u16,
}

impl PmttModuleInfo {
    pub fn is_dcpm(&self) -> bool {
        self.memory_type == PmttMemoryType::Dcpm
    }
}

#[derive(Debug, Clone)]
pub struct PmttRev2 {
    header: PMTT_TABLE2_HEADER,
    sockets: Vec<PMTT_SOCKET2>,
    dies: Vec<PMTT_VENDOR_SPECIFIC2>,
    memory_controllers: Vec<PMTT_IMC2>,
    channels: Vec<PMTT_VENDOR_SPECIFIC2>,
    slots: Vec<PMTT_VENDOR_SPECIFIC2>,
    modules: Vec<PmttModuleInfo>,
}

impl PmttRev2 {
    fn new(header: PMTT_TABLE2_HEADER) -> Self {
        Self {
            header,
            sockets: Vec::new(),
            dies: Vec::new(),
            memory_controllers: Vec::new(),
            channels: Vec::new(),
            slots: Vec::new(),
            modules: Vec::new(),
        }
    }

    pub fn header(&self) -> &PMTT_TABLE2_HEADER {
        &self.header
    }
    pub fn sockets(&self) -> &[PMTT_SOCKET2] {
        &self.sockets
    }
    pub fn dies(&self) -> &[PMTT_VENDOR_SPECIFIC2] {
        &self.dies
    }
    pub fn memory_controllers(&self) -> &[PMTT_IMC2] {
        &self.memory_controllers
    }
    pub fn channels(&self) -> &[PMTT_VENDOR_SPECIFIC2] {
        &self.channels
    }
    pub fn slots(&self) -> &[PMTT_VENDOR_SPECIFIC2] {
        &self.slots
    }
    pub fn modules(&self) -> &[PmttModuleInfo] {
        &self.modules
    }
    pub fn ddr_modules(&self) -> impl Iterator<Item = &PmttModuleInfo> {
        self.modules.iter().filter(|m| !m.is_dcpm())
    }
    pub fn dcpm_modules(&self) -> impl Iterator<Item = &PmttModuleInfo> {
        self.modules.iter().filter(|m| m.is_dcpm())
    }

    fn push(&mut self, node: Pmtt2Node, location: &mut PmttModuleInfo) {
        match node {
            Pmtt2Node::Socket(socket) => {
                *location = PmttModuleInfo {
                    socket_id: Some(socket.socket_id()),
                    cpu_id: Some(self.sockets.len() as u16),
                    ..Default::default()
                };
                self.sockets.push(socket);
            }
            Pmtt2Node::Die(die) => {
                *location = PmttModuleInfo {
                    socket_id: location.socket_id,
                    die_id: Some(die.device_id()),
                    cpu_id: Some(self.dies.len() as u16),
                    ..Default::default()
                };
                self.dies.push(die);
            }
            Pmtt2Node::MemoryController(imc) => {
                location.memory_controller_id =
                    Some(imc.memory_controller_id());
                location.channel_id = None;
                location.slot_id = None;
                self.memory_controllers.push(imc);
            }
            Pmtt2Node::Channel(channel) => {
                location.channel_id = Some(channel.device_id());
                location.slot_id = None;
                self.channels.push(channel);
            }
            Pmtt2Node::Slot(slot) => {
                location.slot_id = Some(slot.device_id());
                self.slots.push(slot);
            }
            Pmtt2Node::Module(module) => {
                self.modules.push(PmttModuleInfo {
                    memory_type: PmttMemoryType::from_flags(
                        module.header.flags(),
                    ),
                    smbios_handle: module.smbios_handle(),
                    flags: module.header.flags(),
                    ..*location
                });
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum PmttNode<'a> {
    Rev1(&'a Pmtt1Node),
    Socket(&'a PMTT_SOCKET2),
    MemoryController(&'a PMTT_IMC2),
    VendorSpecific(&'a PMTT_VENDOR_SPECIFIC2),
    Module(&'a PmttModuleInfo),
}

/// Parsed PMTT of either revision.
#[derive(Debug, Clone)]
pub enum ParsedPmttHeader {
    Rev1(PmttRev1),
    Rev2(PmttRev2),
}

impl ParsedPmttHeader {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        let root_size = size_of::<NVM_TABLE_HEADER>();
        let (header, table) = validate_table(raw, PMTT_SIGNATURE, root_size)?;
        match header.revision() {
            ACPI_REVISION_0_1 => {
                let walk = Pmtt1Walk { remaining: &table[root_size..] };
                for item in walk.clone() {
                    item?;
                }
                let nodes = walk.collect::<Result<Vec<_>>>()?;
                log::debug!(
                    target: "dcpmm::pmtt",
                    "PMTT revision 1: {} nodes",
                    nodes.len()
                );
                Ok(Self::Rev1(PmttRev1 { header, nodes }))
            }
            ACPI_REVISION_1_1 => {
                let root = take_node::<PMTT_TABLE2_HEADER>(
                    &mut &table[..],
                    "PMTT_TABLE2_HEADER",
                )?;
                let walk = Pmtt2Walk {
                    remaining: &table[size_of::<PMTT_TABLE2_HEADER>()..],
                    parent: None,
                };
                for item in walk.clone() {
                    item?;
                }
                let mut result = PmttRev2::new(root);
                let mut location = PmttModuleInfo::default();
                for item in walk {
                    result.push(item?, &mut location);
                }
                log::debug!(
                    target: "dcpmm::pmtt",
                    "PMTT revision 2: {} sockets, {} DDR and {} DCPM modules",
                    result.sockets.len(),
                    result.ddr_modules().count(),
                    result.dcpm_modules().count()
                );
                Ok(Self::Rev2(result))
            }
            _ => Err(Error::Table(
                TableError::UnsupportedRevision,
                "ACPI_TABLE_HEADER::revision",
            )),
        }
    }

    pub fn header(&self) -> &ACPI_TABLE_HEADER {
        match self {
            Self::Rev1(pmtt) => &pmtt.header,
            Self::Rev2(pmtt) => &pmtt.header.header,
        }
    }

    /// Only revision 1 tables carry the module sizes this needs.
    pub fn memory_mode_allowed(&self) -> Result<bool> {
        match self {
            Self::Rev1(pmtt) => Ok(pmtt.memory_mode_allowed()),
            Self::Rev2(_) => Err(Error::Table(
                TableError::UnsupportedRevision,
                "ACPI_TABLE_HEADER::revision",
            )),
        }
    }

    pub fn node_count(&self, kind: PmttNodeKind) -> usize {
        match self {
            Self::Rev1(pmtt) => {
                pmtt.nodes.iter().filter(|node| node.kind() == kind).count()
            }
            Self::Rev2(pmtt) => match kind {
                PmttNodeKind::Socket => pmtt.sockets.len(),
                PmttNodeKind::Die => pmtt.dies.len(),
                PmttNodeKind::MemoryController => pmtt.memory_controllers.len(),
                PmttNodeKind::Channel => pmtt.channels.len(),
                PmttNodeKind::Slot => pmtt.slots.len(),
                PmttNodeKind::Module => pmtt.modules.len(),
            },
        }
    }

    pub fn node_at(&self, kind: PmttNodeKind, index: usize) -> Option<PmttNode<'_>> {
        match self {
            Self::Rev1(pmtt) => pmtt
                .nodes
                .iter()
                .filter(|node| node.kind() == kind)
                .nth(index)
                .map(PmttNode::Rev1),
            Self::Rev2(pmtt) => Some(match kind {
                PmttNodeKind::Socket => {
                    PmttNode::Socket(pmtt.sockets.get(index)?)
                }
                PmttNodeKind::Die => {
                    PmttNode::VendorSpecific(pmtt.dies.get(index)?)
                }
                PmttNodeKind::MemoryController => PmttNode::MemoryController(
                    pmtt.memory_controllers.get(index)?,
                ),
                PmttNodeKind::Channel => {
                    PmttNode::VendorSpecific(pmtt.channels.get(index)?)
                }
                PmttNodeKind::Slot => {
                    PmttNode::VendorSpecific(pmtt.slots.get(index)?)
                }
                PmttNodeKind::Module => {
                    PmttNode::Module(pmtt.modules.get(index)?)
                }
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acpi::build_table;
    use zerocopy::AsBytes;

    fn node1<T: AsBytes>(
        body: &mut Vec<u8>,
        device_type: PmttDeviceType,
        flags: u16,
        node: T,
    ) {
        let mut header =
            PMTT_COMMON_HEADER::new(device_type, size_of::<T>());
        header.set_flags(flags);
        body.extend_from_slice(header.as_bytes());
        body.extend_from_slice(node.as_bytes());
    }

    fn module1(body: &mut Vec<u8>, dcpm: bool, size: u32) {
        let mut module = PMTT_MODULE::default();
        module.set_size_of_dimm(size);
        let flags = if dcpm { 1 | PMTT_DDR_DCPM_FLAG } else { 1 };
        node1(body, PmttDeviceType::Module, flags, module);
    }

    fn rev1(body: &[u8]) -> Result<ParsedPmttHeader> {
        ParsedPmttHeader::parse(&build_table(
            PMTT_SIGNATURE,
            ACPI_REVISION_0_1,
            [0; 4],
            body,
        ))
    }

    #[test]
    fn ddr_without_dcpm_forbids_memory_mode() -> Result<()> {
        let mut body = Vec::new();
        node1(&mut body, PmttDeviceType::Socket, 1, PMTT_SOCKET::default());
        node1(&mut body, PmttDeviceType::MemoryController, 1, PMTT_IMC::default());
        module1(&mut body, false, 16);
        module1(&mut body, true, 128);
        node1(&mut body, PmttDeviceType::MemoryController, 1, PMTT_IMC::default());
        module1(&mut body, false, 16);
        let pmtt = rev1(&body)?;
        assert!(pmtt.node_count(PmttNodeKind::Module) == 3);
        assert!(!pmtt.memory_mode_allowed()?);
        Ok(())
    }

    #[test]
    fn disabled_branches_are_ignored() -> Result<()> {
        let mut body = Vec::new();
        node1(&mut body, PmttDeviceType::Socket, 1, PMTT_SOCKET::default());
        node1(&mut body, PmttDeviceType::MemoryController, 1, PMTT_IMC::default());
        module1(&mut body, false, 16);
        module1(&mut body, true, 128);
        node1(&mut body, PmttDeviceType::MemoryController, 0, PMTT_IMC::default());
        module1(&mut body, false, 16);
        node1(&mut body, PmttDeviceType::Socket, 0, PMTT_SOCKET::default());
        node1(&mut body, PmttDeviceType::MemoryController, 1, PMTT_IMC::default());
        module1(&mut body, false, 16);
        assert!(rev1(&body)?.memory_mode_allowed()?);
        Ok(())
    }

    #[test]
    fn no_memory_controller_forbids_memory_mode() -> Result<()> {
        let mut body = Vec::new();
        node1(&mut body, PmttDeviceType::Socket, 1, PMTT_SOCKET::default());
        assert!(!rev1(&body)?.memory_mode_allowed()?);
        // Empty modules count as neither kind.
        node1(&mut body, PmttDeviceType::MemoryController, 1, PMTT_IMC::default());
        module1(&mut body, false, 0);
        assert!(rev1(&body)?.memory_mode_allowed()?);
        Ok(())
    }

    #[test]
    fn vendor_specific_is_unexpected_in_revision_1() {
        let mut body = Vec::new();
        node1(&mut body, PmttDeviceType::VendorSpecific, 1, PMTT_SOCKET::default());
        assert!(matches!(
            rev1(&body),
            Err(Error::Table(TableError::UnexpectedDevice, _))
        ));
        let mut body = Vec::new();
        node1(&mut body, PmttDeviceType::Socket, 1, PMTT_SOCKET::default());
        body.truncate(body.len() - 1);
        assert!(matches!(
            rev1(&body),
            Err(Error::Table(TableError::TruncatedTable, _))
        ));
    }

    fn vendor_specific(device_id: u16) -> PMTT_VENDOR_SPECIFIC2 {
        let mut node = PMTT_VENDOR_SPECIFIC2::default();
        node.set_device_id(device_id);
        node
    }

    fn rev2(body: &[u8]) -> Result<ParsedPmttHeader> {
        ParsedPmttHeader::parse(&build_table(
            PMTT_SIGNATURE,
            ACPI_REVISION_1_1,
            1u32.to_le_bytes(),
            body,
        ))
    }

    #[test]
    fn parent_context_classifies_vendor_nodes() -> Result<()> {
        use PmttDeviceType::*;
        let sequence = [
            Socket,
            VendorSpecific,
            MemoryController,
            VendorSpecific,
            VendorSpecific,
            Module,
        ];
        let mut parent = None;
        let mut kinds = Vec::new();
        for device_type in sequence {
            let (kind, next) = classify(parent, device_type)?;
            kinds.push(kind);
            parent = next;
        }
        assert!(
            kinds
                == [
                    PmttNodeKind::Socket,
                    PmttNodeKind::Die,
                    PmttNodeKind::MemoryController,
                    PmttNodeKind::Channel,
                    PmttNodeKind::Slot,
                    PmttNodeKind::Module,
                ]
        );
        assert!(classify(None, VendorSpecific).is_err());
        Ok(())
    }

    #[test]
    fn revision_2_records_module_location() -> Result<()> {
        let mut socket = PMTT_SOCKET2::default();
        socket.set_socket_id(1);
        let mut imc = PMTT_IMC2::default();
        imc.set_memory_controller_id(2);
        let mut dcpm = PMTT_MODULE2::default();
        dcpm.set_smbios_handle(0x30);
        dcpm.header.set_flags(PMTT_DDR_DCPM_FLAG);
        let mut ddr = PMTT_MODULE2::default();
        ddr.set_smbios_handle(0x31);

        let mut body = Vec::new();
        body.extend_from_slice(socket.as_bytes());
        body.extend_from_slice(vendor_specific(7).as_bytes());
        body.extend_from_slice(imc.as_bytes());
        body.extend_from_slice(vendor_specific(3).as_bytes());
        body.extend_from_slice(vendor_specific(1).as_bytes());
        body.extend_from_slice(dcpm.as_bytes());
        body.extend_from_slice(vendor_specific(0).as_bytes());
        body.extend_from_slice(ddr.as_bytes());
        let pmtt = match rev2(&body)? {
            ParsedPmttHeader::Rev2(pmtt) => pmtt,
            ParsedPmttHeader::Rev1(_) => return Err(Error::NotFound),
        };
        assert!(pmtt.dies().len() == 1);
        assert!(pmtt.channels().len() == 1);
        assert!(pmtt.slots().len() == 2);
        let dcpm = pmtt.dcpm_modules().next().ok_or(Error::NotFound)?;
        assert!(
            *dcpm
                == PmttModuleInfo {
                    memory_type: PmttMemoryType::Dcpm,
                    socket_id: Some(1),
                    die_id: Some(7),
                    cpu_id: Some(0),
                    memory_controller_id: Some(2),
                    channel_id: Some(3),
                    slot_id: Some(1),
                    smbios_handle: 0x30,
                    flags: PMTT_DDR_DCPM_FLAG,
                }
        );
        let ddr = pmtt.ddr_modules().next().ok_or(Error::NotFound)?;
        assert!(ddr.memory_type == PmttMemoryType::Ddr);
        assert!(ddr.slot_id == Some(0));
        assert!(ddr.smbios_handle == 0x31);
        Ok(())
    }

    #[test]
    fn orphan_vendor_node_is_rejected() {
        assert!(matches!(
            rev2(vendor_specific(0).as_bytes()),
            Err(Error::Table(TableError::UnexpectedDevice, _))
        ));
    }

    #[test]
    fn cpu_follows_die_or_socket_order() -> Result<()> {
        let mut socket = PMTT_SOCKET2::default();
        let module = PMTT_MODULE2::default();
        let mut body = Vec::new();
        for socket_id in [4, 5] {
            socket.set_socket_id(socket_id);
            body.extend_from_slice(socket.as_bytes());
            body.extend_from_slice(PMTT_IMC2::default().as_bytes());
            body.extend_from_slice(module.as_bytes());
        }
        // A third socket split into two dies.
        socket.set_socket_id(6);
        body.extend_from_slice(socket.as_bytes());
        for die in [0, 1] {
            body.extend_from_slice(vendor_specific(die).as_bytes());
            body.extend_from_slice(module.as_bytes());
        }
        let pmtt = match rev2(&body)? {
            ParsedPmttHeader::Rev2(pmtt) => pmtt,
            ParsedPmttHeader::Rev1(_) => return Err(Error::NotFound),
        };
        let cpus = pmtt
            .modules()
            .iter()
            .map(|m| (m.socket_id, m.die_id, m.cpu_id))
            .collect::<Vec<_>>();
        assert!(
            cpus == [
                (Some(4), None, Some(0)),
                (Some(5), None, Some(1)),
                (Some(6), Some(0), Some(0)),
                (Some(6), Some(1), Some(1)),
            ]
        );
        assert!(pmtt.modules().iter().all(|m| !m.is_dcpm()));
        Ok(())
    }

    #[test]
    fn node_cut_short_mid_walk_is_truncated() {
        let mut body = Vec::new();
        body.extend_from_slice(PMTT_SOCKET2::default().as_bytes());
        body.extend_from_slice(vendor_specific(0).as_bytes());
        let imc = PMTT_IMC2::default();
        // The common header survives; the controller body does not.
        body.extend_from_slice(&imc.as_bytes()[..size_of::<PMTT_IMC2>() - 2]);
        assert!(matches!(
            rev2(&body),
            Err(Error::Table(TableError::TruncatedTable, "PMTT_IMC2"))
        ));
    }

    #[test]
    fn unknown_type_below_a_controller_is_rejected() {
        let mut body = Vec::new();
        body.extend_from_slice(PMTT_SOCKET2::default().as_bytes());
        body.extend_from_slice(PMTT_IMC2::default().as_bytes());
        let mut unknown = PMTT_MODULE2::default();
        unknown.header.set_device_type(0x42);
        body.extend_from_slice(unknown.as_bytes());
        assert!(matches!(
            rev2(&body),
            Err(Error::Table(TableError::UnexpectedDevice, _))
        ));
    }
}
