//! Pieces shared by the NFIT, PCAT and PMTT walkers.

use crate::ondisk::{
    take_body_from_collection, take_header_from_collection,
    ACPI_TABLE_HEADER, SUB_TABLE_HEADER,
};
use crate::types::{Error, Result, TableError};
use alloc::vec::Vec;
use core::mem::size_of;
use core::ops::Deref;
use four_cc::FourCC;
use zerocopy::FromBytes;

/// A sub-table copied out of its ACPI table: the fixed-size part plus
/// whatever trailing bytes its length covers.
#[derive(Debug, Clone)]
pub struct SubTable<T> {
    fixed: T,
    trailing: Vec<u8>,
}

impl<T: FromBytes + Copy> SubTable<T> {
    pub(crate) fn copy_from(bytes: &[u8], name: &'static str) -> Result<Self> {
        let fixed = T::read_from_prefix(bytes)
            .ok_or(Error::Table(TableError::InconsistentHeader, name))?;
        Ok(Self { fixed, trailing: bytes[size_of::<T>()..].to_vec() })
    }
}

impl<T> SubTable<T> {
    pub fn trailing(&self) -> &[u8] {
        &self.trailing
    }
}

impl<T> Deref for SubTable<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.fixed
    }
}

/// Whether all LENGTH bytes of the table sum to zero.
pub fn checksum_valid(table: &[u8]) -> bool {
    table.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)) == 0
}

/// Value for the checksum byte that makes TABLE sum to zero, assuming
/// the checksum byte itself currently holds zero.
pub fn compute_checksum(table: &[u8]) -> u8 {
    0u8.wrapping_sub(table.iter().fold(0u8, |sum, &b| sum.wrapping_add(b)))
}

/// Checks signature, length and checksum of RAW and returns the header
/// together with exactly the bytes the header claims.
pub(crate) fn validate_table(
    raw: &[u8],
    signature: FourCC,
    root_size: usize,
) -> Result<(ACPI_TABLE_HEADER, &[u8])> {
    let mut buf = raw;
    let header = *take_header_from_collection::<ACPI_TABLE_HEADER>(&mut buf)
        .ok_or(Error::Table(TableError::TruncatedTable, "ACPI_TABLE_HEADER"))?;
    if header.signature() != signature {
        return Err(Error::Table(
            TableError::BadSignature,
            "ACPI_TABLE_HEADER::signature",
        ));
    }
    let length = header.length() as usize;
    if length < root_size {
        return Err(Error::Table(
            TableError::InconsistentHeader,
            "ACPI_TABLE_HEADER::length",
        ));
    }
    let table = raw.get(..length).ok_or(Error::Table(
        TableError::TruncatedTable,
        "ACPI_TABLE_HEADER::length",
    ))?;
    if !checksum_valid(table) {
        return Err(Error::Table(
            TableError::BadChecksum,
            "ACPI_TABLE_HEADER::checksum",
        ));
    }
    Ok((header, table))
}

/// Walks `{Type, Length}`-prefixed sub-tables. Yields the type and the
/// whole sub-table including its header. Stops for good after the first
/// error.
#[derive(Debug, Clone)]
pub(crate) struct SubTableWalk<'a> {
    remaining: &'a [u8],
    offset: usize,
}

impl<'a> SubTableWalk<'a> {
    pub(crate) fn new(body: &'a [u8], offset: usize) -> Self {
        Self { remaining: body, offset }
    }

    fn next_item(&mut self) -> Result<(u16, &'a [u8])> {
        let mut buf = self.remaining;
        let header = take_header_from_collection::<SUB_TABLE_HEADER>(&mut buf)
            .ok_or(Error::Table(TableError::TruncatedTable, "SUB_TABLE_HEADER"))?;
        let length = header.length() as usize;
        if length < size_of::<SUB_TABLE_HEADER>() {
            return Err(Error::Table(
                TableError::InconsistentHeader,
                "SUB_TABLE_HEADER::length",
            ));
        }
        let mut buf = self.remaining;
        let item = take_body_from_collection(&mut buf, length).ok_or(
            Error::Table(TableError::TruncatedTable, "SUB_TABLE_HEADER::length"),
        )?;
        log::trace!(
            target: "dcpmm::acpi",
            "sub-table type {} at offset {:#x}, {} bytes",
            header.table_type(),
            self.offset,
            length
        );
        self.remaining = buf;
        self.offset += length;
        Ok((header.table_type(), item))
    }
}

impl<'a> Iterator for SubTableWalk<'a> {
    type Item = Result<(u16, &'a [u8])>;

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

/// Assembles a complete table around BODY, fixing up length and
/// checksum.
#[cfg(test)]
pub(crate) fn build_table(
    signature: FourCC,
    revision: u8,
    root_tail: [u8; 4],
    body: &[u8],
) -> Vec<u8> {
    use zerocopy::AsBytes;
    let mut header = ACPI_TABLE_HEADER::default();
    header.set_signature(signature);
    header.set_revision(revision);
    header.set_length((size_of::<ACPI_TABLE_HEADER>() + 4 + body.len()) as u32);
    let mut raw = header.as_bytes().to_vec();
    raw.extend_from_slice(&root_tail);
    raw.extend_from_slice(body);
    raw[9] = compute_checksum(&raw);
    raw
}
