//! # Column Descriptor Array Codec
//!
//! Column descriptors sit back to back at offset 32 of the table file,
//! 32 bytes each, terminated by the first byte equal to 0x0D. Each
//! descriptor carries the column name, type code, byte position within
//! a row slot, slot length, and decimal count.
//!
//! ```text
//! Offset  Size  Description
//! 0       11    Column name, zero-padded
//! 11      1     Type code (one of B C D F I L M N T V Y)
//! 12      4     Byte position within the row slot
//! 16      1     Slot length in bytes
//! 17      1     Decimal places for numeric formatting
//! 18      14    Reserved
//! ```
//!
//! Tables with nullable columns carry a `_NullFlags` pseudo-column at
//! the end of the array; the scan reads past it without exposing it.

use crate::error::DbfError;
use crate::types::{Column, ColumnType};
use eyre::{Result, WrapErr};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use super::headers::{COLUMN_END, HEADER_SIZE};

pub const DESCRIPTOR_SIZE: usize = 32;

/// Internal pseudo-column holding per-row null bits; never exposed.
pub const NULL_FLAGS_COLUMN: &str = "_NullFlags";

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct ColumnDescriptor {
    name: [u8; 11],
    column_type: u8,
    position: U32,
    length: u8,
    decimals: u8,
    reserved: [u8; 14],
}

const _: () = assert!(std::mem::size_of::<ColumnDescriptor>() == DESCRIPTOR_SIZE);

impl ColumnDescriptor {
    pub fn new(name: &str, column_type: ColumnType, position: u32, length: u8, decimals: u8) -> Self {
        let mut name_bytes = [0u8; 11];
        let copied = name.len().min(11);
        name_bytes[..copied].copy_from_slice(&name.as_bytes()[..copied]);
        Self {
            name: name_bytes,
            column_type: column_type.code(),
            position: U32::new(position),
            length,
            decimals,
            reserved: [0u8; 14],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < DESCRIPTOR_SIZE {
            return Err(DbfError::Incomplete).wrap_err_with(|| {
                format!("column descriptor needs {DESCRIPTOR_SIZE} bytes, file holds {}", bytes.len())
            });
        }
        Self::read_from_bytes(&bytes[..DESCRIPTOR_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse column descriptor: {e:?}"))
    }

    pub fn name(&self) -> String {
        let end = self.name.iter().position(|&b| b == 0).unwrap_or(11);
        String::from_utf8_lossy(&self.name[..end]).into_owned()
    }

    /// Converts to the exposed column form, validating the type code.
    pub fn to_column(&self) -> Result<Column> {
        let column_type = ColumnType::from_code(self.column_type)
            .wrap_err_with(|| format!("column {:?} carries an unknown type code", self.name()))?;
        Ok(Column {
            name: self.name(),
            column_type,
            position: self.position.get(),
            length: self.length,
            decimals: self.decimals,
        })
    }
}

/// Scans the descriptor array starting at offset 32. Before each
/// descriptor one byte is peeked; the 0x0D sentinel ends the array.
/// `_NullFlags` descriptors are consumed but not returned.
pub(crate) fn read_columns(mut file: &File) -> Result<Vec<Column>> {
    let mut columns = Vec::new();
    let mut offset = HEADER_SIZE as u64;
    let mut peek = [0u8; 1];
    let mut raw = [0u8; DESCRIPTOR_SIZE];
    loop {
        file.seek(SeekFrom::Start(offset))
            .wrap_err("read_columns: seek to descriptor failed")?;
        file.read_exact(&mut peek)
            .wrap_err("read_columns: peeking descriptor terminator failed")?;
        if peek[0] == COLUMN_END {
            break;
        }

        file.seek(SeekFrom::Start(offset))
            .wrap_err("read_columns: seek back to descriptor failed")?;
        file.read_exact(&mut raw)
            .wrap_err("read_columns: reading descriptor failed")?;
        offset += DESCRIPTOR_SIZE as u64;

        let descriptor = ColumnDescriptor::from_bytes(&raw)?;
        if descriptor.name() == NULL_FLAGS_COLUMN {
            continue;
        }
        columns.push(descriptor.to_column()?);
    }
    Ok(columns)
}
