//! # Table and Memo Header Codecs
//!
//! Zerocopy-based header structs for the two file formats the engine
//! reads and writes.
//!
//! ## Table Header (little-endian, 32 bytes at offset 0)
//!
//! ```text
//! Offset  Size  Description
//! 0       1     File type (0x30 FoxPro, 0x31 FoxPro autoincrement)
//! 1       3     Last modification date: year-2000, month, day
//! 4       4     Row count, including deleted slots
//! 8       2     Offset of the first row (end of the descriptor area)
//! 10      2     Row length, including the deletion-marker byte
//! 12      16    Reserved
//! 28      1     Table flags (bit 0x02: a memo file exists)
//! 29      1     Code page mark
//! 30      2     Reserved
//! ```
//!
//! ## Memo Header (big-endian, 8 meaningful bytes at offset 0)
//!
//! ```text
//! Offset  Size  Description
//! 0       4     Index of the next free block
//! 4       2     Unused
//! 6       2     Block size in bytes
//! ```
//!
//! Memo blocks live at `block_size * index` and start with a big-endian
//! 4-byte sign (1 text, 0 binary) and a 4-byte payload length.
//!
//! Both headers derive the full zerocopy trait set, so parsing is a
//! bounds check and serialisation is `as_bytes()`. Compile-time
//! assertions pin the struct sizes to the on-disk layout.

use crate::error::DbfError;
use chrono::{Datelike, NaiveDate};
use eyre::{Result, WrapErr};
use std::fs::File;
use zerocopy::big_endian::{U16 as BeU16, U32 as BeU32};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const HEADER_SIZE: usize = 32;
pub const MEMO_HEADER_SIZE: usize = 8;
pub const MEMO_BLOCK_HEADER_SIZE: usize = 8;

/// FoxPro file type byte.
pub const FOXPRO: u8 = 0x30;
/// FoxPro with autoincrement columns.
pub const FOXPRO_AUTOINCREMENT: u8 = 0x31;

/// Table flag bit: a companion FPT file exists.
pub const MEMO_FLAG: u8 = 0x02;
/// Terminator byte of the column descriptor array.
pub const COLUMN_END: u8 = 0x0D;
/// Deletion marker of a removed row slot.
pub const DELETED: u8 = b'*';
/// Deletion marker of a live row slot.
pub const ACTIVE: u8 = b' ';

/// Header reads pull a prefix this large; real headers are smaller but
/// files shorter than their own header are caught in one place.
const PREFIX_SIZE: usize = 1024;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct TableHeader {
    file_type: u8,
    year: u8,
    month: u8,
    day: u8,
    rows_count: U32,
    first_row: U16,
    row_length: U16,
    reserved: [u8; 16],
    table_flags: u8,
    code_page: u8,
    reserved2: [u8; 2],
}

const _: () = assert!(std::mem::size_of::<TableHeader>() == HEADER_SIZE);

impl TableHeader {
    pub fn new(
        file_type: u8,
        rows_count: u32,
        first_row: u16,
        row_length: u16,
        table_flags: u8,
        code_page: u8,
    ) -> Self {
        Self {
            file_type,
            year: 0,
            month: 0,
            day: 0,
            rows_count: U32::new(rows_count),
            first_row: U16::new(first_row),
            row_length: U16::new(row_length),
            reserved: [0u8; 16],
            table_flags,
            code_page,
            reserved2: [0u8; 2],
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(DbfError::Incomplete)
                .wrap_err_with(|| format!("table header needs {HEADER_SIZE} bytes, file holds {}", bytes.len()));
        }
        Self::read_from_bytes(&bytes[..HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse table header: {e:?}"))
    }

    pub fn file_type(&self) -> u8 {
        self.file_type
    }

    pub fn rows_count(&self) -> u32 {
        self.rows_count.get()
    }

    pub fn set_rows_count(&mut self, count: u32) {
        self.rows_count = U32::new(count);
    }

    pub fn increment_rows_count(&mut self) {
        self.rows_count = U32::new(self.rows_count.get() + 1);
    }

    pub fn first_row(&self) -> u16 {
        self.first_row.get()
    }

    pub fn row_length(&self) -> u16 {
        self.row_length.get()
    }

    pub fn table_flags(&self) -> u8 {
        self.table_flags
    }

    pub fn has_memo(&self) -> bool {
        self.table_flags & MEMO_FLAG != 0
    }

    pub fn code_page(&self) -> u8 {
        self.code_page
    }

    /// The stamped last-modification date. Garbage bytes read as the
    /// zero date.
    pub fn modified(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(
            2000 + i32::from(self.year),
            u32::from(self.month),
            u32::from(self.day),
        )
        .unwrap_or_default()
    }

    /// Stamps the modification date. The year is stored as
    /// years-since-2000.
    pub fn stamp_modified(&mut self, date: NaiveDate) {
        self.year = (date.year() - 2000).clamp(0, 255) as u8;
        self.month = date.month() as u8;
        self.day = date.day() as u8;
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct MemoHeader {
    next_free: BeU32,
    unused: [u8; 2],
    block_size: BeU16,
}

const _: () = assert!(std::mem::size_of::<MemoHeader>() == MEMO_HEADER_SIZE);

impl MemoHeader {
    pub fn new(next_free: u32, block_size: u16) -> Self {
        Self {
            next_free: BeU32::new(next_free),
            unused: [0u8; 2],
            block_size: BeU16::new(block_size),
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < MEMO_HEADER_SIZE {
            return Err(DbfError::Incomplete)
                .wrap_err_with(|| format!("memo header needs {MEMO_HEADER_SIZE} bytes, file holds {}", bytes.len()));
        }
        Self::read_from_bytes(&bytes[..MEMO_HEADER_SIZE])
            .map_err(|e| eyre::eyre!("failed to parse memo header: {e:?}"))
    }

    pub fn next_free(&self) -> u32 {
        self.next_free.get()
    }

    pub fn increment_next_free(&mut self) {
        self.next_free = BeU32::new(self.next_free.get() + 1);
    }

    pub fn block_size(&self) -> u16 {
        self.block_size.get()
    }
}

/// Accepts the FoxPro file types unconditionally; anything else only
/// under the `untested` override.
pub fn validate_file_version(file_type: u8, untested: bool) -> Result<()> {
    match file_type {
        FOXPRO | FOXPRO_AUTOINCREMENT => Ok(()),
        other if untested => {
            tracing::debug!(file_type = other, "accepting untested file version");
            Ok(())
        }
        other => Err(DbfError::UnsupportedVersion(other))
            .wrap_err("validate_file_version: file type byte not in the accepted set"),
    }
}

/// Reads and parses the table header from the start of the file.
pub(crate) fn read_header(file: &File) -> Result<TableHeader> {
    let prefix = super::read_prefix(file, PREFIX_SIZE).wrap_err("read_header: prefix read failed")?;
    TableHeader::from_bytes(&prefix).wrap_err("read_header: decoding table header failed")
}

/// Reads and parses the memo header from the start of the FPT file.
pub(crate) fn read_memo_header(file: &File) -> Result<MemoHeader> {
    let prefix =
        super::read_prefix(file, PREFIX_SIZE).wrap_err("read_memo_header: prefix read failed")?;
    MemoHeader::from_bytes(&prefix).wrap_err("read_memo_header: decoding memo header failed")
}
