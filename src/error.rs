//! # Error Taxonomy
//!
//! This module defines `DbfError`, the matchable kernel of every failure
//! the engine can produce. All public operations return `eyre::Result`;
//! a `DbfError` is the root cause inside the report and each call site
//! layers a short context string with `wrap_err`, so a failed operation
//! carries an ordered chain from the public entry point down to the
//! failing seek, read, write, or lock.
//!
//! Callers that need to branch on the failure kind recover the taxonomy
//! with `report.downcast_ref::<DbfError>()`.
//!
//! ## Variants
//!
//! | Variant | Raised when |
//! |---------|-------------|
//! | `Eof` | a row index at or past `rows_count` is accessed |
//! | `Incomplete` | the file ended before an expected read length |
//! | `NoFpt` | a memo operation runs on a table opened without an FPT |
//! | `UnsupportedVersion` | the file-type byte is unknown and `untested` is off |
//! | `CodePageMismatch` | the header code page differs from the converter |
//! | `UnsupportedType` | a column carries a type code outside `B C D F I L M N T V Y` |
//! | `TypeMismatch` | a field value's domain arm does not fit its column type |
//! | `SearchMemo` | a search targets a memo column |
//!
//! Plain I/O failures (seek, read, write, fcntl) are not enumerated
//! here; they stay `std::io::Error` roots wrapped with call-site
//! context.

use thiserror::Error;

/// Matchable error kinds produced by the engine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DbfError {
    #[error("attempted to access a row past the end of the table")]
    Eof,

    #[error("incomplete read, the file ended before the expected length")]
    Incomplete,

    #[error("the table was opened without a memo file")]
    NoFpt,

    #[error("untested dBase file version: 0x{0:02x}")]
    UnsupportedVersion(u8),

    #[error("code page mark mismatch: header has {header}, converter has {converter}")]
    CodePageMismatch { header: u8, converter: u8 },

    #[error("unsupported column type: {0}")]
    UnsupportedType(char),

    #[error("invalid value type {value} for column {column}, expected {expected}")]
    TypeMismatch {
        column: String,
        value: &'static str,
        expected: &'static str,
    },

    #[error("searching memo columns is not supported")]
    SearchMemo,
}
