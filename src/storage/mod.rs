//! # On-Disk Layout and Raw File Access
//!
//! This module owns everything that touches bytes at known file
//! offsets:
//!
//! - [`headers`]: the 32-byte table header and the big-endian memo
//!   header, as zerocopy structs with file readers.
//! - [`descriptors`]: the 32-byte column descriptor array and its
//!   sentinel-terminated scan.
//! - [`lock`]: POSIX advisory byte-range locking behind a small trait
//!   with a no-op fallback.
//!
//! The stateful engine that sequences these reads and writes into
//! table operations lives in the `table` module.

pub mod descriptors;
pub mod headers;
pub(crate) mod lock;

pub use descriptors::{ColumnDescriptor, DESCRIPTOR_SIZE, NULL_FLAGS_COLUMN};
pub use headers::{
    MemoHeader, TableHeader, ACTIVE, COLUMN_END, DELETED, FOXPRO, FOXPRO_AUTOINCREMENT,
    HEADER_SIZE, MEMO_BLOCK_HEADER_SIZE, MEMO_FLAG, MEMO_HEADER_SIZE,
};

use crate::error::DbfError;
use eyre::{Result, WrapErr};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// Reads up to `length` bytes from the start of the file. The returned
/// buffer is truncated to what the file actually holds.
pub(crate) fn read_prefix(mut file: &File, length: usize) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(0))
        .wrap_err("seek to file start failed")?;
    let mut buf = vec![0u8; length];
    let mut filled = 0;
    while filled < length {
        let n = file
            .read(&mut buf[filled..])
            .wrap_err("reading file prefix failed")?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    buf.truncate(filled);
    Ok(buf)
}

/// Reads exactly `buf.len()` bytes at `offset`. A file that ends early
/// is an `Incomplete` error.
pub(crate) fn read_slot(mut file: &File, offset: u64, buf: &mut [u8]) -> Result<()> {
    file.seek(SeekFrom::Start(offset))
        .wrap_err_with(|| format!("seek to offset {offset} failed"))?;
    let mut filled = 0;
    while filled < buf.len() {
        let n = file
            .read(&mut buf[filled..])
            .wrap_err_with(|| format!("read at offset {offset} failed"))?;
        if n == 0 {
            return Err(DbfError::Incomplete)
                .wrap_err_with(|| format!("{filled} of {} bytes at offset {offset}", buf.len()));
        }
        filled += n;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn prefix_reads_stop_at_end_of_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let file = File::open(&path).unwrap();
        let buf = read_prefix(&file, 1024).unwrap();
        assert_eq!(buf, [1, 2, 3]);
    }

    #[test]
    fn slot_reads_past_the_end_are_incomplete() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("short.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0u8; 10]).unwrap();

        let file = File::open(&path).unwrap();
        let mut buf = [0u8; 8];
        assert!(read_slot(&file, 4, &mut buf).is_ok());

        let err = read_slot(&file, 8, &mut buf).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DbfError>(),
            Some(&DbfError::Incomplete)
        );
    }
}
