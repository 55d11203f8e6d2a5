//! # The Table Handle
//!
//! `Dbf` owns the two file descriptors of an open table (the table
//! file, and the memo file when the header demands one) and sequences
//! every operation against them: lifecycle, cursor navigation, row and
//! memo I/O, and linear search.
//!
//! ## Concurrency Model
//!
//! The handle is shared freely across threads. Writes serialise
//! per file: the table mutex owns the table header and covers
//! `write_row` end to end, the memo mutex owns the memo header and
//! covers `write_memo`. Reads take no lock beyond a momentary header
//! snapshot, so a reader racing a writer on the same handle can
//! observe torn row bytes; concurrent read-write on one handle is not
//! a supported pattern. Cross-process coordination is the advisory
//! byte-range locking of `storage::lock`, enabled per handle.
//!
//! ## Append Convention
//!
//! A row whose position is at or past `rows_count` is an append: the
//! slot lands at `first_row + (position - 1) * row_length` and the
//! header's row count grows by one before the payload is written.
//! `new_row` hands out rows positioned accordingly.
//!
//! ## Module Structure
//!
//! - `config`: open configuration and the converter contract
//! - `row`: materialised rows and fields
//! - `fields`: the per-column-type value codec

pub mod config;
pub mod fields;
pub mod row;

pub use config::{Config, Encoding, UnicodeConverter};
pub use row::{Field, Row};

use crate::error::DbfError;
use crate::storage::lock::with_range_lock;
use crate::storage::{descriptors, headers, read_slot};
use crate::storage::{MemoHeader, TableHeader, DELETED, MEMO_BLOCK_HEADER_SIZE};
use crate::types::{Column, ColumnType, Value};
use chrono::Local;
use eyre::{ensure, Result, WrapErr};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tracing::debug;
use zerocopy::IntoBytes;

/// An open dBase table.
#[derive(Debug)]
pub struct Dbf {
    config: Config,
    write_lock: AtomicBool,
    table_file: File,
    memo_file: Option<File>,
    columns: Vec<Column>,
    /// Table mutex: owns the header, serialises table-file writes.
    header: Mutex<TableHeader>,
    /// Memo mutex: owns the memo header, serialises memo-file writes.
    memo_header: Mutex<Option<MemoHeader>>,
    /// Copy of the header's first-row offset. Fixed after open; also
    /// serves as the memo header's lock region length.
    first_row: u16,
    cursor: AtomicU32,
}

impl Dbf {
    /// Opens the table file, parses its header and column descriptors,
    /// and opens the companion memo file when the header's memo flag
    /// is set.
    pub fn open(config: Config) -> Result<Self> {
        let filename: PathBuf = config.filename.components().collect();

        let mut options = OpenOptions::new();
        options.read(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            if config.exclusive {
                options.custom_flags(libc::O_EXCL);
            }
        }

        let table_file = options.open(&filename).wrap_err_with(|| {
            format!("open: opening table file '{}' failed", filename.display())
        })?;
        let header =
            headers::read_header(&table_file).wrap_err("open: reading table header failed")?;
        headers::validate_file_version(header.file_type(), config.untested)
            .wrap_err("open: file version check failed")?;
        let columns = descriptors::read_columns(&table_file)
            .wrap_err("open: reading column descriptors failed")?;

        if config.code_page_validation {
            let mark = config.converter.code_page_mark();
            if header.code_page() != mark {
                return Err(DbfError::CodePageMismatch {
                    header: header.code_page(),
                    converter: mark,
                })
                .wrap_err("open: code page validation failed");
            }
        }

        let (memo_file, memo_header) = if header.has_memo() {
            let memo_path = memo_path(&filename);
            let memo_file = options.open(&memo_path).wrap_err_with(|| {
                format!("open: opening memo file '{}' failed", memo_path.display())
            })?;
            let memo_header = headers::read_memo_header(&memo_file)
                .wrap_err("open: reading memo header failed")?;
            (Some(memo_file), Some(memo_header))
        } else {
            (None, None)
        };

        debug!(
            table = %filename.display(),
            rows = header.rows_count(),
            columns = columns.len(),
            memo = memo_file.is_some(),
            "opened table"
        );

        Ok(Self {
            write_lock: AtomicBool::new(config.write_lock),
            first_row: header.first_row(),
            header: Mutex::new(header),
            memo_header: Mutex::new(memo_header),
            table_file,
            memo_file,
            columns,
            cursor: AtomicU32::new(0),
            config,
        })
    }

    /// Flushes and releases both file handles. Both flushes are
    /// attempted; the first failure is surfaced.
    pub fn close(self) -> Result<()> {
        debug!("closing table");
        let table = self
            .table_file
            .sync_all()
            .wrap_err("close: flushing the table file failed");
        let memo = match &self.memo_file {
            Some(file) => file
                .sync_all()
                .wrap_err("close: flushing the memo file failed"),
            None => Ok(()),
        };
        table.and(memo)
    }

    pub(crate) fn converter(&self) -> &dyn Encoding {
        self.config.converter.as_ref()
    }

    pub(crate) fn trims_spaces(&self) -> bool {
        self.config.trim_spaces
    }

    fn write_lock_enabled(&self) -> bool {
        self.write_lock.load(Ordering::Acquire)
    }

    /// Enables or disables advisory byte-range locking on writes.
    pub fn write_lock(&self, enabled: bool) {
        self.write_lock.store(enabled, Ordering::Release);
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Looks a column up by name, case-insensitively.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.is_named(name))
    }

    pub fn rows_count(&self) -> u32 {
        self.header.lock().rows_count()
    }

    pub fn row_length(&self) -> u16 {
        self.header.lock().row_length()
    }

    pub fn first_row(&self) -> u16 {
        self.first_row
    }

    pub fn file_type(&self) -> u8 {
        self.header.lock().file_type()
    }

    pub fn code_page(&self) -> u8 {
        self.header.lock().code_page()
    }

    /// The last modification date stamped in the header.
    pub fn modified(&self) -> chrono::NaiveDate {
        self.header.lock().modified()
    }

    /// The current cursor position.
    pub fn position(&self) -> u32 {
        self.cursor.load(Ordering::Acquire)
    }

    /// Moves the cursor to `row`. Positions past `rows_count` clamp
    /// the cursor there and fail with `Eof`.
    pub fn goto(&self, row: u32) -> Result<()> {
        let rows_count = self.header.lock().rows_count();
        if row > rows_count {
            self.cursor.store(rows_count, Ordering::Release);
            return Err(DbfError::Eof)
                .wrap_err_with(|| format!("goto: row {row} is past the {rows_count} row slots"));
        }
        self.cursor.store(row, Ordering::Release);
        Ok(())
    }

    /// Moves the cursor by `offset`, clamping into `[0, rows_count]`.
    /// Deleted rows are not skipped.
    pub fn skip(&self, offset: i64) {
        let rows_count = self.header.lock().rows_count();
        let current = i64::from(self.cursor.load(Ordering::Acquire));
        let next = (current + offset).clamp(0, i64::from(rows_count));
        self.cursor.store(next as u32, Ordering::Release);
    }

    /// Whether the row under the cursor carries the deletion marker.
    pub fn deleted(&self) -> Result<bool> {
        let (rows_count, first_row, row_length) = self.layout();
        let cursor = self.cursor.load(Ordering::Acquire);
        if cursor >= rows_count {
            return Err(DbfError::Eof)
                .wrap_err_with(|| format!("deleted: cursor {cursor} is past the row slots"));
        }
        let mut marker = [0u8; 1];
        read_slot(
            &self.table_file,
            first_row + u64::from(cursor) * row_length,
            &mut marker,
        )
        .wrap_err("deleted: reading the deletion marker failed")?;
        Ok(marker[0] == DELETED)
    }

    fn layout(&self) -> (u32, u64, u64) {
        let header = self.header.lock();
        (
            header.rows_count(),
            u64::from(header.first_row()),
            u64::from(header.row_length()),
        )
    }

    /// Reads the raw bytes of row slot `position`.
    pub(crate) fn read_row(&self, position: u32) -> Result<Vec<u8>> {
        let (rows_count, first_row, row_length) = self.layout();
        if position >= rows_count {
            return Err(DbfError::Eof)
                .wrap_err_with(|| format!("read_row: row {position} is past the {rows_count} row slots"));
        }
        let mut buf = vec![0u8; row_length as usize];
        read_slot(
            &self.table_file,
            first_row + u64::from(position) * row_length,
            &mut buf,
        )
        .wrap_err_with(|| format!("read_row: reading row {position} failed"))?;
        Ok(buf)
    }

    /// Materialises the row under the cursor.
    pub fn row(&self) -> Result<Row> {
        let position = self.cursor.load(Ordering::Acquire);
        let raw = self.read_row(position)?;
        self.decode_row(position, &raw)
            .wrap_err_with(|| format!("row: decoding row {position} failed"))
    }

    /// Materialises every row slot, optionally dropping slots whose
    /// marker is the deletion sentinel.
    pub fn rows(&self, skip_deleted: bool) -> Result<Vec<Row>> {
        let rows_count = self.rows_count();
        let mut rows = Vec::with_capacity(rows_count as usize);
        for position in 0..rows_count {
            let raw = self.read_row(position)?;
            if skip_deleted && raw.first().copied() == Some(DELETED) {
                continue;
            }
            rows.push(self.decode_row(position, &raw)?);
        }
        Ok(rows)
    }

    /// A fresh appendable row carrying each column's zero value.
    pub fn new_row(&self) -> Row {
        let fields = self
            .columns
            .iter()
            .map(|column| Field::new(column.clone(), Value::zero(column.column_type)))
            .collect();
        Row::new(self.rows_count() + 1, false, fields)
    }

    /// Pairs a value with the named column, for `search`.
    pub fn new_field(&self, name: &str, value: Value) -> Result<Field> {
        let column = self
            .column(name)
            .ok_or_else(|| eyre::eyre!("table has no column named {name:?}"))?;
        Ok(Field::new(column.clone(), value))
    }

    /// Writes a row back to its slot. Positions at or past the current
    /// row count append: the row count grows by one and the header is
    /// rewritten (restamping the modification date) before the row
    /// payload goes out.
    pub fn write_row(&self, row: &Row) -> Result<()> {
        let mut header = self.header.lock();

        let raw = self
            .encode_row(row, header.row_length())
            .wrap_err("write_row: encoding the row failed")?;

        let first_row = u64::from(header.first_row());
        let row_length = u64::from(header.row_length());
        let appending = row.position() >= header.rows_count();
        let offset = if appending {
            ensure!(
                row.position() > 0,
                "write_row: append position 0 has no slot before the first row"
            );
            header.increment_rows_count();
            first_row + (u64::from(row.position()) - 1) * row_length
        } else {
            first_row + u64::from(row.position()) * row_length
        };

        self.write_header(&mut header)
            .wrap_err("write_row: rewriting the table header failed")?;

        with_range_lock(
            self.write_lock_enabled(),
            &self.table_file,
            offset,
            row_length,
            || {
                let mut file = &self.table_file;
                file.seek(SeekFrom::Start(offset))
                    .wrap_err("write_row: seek to row slot failed")?;
                file.write_all(&raw)
                    .wrap_err("write_row: writing the row failed")?;
                Ok(())
            },
        )?;

        debug!(position = row.position(), appending, "wrote row");
        Ok(())
    }

    /// Serialises the header, stamping the modification date with the
    /// current local day.
    fn write_header(&self, header: &mut TableHeader) -> Result<()> {
        let lock_length = u64::from(header.first_row());
        with_range_lock(
            self.write_lock_enabled(),
            &self.table_file,
            0,
            lock_length,
            || {
                header.stamp_modified(Local::now().date_naive());
                let mut file = &self.table_file;
                file.seek(SeekFrom::Start(0))
                    .wrap_err("write_header: seek to file start failed")?;
                file.write_all(header.as_bytes())
                    .wrap_err("write_header: writing the header failed")?;
                Ok(())
            },
        )
    }

    /// Resolves a memo column's block reference into its payload and
    /// text flag.
    pub fn read_memo(&self, block_ref: &[u8]) -> Result<(Vec<u8>, bool)> {
        let memo_file = self
            .memo_file
            .as_ref()
            .ok_or(DbfError::NoFpt)
            .wrap_err("read_memo: table has no memo file")?;
        let header = (*self.memo_header.lock())
            .ok_or(DbfError::NoFpt)
            .wrap_err("read_memo: table has no memo header")?;

        ensure!(
            block_ref.len() >= 4,
            "read_memo: block reference of {} bytes is too short",
            block_ref.len()
        );
        let mut word = [0u8; 4];
        word.copy_from_slice(&block_ref[..4]);
        let block = u32::from_le_bytes(word);
        let block_size = u64::from(header.block_size());

        let mut block_header = [0u8; MEMO_BLOCK_HEADER_SIZE];
        read_slot(memo_file, u64::from(block) * block_size, &mut block_header)
            .wrap_err("read_memo: reading the block header failed")?;
        word.copy_from_slice(&block_header[..4]);
        let sign = u32::from_be_bytes(word);
        word.copy_from_slice(&block_header[4..8]);
        let length = u32::from_be_bytes(word);

        if length == 0 {
            return Ok((Vec::new(), sign == 1));
        }

        let mut payload = vec![0u8; length as usize];
        read_slot(
            memo_file,
            u64::from(block) * block_size + MEMO_BLOCK_HEADER_SIZE as u64,
            &mut payload,
        )
        .wrap_err("read_memo: reading the block payload failed")?;
        Ok((payload, sign == 1))
    }

    /// Appends a memo block and returns the 4-byte little-endian
    /// block reference its column slot stores. The next-free counter
    /// advances by exactly one block per write; payloads larger than
    /// one block truncate.
    pub fn write_memo(&self, payload: &[u8], is_text: bool, length: u32) -> Result<[u8; 4]> {
        let mut guard = self.memo_header.lock();
        let memo_file = self
            .memo_file
            .as_ref()
            .ok_or(DbfError::NoFpt)
            .wrap_err("write_memo: table has no memo file")?;
        let header = guard
            .as_mut()
            .ok_or(DbfError::NoFpt)
            .wrap_err("write_memo: table has no memo header")?;

        let block_position = header.next_free();
        self.write_memo_header(memo_file, header)
            .wrap_err("write_memo: updating the memo header failed")?;

        let block_size = usize::from(header.block_size());
        ensure!(
            block_size > MEMO_BLOCK_HEADER_SIZE,
            "write_memo: block size {block_size} cannot hold a block header"
        );
        let mut block = vec![0u8; block_size];
        let sign: u32 = if is_text { 1 } else { 0 };
        block[..4].copy_from_slice(&sign.to_be_bytes());
        block[4..8].copy_from_slice(&length.to_be_bytes());
        let copied = payload.len().min(block_size - MEMO_BLOCK_HEADER_SIZE);
        block[MEMO_BLOCK_HEADER_SIZE..MEMO_BLOCK_HEADER_SIZE + copied]
            .copy_from_slice(&payload[..copied]);

        let offset = u64::from(block_position) * block_size as u64;
        with_range_lock(
            self.write_lock_enabled(),
            memo_file,
            u64::from(block_position),
            block_size as u64,
            || {
                let mut file = memo_file;
                file.seek(SeekFrom::Start(offset))
                    .wrap_err("write_memo: seek to block failed")?;
                file.write_all(&block)
                    .wrap_err("write_memo: writing the block failed")?;
                Ok(())
            },
        )?;

        debug!(block = block_position, text = is_text, length, "wrote memo block");
        Ok(block_position.to_le_bytes())
    }

    fn write_memo_header(&self, memo_file: &File, header: &mut MemoHeader) -> Result<()> {
        let lock_length = u64::from(self.first_row);
        with_range_lock(
            self.write_lock_enabled(),
            memo_file,
            0,
            lock_length,
            || {
                let mut file = memo_file;
                file.seek(SeekFrom::Start(0))
                    .wrap_err("write_memo_header: seek to file start failed")?;
                header.increment_next_free();
                file.write_all(header.as_bytes())
                    .wrap_err("write_memo_header: writing the memo header failed")?;
                Ok(())
            },
        )
    }

    /// Scans every row for slots whose bytes contain the encoded
    /// target value. With `exact_match` the target is padded to the
    /// full slot width, so containment equals slot equality. Rows that
    /// fail to read or decode are skipped.
    pub fn search(&self, field: &Field, exact_match: bool) -> Result<Vec<Row>> {
        let column = field.column();
        if column.column_type == ColumnType::Memo {
            return Err(DbfError::SearchMemo).wrap_err("search: memo columns cannot be scanned");
        }
        let target = self
            .encode_field(field.value(), column, exact_match)
            .wrap_err("search: encoding the target value failed")?;

        let (rows_count, first_row, row_length) = self.layout();
        let mut matches = Vec::new();
        let mut slot = vec![0u8; usize::from(column.length)];
        for position in 0..rows_count {
            let offset =
                first_row + u64::from(position) * row_length + u64::from(column.position);
            if read_slot(&self.table_file, offset, &mut slot).is_err() {
                continue;
            }
            if !contains(&slot, &target) {
                continue;
            }
            if self.goto(position).is_err() {
                continue;
            }
            match self.row() {
                Ok(row) => matches.push(row),
                Err(_) => continue,
            }
        }
        Ok(matches)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    if needle.len() > haystack.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// The companion memo path: same file name, `.fpt` extension, upper
/// case when the table extension is upper case.
fn memo_path(table_path: &Path) -> PathBuf {
    let ext = table_path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let memo_ext = if ext.to_uppercase() == ext { "FPT" } else { "fpt" };
    table_path.with_extension(memo_ext)
}
