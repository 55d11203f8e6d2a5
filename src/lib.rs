//! # foxbase - FoxPro dBase Table Engine
//!
//! foxbase reads and writes FoxPro-family dBase tables: a `.dbf` table
//! file holding a fixed header, a column descriptor array, and
//! fixed-length row slots, plus an optional `.fpt` memo file holding
//! variable-length blobs referenced from memo columns.
//!
//! The engine opens existing tables, decodes typed column values from
//! raw row bytes, writes modified rows and appends new ones while
//! keeping the header consistent, allocates and writes memo blocks,
//! and supports positional navigation and linear search.
//!
//! ## Quick Start
//!
//! ```ignore
//! use foxbase::{Config, Dbf, UnicodeConverter, Value};
//!
//! let dbf = Dbf::open(Config::new(
//!     "people.dbf",
//!     Box::new(UnicodeConverter::default()),
//! ))?;
//!
//! dbf.goto(0)?;
//! let row = dbf.row()?;
//! println!("{:?}", row.field("NAME").unwrap().value());
//!
//! let mut fresh = dbf.new_row();
//! fresh.set("NAME", Value::Character("BOB".into()))?;
//! dbf.write_row(&fresh)?;
//! dbf.close()?;
//! ```
//!
//! ## File Layout
//!
//! ```text
//! people.dbf                       people.fpt
//! +--------------------+          +--------------------+
//! | Header (32B)       |          | Memo header        |
//! +--------------------+          |  next_free, size   |
//! | Column descriptors |          +--------------------+
//! |  (32B each)        |          | Block 0..n         |
//! +--------------------+          |  sign, length,     |
//! | 0x0D terminator    |          |  payload           |
//! +--------------------+          +--------------------+
//! | Row slots          |
//! |  (row_length each) |
//! +--------------------+
//! ```
//!
//! Each row slot leads with a deletion marker byte (0x20 live, 0x2A
//! deleted) followed by column data at the descriptor positions.
//!
//! ## Module Overview
//!
//! - [`table`]: the `Dbf` handle, configuration, rows, and the column
//!   value codec
//! - [`storage`]: on-disk header and descriptor layouts, advisory
//!   byte-range locking
//! - [`types`]: column descriptors and the `Value` domain type
//! - [`codec`]: Julian day arithmetic and ASCII numeric helpers
//! - [`error`]: the matchable error taxonomy
//!
//! ## Concurrency
//!
//! A `Dbf` may be shared across threads. Writes to each file serialise
//! through a per-file mutex; reads are unlocked and may observe torn
//! data when racing a writer on the same handle. Cross-process
//! coordination uses POSIX advisory byte-range locks, opt-in per
//! handle.

pub mod codec;
pub mod error;
pub mod storage;
pub mod table;
pub mod types;

pub use error::DbfError;
pub use table::{Config, Dbf, Encoding, Field, Row, UnicodeConverter};
pub use types::{Column, ColumnType, Value};
