//! # Column and Value Model
//!
//! The typed surface of the engine:
//!
//! - [`column`]: `ColumnType` (the eleven supported FoxPro type codes)
//!   and `Column`, the parsed descriptor exposed to callers.
//! - [`value`]: `Value`, the tagged domain value with one arm per
//!   decoded column domain.
//!
//! The mapping between the two (which arm a column type decodes to and
//! accepts on encode) lives in `table::fields`.

pub mod column;
pub mod value;

pub use column::{Column, ColumnType};
pub use value::Value;
