//! # Domain Value Representation
//!
//! `Value` is the tagged domain value the engine decodes column slots
//! into and encodes rows from, one arm per supported column domain.
//! The column's type code selects the expected arm; handing a column
//! the wrong arm is a typed error, not a runtime surprise.
//!
//! ## Arms
//!
//! | Arm | Carries | Produced by columns |
//! |-----|---------|---------------------|
//! | `Character` | text | `C`, text memos on the encode side |
//! | `Memo` | payload bytes and a text flag | `M` |
//! | `Integer` | `i32` | `I` |
//! | `Numeric` | `i64` | `N` with zero decimals |
//! | `Float` | `f64` | `B`, `F`, `Y`, fractional `N` |
//! | `Logical` | `bool` | `L` |
//! | `Date` | calendar date | `D` |
//! | `DateTime` | date and time of day | `T` |
//! | `Varbinary` | raw bytes | `V` |
//!
//! Text memos decode with the table's converter applied, so the
//! `Memo` payload is UTF-8 whenever the flag is set.

use crate::types::ColumnType;
use chrono::{NaiveDate, NaiveDateTime};

/// A decoded column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Character(String),
    Memo(Vec<u8>, bool),
    Integer(i32),
    Numeric(i64),
    Float(f64),
    Logical(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Varbinary(Vec<u8>),
}

/// Day 1 of year 1, the blank-slot date.
pub(crate) fn zero_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(1, 1, 1).unwrap_or_default()
}

impl Value {
    /// Short arm name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Character(_) => "character",
            Value::Memo(..) => "memo",
            Value::Integer(_) => "integer",
            Value::Numeric(_) => "numeric",
            Value::Float(_) => "float",
            Value::Logical(_) => "logical",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Varbinary(_) => "varbinary",
        }
    }

    /// The zero value a fresh row carries for a column of this type.
    pub fn zero(column_type: ColumnType) -> Value {
        match column_type {
            ColumnType::Character => Value::Character(String::new()),
            ColumnType::Memo => Value::Memo(Vec::new(), true),
            ColumnType::Integer => Value::Integer(0),
            ColumnType::Numeric => Value::Numeric(0),
            ColumnType::Double | ColumnType::Float | ColumnType::Currency => Value::Float(0.0),
            ColumnType::Logical => Value::Logical(false),
            ColumnType::Date => Value::Date(zero_date()),
            ColumnType::DateTime => Value::DateTime(zero_date().and_hms_opt(0, 0, 0).unwrap_or_default()),
            ColumnType::Varbinary => Value::Varbinary(Vec::new()),
        }
    }

    /// Text view of `Character` values and text memos.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Character(text) => Some(text),
            Value::Memo(bytes, true) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(i64::from(*i)),
            Value::Numeric(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(f64::from(*i)),
            Value::Numeric(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Logical(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Value::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Varbinary(bytes) | Value::Memo(bytes, _) => Some(bytes),
            _ => None,
        }
    }
}
