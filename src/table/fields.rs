//! # Column Value Codec
//!
//! The mapping between raw column slot bytes and `Value` arms, one
//! rule per column type. This is where the engine's semantics live;
//! everything else is plumbing around it.
//!
//! The pure per-type rules are the free functions `decode_value` and
//! `encode_value`. Memo columns need the table handle (their slot
//! holds a block index into the FPT file), so the `Dbf` methods wrap
//! the free functions and add the memo indirection plus whole-row
//! assembly.
//!
//! ## Encode Tolerance
//!
//! Writers are permissive where the format's users historically were:
//!
//! - `I` accepts a float; values in `(0, i32::MAX]` convert, anything
//!   else stores zero.
//! - `D` and `T` accept an RFC 3339 string in place of a calendar
//!   value.
//! - `F` and `N` accept integers and floats both; integral floats are
//!   stored without a decimal point.
//! - `M` accepts text in place of a memo payload and stores it as a
//!   text block.
//!
//! Everything else is a `TypeMismatch`.

use crate::codec::{
    format_number, julian_to_ymd, pad_leading, pad_trailing, parse_ascii_float, parse_ascii_int,
    ymd_to_julian,
};
use crate::error::DbfError;
use crate::storage::{ACTIVE, DELETED};
use crate::table::config::Encoding;
use crate::table::row::{Field, Row};
use crate::table::Dbf;
use crate::types::value::zero_date;
use crate::types::{Column, ColumnType, Value};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use eyre::{bail, ensure, Result, WrapErr};

const MILLIS_PER_HOUR: u32 = 3_600_000;
const MILLIS_PER_MINUTE: u32 = 60_000;
const MILLIS_PER_SECOND: u32 = 1_000;

fn mismatch(column: &Column, value: &Value, expected: &'static str) -> eyre::Report {
    DbfError::TypeMismatch {
        column: column.name.clone(),
        value: value.type_name(),
        expected,
    }
    .into()
}

fn parse_rfc3339(text: &str) -> Result<NaiveDateTime> {
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_local())
        .wrap_err_with(|| format!("invalid RFC 3339 timestamp {text:?}"))
}

fn date_of(column: &Column, value: &Value) -> Result<NaiveDate> {
    match value {
        Value::Date(date) => Ok(*date),
        Value::DateTime(datetime) => Ok(datetime.date()),
        Value::Character(text) => Ok(parse_rfc3339(text)?.date()),
        other => Err(mismatch(column, other, "date, datetime or RFC 3339 text")),
    }
}

fn datetime_of(column: &Column, value: &Value) -> Result<NaiveDateTime> {
    match value {
        Value::DateTime(datetime) => Ok(*datetime),
        Value::Date(date) => Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default()),
        Value::Character(text) => parse_rfc3339(text),
        other => Err(mismatch(column, other, "datetime, date or RFC 3339 text")),
    }
}

/// Decodes a raw slot into its domain value. Memo slots are resolved
/// by the caller; this function covers every other column type.
pub(crate) fn decode_value(raw: &[u8], column: &Column, converter: &dyn Encoding) -> Result<Value> {
    match column.column_type {
        ColumnType::Character => {
            let text = converter
                .decode(raw)
                .wrap_err_with(|| format!("decoding text of column {}", column.name))?;
            Ok(Value::Character(text))
        }
        ColumnType::Integer => {
            ensure!(raw.len() >= 4, "integer slot of column {} is too short", column.name);
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&raw[..4]);
            Ok(Value::Integer(i32::from_le_bytes(bytes)))
        }
        ColumnType::Double => {
            ensure!(raw.len() >= 8, "double slot of column {} is too short", column.name);
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&raw[..8]);
            Ok(Value::Float(f64::from_le_bytes(bytes)))
        }
        ColumnType::Currency => {
            ensure!(raw.len() >= 8, "currency slot of column {} is too short", column.name);
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&raw[..8]);
            Ok(Value::Float(i64::from_le_bytes(bytes) as f64 / 10_000.0))
        }
        ColumnType::Date => decode_date(raw, column),
        ColumnType::DateTime => decode_datetime(raw, column),
        ColumnType::Logical => Ok(Value::Logical(raw == b"T")),
        ColumnType::Varbinary => Ok(Value::Varbinary(raw.to_vec())),
        ColumnType::Numeric => {
            if column.decimals == 0 {
                let n = parse_ascii_int(raw)
                    .wrap_err_with(|| format!("numeric slot of column {}", column.name))?;
                Ok(Value::Numeric(n))
            } else {
                let f = parse_ascii_float(raw)
                    .wrap_err_with(|| format!("numeric slot of column {}", column.name))?;
                Ok(Value::Float(f))
            }
        }
        ColumnType::Float => {
            let f = parse_ascii_float(raw)
                .wrap_err_with(|| format!("float slot of column {}", column.name))?;
            Ok(Value::Float(f))
        }
        ColumnType::Memo => bail!("memo slots are resolved through the memo file"),
    }
}

fn decode_date(raw: &[u8], column: &Column) -> Result<Value> {
    let text = std::str::from_utf8(raw)
        .wrap_err_with(|| format!("date slot of column {} holds non-ASCII bytes", column.name))?;
    let text = text.trim_matches(|c| c == ' ' || c == '\0');
    if text.is_empty() {
        return Ok(Value::Date(zero_date()));
    }
    ensure!(
        text.len() == 8,
        "date slot of column {} holds {text:?}, expected YYYYMMDD",
        column.name
    );
    let year: i32 = text[..4].parse().wrap_err("invalid date year")?;
    let month: u32 = text[4..6].parse().wrap_err("invalid date month")?;
    let day: u32 = text[6..8].parse().wrap_err("invalid date day")?;
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| eyre::eyre!("date slot of column {} holds impossible date {text:?}", column.name))?;
    Ok(Value::Date(date))
}

fn decode_datetime(raw: &[u8], column: &Column) -> Result<Value> {
    ensure!(raw.len() >= 8, "datetime slot of column {} is too short", column.name);
    let mut word = [0u8; 4];
    word.copy_from_slice(&raw[..4]);
    let julian_day = u32::from_le_bytes(word);
    word.copy_from_slice(&raw[4..8]);
    let millis = u32::from_le_bytes(word);

    if julian_day == 0 && millis == 0 {
        return Ok(Value::DateTime(zero_date().and_hms_opt(0, 0, 0).unwrap_or_default()));
    }

    let (year, month, day) = julian_to_ymd(i64::from(julian_day));
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
        eyre::eyre!("datetime slot of column {} holds impossible day {julian_day}", column.name)
    })?;
    let datetime = date
        .and_hms_milli_opt(
            millis / MILLIS_PER_HOUR,
            millis % MILLIS_PER_HOUR / MILLIS_PER_MINUTE,
            millis % MILLIS_PER_MINUTE / MILLIS_PER_SECOND,
            millis % MILLIS_PER_SECOND,
        )
        .ok_or_else(|| {
            eyre::eyre!("datetime slot of column {} holds impossible time {millis}", column.name)
        })?;
    Ok(Value::DateTime(datetime))
}

/// Encodes a domain value into slot bytes for its column. With `pad`
/// the result is exactly `column.length` bytes, the form rows store;
/// without it text and numeric encodings keep their natural width,
/// the form substring search matches against. Memo values are written
/// by the caller; this function covers every other column type.
pub(crate) fn encode_value(
    value: &Value,
    column: &Column,
    converter: &dyn Encoding,
    pad: bool,
) -> Result<Vec<u8>> {
    let length = column.length as usize;
    match column.column_type {
        ColumnType::Character => {
            let text = match value {
                Value::Character(text) => text,
                other => return Err(mismatch(column, other, "character")),
            };
            let mut encoded = converter
                .encode(text)
                .wrap_err_with(|| format!("encoding text of column {}", column.name))?;
            if pad {
                encoded = pad_trailing(&encoded, length);
                encoded.truncate(length);
            }
            Ok(encoded)
        }
        ColumnType::Integer => {
            let n = match value {
                Value::Integer(n) => *n,
                Value::Float(f) => {
                    if *f > 0.0 && *f <= i32::MAX as f64 {
                        *f as i32
                    } else {
                        0
                    }
                }
                other => return Err(mismatch(column, other, "integer or float")),
            };
            Ok(fixed_slot(&n.to_le_bytes(), length))
        }
        ColumnType::Currency => {
            let f = match value {
                Value::Float(f) => *f,
                other => return Err(mismatch(column, other, "float")),
            };
            let scaled = (f * 10_000.0) as i64;
            Ok(fixed_slot(&scaled.to_le_bytes(), length))
        }
        ColumnType::Double => {
            let f = match value {
                Value::Float(f) => *f,
                other => return Err(mismatch(column, other, "float")),
            };
            Ok(fixed_slot(&f.to_le_bytes(), length))
        }
        ColumnType::Date => {
            let date = date_of(column, value)?;
            let text = format!("{:04}{:02}{:02}", date.year(), date.month(), date.day());
            Ok(fixed_slot(text.as_bytes(), length))
        }
        ColumnType::DateTime => {
            let datetime = datetime_of(column, value)?;
            let date = datetime.date();
            let julian_day = ymd_to_julian(date.year(), date.month(), date.day()) as u32;
            let millis = datetime.hour() * MILLIS_PER_HOUR
                + datetime.minute() * MILLIS_PER_MINUTE
                + datetime.second() * MILLIS_PER_SECOND
                + datetime.nanosecond() / 1_000_000;
            let mut raw = [0u8; 8];
            raw[..4].copy_from_slice(&julian_day.to_le_bytes());
            raw[4..].copy_from_slice(&millis.to_le_bytes());
            Ok(fixed_slot(&raw, length))
        }
        ColumnType::Logical => {
            let b = match value {
                Value::Logical(b) => *b,
                other => return Err(mismatch(column, other, "logical")),
            };
            Ok(vec![if b { b'T' } else { b'F' }])
        }
        ColumnType::Varbinary => {
            let bytes = match value {
                Value::Varbinary(bytes) => bytes,
                other => return Err(mismatch(column, other, "varbinary")),
            };
            if !pad {
                return Ok(bytes.clone());
            }
            ensure!(
                bytes.len() <= length,
                "varbinary value of {} bytes exceeds the {length} byte slot of column {}",
                bytes.len(),
                column.name
            );
            let mut slot = bytes.clone();
            slot.resize(length, 0);
            Ok(slot)
        }
        ColumnType::Float | ColumnType::Numeric => {
            let digits = match value {
                Value::Float(f) => format_number(*f, column.decimals)
                    .wrap_err_with(|| format!("formatting column {}", column.name))?,
                Value::Numeric(n) => format!("{n}").into_bytes(),
                Value::Integer(n) => format!("{n}").into_bytes(),
                other => return Err(mismatch(column, other, "integer or float")),
            };
            if !pad {
                return Ok(digits);
            }
            ensure!(
                digits.len() <= length,
                "number {:?} does not fit the {length} byte slot of column {}",
                String::from_utf8_lossy(&digits),
                column.name
            );
            Ok(pad_leading(&digits, length))
        }
        ColumnType::Memo => bail!("memo values are written through the memo file"),
    }
}

fn fixed_slot(encoded: &[u8], length: usize) -> Vec<u8> {
    let mut slot = vec![0u8; length];
    let copied = encoded.len().min(length);
    slot[..copied].copy_from_slice(&encoded[..copied]);
    slot
}

impl Dbf {
    /// Decodes one raw column slot, resolving memo references through
    /// the FPT file.
    pub(crate) fn decode_field(&self, raw: &[u8], column: &Column) -> Result<Value> {
        ensure!(
            raw.len() == column.length as usize,
            "invalid length {} bytes != {} bytes at column {}",
            raw.len(),
            column.length,
            column.name
        );
        if column.column_type == ColumnType::Memo {
            let (payload, is_text) = self
                .read_memo(raw)
                .wrap_err_with(|| format!("resolving memo of column {}", column.name))?;
            let payload = if is_text {
                self.converter()
                    .decode(&payload)
                    .wrap_err_with(|| format!("decoding text memo of column {}", column.name))?
                    .into_bytes()
            } else {
                payload
            };
            return Ok(Value::Memo(payload, is_text));
        }
        decode_value(raw, column, self.converter())
    }

    /// Encodes one field value into slot bytes, writing memo payloads
    /// out to the FPT file. With `pad` the result is exactly the
    /// column's slot width.
    pub(crate) fn encode_field(&self, value: &Value, column: &Column, pad: bool) -> Result<Vec<u8>> {
        if column.column_type == ColumnType::Memo {
            let (payload, is_text): (&[u8], bool) = match value {
                Value::Memo(bytes, is_text) => (bytes, *is_text),
                Value::Character(text) => (text.as_bytes(), true),
                other => return Err(mismatch(column, other, "memo or character")),
            };
            let block_ref = self
                .write_memo(payload, is_text, payload.len() as u32)
                .wrap_err_with(|| format!("writing memo of column {}", column.name))?;
            return Ok(fixed_slot(&block_ref, column.length as usize));
        }
        encode_value(value, column, self.converter(), pad)
    }

    /// Decodes a full raw row slot into a materialised `Row`.
    pub(crate) fn decode_row(&self, position: u32, raw: &[u8]) -> Result<Row> {
        let deleted = raw.first().copied() == Some(DELETED);
        let mut fields = Vec::with_capacity(self.columns().len());
        for column in self.columns() {
            let start = column.position as usize;
            let end = start + column.length as usize;
            ensure!(
                end <= raw.len(),
                "column {} slot [{start}, {end}) exceeds the {} byte row",
                column.name,
                raw.len()
            );
            let mut value = self
                .decode_field(&raw[start..end], column)
                .wrap_err_with(|| format!("decoding column {} of row {position}", column.name))?;
            if self.trims_spaces() {
                if let Value::Character(text) = &mut value {
                    text.truncate(text.trim_end_matches(' ').len());
                }
            }
            fields.push(Field::new(column.clone(), value));
        }
        Ok(Row::new(position, deleted, fields))
    }

    /// Assembles the on-disk row buffer: deletion marker first, then
    /// every field encoded at its descriptor position.
    pub(crate) fn encode_row(&self, row: &Row, row_length: u16) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; row_length as usize];
        if buf.is_empty() {
            bail!("row length of zero bytes leaves no room for the deletion marker");
        }
        buf[0] = if row.deleted() { DELETED } else { ACTIVE };
        for field in row.fields() {
            let column = field.column();
            let start = column.position as usize;
            let end = start + column.length as usize;
            ensure!(
                end <= buf.len(),
                "column {} slot [{start}, {end}) exceeds the {row_length} byte row",
                column.name
            );
            let raw = self
                .encode_field(field.value(), column, true)
                .wrap_err_with(|| format!("encoding column {}", column.name))?;
            let copied = raw.len().min(column.length as usize);
            buf[start..start + copied].copy_from_slice(&raw[..copied]);
        }
        Ok(buf)
    }
}
