//! # ASCII Numeric and Padding Codec
//!
//! FoxPro stores `C` columns space-padded on the right, and `F`/`N`
//! columns as ASCII decimal text space-padded on the left. This module
//! provides the padding helpers and the numeric parse/format routines
//! those encodings share.
//!
//! Blank slots (all spaces, or spaces around nothing) are routine in
//! real tables and parse as zero rather than failing.

use eyre::{bail, Result, WrapErr};

/// Right-pads `bytes` with spaces up to `length`. Longer inputs are
/// returned unchanged.
pub fn pad_trailing(bytes: &[u8], length: usize) -> Vec<u8> {
    let mut out = bytes.to_vec();
    while out.len() < length {
        out.push(b' ');
    }
    out
}

/// Left-pads `bytes` with spaces up to `length`. Longer inputs are
/// returned unchanged.
pub fn pad_leading(bytes: &[u8], length: usize) -> Vec<u8> {
    if bytes.len() >= length {
        return bytes.to_vec();
    }
    let mut out = vec![b' '; length - bytes.len()];
    out.extend_from_slice(bytes);
    out
}

fn trimmed_ascii(raw: &[u8]) -> Result<&str> {
    let text = std::str::from_utf8(raw).wrap_err("numeric slot holds non-ASCII bytes")?;
    Ok(text.trim_matches(|c| c == ' ' || c == '\0'))
}

/// Parses a space-padded ASCII integer slot. Blank slots are zero.
pub fn parse_ascii_int(raw: &[u8]) -> Result<i64> {
    let text = trimmed_ascii(raw)?;
    if text.is_empty() {
        return Ok(0);
    }
    text.parse::<i64>()
        .wrap_err_with(|| format!("invalid integer slot {text:?}"))
}

/// Parses a space-padded ASCII decimal slot. Blank slots are zero.
pub fn parse_ascii_float(raw: &[u8]) -> Result<f64> {
    let text = trimmed_ascii(raw)?;
    if text.is_empty() {
        return Ok(0.0);
    }
    text.parse::<f64>()
        .wrap_err_with(|| format!("invalid decimal slot {text:?}"))
}

/// Formats a number the way `F`/`N` slots store it: integral values
/// without a decimal point, fractional values with exactly `decimals`
/// places.
pub fn format_number(value: f64, decimals: u8) -> Result<Vec<u8>> {
    if !value.is_finite() {
        bail!("cannot store non-finite number {value}");
    }
    let text = if value == value.trunc() {
        format!("{}", value as i64)
    } else {
        format!("{:.*}", decimals as usize, value)
    };
    Ok(text.into_bytes())
}
