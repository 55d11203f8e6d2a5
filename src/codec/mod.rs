//! # Byte-Level Codecs
//!
//! Pure, stateless helpers shared by the column value codec:
//!
//! - [`julian`]: Julian day number arithmetic for the `T` (datetime)
//!   column encoding.
//! - [`text`]: space padding and ASCII numeric parsing/formatting for
//!   the `C`, `F`, and `N` column encodings.
//!
//! Everything in here operates on byte slices and plain integers, does
//! no I/O, and allocates only for returned buffers. The stateful value
//! codec that dispatches on column types lives in `table::fields`.

pub mod julian;
pub mod text;

pub use julian::{julian_to_ymd, ymd_to_julian};
pub use text::{format_number, pad_leading, pad_trailing, parse_ascii_float, parse_ascii_int};
