//! # Open Configuration and Converter Contract
//!
//! `Config` gathers everything `Dbf::open` needs: the table path, the
//! character-set converter, and the behaviour toggles. The converter is
//! an external collaborator expressed as the `Encoding` trait; the
//! engine never interprets `C` column bytes or text memo payloads
//! itself.
//!
//! `UnicodeConverter` is the bundled implementation for tables whose
//! text is already UTF-8 compatible; real single-byte code pages plug
//! in through their own `Encoding` implementations.

use eyre::Result;
use std::path::PathBuf;

/// Character-set converter between on-disk column bytes and text.
pub trait Encoding: Send + Sync {
    /// Decodes raw column bytes to text.
    fn decode(&self, raw: &[u8]) -> Result<String>;

    /// Encodes text to raw column bytes.
    fn encode(&self, text: &str) -> Result<Vec<u8>>;

    /// The single-byte code page identifier this converter implements,
    /// matched against the table header when code page validation is
    /// enabled.
    fn code_page_mark(&self) -> u8;
}

/// Pass-through converter for UTF-8 compatible tables. Undecodable
/// byte sequences are replaced rather than failing, since legacy
/// tables routinely hold stray high bytes.
#[derive(Debug, Clone)]
pub struct UnicodeConverter {
    code_page_mark: u8,
}

impl UnicodeConverter {
    pub fn new(code_page_mark: u8) -> Self {
        Self { code_page_mark }
    }
}

impl Default for UnicodeConverter {
    /// Defaults to 0x03, the Windows ANSI code page mark.
    fn default() -> Self {
        Self::new(0x03)
    }
}

impl Encoding for UnicodeConverter {
    fn decode(&self, raw: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(raw).into_owned())
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>> {
        Ok(text.as_bytes().to_vec())
    }

    fn code_page_mark(&self) -> u8 {
        self.code_page_mark
    }
}

/// Everything `Dbf::open` needs to know.
pub struct Config {
    /// Path of the table file. A companion memo file is looked up next
    /// to it when the header demands one.
    pub filename: PathBuf,
    /// Character-set converter for `C` columns and text memos.
    pub converter: Box<dyn Encoding>,
    /// Open the files with the exclusive flag.
    pub exclusive: bool,
    /// Accept file-type bytes outside the tested FoxPro set.
    pub untested: bool,
    /// Present `C` values with trailing pad spaces removed.
    pub trim_spaces: bool,
    /// Take advisory byte-range locks around writes.
    pub write_lock: bool,
    /// Require the header code page to match the converter.
    pub code_page_validation: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("filename", &self.filename)
            .field("exclusive", &self.exclusive)
            .field("untested", &self.untested)
            .field("trim_spaces", &self.trim_spaces)
            .field("write_lock", &self.write_lock)
            .field("code_page_validation", &self.code_page_validation)
            .finish()
    }
}

impl Config {
    /// A config with every toggle off.
    pub fn new(filename: impl Into<PathBuf>, converter: Box<dyn Encoding>) -> Self {
        Self {
            filename: filename.into(),
            converter,
            exclusive: false,
            untested: false,
            trim_spaces: false,
            write_lock: false,
            code_page_validation: false,
        }
    }

    pub fn exclusive(mut self, enabled: bool) -> Self {
        self.exclusive = enabled;
        self
    }

    pub fn untested(mut self, enabled: bool) -> Self {
        self.untested = enabled;
        self
    }

    pub fn trim_spaces(mut self, enabled: bool) -> Self {
        self.trim_spaces = enabled;
        self
    }

    pub fn write_lock(mut self, enabled: bool) -> Self {
        self.write_lock = enabled;
        self
    }

    pub fn code_page_validation(mut self, enabled: bool) -> Self {
        self.code_page_validation = enabled;
        self
    }
}
