//! EBCDIC code pages and the text codec built on them
//!
//! This module owns the single-byte tables used to translate between the
//! remote host's EBCDIC bytes and Unicode text on the local terminal.
//!
//! The set of code pages is fixed at compile time. A code page is picked once
//! at startup by name through [`lookup`]; an unknown name is a configuration
//! error, never a per-call failure.
//!
//! # Conversion policy
//!
//! - Decoding is total: bytes without a character assignment (0xFF in every
//!   built-in page) become U+FFFD REPLACEMENT CHARACTER.
//! - Encoding is total: characters the page cannot represent become the
//!   EBCDIC SUB control (0x3F).
//!
//! # Examples
//!
//! ```
//! use netebcdicat::codepage;
//!
//! let cp = codepage::lookup("cp037").unwrap();
//! assert_eq!(cp.decode(&[0xC8, 0xC5, 0xD3, 0xD3, 0xD6]), "HELLO");
//! assert_eq!(cp.encode("HI"), vec![0xC8, 0xC9]);
//! ```

mod tables;

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::OnceCell;

use crate::error::{ConfigError, ConfigResult};

pub use tables::UNMAPPED;

/// EBCDIC NL control. Hosts use it as the end-of-line marker.
pub const EBCDIC_NL: u8 = 0x15;

/// EBCDIC SUB control, written in place of unencodable characters.
pub const EBCDIC_SUB: u8 = 0x3F;

/// Name of the code page used when none is requested.
pub const DEFAULT_CODEPAGE: &str = "cp1047";

/// A single-byte EBCDIC code page.
pub struct CodePage {
    name: &'static str,
    aliases: &'static [&'static str],
    description: &'static str,
    to_unicode: [char; 256],
    from_unicode: OnceCell<HashMap<char, u8>>,
}

impl CodePage {
    const fn new(
        name: &'static str,
        aliases: &'static [&'static str],
        description: &'static str,
        to_unicode: [char; 256],
    ) -> Self {
        Self {
            name,
            aliases,
            description,
            to_unicode,
            from_unicode: OnceCell::new(),
        }
    }

    /// Canonical name, e.g. `cp037`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn aliases(&self) -> &'static [&'static str] {
        self.aliases
    }

    pub fn description(&self) -> &'static str {
        self.description
    }

    /// Byte appended to every line sent to the host.
    pub fn line_terminator(&self) -> u8 {
        EBCDIC_NL
    }

    /// True if `name` is this page's canonical name or one of its aliases,
    /// ignoring ASCII case.
    pub fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|alias| alias.eq_ignore_ascii_case(name))
    }

    /// Whether `byte` has a character assignment in this page.
    #[inline]
    pub fn is_mapped(&self, byte: u8) -> bool {
        self.to_unicode[byte as usize] != UNMAPPED
    }

    /// Convert one EBCDIC byte, yielding U+FFFD for unassigned positions.
    #[inline(always)]
    pub fn decode_byte(&self, byte: u8) -> char {
        self.to_unicode[byte as usize]
    }

    /// Convert one character, or `None` if this page cannot represent it.
    pub fn encode_char(&self, ch: char) -> Option<u8> {
        self.reverse_table().get(&ch).copied()
    }

    /// Decode a byte slice received from the host.
    ///
    /// Never fails; see the module docs for the replacement policy.
    pub fn decode(&self, bytes: &[u8]) -> String {
        let mut text = String::with_capacity(bytes.len());
        self.decode_into(bytes, &mut text);
        text
    }

    /// Decode `bytes`, appending to `out`.
    pub fn decode_into(&self, bytes: &[u8], out: &mut String) {
        out.extend(bytes.iter().map(|&byte| self.decode_byte(byte)));
    }

    /// Encode text for the host, substituting SUB for unencodable characters.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(text.len());
        self.encode_into(text, &mut bytes);
        bytes
    }

    /// Encode `text`, appending to `out`. Returns the number of characters
    /// that had to be substituted.
    pub fn encode_into(&self, text: &str, out: &mut Vec<u8>) -> usize {
        let reverse = self.reverse_table();
        let mut substituted = 0;
        for ch in text.chars() {
            match reverse.get(&ch) {
                Some(&byte) => out.push(byte),
                None => {
                    substituted += 1;
                    out.push(EBCDIC_SUB);
                }
            }
        }
        substituted
    }

    fn reverse_table(&self) -> &HashMap<char, u8> {
        self.from_unicode.get_or_init(|| {
            let mut reverse = HashMap::with_capacity(256);
            for (byte, &ch) in self.to_unicode.iter().enumerate() {
                if ch != UNMAPPED {
                    reverse.entry(ch).or_insert(byte as u8);
                }
            }
            reverse
        })
    }
}

impl fmt::Debug for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodePage")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}

impl fmt::Display for CodePage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl PartialEq for CodePage {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for CodePage {}

static CP037: CodePage = CodePage::new(
    "cp037",
    &["037", "ibm037", "ibm-37", "ebcdic-cp-us"],
    "EBCDIC US/Canada",
    tables::CP037,
);

static CP500: CodePage = CodePage::new(
    "cp500",
    &["500", "ibm500", "ebcdic-cp-be", "ebcdic-cp-ch"],
    "EBCDIC International Latin-1",
    tables::CP500,
);

static CP1047: CodePage = CodePage::new(
    "cp1047",
    &["1047", "ibm1047", "ibm-1047"],
    "EBCDIC Open Systems Latin-1 (z/OS UNIX)",
    tables::CP1047,
);

static CODEPAGES: [&CodePage; 3] = [&CP037, &CP500, &CP1047];

/// Every built-in code page, in display order.
pub fn all() -> &'static [&'static CodePage] {
    &CODEPAGES
}

/// Canonical names of every built-in code page.
pub fn names() -> impl Iterator<Item = &'static str> {
    CODEPAGES.iter().map(|cp| cp.name())
}

pub fn default_codepage() -> &'static CodePage {
    &CP1047
}

/// Resolve a code page by name or alias.
pub fn lookup(name: &str) -> ConfigResult<&'static CodePage> {
    let wanted = name.trim();
    CODEPAGES
        .iter()
        .copied()
        .find(|cp| cp.matches(wanted))
        .ok_or_else(|| ConfigError::UnknownCodePage {
            name: name.to_string(),
            available: names().map(str::to_string).collect(),
        })
}
