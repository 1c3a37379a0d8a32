//! Chunks and text encodings
//!
//! A chunk is the unit a stage receives and emits. Text chunks are sized
//! through a [`TextEncoding`]; binary chunks are sized by their raw length.

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;

/// One unit of input or output flowing through a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Chunk {
    /// Text content (always valid UTF-8 in memory)
    Text(String),
    /// Raw bytes, possibly not valid UTF-8
    Binary(Vec<u8>),
}

impl Chunk {
    /// Raw in-memory bytes of the chunk
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Chunk::Text(s) => s.as_bytes(),
            Chunk::Binary(b) => b,
        }
    }

    /// Text view, if the content is valid UTF-8
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Chunk::Text(s) => Some(s),
            Chunk::Binary(b) => std::str::from_utf8(b).ok(),
        }
    }

    /// Size in bytes once encoded with `encoding`.
    ///
    /// Binary chunks ignore the encoding.
    pub fn encoded_len(&self, encoding: TextEncoding) -> usize {
        match self {
            Chunk::Text(s) => encoding.byte_len(s),
            Chunk::Binary(b) => b.len(),
        }
    }

    /// In-memory length in bytes
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build a chunk from bytes, keeping it as text when it decodes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(s) => Chunk::Text(s),
            Err(e) => Chunk::Binary(e.into_bytes()),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Chunk::Text(s) => s.into_bytes(),
            Chunk::Binary(b) => b,
        }
    }
}

impl From<&str> for Chunk {
    fn from(s: &str) -> Self {
        Chunk::Text(s.to_string())
    }
}

impl From<String> for Chunk {
    fn from(s: String) -> Self {
        Chunk::Text(s)
    }
}

impl From<&[u8]> for Chunk {
    fn from(b: &[u8]) -> Self {
        Chunk::Binary(b.to_vec())
    }
}

impl From<Vec<u8>> for Chunk {
    fn from(b: Vec<u8>) -> Self {
        Chunk::Binary(b)
    }
}

/// Encoding used to size text chunks.
///
/// Only the byte count matters here; chunks are never re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    /// Two bytes per UTF-16 code unit
    Utf16Le,
    /// One byte per UTF-16 code unit
    Latin1,
    /// One byte per UTF-16 code unit
    Ascii,
}

impl TextEncoding {
    /// Number of bytes `text` occupies in this encoding
    pub fn byte_len(self, text: &str) -> usize {
        match self {
            TextEncoding::Utf8 => text.len(),
            TextEncoding::Utf16Le => text.encode_utf16().count() * 2,
            TextEncoding::Latin1 | TextEncoding::Ascii => text.encode_utf16().count(),
        }
    }

    /// Canonical identifier
    pub fn name(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Latin1 => "latin1",
            TextEncoding::Ascii => "ascii",
        }
    }
}

impl FromStr for TextEncoding {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(TextEncoding::Utf8),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(TextEncoding::Utf16Le),
            "latin1" | "binary" => Ok(TextEncoding::Latin1),
            "ascii" => Ok(TextEncoding::Ascii),
            _ => Err(ConfigError::UnknownEncoding(s.to_string())),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
