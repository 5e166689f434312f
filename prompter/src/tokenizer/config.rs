//! Tokenizer configuration.

use std::borrow::Cow;

use serde::Deserialize;

use crate::error::StreamError;

/// Character encoding of a watched stream and of replies written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Encoding {
    /// Strict UTF-8. Malformed input stops the tokenizer.
    #[default]
    #[serde(rename = "utf-8", alias = "utf8")]
    Utf8,

    /// UTF-8 with malformed sequences replaced by U+FFFD.
    #[serde(rename = "utf-8-lossy")]
    Utf8Lossy,

    /// ISO-8859-1, one byte per character.
    #[serde(rename = "latin-1", alias = "iso-8859-1")]
    Latin1,
}

impl Encoding {
    /// Human readable name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Utf8 | Encoding::Utf8Lossy => "UTF-8",
            Encoding::Latin1 => "ISO-8859-1",
        }
    }

    /// Encode `text` for writing to a process.
    pub fn encode<'a>(&self, text: &'a str) -> Result<Cow<'a, [u8]>, StreamError> {
        match self {
            Encoding::Utf8 | Encoding::Utf8Lossy => Ok(Cow::Borrowed(text.as_bytes())),
            Encoding::Latin1 => text
                .chars()
                .map(|ch| {
                    u8::try_from(u32::from(ch)).map_err(|_| StreamError::Unencodable {
                        encoding: self.name(),
                        ch,
                    })
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(Cow::Owned),
        }
    }

    /// Decode a complete byte sequence, such as captured output.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, StreamError> {
        match self {
            Encoding::Utf8 => std::str::from_utf8(bytes)
                .map(str::to_string)
                .map_err(|e| StreamError::Malformed {
                    encoding: self.name(),
                    valid_up_to: e.valid_up_to(),
                }),
            Encoding::Utf8Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
            Encoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

/// Configuration for a [`Tokenizer`](super::Tokenizer).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenizerConfig {
    /// Encoding of the watched stream.
    pub encoding: Encoding,

    /// Bytes requested from the stream per read.
    pub read_buffer_size: usize,

    /// Initial capacity of the pending text buffer.
    pub token_capacity: usize,

    /// Remove terminal escape sequences before tokenizing.
    pub strip_ansi: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Utf8,
            read_buffer_size: 8192,
            token_capacity: 8192,
            strip_ansi: false,
        }
    }
}

impl TokenizerConfig {
    /// Set the stream encoding.
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the read size (minimum 1).
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the initial pending text capacity.
    pub fn token_capacity(mut self, capacity: usize) -> Self {
        self.token_capacity = capacity;
        self
    }

    /// Enable or disable escape sequence stripping.
    pub fn strip_ansi(mut self, strip: bool) -> Self {
        self.strip_ansi = strip;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latin1_encode() {
        let bytes = Encoding::Latin1.encode("café").unwrap();
        assert_eq!(bytes.as_ref(), &[b'c', b'a', b'f', 0xE9]);
    }

    #[test]
    fn test_latin1_rejects_wide_chars() {
        let err = Encoding::Latin1.encode("€").unwrap_err();
        assert!(matches!(err, StreamError::Unencodable { ch: '€', .. }));
    }

    #[test]
    fn test_utf8_encode_borrows() {
        let bytes = Encoding::Utf8.encode("yes\n").unwrap();
        assert!(matches!(bytes, Cow::Borrowed(_)));
        assert_eq!(bytes.as_ref(), b"yes\n");
    }

    #[test]
    fn test_decode_complete_bytes() {
        assert_eq!(Encoding::Latin1.decode(b"caf\xE9").unwrap(), "café");
        assert_eq!(Encoding::Utf8Lossy.decode(b"ok\xE2\x82").unwrap(), "ok\u{FFFD}");
        assert!(matches!(
            Encoding::Utf8.decode(b"ok\xE2\x82"),
            Err(StreamError::Malformed { valid_up_to: 2, .. })
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config: TokenizerConfig =
            serde_json::from_str(r#"{"encoding": "latin-1", "strip_ansi": true}"#).unwrap();
        assert_eq!(config.encoding, Encoding::Latin1);
        assert!(config.strip_ansi);
        assert_eq!(config.read_buffer_size, 8192);
    }
}
