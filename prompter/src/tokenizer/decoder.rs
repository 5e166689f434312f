//! Incremental byte-to-text decoding.
//!
//! Bytes arrive in arbitrary chunks, so a multi-byte character may be split
//! across two reads. The decoder consumes only complete characters from the
//! front of the input and leaves an incomplete tail in place for the next
//! read to finish.

use bytes::{Buf, BytesMut};

use super::config::Encoding;
use crate::error::StreamError;

/// Collects printable output from the terminal parser.
struct Printable<'a> {
    out: &'a mut String,
}

impl vte::Perform for Printable<'_> {
    fn print(&mut self, c: char) {
        self.out.push(c);
    }

    fn execute(&mut self, byte: u8) {
        if matches!(byte, b'\n' | b'\r' | b'\t') {
            self.out.push(char::from(byte));
        }
    }
}

/// Stateful decoder for one stream.
pub(crate) struct Decoder {
    encoding: Encoding,
    terminal: Option<vte::Parser>,
    scratch: String,
    consumed: usize,
}

impl Decoder {
    pub(crate) fn new(encoding: Encoding, strip_ansi: bool) -> Self {
        Self {
            encoding,
            terminal: strip_ansi.then(vte::Parser::new),
            scratch: String::new(),
            consumed: 0,
        }
    }

    /// Decode the complete characters at the front of `input` into `out`.
    ///
    /// Any incomplete trailing sequence stays in `input`.
    pub(crate) fn decode(&mut self, input: &mut BytesMut, out: &mut String) -> Result<(), StreamError> {
        match self.terminal.as_mut() {
            None => decode_text(self.encoding, &mut self.consumed, input, out),
            Some(parser) => {
                // escape sequences may also be split across reads; the parser
                // keeps that state between calls
                self.scratch.clear();
                decode_text(self.encoding, &mut self.consumed, input, &mut self.scratch)?;
                parser.advance(&mut Printable { out }, self.scratch.as_bytes());
                Ok(())
            }
        }
    }
}

fn decode_text(
    encoding: Encoding,
    consumed: &mut usize,
    input: &mut BytesMut,
    out: &mut String,
) -> Result<(), StreamError> {
    match encoding {
        Encoding::Latin1 => {
            out.extend(input.iter().map(|&b| char::from(b)));
            *consumed += input.len();
            input.clear();
            Ok(())
        }
        Encoding::Utf8 | Encoding::Utf8Lossy => loop {
            let error = match std::str::from_utf8(input) {
                Ok(text) => {
                    out.push_str(text);
                    *consumed += input.len();
                    input.clear();
                    return Ok(());
                }
                Err(error) => error,
            };

            let valid = error.valid_up_to();
            // valid_up_to marks a well-formed prefix
            let prefix = std::str::from_utf8(&input[..valid]).map_err(|e| StreamError::Malformed {
                encoding: encoding.name(),
                valid_up_to: *consumed + e.valid_up_to(),
            })?;
            out.push_str(prefix);

            match error.error_len() {
                // incomplete sequence at the end: wait for more bytes
                None => {
                    *consumed += valid;
                    input.advance(valid);
                    return Ok(());
                }
                Some(_) if encoding == Encoding::Utf8 => {
                    return Err(StreamError::Malformed {
                        encoding: encoding.name(),
                        valid_up_to: *consumed + valid,
                    });
                }
                Some(invalid) => {
                    out.push(char::REPLACEMENT_CHARACTER);
                    *consumed += valid + invalid;
                    input.advance(valid + invalid);
                }
            }
        },
    }
}
