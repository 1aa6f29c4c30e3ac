//! # Payload Encoding
//!
//! Charset encoding of textual handler output according to an exchange type's
//! encoding label and error policy, and base64 encoding of file content at rest.
//!
//! `ascii`, `latin1`/`iso-8859-1` and the UTF-16 family are encoded as those
//! exact charsets. Any other label resolves through the WHATWG encoding
//! registry (`utf-8`, `windows-1252`, `iso-8859-15`, `shift_jis`, ...). Labels
//! the registry maps to an encoding it cannot encode to are rejected.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use encoding_rs::{EncoderResult, Encoding, UTF_16BE, UTF_16LE, UTF_8};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// What to do with characters the target charset cannot represent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingErrorPolicy {
    /// Fail the encoding
    #[default]
    Strict,
    /// Substitute `?`
    Replace,
    /// Drop the character
    Ignore,
    /// Substitute an XML numeric character reference (`&#8364;`)
    XmlCharRefReplace,
}

impl fmt::Display for EncodingErrorPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Strict => "strict",
            Self::Replace => "replace",
            Self::Ignore => "ignore",
            Self::XmlCharRefReplace => "xmlcharrefreplace",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),

    #[error("Character {character:?} cannot be encoded as {encoding}")]
    Unmappable { character: char, encoding: String },

    #[error("Text is not valid {encoding}")]
    Malformed { encoding: String },

    #[error("Invalid base64 content: {0}")]
    InvalidBase64(String),

    #[error("Encoded output exceeds addressable size")]
    Overflow,
}

/// Charset a label resolves to
#[derive(Debug, Clone, Copy)]
enum Charset {
    Utf8,
    Ascii,
    Latin1,
    /// A byte order mark is written only for the unqualified `utf-16` label
    Utf16 { big_endian: bool, bom: bool },
    Registry(&'static Encoding),
}

impl Charset {
    fn for_label(label: &str) -> Result<Self, EncodingError> {
        let trimmed = label.trim();
        let normalized = trimmed.to_ascii_lowercase().replace(['_', ' '], "-");
        let charset = match normalized.as_str() {
            "ascii" | "us-ascii" | "646" | "ansi-x3.4-1968" => Self::Ascii,
            "latin1" | "latin-1" | "l1" | "iso-8859-1" | "iso8859-1" | "iso-ir-100" | "cp819"
            | "8859" => Self::Latin1,
            "utf-16" | "utf16" => Self::Utf16 {
                big_endian: false,
                bom: true,
            },
            "utf-16le" | "utf-16-le" => Self::Utf16 {
                big_endian: false,
                bom: false,
            },
            "utf-16be" | "utf-16-be" => Self::Utf16 {
                big_endian: true,
                bom: false,
            },
            _ => {
                let encoding = Encoding::for_label(trimmed.as_bytes())
                    .ok_or_else(|| EncodingError::UnknownEncoding(label.to_string()))?;
                if encoding == UTF_8 {
                    Self::Utf8
                } else if encoding == UTF_16LE || encoding == UTF_16BE {
                    Self::Utf16 {
                        big_endian: encoding == UTF_16BE,
                        bom: false,
                    }
                } else if encoding.output_encoding() != encoding {
                    return Err(EncodingError::UnknownEncoding(label.to_string()));
                } else {
                    Self::Registry(encoding)
                }
            }
        };
        Ok(charset)
    }
}

/// Encode text with the given charset label and error policy.
pub fn encode_text(
    text: &str,
    label: &str,
    policy: EncodingErrorPolicy,
) -> Result<Vec<u8>, EncodingError> {
    match Charset::for_label(label)? {
        Charset::Utf8 => Ok(text.as_bytes().to_vec()),
        Charset::Ascii => encode_single_byte(text, 0x7F, "ascii", policy),
        Charset::Latin1 => encode_single_byte(text, 0xFF, "iso-8859-1", policy),
        Charset::Utf16 { big_endian, bom } => Ok(encode_utf16(text, big_endian, bom)),
        Charset::Registry(encoding) => encode_with_registry(text, encoding, policy),
    }
}

/// Charsets whose code points map one-to-one onto bytes up to `max`
fn encode_single_byte(
    text: &str,
    max: u8,
    name: &str,
    policy: EncodingErrorPolicy,
) -> Result<Vec<u8>, EncodingError> {
    let mut output = Vec::with_capacity(text.len());
    for character in text.chars() {
        match u8::try_from(u32::from(character)) {
            Ok(byte) if byte <= max => output.push(byte),
            _ => substitute(&mut output, character, name, policy)?,
        }
    }
    Ok(output)
}

fn encode_utf16(text: &str, big_endian: bool, bom: bool) -> Vec<u8> {
    bom.then_some(0xFEFF_u16)
        .into_iter()
        .chain(text.encode_utf16())
        .flat_map(|unit| {
            if big_endian {
                unit.to_be_bytes()
            } else {
                unit.to_le_bytes()
            }
        })
        .collect()
}

fn encode_with_registry(
    text: &str,
    encoding: &'static Encoding,
    policy: EncodingErrorPolicy,
) -> Result<Vec<u8>, EncodingError> {
    let mut encoder = encoding.new_encoder();
    let mut output = Vec::with_capacity(text.len());
    let mut remaining = text;

    loop {
        let needed = encoder
            .max_buffer_length_from_utf8_without_replacement(remaining.len())
            .ok_or(EncodingError::Overflow)?;
        output.reserve(needed);

        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(remaining, &mut output, true);
        remaining = remaining.get(read..).unwrap_or_default();

        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::OutputFull => continue,
            EncoderResult::Unmappable(character) => {
                substitute(&mut output, character, encoding.name(), policy)?
            }
        }
    }

    Ok(output)
}

fn substitute(
    output: &mut Vec<u8>,
    character: char,
    encoding: &str,
    policy: EncodingErrorPolicy,
) -> Result<(), EncodingError> {
    match policy {
        EncodingErrorPolicy::Strict => {
            return Err(EncodingError::Unmappable {
                character,
                encoding: encoding.to_string(),
            })
        }
        EncodingErrorPolicy::Replace => output.push(b'?'),
        EncodingErrorPolicy::Ignore => {}
        EncodingErrorPolicy::XmlCharRefReplace => {
            output.extend_from_slice(format!("&#{};", u32::from(character)).as_bytes())
        }
    }
    Ok(())
}

/// Decode bytes with the given charset label, failing on malformed input.
pub fn decode_text(content: &[u8], label: &str) -> Result<String, EncodingError> {
    match Charset::for_label(label)? {
        Charset::Utf8 => decode_with_registry(content, UTF_8),
        Charset::Ascii if content.is_ascii() => {
            Ok(content.iter().copied().map(char::from).collect())
        }
        Charset::Ascii => Err(EncodingError::Malformed {
            encoding: "ascii".to_string(),
        }),
        Charset::Latin1 => Ok(content.iter().copied().map(char::from).collect()),
        Charset::Utf16 { big_endian, bom } => {
            let declared = if bom {
                Encoding::for_bom(content)
                    .filter(|(encoding, _)| *encoding == UTF_16LE || *encoding == UTF_16BE)
            } else {
                None
            };
            match declared {
                Some((encoding, length)) => {
                    decode_with_registry(content.get(length..).unwrap_or_default(), encoding)
                }
                None if big_endian => decode_with_registry(content, UTF_16BE),
                None => decode_with_registry(content, UTF_16LE),
            }
        }
        Charset::Registry(encoding) => decode_with_registry(content, encoding),
    }
}

fn decode_with_registry(
    content: &[u8],
    encoding: &'static Encoding,
) -> Result<String, EncodingError> {
    encoding
        .decode_without_bom_handling_and_without_replacement(content)
        .map(|text| text.into_owned())
        .ok_or_else(|| EncodingError::Malformed {
            encoding: encoding.name().to_string(),
        })
}

/// Binary-to-text encoding used when file content is persisted.
pub fn encode_at_rest(content: &[u8]) -> String {
    STANDARD.encode(content)
}

pub fn decode_at_rest(encoded: &str) -> Result<Vec<u8>, EncodingError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| EncodingError::InvalidBase64(e.to_string()))
}
