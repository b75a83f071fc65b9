// src/encoding/mod.rs

use encoding_rs::{DecoderResult, Encoding, UTF_8, WINDOWS_1250};
use std::{borrow::Cow, fmt};
use thiserror::Error;

mod cp852;

/// Candidate order tried when nothing else is configured: most
/// locale-specific first, most permissive last.
pub const DEFAULT_CANDIDATES: &[&str] = &["cp1250", "utf-8", "iso-8859-2", "latin-1", "cp852"];

/// How invalid byte sequences are handled while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Fail on the first byte sequence the codec cannot map.
    Strict,
    /// Substitute U+FFFD for anything the codec cannot map.
    Lossy,
}

#[derive(Debug, Error)]
#[error("unknown encoding `{0}`")]
pub struct UnknownEncoding(pub String);

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("'{codec}' codec can't decode byte 0x{byte:02x} in position {position}")]
pub struct DecodeError {
    pub codec: String,
    pub byte: u8,
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    /// A WHATWG table from `encoding_rs`. The Windows tables map their
    /// unassigned bytes onto C1 controls, so `reject_c1` treats those as malformed.
    Whatwg {
        encoding: &'static Encoding,
        reject_c1: bool,
    },
    /// True ISO-8859-1: every byte maps to the code point of the same value.
    Latin1,
    Cp852,
}

/// A named text codec, as listed in the candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codec {
    name: String,
    kind: Kind,
}

impl Codec {
    /// Resolve a codec from a name such as `cp1250`, `utf-8` or `latin-1`.
    /// Anything not special-cased falls back to the WHATWG label table.
    pub fn from_name(name: &str) -> Result<Self, UnknownEncoding> {
        let trimmed = name.trim();
        let label = trimmed.to_ascii_lowercase().replace('_', "-");
        let kind = match label.as_str() {
            "cp1250" | "windows-1250" => Kind::Whatwg {
                encoding: WINDOWS_1250,
                reject_c1: true,
            },
            "utf-8" | "utf8" => Kind::Whatwg {
                encoding: UTF_8,
                reject_c1: false,
            },
            // WHATWG aliases these to windows-1252, which is not latin-1
            "latin-1" | "latin1" | "iso-8859-1" | "iso8859-1" | "l1" => Kind::Latin1,
            "cp852" | "ibm852" | "852" => Kind::Cp852,
            other => {
                let windows_alias = other
                    .strip_prefix("cp")
                    .filter(|n| n.starts_with("125"))
                    .map(|n| format!("windows-{}", n));
                let lookup = windows_alias.as_deref().unwrap_or(other);
                let encoding = Encoding::for_label(lookup.as_bytes())
                    .ok_or_else(|| UnknownEncoding(trimmed.to_string()))?;
                Kind::Whatwg {
                    encoding,
                    reject_c1: encoding.name().starts_with("windows-"),
                }
            }
        };
        Ok(Self {
            name: trimmed.to_string(),
            kind,
        })
    }

    /// Resolve a whole candidate list, keeping its order.
    pub fn list(names: &[impl AsRef<str>]) -> Result<Vec<Self>, UnknownEncoding> {
        names.iter().map(|n| Self::from_name(n.as_ref())).collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn decode<'a>(&self, bytes: &'a [u8], mode: DecodeMode) -> Result<Cow<'a, str>, DecodeError> {
        match self.kind {
            Kind::Latin1 => Ok(Cow::Owned(bytes.iter().map(|&b| b as char).collect())),
            Kind::Cp852 => Ok(Cow::Owned(cp852::decode(bytes))),
            Kind::Whatwg {
                encoding,
                reject_c1,
            } => match mode {
                DecodeMode::Strict => {
                    let text = encoding
                        .decode_without_bom_handling_and_without_replacement(bytes)
                        .ok_or_else(|| self.malformed_at(bytes, locate_malformed(encoding, bytes)))?;
                    if reject_c1 {
                        // only single-byte tables get here, so char index == byte index
                        if let Some(pos) = text.chars().position(is_c1) {
                            return Err(self.malformed_at(bytes, pos));
                        }
                    }
                    Ok(text)
                }
                DecodeMode::Lossy => {
                    let (text, _) = encoding.decode_without_bom_handling(bytes);
                    if reject_c1 && text.chars().any(is_c1) {
                        let replaced: String = text
                            .chars()
                            .map(|c| if is_c1(c) { char::REPLACEMENT_CHARACTER } else { c })
                            .collect();
                        return Ok(Cow::Owned(replaced));
                    }
                    Ok(text)
                }
            },
        }
    }

    fn malformed_at(&self, bytes: &[u8], position: usize) -> DecodeError {
        DecodeError {
            codec: self.name.clone(),
            byte: bytes.get(position).copied().unwrap_or_default(),
            position,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn is_c1(c: char) -> bool {
    ('\u{80}'..='\u{9f}').contains(&c)
}

/// Byte offset of the first malformed sequence, for error reporting.
fn locate_malformed(encoding: &'static Encoding, bytes: &[u8]) -> usize {
    let mut decoder = encoding.new_decoder_without_bom_handling();
    let capacity = decoder
        .max_utf8_buffer_length_without_replacement(bytes.len())
        .unwrap_or(bytes.len() * 4);
    let mut sink = String::with_capacity(capacity);
    let (result, read) = decoder.decode_to_string_without_replacement(bytes, &mut sink, true);
    match result {
        DecoderResult::Malformed(bad, after) => read.saturating_sub(bad as usize + after as usize),
        DecoderResult::InputEmpty | DecoderResult::OutputFull => read,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_candidates_resolve() {
        let codecs = Codec::list(DEFAULT_CANDIDATES).unwrap();
        let names: Vec<&str> = codecs.iter().map(Codec::name).collect();
        assert_eq!(names, DEFAULT_CANDIDATES);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let err = Codec::from_name("klingon-7").unwrap_err();
        assert_eq!(err.0, "klingon-7");
    }

    #[test]
    fn cp1250_decodes_czech() {
        let codec = Codec::from_name("cp1250").unwrap();
        // "Žluťoučký" in windows-1250
        let raw = [0x8E, 0x6C, 0x75, 0x9D, 0x6F, 0x75, 0xE8, 0x6B, 0xFD];
        assert_eq!(codec.decode(&raw, DecodeMode::Strict).unwrap(), "Žluťoučký");
    }

    #[test]
    fn cp1250_strict_rejects_unassigned_byte() {
        let codec = Codec::from_name("cp1250").unwrap();
        let err = codec.decode(b"ab\x81c", DecodeMode::Strict).unwrap_err();
        assert_eq!(err.byte, 0x81);
        assert_eq!(err.position, 2);

        let lossy = codec.decode(b"ab\x81c", DecodeMode::Lossy).unwrap();
        assert_eq!(lossy, "ab\u{FFFD}c");
    }

    #[test]
    fn utf8_strict_reports_position() {
        let codec = Codec::from_name("utf-8").unwrap();
        let err = codec.decode(b"Praha\xff", DecodeMode::Strict).unwrap_err();
        assert_eq!(err.position, 5);
        assert_eq!(err.byte, 0xff);
        assert_eq!(
            codec.decode(b"Praha\xff", DecodeMode::Lossy).unwrap(),
            "Praha\u{FFFD}"
        );
    }

    #[test]
    fn latin1_maps_every_byte() {
        let codec = Codec::from_name("latin-1").unwrap();
        let all: Vec<u8> = (0u8..=255).collect();
        let text = codec.decode(&all, DecodeMode::Strict).unwrap();
        assert_eq!(text.chars().count(), 256);
        assert_eq!(text.chars().nth(0x81), Some('\u{81}'));
    }

    #[test]
    fn iso_8859_2_keeps_c1_controls() {
        let codec = Codec::from_name("iso-8859-2").unwrap();
        assert!(codec.decode(b"\x81", DecodeMode::Strict).is_ok());
        assert_eq!(codec.decode(b"\xa9", DecodeMode::Strict).unwrap(), "Š");
    }

    #[test]
    fn cp_prefixed_windows_alias() {
        let codec = Codec::from_name("cp1252").unwrap();
        assert_eq!(codec.decode(b"\x80", DecodeMode::Strict).unwrap(), "€");
        assert!(codec.decode(b"\x81", DecodeMode::Strict).is_err());
    }
}
