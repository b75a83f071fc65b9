// src/dbf/header.rs

use chrono::NaiveDate;
use serde::Serialize;

use super::DbfError;
use crate::encoding::{Codec, DecodeMode};

pub const HEADER_LEN: usize = 32;
pub const DESCRIPTOR_LEN: usize = 32;
const NAME_LEN: usize = 11;

/// The fixed 32-byte table header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DbfHeader {
    pub version: u8,
    pub last_update: Option<NaiveDate>,
    /// Record count as claimed by the header; iteration does not rely on it.
    pub record_count: u32,
    pub header_len: u16,
    pub record_len: u16,
    pub language_driver: u8,
}

impl DbfHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, DbfError> {
        if bytes.len() < HEADER_LEN {
            return Err(DbfError::TruncatedHeader { len: bytes.len() });
        }
        let record_len = u16::from_le_bytes([bytes[10], bytes[11]]);
        if record_len == 0 {
            return Err(DbfError::InvalidHeader("record length is zero".into()));
        }
        Ok(Self {
            version: bytes[0],
            last_update: NaiveDate::from_ymd_opt(
                1900 + i32::from(bytes[1]),
                u32::from(bytes[2]),
                u32::from(bytes[3]),
            ),
            record_count: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            header_len: u16::from_le_bytes([bytes[8], bytes[9]]),
            record_len,
            language_driver: bytes[29],
        })
    }

    /// dBASE IV style memo files carry their own block size.
    pub fn is_dbase4(&self) -> bool {
        self.version & 0x07 == 0x04 || matches!(self.version, 0x8B | 0xCB | 0x8E)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Character,
    Numeric,
    Float,
    Date,
    Logical,
    Integer,
    AutoIncrement,
    Currency,
    Double,
    DateTime,
    Timestamp,
    Memo,
    General,
    Picture,
    /// `B` is a double in Visual FoxPro and a binary memo in dBASE.
    Binary,
    NullFlags,
    Unknown(char),
}

impl FieldType {
    pub fn from_code(code: u8) -> Self {
        match code.to_ascii_uppercase() {
            b'C' => Self::Character,
            b'N' => Self::Numeric,
            b'F' => Self::Float,
            b'D' => Self::Date,
            b'L' => Self::Logical,
            b'I' => Self::Integer,
            b'+' => Self::AutoIncrement,
            b'Y' => Self::Currency,
            b'O' => Self::Double,
            b'T' => Self::DateTime,
            b'@' => Self::Timestamp,
            b'M' => Self::Memo,
            b'G' => Self::General,
            b'P' => Self::Picture,
            b'B' => Self::Binary,
            b'0' => Self::NullFlags,
            other => Self::Unknown(other as char),
        }
    }
}

/// One 32-byte field descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldType,
    pub length: u8,
    pub decimal_count: u8,
}

impl FieldDescriptor {
    /// Whether values live in the companion memo file.
    pub fn is_memo(&self) -> bool {
        match self.kind {
            FieldType::Memo | FieldType::General | FieldType::Picture => true,
            FieldType::Binary => self.length != 8,
            _ => false,
        }
    }
}

/// Read descriptors from offset 32 until the `0x0D` terminator (some writers use `0x0A`).
/// Names are decoded with `codec`, so a strict pass can already fail here.
pub fn parse_fields(
    bytes: &[u8],
    codec: &Codec,
    mode: DecodeMode,
) -> Result<Vec<FieldDescriptor>, DbfError> {
    let mut fields = Vec::new();
    let mut pos = HEADER_LEN;

    while let Some(&sep) = bytes.get(pos) {
        if sep == b'\r' || sep == b'\n' {
            break;
        }
        let raw = bytes
            .get(pos..pos + DESCRIPTOR_LEN)
            .ok_or(DbfError::TruncatedFields {
                index: fields.len(),
            })?;

        let name_bytes = &raw[..NAME_LEN];
        let name_end = name_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LEN);
        let name = codec.decode(&name_bytes[..name_end], mode)?.into_owned();

        fields.push(FieldDescriptor {
            name,
            kind: FieldType::from_code(raw[11]),
            length: raw[16],
            decimal_count: raw[17],
        });
        pos += DESCRIPTOR_LEN;
    }

    Ok(fields)
}
