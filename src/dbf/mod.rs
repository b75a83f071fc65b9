// src/dbf/mod.rs
//! Reader for dBASE III/IV, FoxPro and Visual FoxPro table files.
//!
//! A table is opened under one [`Codec`] and [`DecodeMode`]; text is decoded
//! lazily as records are iterated, so a strict decode failure surfaces on the
//! record that contains the offending bytes.

use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;

use crate::encoding::{Codec, DecodeError, DecodeMode};

pub mod header;
pub mod memo;
pub mod value;

#[cfg(test)]
pub(crate) mod fixture;

pub use header::{DbfHeader, FieldDescriptor, FieldType};
pub use memo::MemoFile;
pub use value::Value;

use value::{parse_value, FieldContext};

const LIVE: u8 = b' ';
const EOF_MARK: u8 = 0x1A;

#[derive(Debug, Error)]
pub enum DbfError {
    #[error("reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file is {len} bytes, too short for a table header")]
    TruncatedHeader { len: usize },
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("field descriptor {index} is cut short")]
    TruncatedFields { index: usize },
    #[error("record {index} is cut short")]
    TruncatedRecord { index: usize },
    #[error("table has memo fields but no memo file next to {}", .0.display())]
    MissingMemoFile(PathBuf),
    #[error("memo block {block} lies outside the memo file")]
    MemoOutOfRange { block: u64 },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("unknown field type {kind:?} in field {field}")]
    UnknownFieldType { field: String, kind: char },
    #[error("invalid {kind} value {raw:?} in field {field}")]
    InvalidValue {
        field: String,
        kind: &'static str,
        raw: String,
    },
}

/// One live record: values in field order.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    values: Vec<Value>,
}

impl Record {
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }
}

/// An opened table, decoded under a single codec.
#[derive(Debug)]
pub struct DbfTable {
    path: PathBuf,
    header: DbfHeader,
    fields: Vec<FieldDescriptor>,
    data: Vec<u8>,
    memo: Option<MemoFile>,
    codec: Codec,
    mode: DecodeMode,
}

impl DbfTable {
    /// Read `path` and its memo file (if the table has memo fields).
    pub fn open(path: impl AsRef<Path>, codec: &Codec, mode: DecodeMode) -> Result<Self, DbfError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| DbfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let header = DbfHeader::parse(&data)?;
        let fields = header::parse_fields(&data, codec, mode)?;

        let memo = if fields.iter().any(FieldDescriptor::is_memo) {
            let memo_path =
                MemoFile::locate(path).ok_or_else(|| DbfError::MissingMemoFile(path.to_path_buf()))?;
            Some(MemoFile::open(&memo_path, header.is_dbase4())?)
        } else {
            None
        };

        Ok(Self {
            path: path.to_path_buf(),
            header,
            fields,
            data,
            memo,
            codec: codec.clone(),
            mode,
        })
    }

    /// Parse an in-memory table. Memo fields resolve against `memo` when given.
    pub fn from_bytes(
        path: impl Into<PathBuf>,
        data: Vec<u8>,
        memo: Option<MemoFile>,
        codec: &Codec,
        mode: DecodeMode,
    ) -> Result<Self, DbfError> {
        let header = DbfHeader::parse(&data)?;
        let fields = header::parse_fields(&data, codec, mode)?;
        Ok(Self {
            path: path.into(),
            header,
            fields,
            data,
            memo,
            codec: codec.clone(),
            mode,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn header(&self) -> &DbfHeader {
        &self.header
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// Live records in file order; deleted ones are skipped.
    pub fn records(&self) -> Records<'_> {
        Records {
            table: self,
            offset: usize::from(self.header.header_len),
            index: 0,
            done: false,
        }
    }

    /// Materialize the first live record, `None` when the table has none.
    pub fn first_record(&self) -> Result<Option<Record>, DbfError> {
        self.records().next().transpose()
    }

    fn parse_record(&self, raw: &[u8], index: usize) -> Result<Record, DbfError> {
        let ctx = FieldContext {
            codec: &self.codec,
            mode: self.mode,
            memo: self.memo.as_ref(),
        };
        let mut values = Vec::with_capacity(self.fields.len());
        let mut pos = 0usize;
        for field in &self.fields {
            let end = pos + usize::from(field.length);
            let bytes = raw
                .get(pos..end)
                .ok_or(DbfError::TruncatedRecord { index })?;
            values.push(parse_value(field, bytes, &ctx)?);
            pos = end;
        }
        Ok(Record { values })
    }
}

/// Iterator over the live records of a [`DbfTable`].
pub struct Records<'a> {
    table: &'a DbfTable,
    offset: usize,
    index: usize,
    done: bool,
}

impl Iterator for Records<'_> {
    type Item = Result<Record, DbfError>;

    fn next(&mut self) -> Option<Self::Item> {
        let record_len = usize::from(self.table.header.record_len);
        let data = &self.table.data;

        while !self.done {
            let flag = match data.get(self.offset) {
                Some(&EOF_MARK) | None => {
                    self.done = true;
                    return None;
                }
                Some(&flag) => flag,
            };

            let start = self.offset;
            let index = self.index;
            self.offset += record_len;
            self.index += 1;

            // deleted ('*') and unrecognised flags are skipped
            if flag != LIVE {
                continue;
            }

            let Some(raw) = data.get(start + 1..start + record_len) else {
                self.done = true;
                return Some(Err(DbfError::TruncatedRecord { index }));
            };
            return Some(self.table.parse_record(raw, index));
        }
        None
    }
}
