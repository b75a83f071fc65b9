// src/dbf/fixture.rs
//! Builds small dBASE III tables for tests.

use std::{fs, io, path::Path};

struct FieldSpec {
    name: String,
    code: u8,
    length: u8,
    decimal_count: u8,
}

pub(crate) struct DbfBuilder {
    fields: Vec<FieldSpec>,
    records: Vec<(u8, Vec<Vec<u8>>)>,
    eof_marker: bool,
}

impl DbfBuilder {
    pub(crate) fn new() -> Self {
        Self {
            fields: Vec::new(),
            records: Vec::new(),
            eof_marker: true,
        }
    }

    pub(crate) fn field(mut self, name: &str, code: char, length: u8, decimal_count: u8) -> Self {
        self.fields.push(FieldSpec {
            name: name.to_string(),
            code: code as u8,
            length,
            decimal_count,
        });
        self
    }

    /// Field names given as raw bytes, for names outside ASCII.
    pub(crate) fn raw_field(mut self, name: &[u8], code: char, length: u8) -> Self {
        self.fields.push(FieldSpec {
            name: name.iter().map(|&b| b as char).collect(),
            code: code as u8,
            length,
            decimal_count: 0,
        });
        self
    }

    pub(crate) fn record<I, B>(self, values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.push_record(b' ', values)
    }

    pub(crate) fn deleted_record<I, B>(self, values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        self.push_record(b'*', values)
    }

    pub(crate) fn without_eof_marker(mut self) -> Self {
        self.eof_marker = false;
        self
    }

    fn push_record<I, B>(mut self, flag: u8, values: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let values = values.into_iter().map(|v| v.as_ref().to_vec()).collect();
        self.records.push((flag, values));
        self
    }

    pub(crate) fn build(&self) -> Vec<u8> {
        let header_len = 32 + 32 * self.fields.len() + 1;
        let record_len = 1 + self.fields.iter().map(|f| f.length as usize).sum::<usize>();

        let mut out = Vec::with_capacity(header_len + record_len * self.records.len() + 1);
        out.push(0x03);
        out.extend_from_slice(&[124, 1, 15]);
        out.extend_from_slice(&(self.records.len() as u32).to_le_bytes());
        out.extend_from_slice(&(header_len as u16).to_le_bytes());
        out.extend_from_slice(&(record_len as u16).to_le_bytes());
        out.resize(32, 0);

        for f in &self.fields {
            // one byte per char, see `raw_field`
            let mut name: Vec<u8> = f.name.chars().map(|c| c as u32 as u8).collect();
            name.resize(11, 0);
            out.extend_from_slice(&name);
            out.push(f.code);
            out.extend_from_slice(&[0; 4]);
            out.push(f.length);
            out.push(f.decimal_count);
            out.extend_from_slice(&[0; 14]);
        }
        out.push(0x0D);

        for (flag, values) in &self.records {
            out.push(*flag);
            for (f, v) in self.fields.iter().zip(values) {
                out.extend_from_slice(&pad(f, v));
            }
        }
        if self.eof_marker {
            out.push(0x1A);
        }
        out
    }

    pub(crate) fn write_to(&self, path: &Path) -> io::Result<()> {
        fs::write(path, self.build())
    }
}

fn pad(field: &FieldSpec, value: &[u8]) -> Vec<u8> {
    let len = field.length as usize;
    let mut v: Vec<u8> = value.iter().copied().take(len).collect();
    match field.code {
        b'N' | b'F' => {
            let mut padded = vec![b' '; len - v.len()];
            padded.extend_from_slice(&v);
            padded
        }
        b'C' | b'D' | b'L' | b'M' => {
            v.resize(len, b' ');
            v
        }
        _ => {
            v.resize(len, 0);
            v
        }
    }
}
