// src/dbf/memo.rs

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

use super::DbfError;

const DBASE3_BLOCK: usize = 512;
const EOF_MARK: u8 = 0x1A;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// dBASE III `.DBT`: fixed 512-byte blocks, data runs until `0x1A`.
    Dbase3,
    /// dBASE IV `.DBT`: per-block header `FF FF 08 00` + u32 LE length (header included).
    Dbase4 { block_size: usize },
    /// FoxPro `.FPT`: per-block u32 BE type + u32 BE length.
    FoxPro { block_size: usize },
}

/// One memo entry, still undecoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoBlock<'a> {
    Text(&'a [u8]),
    Binary(&'a [u8]),
}

/// Companion memo file, held in memory.
#[derive(Debug, Clone)]
pub struct MemoFile {
    layout: Layout,
    data: Vec<u8>,
}

impl MemoFile {
    /// Locate the memo file belonging to `table_path`: same stem, `.fpt` or
    /// `.dbt`, compared case-insensitively. `.fpt` wins when both exist.
    pub fn locate(table_path: &Path) -> Option<PathBuf> {
        let stem = table_path.file_stem()?.to_string_lossy().to_lowercase();
        let dir = match table_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut found: Vec<(bool, PathBuf)> = fs::read_dir(dir)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter_map(|p| {
                let same_stem = p.file_stem()?.to_string_lossy().to_lowercase() == stem;
                let ext = p.extension()?.to_string_lossy().to_lowercase();
                match ext.as_str() {
                    "fpt" | "dbt" if same_stem => Some((ext == "dbt", p)),
                    _ => None,
                }
            })
            .collect();
        found.sort();
        found.into_iter().next().map(|(_, p)| p)
    }

    pub fn open(path: &Path, dbase4: bool) -> Result<Self, DbfError> {
        let data = fs::read(path).map_err(|source| DbfError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_fpt = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("fpt"))
            .unwrap_or(false);
        let memo = Self::from_bytes(data, is_fpt, dbase4);
        debug!(path = %path.display(), layout = ?memo.layout, "opened memo file");
        Ok(memo)
    }

    pub fn from_bytes(data: Vec<u8>, is_fpt: bool, dbase4: bool) -> Self {
        let layout = if is_fpt {
            let size = data
                .get(6..8)
                .map(|b| u16::from_be_bytes([b[0], b[1]]) as usize)
                .unwrap_or(0);
            Layout::FoxPro {
                block_size: if size == 0 { 64 } else { size },
            }
        } else if dbase4 {
            let size = data
                .get(20..22)
                .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
                .unwrap_or(0);
            Layout::Dbase4 {
                block_size: if size == 0 { DBASE3_BLOCK } else { size },
            }
        } else {
            Layout::Dbase3
        };
        Self { layout, data }
    }

    /// Fetch block `index`. Index 0 is the file header and means "no memo".
    pub fn block(&self, index: u64) -> Result<Option<MemoBlock<'_>>, DbfError> {
        if index == 0 {
            return Ok(None);
        }
        let out_of_range = || DbfError::MemoOutOfRange { block: index };

        match self.layout {
            Layout::Dbase3 => {
                let start = offset(index, DBASE3_BLOCK).ok_or_else(out_of_range)?;
                let rest = self.data.get(start..).ok_or_else(out_of_range)?;
                let end = rest
                    .iter()
                    .position(|&b| b == EOF_MARK)
                    .unwrap_or(rest.len());
                Ok(Some(MemoBlock::Text(&rest[..end])))
            }
            Layout::Dbase4 { block_size } => {
                let start = offset(index, block_size).ok_or_else(out_of_range)?;
                let head = self.data.get(start..start + 8).ok_or_else(out_of_range)?;
                let len = u32::from_le_bytes([head[4], head[5], head[6], head[7]]) as usize;
                let body_end = (start + len.max(8)).min(self.data.len());
                Ok(Some(MemoBlock::Text(&self.data[start + 8..body_end])))
            }
            Layout::FoxPro { block_size } => {
                let start = offset(index, block_size).ok_or_else(out_of_range)?;
                let head = self.data.get(start..start + 8).ok_or_else(out_of_range)?;
                let kind = u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
                let len = u32::from_be_bytes([head[4], head[5], head[6], head[7]]) as usize;
                let body = self
                    .data
                    .get(start + 8..start + 8 + len)
                    .ok_or_else(out_of_range)?;
                Ok(Some(if kind == 1 {
                    MemoBlock::Text(body)
                } else {
                    MemoBlock::Binary(body)
                }))
            }
        }
    }
}

fn offset(index: u64, block_size: usize) -> Option<usize> {
    usize::try_from(index).ok()?.checked_mul(block_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fpt(blocks: &[(u32, &[u8])]) -> Vec<u8> {
        let block_size = 64usize;
        let mut data = vec![0u8; block_size * 8];
        data[6..8].copy_from_slice(&(block_size as u16).to_be_bytes());
        for (i, (kind, body)) in blocks.iter().enumerate() {
            let start = (i + 8) * block_size;
            data.resize(start, 0);
            data.extend_from_slice(&kind.to_be_bytes());
            data.extend_from_slice(&(body.len() as u32).to_be_bytes());
            data.extend_from_slice(body);
        }
        data
    }

    #[test]
    fn foxpro_text_and_binary_blocks() {
        let memo = MemoFile::from_bytes(fpt(&[(1, b"hello"), (0, b"\x89PNG")]), true, false);
        assert_eq!(memo.block(8).unwrap(), Some(MemoBlock::Text(b"hello")));
        assert_eq!(memo.block(9).unwrap(), Some(MemoBlock::Binary(b"\x89PNG")));
        assert_eq!(memo.block(0).unwrap(), None);
        assert!(matches!(
            memo.block(500),
            Err(DbfError::MemoOutOfRange { block: 500 })
        ));
    }

    #[test]
    fn dbase3_block_runs_to_eof_mark() {
        let mut data = vec![0u8; DBASE3_BLOCK];
        data.extend_from_slice(b"long note");
        data.extend_from_slice(&[EOF_MARK, EOF_MARK]);
        let memo = MemoFile::from_bytes(data, false, false);
        assert_eq!(memo.block(1).unwrap(), Some(MemoBlock::Text(b"long note")));
    }

    #[test]
    fn dbase4_block_uses_length_header() {
        let mut data = vec![0u8; DBASE3_BLOCK];
        data[20..22].copy_from_slice(&(DBASE3_BLOCK as u16).to_le_bytes());
        data.extend_from_slice(&[0xFF, 0xFF, 0x08, 0x00]);
        data.extend_from_slice(&(8u32 + 4).to_le_bytes());
        data.extend_from_slice(b"memo and trailing junk");
        let memo = MemoFile::from_bytes(data, false, true);
        assert_eq!(memo.block(1).unwrap(), Some(MemoBlock::Text(b"memo")));
    }

    #[test]
    fn locate_finds_sibling_regardless_of_case() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("NOTES.DBF");
        fs::write(&table, b"").unwrap();
        assert_eq!(MemoFile::locate(&table), None);

        fs::write(dir.path().join("Notes.dbt"), b"").unwrap();
        assert_eq!(MemoFile::locate(&table), Some(dir.path().join("Notes.dbt")));

        fs::write(dir.path().join("notes.Fpt"), b"").unwrap();
        assert_eq!(MemoFile::locate(&table), Some(dir.path().join("notes.Fpt")));
    }
}
