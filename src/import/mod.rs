// src/import/mod.rs
//! Converts a directory of DBF tables into one SQLite database.
//!
//! Each file is opened under the first candidate encoding that can read its
//! first record (strict pass, then lossy pass), loaded into an all-TEXT table
//! named after the file, and tallied into a [`ConversionRun`].

use anyhow::{Context, Result};
use glob::{glob_with, MatchOptions, Pattern};
use rusqlite::Connection;
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    config::ImportConfig,
    dbf::{DbfError, DbfTable, Record, Value},
    encoding::{Codec, DecodeMode},
    sqlite::{self, RowInserter},
};

pub mod report;

pub use report::{ConversionRun, FileOutcome, FileStatus};

/// Strict-pass failure reasons are cut to this many characters in the log.
const REASON_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Directory '{}' does not exist", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("bad search pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

/// One candidate that could not read the file.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub encoding: String,
    pub mode: DecodeMode,
    pub reason: String,
}

/// No candidate, strict or lossy, could read the first record.
#[derive(Debug, Error)]
#[error("could not read {} with any of {} encodings", path.display(), tried)]
pub struct Unreadable {
    pub path: PathBuf,
    pub tried: usize,
    pub rejected: Vec<Rejection>,
}

/// A table opened under an accepted candidate.
#[derive(Debug)]
pub struct Decoded {
    pub table: DbfTable,
    /// True when only the lossy pass succeeded.
    pub degraded: bool,
    /// Candidates that failed before this one was accepted.
    pub rejected: Vec<Rejection>,
}

impl Decoded {
    /// `cp1250`, or `cp1250 (ignore errors)` for a lossy acceptance.
    pub fn encoding_label(&self) -> String {
        if self.degraded {
            format!("{} (ignore errors)", self.table.codec())
        } else {
            self.table.codec().to_string()
        }
    }
}

/// Rows inserted for one file, and the error that stopped the loop if any.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadReport {
    pub inserted: usize,
    pub aborted: Option<String>,
}

/// Regular files in `dir` (not recursive) whose extension is `dbf` in any
/// case, sorted by path.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, ImportError> {
    if !dir.is_dir() {
        return Err(ImportError::DirectoryNotFound(dir.to_path_buf()));
    }
    let pattern = format!("{}/*.dbf", Pattern::escape(&dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let mut files: Vec<PathBuf> = glob_with(&pattern, options)?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    files.dedup();
    Ok(files)
}

/// Lower-cased file stem: `CITIES.DBF` becomes `cities`.
pub fn table_name_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn short_reason(reason: &str) -> String {
    reason.chars().take(REASON_CHARS).collect()
}

#[derive(Debug, Error)]
enum CandidateError {
    #[error("table has no records")]
    NoRecords,
    #[error(transparent)]
    Dbf(#[from] DbfError),
}

fn try_candidate(path: &Path, codec: &Codec, mode: DecodeMode) -> Result<DbfTable, CandidateError> {
    let table = DbfTable::open(path, codec, mode)?;
    match table.first_record()? {
        Some(_) => Ok(table),
        None => Err(CandidateError::NoRecords),
    }
}

/// Try every candidate strictly, then every candidate lossily, and keep the
/// first under which the file's first record decodes.
pub fn open_with_fallback(path: &Path, candidates: &[Codec]) -> Result<Decoded, Unreadable> {
    let mut rejected = Vec::new();

    for mode in [DecodeMode::Strict, DecodeMode::Lossy] {
        for codec in candidates {
            match try_candidate(path, codec, mode) {
                Ok(table) => {
                    if mode == DecodeMode::Lossy {
                        warn!("using encoding '{}' with error ignore mode", codec);
                    } else {
                        debug!("encoding '{}' accepted", codec);
                    }
                    return Ok(Decoded {
                        table,
                        degraded: mode == DecodeMode::Lossy,
                        rejected,
                    });
                }
                Err(e) => {
                    let reason = e.to_string();
                    if matches!(e, CandidateError::NoRecords) {
                        debug!("no records under '{}', trying next", codec);
                    } else if mode == DecodeMode::Strict {
                        warn!("failed with encoding '{}': {}...", codec, short_reason(&reason));
                    } else {
                        debug!("lossy '{}' failed: {}", codec, reason);
                    }
                    rejected.push(Rejection {
                        encoding: codec.name().to_string(),
                        mode,
                        reason,
                    });
                }
            }
        }
    }

    Err(Unreadable {
        path: path.to_path_buf(),
        tried: candidates.len(),
        rejected,
    })
}

/// Text for one cell. Missing and null values both become "".
pub fn cell_text(value: Option<&Value>) -> String {
    value.map(Value::to_text).unwrap_or_default()
}

fn row_text(record: &Record, width: usize) -> Vec<String> {
    (0..width).map(|i| cell_text(record.get(i))).collect()
}

/// Insert every live record of `dbf` into `table_name` in file order.
///
/// A decode or insert error stops the loop; rows already inserted stay.
/// Only a failure to prepare the statement is returned as `Err`.
pub fn bulk_load(
    conn: &Connection,
    table_name: &str,
    dbf: &DbfTable,
    progress_every: usize,
) -> rusqlite::Result<LoadReport> {
    let columns = dbf.field_names();
    let mut inserter = RowInserter::new(conn, table_name, &columns)?;
    let mut report = LoadReport::default();

    for record in dbf.records() {
        let outcome = record
            .map_err(anyhow::Error::from)
            .and_then(|r| Ok(inserter.insert(&row_text(&r, inserter.width()))?));
        if let Err(e) = outcome {
            warn!(
                "error inserting into '{}' after {} records: {:#}",
                table_name, report.inserted, e
            );
            report.aborted = Some(format!("{:#}", e));
            break;
        }
        report.inserted += 1;
        if progress_every > 0 && report.inserted % progress_every == 0 {
            info!("inserted {} records...", report.inserted);
        }
    }
    Ok(report)
}

/// Decode, create and load one file. Never fails the run.
#[instrument(level = "info", skip(conn, path, config), fields(file = %file_label(path)))]
pub fn convert_file(conn: &Connection, path: &Path, config: &ImportConfig) -> FileOutcome {
    let file = file_label(path);
    info!("processing {}", file);

    // 1) pick an encoding
    let decoded = match open_with_fallback(path, &config.candidates) {
        Ok(d) => d,
        Err(e) => {
            error!("could not read {} with any encoding", file);
            return FileOutcome {
                file,
                status: FileStatus::Skipped {
                    reason: e.to_string(),
                },
            };
        }
    };
    let encoding = decoded.encoding_label();
    info!("successfully opened with encoding: {}", encoding);

    // 2) recreate the target table
    let table_name = table_name_for(path);
    let columns = decoded.table.field_names();
    if let Err(e) = sqlite::create_text_table(conn, &table_name, &columns) {
        error!("error processing {}: {}", file, e);
        return FileOutcome {
            file,
            status: FileStatus::Failed {
                table: table_name,
                reason: e.to_string(),
            },
        };
    }
    info!("created table '{}' with {} columns", table_name, columns.len());

    // 3) load the records
    match bulk_load(conn, &table_name, &decoded.table, config.progress_every) {
        Ok(load) => {
            info!("inserted {} records into '{}'", load.inserted, table_name);
            FileOutcome {
                file,
                status: FileStatus::Converted {
                    table: table_name,
                    encoding,
                    degraded: decoded.degraded,
                    columns: columns.len(),
                    rows: load.inserted,
                    aborted: load.aborted,
                },
            }
        }
        Err(e) => {
            error!("error processing {}: {}", file, e);
            FileOutcome {
                file,
                status: FileStatus::Failed {
                    table: table_name,
                    reason: e.to_string(),
                },
            }
        }
    }
}

/// Convert every DBF file under `config.source_dir` into `config.output_file`.
///
/// Only a missing source directory or an unusable output database fails the
/// run; per-file problems are recorded in the returned [`ConversionRun`].
pub fn run(config: &ImportConfig) -> Result<ConversionRun> {
    info!(
        "converting DBF files from '{}' to '{}'",
        config.source_dir.display(),
        config.output_file.display()
    );

    // 1) discover inputs
    let files = discover_files(&config.source_dir)?;
    let mut run = ConversionRun::new(&config.source_dir, &config.output_file);
    if files.is_empty() {
        info!(
            "no DBF files found in '{}' directory",
            config.source_dir.display()
        );
        return Ok(run);
    }
    info!("found {} DBF files", files.len());
    for f in &files {
        info!("  - {}", file_label(f));
    }

    // 2) start from an empty database
    if config.output_file.exists() {
        info!("removing existing {}", config.output_file.display());
        fs::remove_file(&config.output_file).with_context(|| {
            format!("removing existing {}", config.output_file.display())
        })?;
    }
    let mut conn = sqlite::open_disk_db(&config.output_file)?;
    let tx = conn.transaction().context("starting transaction")?;

    // 3) one table per file
    for path in &files {
        run.record(convert_file(&tx, path, config));
    }

    // 4) everything lands at once
    tx.commit().context("committing imported tables")?;

    info!(
        "converted {}/{} DBF files, {} records",
        run.succeeded, run.attempted, run.total_rows
    );
    if run.failed() > 0 {
        warn!("{} files failed to convert", run.failed());
    }
    for o in run.degraded() {
        warn!("{} was decoded with error ignore mode", o.file);
    }
    Ok(run)
}
