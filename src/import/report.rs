// src/import/report.rs

use serde::Serialize;
use std::{fmt, path::PathBuf};

/// What happened to one source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileStatus {
    /// Table created; `aborted` holds the error that stopped the insert loop early, if any.
    Converted {
        table: String,
        encoding: String,
        degraded: bool,
        columns: usize,
        rows: usize,
        aborted: Option<String>,
    },
    /// No candidate encoding could read the file; no table was created.
    Skipped { reason: String },
    /// The file decoded but its table could not be created.
    Failed { table: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileOutcome {
    pub file: String,
    #[serde(flatten)]
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, FileStatus::Converted { .. })
    }

    pub fn rows(&self) -> usize {
        match self.status {
            FileStatus::Converted { rows, .. } => rows,
            _ => 0,
        }
    }
}

impl fmt::Display for FileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            FileStatus::Converted {
                table,
                encoding,
                rows,
                aborted,
                ..
            } => {
                write!(f, "{}: {} rows into '{}' ({})", self.file, rows, table, encoding)?;
                if aborted.is_some() {
                    write!(f, ", partial")?;
                }
                Ok(())
            }
            FileStatus::Skipped { .. } => {
                write!(f, "{}: skipped, not readable with any encoding", self.file)
            }
            FileStatus::Failed { reason, .. } => write!(f, "{}: failed: {}", self.file, reason),
        }
    }
}

/// Totals for one invocation. Printed at the end, never persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConversionRun {
    pub source_dir: PathBuf,
    pub output_file: PathBuf,
    pub attempted: usize,
    pub succeeded: usize,
    pub total_rows: usize,
    pub files: Vec<FileOutcome>,
}

impl ConversionRun {
    pub fn new(source_dir: impl Into<PathBuf>, output_file: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_file: output_file.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: FileOutcome) {
        self.attempted += 1;
        if outcome.is_success() {
            self.succeeded += 1;
            self.total_rows += outcome.rows();
        }
        self.files.push(outcome);
    }

    pub fn failed(&self) -> usize {
        self.attempted - self.succeeded
    }

    pub fn degraded(&self) -> impl Iterator<Item = &FileOutcome> {
        self.files
            .iter()
            .filter(|o| matches!(o.status, FileStatus::Converted { degraded: true, .. }))
    }
}

impl fmt::Display for ConversionRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempted == 0 {
            return writeln!(
                f,
                "No DBF files found in '{}' directory",
                self.source_dir.display()
            );
        }
        writeln!(f, "{:=<60}", "")?;
        for outcome in &self.files {
            writeln!(f, "  {}", outcome)?;
        }
        writeln!(f, "{:-<60}", "")?;
        writeln!(
            f,
            "Successfully converted {}/{} DBF files",
            self.succeeded, self.attempted
        )?;
        writeln!(f, "Total records imported: {}", self.total_rows)?;
        writeln!(f, "SQLite database saved as: {}", self.output_file.display())?;
        if self.failed() > 0 {
            writeln!(f, "WARNING: {} files failed to convert", self.failed())?;
        }
        Ok(())
    }
}
