// src/config/mod.rs

use anyhow::{Context, Result};
use std::{env, path::PathBuf};

use crate::encoding::{Codec, DEFAULT_CANDIDATES};

pub const DEFAULT_SOURCE_DIR: &str = "jmena";
pub const DEFAULT_OUTPUT_FILE: &str = "jmena.sqlite";
/// Rows between progress lines while loading a table.
pub const PROGRESS_EVERY: usize = 1_000;

pub const ENV_SOURCE_DIR: &str = "DBF_SOURCE_DIR";
pub const ENV_OUTPUT_FILE: &str = "DBF_OUTPUT_FILE";
pub const ENV_ENCODINGS: &str = "DBF_ENCODINGS";

/// Settings for one conversion run.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    pub source_dir: PathBuf,
    pub output_file: PathBuf,
    /// Tried in order, strict pass first, then lossy.
    pub candidates: Vec<Codec>,
    pub progress_every: usize,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from(DEFAULT_SOURCE_DIR),
            output_file: PathBuf::from(DEFAULT_OUTPUT_FILE),
            candidates: Codec::list(DEFAULT_CANDIDATES)
                .expect("built-in candidate encodings should resolve"),
            progress_every: PROGRESS_EVERY,
        }
    }
}

impl ImportConfig {
    /// Defaults, overridden by `DBF_SOURCE_DIR`, `DBF_OUTPUT_FILE` and
    /// `DBF_ENCODINGS` (comma-separated) when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        let non_empty = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        if let Some(dir) = non_empty(ENV_SOURCE_DIR) {
            cfg.source_dir = PathBuf::from(dir);
        }
        if let Some(out) = non_empty(ENV_OUTPUT_FILE) {
            cfg.output_file = PathBuf::from(out);
        }
        if let Some(list) = non_empty(ENV_ENCODINGS) {
            let names: Vec<&str> = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            cfg.candidates = Codec::list(&names)
                .with_context(|| format!("parsing {}={}", ENV_ENCODINGS, list))?;
        }
        Ok(cfg)
    }

    pub fn with_paths(source_dir: impl Into<PathBuf>, output_file: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            output_file: output_file.into(),
            ..Self::default()
        }
    }

    pub fn with_candidates(mut self, names: &[&str]) -> Result<Self> {
        self.candidates = Codec::list(names).context("resolving candidate encodings")?;
        Ok(self)
    }
}
