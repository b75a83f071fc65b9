use anyhow::{Context, Result};
use dbf2sqlite::{
    dbf::{DbfHeader, FieldDescriptor},
    encoding::{Codec, DecodeMode, DEFAULT_CANDIDATES},
    import::{self, cell_text},
};
use serde::Serialize;
use std::{env, path::Path, process::exit};

/// Records shown in the preview.
const PREVIEW_ROWS: usize = 5;

#[derive(Serialize)]
struct Inspection<'a> {
    file: String,
    encoding: String,
    degraded: bool,
    rejected: Vec<String>,
    header: &'a DbfHeader,
    fields: &'a [FieldDescriptor],
    preview: Vec<Vec<String>>,
}

fn main() {
    // Expect a DBF path and optionally one encoding to force.
    let args: Vec<String> = env::args().collect();
    if !(2..=3).contains(&args.len()) {
        eprintln!("Usage: {} <DBF_FILE> [ENCODING]", args[0]);
        exit(1);
    }
    if let Err(e) = inspect_dbf(Path::new(&args[1]), args.get(2).map(String::as_str)) {
        eprintln!("Error: {:#}", e);
        exit(1);
    }
}

/// Open the table the way the importer would and print its layout as JSON.
fn inspect_dbf(path: &Path, encoding: Option<&str>) -> Result<()> {
    // 1) candidate list: the forced encoding or the defaults
    let candidates = match encoding {
        Some(name) => vec![Codec::from_name(name)?],
        None => Codec::list(DEFAULT_CANDIDATES)?,
    };

    // 2) same strict-then-lossy selection as the importer
    let decoded = import::open_with_fallback(path, &candidates)?;
    let table = &decoded.table;

    // 3) a few records, rendered as they would be stored
    let width = table.fields().len();
    let mut preview = Vec::with_capacity(PREVIEW_ROWS);
    for record in table.records().take(PREVIEW_ROWS) {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        preview.push((0..width).map(|i| cell_text(record.get(i))).collect());
    }

    let report = Inspection {
        file: table.path().display().to_string(),
        encoding: decoded.encoding_label(),
        degraded: decoded.degraded,
        rejected: decoded
            .rejected
            .iter()
            .map(|r| {
                let pass = match r.mode {
                    DecodeMode::Strict => "strict",
                    DecodeMode::Lossy => "lossy",
                };
                format!("{} ({}): {}", r.encoding, pass, r.reason)
            })
            .collect(),
        header: table.header(),
        fields: table.fields(),
        preview,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
