// src/sqlite/mod.rs

use anyhow::{Context, Result};
use rusqlite::{params_from_iter, Connection, Statement};
use std::path::Path;

/// Open (creating if needed) a SQLite database on disk.
pub fn open_disk_db(path: &Path) -> Result<Connection> {
    Connection::open(path).with_context(|| format!("opening SQLite database {}", path.display()))
}

/// Open a SQLite in-memory database
pub fn open_mem_db() -> Result<Connection> {
    Connection::open_in_memory().context("opening in-memory SQLite database")
}

/// Double-quote an identifier, doubling any embedded quotes. No other validation.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Drop `table` if present, then create it with one TEXT column per name, in order.
pub fn create_text_table(conn: &Connection, table: &str, columns: &[&str]) -> rusqlite::Result<()> {
    let table = quote_ident(table);
    conn.execute(&format!("DROP TABLE IF EXISTS {}", table), [])?;

    let cols = columns
        .iter()
        .map(|c| format!("{} TEXT", quote_ident(c)))
        .collect::<Vec<_>>()
        .join(", ");
    conn.execute(&format!("CREATE TABLE {} ({})", table, cols), [])?;
    Ok(())
}

/// A prepared `INSERT` for one table, reused for every row.
pub struct RowInserter<'conn> {
    stmt: Statement<'conn>,
    width: usize,
}

impl<'conn> RowInserter<'conn> {
    pub fn new(conn: &'conn Connection, table: &str, columns: &[&str]) -> rusqlite::Result<Self> {
        let quoted = columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table),
            quoted,
            placeholders
        );
        Ok(Self {
            stmt: conn.prepare(&sql)?,
            width: columns.len(),
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn insert(&mut self, values: &[String]) -> rusqlite::Result<()> {
        self.stmt.execute(params_from_iter(values.iter()))?;
        Ok(())
    }
}

/// `(name, declared type)` for each column of `table`, in column order.
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let cols = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(cols)
}

pub fn table_names(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names)
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let n = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
        [],
        |r| r.get(0),
    )?;
    Ok(n)
}
