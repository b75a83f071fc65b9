// src/lib.rs
//! Import a directory of legacy DBF tables into a single SQLite database.

pub mod config;
pub mod dbf;
pub mod encoding;
pub mod import;
pub mod sqlite;
