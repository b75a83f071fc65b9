// src/main.rs

use anyhow::Result;
use dbf2sqlite::{config::ImportConfig, import};
use std::env;
use tracing::{debug, info};
use tracing_subscriber::{filter::LevelFilter, fmt, EnvFilter};

fn main() -> Result<()> {
    // ─── 1) init logging ─────────────────────────────────────────────
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"))
        .add_directive(log_level.parse().unwrap_or(LevelFilter::INFO.into()));
    fmt::Subscriber::builder().with_env_filter(filter).init();
    info!("startup");

    // ─── 2) configure paths and candidate encodings ──────────────────
    let config = ImportConfig::from_env()?;
    let names: Vec<&str> = config.candidates.iter().map(|c| c.name()).collect();
    info!("candidate encodings: {}", names.join(", "));

    // ─── 3) convert ──────────────────────────────────────────────────
    let run = import::run(&config)?;

    // ─── 4) summary ──────────────────────────────────────────────────
    print!("{}", run);
    debug!("summary: {}", serde_json::to_string(&run)?);
    Ok(())
}
