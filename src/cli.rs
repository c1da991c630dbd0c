//! CLI commands for working with the record store directly.
//!
//! Exposes the dump workflow (backup/restore) and a history view without
//! going through a calling application.

use std::path::PathBuf;

use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};

use crate::store::{Dump, SqliteStore};

#[derive(Parser, Debug)]
#[command(name = "fieldstore", about = "Local record store for technician observations and history")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Export both collections as a JSON dump
    Export {
        /// File to write (omit for stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import a JSON dump (history ids are re-assigned, ot keys overwrite)
    Import {
        /// Dump file to read
        file: PathBuf,
    },

    /// Show recent history entries for a technician, newest first
    History {
        /// Technician identifier
        tech: String,

        /// Maximum number of entries
        #[arg(short, long, default_value = "200")]
        limit: usize,
    },

    /// Open the database and ensure the schema exists
    Migrate,
}

/// Run a CLI command against an opened store.
pub async fn run_command(cmd: Command, store: &SqliteStore) -> anyhow::Result<()> {
    match cmd {
        Command::Export { out } => export(store, out).await,
        Command::Import { file } => import(store, &file).await,
        Command::History { tech, limit } => history(store, &tech, limit).await,
        // Schema is ensured when the store opens; nothing left to do.
        Command::Migrate => {
            println!("Schema ensured");
            Ok(())
        }
    }
}

async fn export(store: &SqliteStore, out: Option<PathBuf>) -> anyhow::Result<()> {
    let dump = store.export_all().await?;
    let json = serde_json::to_string_pretty(&dump)?;
    match out {
        Some(path) => {
            tokio::fs::write(&path, &json).await?;
            println!(
                "Exported {} observation(s) and {} history entr(ies) to {}",
                dump.ot.len(),
                dump.history.len(),
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

async fn import(store: &SqliteStore, file: &PathBuf) -> anyhow::Result<()> {
    let json = tokio::fs::read_to_string(file).await?;
    let dump: Dump = serde_json::from_str(&json)?;
    store.import_all(&dump).await?;
    println!(
        "Imported {} observation(s) and {} history entr(ies)",
        dump.ot.len(),
        dump.history.len()
    );
    Ok(())
}

async fn history(store: &SqliteStore, tech: &str, limit: usize) -> anyhow::Result<()> {
    let entries = store.history_by_tech(tech, Some(limit)).await?;
    if entries.is_empty() {
        println!("No history for: {tech}");
        return Ok(());
    }

    for entry in &entries {
        let when = Utc
            .timestamp_millis_opt(entry.ts)
            .single()
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let id = entry.id.map(|i| i.to_string()).unwrap_or_else(|| "-".to_string());
        println!("#{id} [{when}] {} {}", entry.date, serde_json::Value::Object(entry.extra.clone()));
    }
    Ok(())
}
