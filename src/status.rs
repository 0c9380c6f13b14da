//! Artifact counts across the pipeline.
//!
//! `etl status` shows how many rows each hand-off point holds, which is
//! the quickest way to confirm that the load and extract stages lost no
//! rows and how much cleaning removed. Missing artifacts are reported, not
//! treated as failures.

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::error::EtlError;
use crate::index_store::DocumentIndex;
use crate::snapshot;

/// Count for one artifact, or why it could not be taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Count {
    Rows(u64),
    Missing,
    Unreachable(String),
}

impl std::fmt::Display for Count {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Count::Rows(n) => write!(f, "{}", n),
            Count::Missing => f.write_str("missing"),
            Count::Unreachable(reason) => write!(f, "unreachable ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub source: Count,
    pub table: Count,
    pub raw_snapshot: Count,
    pub clean_snapshot: Count,
    pub index: Count,
}

pub async fn collect_status(config: &Config, index: &dyn DocumentIndex) -> StatusReport {
    StatusReport {
        source: file_count(&config.paths.source),
        table: table_count(config).await,
        raw_snapshot: file_count(&config.paths.raw_snapshot),
        clean_snapshot: file_count(&config.paths.clean_snapshot),
        index: match index.count().await {
            Ok(n) => Count::Rows(n),
            Err(e) => Count::Unreachable(e.to_string()),
        },
    }
}

fn file_count(path: &Path) -> Count {
    if !path.exists() {
        return Count::Missing;
    }
    match snapshot::count_records(path) {
        Ok(n) => Count::Rows(n as u64),
        Err(e) => Count::Unreachable(e.to_string()),
    }
}

async fn table_count(config: &Config) -> Count {
    let mut session = match db::connect(config).await {
        Ok(session) => session,
        Err(e) => return Count::Unreachable(e.to_string()),
    };
    let result = db::count_rows(&mut session, &config.db.table).await;
    match db::close(session, result).await {
        Ok(n) => Count::Rows(n as u64),
        // The store rejected the query itself: the table has not been loaded.
        Err(EtlError::Database(sqlx::Error::Database(_))) => Count::Missing,
        Err(e) => Count::Unreachable(e.to_string()),
    }
}

/// Run the status command: collect counts and print a summary.
pub async fn run_status(config: &Config, index: &dyn DocumentIndex) -> Result<()> {
    let report = collect_status(config, index).await;

    println!("pipeline {}", config.pipeline.name);
    println!();
    println!("  {:<16} {:<40} COUNT", "ARTIFACT", "LOCATION");
    println!("  {}", "-".repeat(70));
    let rows = [
        ("source", config.paths.source.display().to_string(), &report.source),
        ("table", config.db.table.clone(), &report.table),
        (
            "raw snapshot",
            config.paths.raw_snapshot.display().to_string(),
            &report.raw_snapshot,
        ),
        (
            "clean snapshot",
            config.paths.clean_snapshot.display().to_string(),
            &report.clean_snapshot,
        ),
        ("index", config.index.name.clone(), &report.index),
    ];
    for (artifact, location, count) in rows {
        println!("  {:<16} {:<40} {}", artifact, location, count);
    }
    println!();

    Ok(())
}
