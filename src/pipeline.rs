//! Stage sequencing.
//!
//! The pipeline is a single fixed chain, `load → extract → clean → index`.
//! Stages share nothing in memory: every hand-off goes through the
//! relational table or a snapshot file, so any stage can be re-run on its
//! own against the still-valid output of the one before it.
//!
//! Scheduling itself is external. [`run_pipeline`] only runs a contiguous
//! slice of the chain in order and stops at the first failure.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::fmt;
use tracing::{error, info, warn};

use crate::cleaner::{self, CleanReport};
use crate::config::Config;
use crate::error::EtlError;
use crate::extractor::{self, ExtractReport};
use crate::index_store::DocumentIndex;
use crate::indexer::{self, IndexReport};
use crate::loader::{self, LoadReport};
use crate::progress::IndexProgressReporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, clap::ValueEnum)]
pub enum Stage {
    Load,
    Extract,
    Clean,
    Index,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Load, Stage::Extract, Stage::Clean, Stage::Index];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Extract => "extract",
            Stage::Clean => "clean",
            Stage::Index => "index",
        }
    }

    /// Task identifier the external scheduler knows this stage by.
    pub fn task_id(&self) -> &'static str {
        match self {
            Stage::Load => "csv_to_db",
            Stage::Extract => "db_to_csv",
            Stage::Clean => "data_cleaning",
            Stage::Index => "csv_to_index",
        }
    }

    pub fn upstream(&self) -> Option<Stage> {
        match self {
            Stage::Load => None,
            Stage::Extract => Some(Stage::Load),
            Stage::Clean => Some(Stage::Extract),
            Stage::Index => Some(Stage::Clean),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stages from `from` to `to`, inclusive, in pipeline order.
pub fn stages_between(from: Stage, to: Stage) -> Vec<Stage> {
    Stage::ALL
        .into_iter()
        .filter(|s| *s >= from && *s <= to)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageReport {
    Load(LoadReport),
    Extract(ExtractReport),
    Clean(CleanReport),
    Index(IndexReport),
}

impl StageReport {
    pub fn stage(&self) -> Stage {
        match self {
            StageReport::Load(_) => Stage::Load,
            StageReport::Extract(_) => Stage::Extract,
            StageReport::Clean(_) => Stage::Clean,
            StageReport::Index(_) => Stage::Index,
        }
    }

    /// Print the stdout summary block for this stage.
    pub fn print(&self, config: &Config) {
        let stage = self.stage();
        println!("{} {}", stage, stage.task_id());
        match self {
            StageReport::Load(r) => {
                println!("  source: {}", config.paths.source.display());
                println!("  table: {}", r.table);
                println!("  columns: {}", r.columns);
                println!("  rows loaded: {}", r.rows);
            }
            StageReport::Extract(r) => {
                println!("  table: {}", r.table);
                println!("  snapshot: {}", config.paths.raw_snapshot.display());
                println!("  rows extracted: {}", r.rows);
            }
            StageReport::Clean(r) => {
                println!("  snapshot: {}", config.paths.clean_snapshot.display());
                println!("  rows read: {}", r.input_rows);
                println!("  dropped (missing): {}", r.dropped_missing);
                println!("  dropped (duplicate): {}", r.dropped_duplicates);
                println!("  rows written: {}", r.rows);
            }
            StageReport::Index(r) => {
                println!("  index: {}", r.index);
                println!("  purged: {}", r.purged);
                println!("  documents indexed: {}", r.documents);
            }
        }
        println!("ok");
    }
}

/// Run one stage without printing.
pub async fn execute(
    config: &Config,
    stage: Stage,
    index: &dyn DocumentIndex,
    progress: &dyn IndexProgressReporter,
) -> Result<StageReport, EtlError> {
    match stage {
        Stage::Load => loader::run_load(config).await.map(StageReport::Load),
        Stage::Extract => extractor::run_extract(config).await.map(StageReport::Extract),
        Stage::Clean => cleaner::run_clean(config).map(StageReport::Clean),
        Stage::Index => indexer::run_index_with(config, index, progress)
            .await
            .map(StageReport::Index),
    }
}

/// Run one stage and print its summary.
pub async fn run_stage(
    config: &Config,
    stage: Stage,
    index: &dyn DocumentIndex,
    progress: &dyn IndexProgressReporter,
) -> Result<StageReport> {
    let report = execute(config, stage, index, progress)
        .await
        .with_context(|| format!("stage {} ({}) failed", stage, stage.task_id()))?;
    report.print(config);
    Ok(report)
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Triggered before `pipeline.start_date`; nothing ran.
    NotEligible { start: NaiveDateTime },
    Completed(Vec<StageReport>),
}

/// Run stages `from..=to` in order, stopping at the first failure.
///
/// When `now` is given, a run before `pipeline.start_date` is refused.
pub async fn run_pipeline(
    config: &Config,
    from: Stage,
    to: Stage,
    now: Option<NaiveDateTime>,
    index: &dyn DocumentIndex,
    progress: &dyn IndexProgressReporter,
) -> Result<RunOutcome> {
    if from > to {
        anyhow::bail!("--from {} comes after --to {}", from, to);
    }

    if let Some(now) = now {
        if !config.pipeline.is_eligible(now)? {
            let start = config.pipeline.start()?;
            warn!(pipeline = %config.pipeline.name, %start, "run refused: before start date");
            println!(
                "pipeline {} not eligible before {}",
                config.pipeline.name, start
            );
            return Ok(RunOutcome::NotEligible { start });
        }
    }

    info!(
        pipeline = %config.pipeline.name,
        owner = %config.pipeline.owner,
        from = %from,
        to = %to,
        "run started"
    );

    let mut reports = Vec::new();
    for stage in stages_between(from, to) {
        match run_stage(config, stage, index, progress).await {
            Ok(report) => reports.push(report),
            Err(e) => {
                error!(stage = %stage, error = %format!("{:#}", e), "run aborted");
                return Err(e);
            }
        }
    }

    info!(pipeline = %config.pipeline.name, stages = reports.len(), "run finished");
    Ok(RunOutcome::Completed(reports))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(Stage::Load < Stage::Extract);
        assert!(Stage::Clean < Stage::Index);
        assert_eq!(Stage::Index.upstream(), Some(Stage::Clean));
        assert_eq!(Stage::Load.upstream(), None);
    }

    #[test]
    fn test_stages_between() {
        assert_eq!(stages_between(Stage::Load, Stage::Index), Stage::ALL.to_vec());
        assert_eq!(
            stages_between(Stage::Extract, Stage::Clean),
            vec![Stage::Extract, Stage::Clean]
        );
        assert_eq!(stages_between(Stage::Index, Stage::Index), vec![Stage::Index]);
        assert!(stages_between(Stage::Index, Stage::Load).is_empty());
    }

    #[test]
    fn test_task_ids_unique() {
        let mut ids: Vec<&str> = Stage::ALL.iter().map(|s| s.task_id()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 4);
    }
}
