//! Stage 4: clean snapshot into the document index.
//!
//! One document per row, submitted synchronously in file order with ID
//! `position + 1`. Submissions are independent: when one fails the stage
//! stops with [`EtlError::PartialIndex`], and documents already written
//! stay in the index.
//!
//! IDs follow row position, not record identity. A run with fewer rows
//! than the previous one leaves the higher IDs behind unless
//! `index.purge_stale` is set, in which case the index is emptied first.

use tracing::{error, info};

use crate::config::Config;
use crate::error::{EtlError, Result};
use crate::index_store::{Document, DocumentIndex, HttpIndex};
use crate::models::Value;
use crate::progress::{IndexProgressEvent, IndexProgressReporter, REPORT_EVERY};
use crate::snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexReport {
    pub index: String,
    pub documents: usize,
    pub purged: bool,
}

/// Index the clean snapshot into the configured HTTP index store.
pub async fn run_index(
    config: &Config,
    progress: &dyn IndexProgressReporter,
) -> Result<IndexReport> {
    let index = HttpIndex::new(&config.index)?;
    run_index_with(config, &index, progress).await
}

/// Index the clean snapshot into `index`.
pub async fn run_index_with(
    config: &Config,
    index: &dyn DocumentIndex,
    progress: &dyn IndexProgressReporter,
) -> Result<IndexReport> {
    let path = &config.paths.clean_snapshot;
    info!(path = %path.display(), index = index.name(), "index started");

    let table = snapshot::read_table(path)?;
    let total = table.len();

    let purged = config.index.purge_stale;
    if purged {
        progress.report(IndexProgressEvent::Purging {
            index: index.name().to_string(),
        });
        index.purge().await?;
        info!(index = index.name(), "stale documents purged");
    }

    for (position, row) in table.rows.iter().enumerate() {
        let id = document_id(position);
        let doc = to_document(&table.columns, row);
        if let Err(e) = index.upsert(&id, &doc).await {
            error!(id = %id, indexed = position, total, error = %e, "document submission failed");
            return Err(EtlError::PartialIndex {
                indexed: position,
                total,
                source: Box::new(e),
            });
        }

        let n = position as u64 + 1;
        if n % REPORT_EVERY == 0 || n == total as u64 {
            progress.report(IndexProgressEvent::Indexing {
                index: index.name().to_string(),
                n,
                total: total as u64,
            });
        }
    }

    index.refresh().await?;

    info!(index = index.name(), documents = total, "index finished");
    Ok(IndexReport {
        index: index.name().to_string(),
        documents: total,
        purged,
    })
}

/// 1-based document ID for a 0-based row position.
pub fn document_id(position: usize) -> String {
    (position + 1).to_string()
}

/// One row as a flat document keyed by column name.
pub fn to_document(columns: &[String], row: &[Value]) -> Document {
    columns
        .iter()
        .zip(row)
        .map(|(column, value)| (column.clone(), value.to_json()))
        .collect()
}
