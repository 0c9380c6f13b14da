//! Error taxonomy shared by the four pipeline stages.
//!
//! Every variant is fatal to the stage that raised it. Nothing here is
//! retried; re-attempts belong to whatever scheduler invoked the stage.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EtlError {
    #[error("{store} unreachable: {message}")]
    Connectivity {
        store: &'static str,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Expected column '{column}' not found in {}", path.display())]
    SchemaMismatch { column: String, path: PathBuf },

    #[error("Column '{column}' cannot be normalised: {reason}")]
    InvalidColumnName {
        column: String,
        reason: &'static str,
    },

    #[error("Malformed value '{value}' in column '{column}' at row {row}: expected {expected}")]
    MalformedValue {
        column: String,
        row: usize,
        value: String,
        expected: &'static str,
    },

    #[error("Snapshot error in {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} has no header row", path.display())]
    MissingHeader { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Index store rejected request ({status}): {body}")]
    IndexRejected { status: u16, body: String },

    #[error("Indexing stopped after {indexed} of {total} documents: {source}")]
    PartialIndex {
        indexed: usize,
        total: usize,
        #[source]
        source: Box<EtlError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EtlError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn snapshot(path: impl Into<PathBuf>, source: csv::Error) -> Self {
        Self::Snapshot {
            path: path.into(),
            source,
        }
    }

    /// Classify a driver error raised while opening a connection.
    pub(crate) fn from_connect(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::Configuration(_) => Self::Connectivity {
                store: "relational store",
                message: err.to_string(),
            },
            other => Self::Database(other),
        }
    }
}

impl From<reqwest::Error> for EtlError {
    fn from(err: reqwest::Error) -> Self {
        Self::Connectivity {
            store: "index store",
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
