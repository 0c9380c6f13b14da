//! # Daily ETL
//!
//! A four-stage batch job that moves one dataset from a comma-delimited
//! source file into a search index, once per scheduled run.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐ load  ┌──────────┐ extract ┌──────────┐ clean ┌──────────┐ index ┌──────────┐
//! │ source   │──────▶│  table   │────────▶│   raw    │──────▶│  clean   │──────▶│  index   │
//! │  .csv    │       │ (SQL)    │         │  .csv    │       │  .csv    │       │ (HTTP)   │
//! └──────────┘       └──────────┘         └──────────┘       └──────────┘       └──────────┘
//! ```
//!
//! Stages never share memory. Each reads what the previous one persisted,
//! so a failed stage can be re-run alone once its cause is fixed.
//!
//! ## Quick Start
//!
//! ```bash
//! etl plan                      # show the task chain and run metadata
//! etl run                       # all four stages, in order
//! etl run --from clean          # resume from the cleaning stage
//! etl status                    # row counts at every hand-off point
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`error`] | Stage error taxonomy |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`models`] | Tabular data types |
//! | [`snapshot`] | Comma-delimited read/write |
//! | [`db`] | Scoped relational connections |
//! | [`loader`] | Source file → table |
//! | [`extractor`] | Table → raw snapshot |
//! | [`cleaner`] | Raw snapshot → clean snapshot |
//! | [`index_store`] | Document index backends |
//! | [`indexer`] | Clean snapshot → index |
//! | [`progress`] | Indexing progress on stderr |
//! | [`pipeline`] | Stage ordering and runs |
//! | [`plan`] | Task chain and run metadata |
//! | [`status`] | Artifact counts |

pub mod cleaner;
pub mod config;
pub mod db;
pub mod error;
pub mod extractor;
pub mod index_store;
pub mod indexer;
pub mod loader;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod plan;
pub mod progress;
pub mod snapshot;
pub mod status;
