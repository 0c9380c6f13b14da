//! # Daily ETL CLI (`etl`)
//!
//! Each stage is its own command so an external scheduler can run them as
//! separate tasks and gate each on the previous one's exit status.
//!
//! ## Usage
//!
//! ```bash
//! etl --config ./config/etl.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `etl load` | Source file → relational table (full refresh) |
//! | `etl extract` | Relational table → raw snapshot |
//! | `etl clean` | Raw snapshot → clean snapshot |
//! | `etl index` | Clean snapshot → document index |
//! | `etl run` | Stages in order, stopping at the first failure |
//! | `etl plan` | Show the task chain and run metadata |
//! | `etl status` | Row counts at every hand-off point |

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use daily_etl::config;
use daily_etl::index_store::HttpIndex;
use daily_etl::logging::{self, LogFormat};
use daily_etl::pipeline::{self, Stage};
use daily_etl::plan;
use daily_etl::progress::ProgressMode;
use daily_etl::status;

/// Daily ETL: source file to relational table, snapshots, cleaning, and
/// document index.
#[derive(Parser)]
#[command(name = "etl", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/etl.toml")]
    config: PathBuf,

    /// Log line format on stderr.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Indexing progress on stderr. Defaults to `human` on a TTY, `off` otherwise.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the source file and replace the relational table with it.
    Load,

    /// Write every row of the relational table to the raw snapshot.
    Extract,

    /// Normalise the raw snapshot into the clean snapshot.
    Clean,

    /// Submit each clean snapshot row to the document index.
    Index,

    /// Run stages in order, stopping at the first failure.
    ///
    /// Refuses to run before `pipeline.start_date` unless
    /// `--ignore-start-date` is given.
    Run {
        /// First stage to run.
        #[arg(long, value_enum, default_value = "load")]
        from: Stage,

        /// Last stage to run.
        #[arg(long, value_enum, default_value = "index")]
        to: Stage,

        /// Run even if the pipeline start date is in the future.
        #[arg(long)]
        ignore_start_date: bool,
    },

    /// Show the task chain, schedule, and owner.
    Plan,

    /// Show row and document counts for every artifact.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_format);

    let cfg = config::load_config(&cli.config)?;
    let progress = cli
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();
    let index = HttpIndex::new(&cfg.index)?;

    match cli.command {
        Commands::Load => {
            pipeline::run_stage(&cfg, Stage::Load, &index, progress.as_ref()).await?;
        }
        Commands::Extract => {
            pipeline::run_stage(&cfg, Stage::Extract, &index, progress.as_ref()).await?;
        }
        Commands::Clean => {
            pipeline::run_stage(&cfg, Stage::Clean, &index, progress.as_ref()).await?;
        }
        Commands::Index => {
            pipeline::run_stage(&cfg, Stage::Index, &index, progress.as_ref()).await?;
        }
        Commands::Run {
            from,
            to,
            ignore_start_date,
        } => {
            let now = if ignore_start_date {
                None
            } else {
                Some(chrono::Local::now().naive_local())
            };
            pipeline::run_pipeline(&cfg, from, to, now, &index, progress.as_ref()).await?;
        }
        Commands::Plan => {
            plan::print_plan(&cfg)?;
        }
        Commands::Status => {
            status::run_status(&cfg, &index).await?;
        }
    }

    Ok(())
}
