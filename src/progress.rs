//! Indexing progress reporting.
//!
//! Reports how many documents the indexer has submitted so far. Progress is
//! emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for the indexing stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IndexProgressEvent {
    /// The index is being purged before the first submission.
    Purging { index: String },
    /// n documents submitted out of total.
    Indexing { index: String, n: u64, total: u64 },
}

/// Reports indexing progress. Implementations write to stderr (human or JSON).
pub trait IndexProgressReporter: Send + Sync {
    fn report(&self, event: IndexProgressEvent);
}

/// Human-friendly progress on stderr: "index player_sessions  1,234 / 5,000 documents".
pub struct StderrProgress;

impl IndexProgressReporter for StderrProgress {
    fn report(&self, event: IndexProgressEvent) {
        let line = match &event {
            IndexProgressEvent::Purging { index } => format!("index {}  purging...\n", index),
            IndexProgressEvent::Indexing { index, n, total } => format!(
                "index {}  {} / {} documents\n",
                index,
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IndexProgressReporter for JsonProgress {
    fn report(&self, event: IndexProgressEvent) {
        let obj = match &event {
            IndexProgressEvent::Purging { index } => serde_json::json!({
                "event": "progress",
                "index": index,
                "phase": "purging"
            }),
            IndexProgressEvent::Indexing { index, n, total } => serde_json::json!({
                "event": "progress",
                "index": index,
                "phase": "indexing",
                "n": n,
                "total": total
            }),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", obj);
        let _ = stderr.flush();
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IndexProgressReporter for NoProgress {
    fn report(&self, _event: IndexProgressEvent) {}
}

/// Thousands separators: 1234567 → "1,234,567".
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let head = digits.len() % 3;
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (i + 3 - head) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Documents between two `Indexing` events. The last document always reports.
pub const REPORT_EVERY: u64 = 500;

/// Value of the global `--progress` flag.
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// `human` on an interactive stderr, `off` when piped or under a scheduler.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn IndexProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
