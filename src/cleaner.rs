//! Stage 3: raw snapshot into the clean snapshot.
//!
//! The rules run in a fixed order:
//!
//! 1. Column names are split at upper-case boundaries, configured acronyms
//!    are re-joined (`Player I D` becomes `Player ID`), then the words are
//!    joined with underscores, lower-cased and trimmed.
//! 2. Rows with any missing value are dropped.
//! 3. Exact duplicate rows are dropped, keeping the first occurrence.
//! 4. Rows are renumbered contiguously (implicit: rows are a `Vec`).
//! 5. The purchase-flag column is recoded from 0/1 to `No`/`Yes`.
//! 6. The play-time column is coerced to real and rounded.
//!
//! The column roles are schema-specific and come from [`CleaningConfig`].
//! A purchase flag outside {0, 1} is a [`EtlError::MalformedValue`], so
//! every value in the clean column is exactly `No` or `Yes`.

use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::config::{CleaningConfig, Config};
use crate::error::{EtlError, Result};
use crate::models::{Table, Value};
use crate::snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub input_rows: usize,
    pub dropped_missing: usize,
    pub dropped_duplicates: usize,
    pub rows: usize,
}

pub fn run_clean(config: &Config) -> Result<CleanReport> {
    let raw_path = &config.paths.raw_snapshot;
    let clean_path = &config.paths.clean_snapshot;
    info!(path = %raw_path.display(), "clean started");

    let raw = snapshot::read_table(raw_path)?;
    let (clean, report) = clean_table(raw, &config.cleaning, raw_path)?;
    snapshot::write_table(clean_path, &clean)?;

    info!(
        path = %clean_path.display(),
        rows = report.rows,
        dropped_missing = report.dropped_missing,
        dropped_duplicates = report.dropped_duplicates,
        "clean finished"
    );
    Ok(report)
}

/// Apply every cleaning rule to `table`.
///
/// `source` is only used to name the file in schema errors.
pub fn clean_table(
    mut table: Table,
    cleaning: &CleaningConfig,
    source: &Path,
) -> Result<(Table, CleanReport)> {
    table.columns = normalize_columns(&table.columns, &cleaning.acronyms)?;

    let flag_idx = require_column(&table, &cleaning.purchase_flag_column, source)?;
    let play_idx = require_column(&table, &cleaning.play_time_column, source)?;

    let input_rows = table.len();

    table.rows.retain(|row| !row.iter().any(Value::is_null));
    let dropped_missing = input_rows - table.len();

    let before_dedup = table.len();
    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(before_dedup);
    table
        .rows
        .retain(|row| seen.insert(row.iter().map(Value::render).collect()));
    let dropped_duplicates = before_dedup - table.len();

    for (position, row) in table.rows.iter_mut().enumerate() {
        let label = recode_flag(&row[flag_idx]).ok_or_else(|| EtlError::MalformedValue {
            column: cleaning.purchase_flag_column.clone(),
            row: position,
            value: row[flag_idx].render(),
            expected: "0 or 1",
        })?;
        row[flag_idx] = Value::Text(label.to_string());

        let hours = coerce_real(&row[play_idx]).ok_or_else(|| EtlError::MalformedValue {
            column: cleaning.play_time_column.clone(),
            row: position,
            value: row[play_idx].render(),
            expected: "a number",
        })?;
        row[play_idx] = Value::Real(round_half_even(hours, cleaning.decimals));
    }

    let report = CleanReport {
        input_rows,
        dropped_missing,
        dropped_duplicates,
        rows: table.len(),
    };
    Ok((table, report))
}

fn require_column(table: &Table, name: &str, source: &Path) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| EtlError::SchemaMismatch {
            column: name.to_string(),
            path: source.to_path_buf(),
        })
}

fn normalize_columns(columns: &[String], acronyms: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut normalized = Vec::with_capacity(columns.len());
    for column in columns {
        let name = normalize_column_name(column, acronyms);
        if name.is_empty() {
            return Err(EtlError::InvalidColumnName {
                column: column.clone(),
                reason: "no upper-case word boundary",
            });
        }
        if !seen.insert(name.clone()) {
            return Err(EtlError::InvalidColumnName {
                column: column.clone(),
                reason: "collides with another column after normalisation",
            });
        }
        normalized.push(name);
    }
    Ok(normalized)
}

fn word_regex() -> &'static Regex {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"[A-Z][a-z]*").expect("static regex"))
}

/// `PlayerID` → `player_id`, `AvgSessionDurationMinutes` → `avg_session_duration_minutes`.
///
/// Only upper-case-led words survive the split; digits and a lower-case
/// prefix are dropped.
pub fn normalize_column_name(name: &str, acronyms: &[String]) -> String {
    let words: Vec<&str> = word_regex().find_iter(name).map(|m| m.as_str()).collect();
    let words = merge_acronyms(&words, acronyms);
    words
        .join(" ")
        .replace(' ', "_")
        .to_lowercase()
        .trim()
        .to_string()
}

/// Re-join runs of single-letter words that spell a configured acronym.
fn merge_acronyms(words: &[&str], acronyms: &[String]) -> Vec<String> {
    let mut by_length: Vec<&String> = acronyms.iter().collect();
    by_length.sort_by_key(|a| std::cmp::Reverse(a.len()));

    let mut merged = Vec::with_capacity(words.len());
    let mut i = 0;
    while i < words.len() {
        match by_length.iter().find(|a| spells(&words[i..], a)) {
            Some(acronym) => {
                merged.push((*acronym).clone());
                i += acronym.len();
            }
            None => {
                merged.push(words[i].to_string());
                i += 1;
            }
        }
    }
    merged
}

fn spells(words: &[&str], acronym: &str) -> bool {
    acronym.len() <= words.len()
        && acronym
            .chars()
            .zip(words)
            .all(|(letter, word)| word.len() == 1 && word.starts_with(letter))
}

fn recode_flag(value: &Value) -> Option<&'static str> {
    match value {
        Value::Integer(0) => Some("No"),
        Value::Integer(1) => Some("Yes"),
        Value::Real(r) if *r == 0.0 => Some("No"),
        Value::Real(r) if *r == 1.0 => Some("Yes"),
        Value::Text(s) if s == "0" => Some("No"),
        Value::Text(s) if s == "1" => Some("Yes"),
        _ => None,
    }
}

fn coerce_real(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(i) => Some(*i as f64),
        Value::Real(r) => Some(*r),
        Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Text(s) => s.trim().parse().ok(),
        Value::Null => None,
    }
}

/// Scale, round half to even, scale back.
pub fn round_half_even(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round_ties_even() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn acronyms() -> Vec<String> {
        vec!["ID".to_string()]
    }

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    fn raw_table() -> Table {
        let mut table = Table::new(
            ["PlayerID", "Gender", "PlayTimeHours", "InGamePurchases"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        );
        table.rows = vec![
            vec![Value::Integer(1), text("Male"), Value::Real(12.3456), Value::Integer(1)],
            vec![Value::Integer(2), Value::Null, Value::Real(3.1), Value::Integer(0)],
            vec![Value::Integer(3), text("Female"), Value::Real(7.0), Value::Integer(0)],
            vec![Value::Integer(1), text("Male"), Value::Real(12.3456), Value::Integer(1)],
            vec![Value::Integer(4), text("Female"), Value::Real(0.125), Value::Integer(1)],
        ];
        table
    }

    fn clean(table: Table) -> Result<(Table, CleanReport)> {
        clean_table(table, &CleaningConfig::default(), Path::new("raw.csv"))
    }

    #[test]
    fn test_player_id_special_case() {
        assert_eq!(normalize_column_name("PlayerID", &acronyms()), "player_id");
    }

    #[test]
    fn test_without_acronym_letters_stay_split() {
        assert_eq!(normalize_column_name("PlayerID", &[]), "player_i_d");
    }

    #[test]
    fn test_camel_case_split() {
        let a = acronyms();
        assert_eq!(
            normalize_column_name("AvgSessionDurationMinutes", &a),
            "avg_session_duration_minutes"
        );
        assert_eq!(normalize_column_name("InGamePurchases", &a), "in_game_purchases");
        assert_eq!(normalize_column_name("Age", &a), "age");
        assert_eq!(normalize_column_name(" PlayTimeHours ", &a), "play_time_hours");
    }

    #[test]
    fn test_acronym_inside_name() {
        assert_eq!(
            normalize_column_name("SessionIDValue", &acronyms()),
            "session_id_value"
        );
    }

    #[test]
    fn test_longest_acronym_wins() {
        let a = vec!["ID".to_string(), "IDX".to_string()];
        assert_eq!(normalize_column_name("RowIDX", &a), "row_idx");
    }

    #[test]
    fn test_clean_scenario_five_rows_to_three() {
        let (table, report) = clean(raw_table()).unwrap();
        assert_eq!(report.input_rows, 5);
        assert_eq!(report.dropped_missing, 1);
        assert_eq!(report.dropped_duplicates, 1);
        assert_eq!(report.rows, 3);
        assert_eq!(
            table.columns,
            vec!["player_id", "gender", "play_time_hours", "in_game_purchases"]
        );
        assert_eq!(
            table.rows[0],
            vec![Value::Integer(1), text("Male"), Value::Real(12.35), text("Yes")]
        );
        assert_eq!(table.rows[1][3], text("No"));
        assert_eq!(table.rows[1][2], Value::Real(7.0));
    }

    #[test]
    fn test_rounding_is_half_even() {
        let (table, _) = clean(raw_table()).unwrap();
        // 0.125 * 100 = 12.5, which rounds to 12
        assert_eq!(table.rows[2][2], Value::Real(0.12));
        assert_eq!(round_half_even(12.3456, 2), 12.35);
        assert_eq!(round_half_even(2.5, 0), 2.0);
    }

    #[test]
    fn test_column_names_match_pattern() {
        let pattern = Regex::new(r"^[a-z]+(_[a-z]+)*$").unwrap();
        let (table, _) = clean(raw_table()).unwrap();
        assert!(table.columns.iter().all(|c| pattern.is_match(c)));
    }

    #[test]
    fn test_text_flags_recode() {
        let mut table = raw_table();
        for row in &mut table.rows {
            let flag = row[3].render();
            row[3] = text(&flag);
        }
        let (table, _) = clean(table).unwrap();
        assert_eq!(table.rows[0][3], text("Yes"));
        assert_eq!(table.rows[1][3], text("No"));
    }

    #[test]
    fn test_out_of_domain_flag_is_error() {
        let mut table = raw_table();
        table.rows[0][3] = Value::Integer(2);
        let err = clean(table).unwrap_err();
        match err {
            EtlError::MalformedValue { column, row, .. } => {
                assert_eq!(column, "in_game_purchases");
                assert_eq!(row, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_play_time_is_error() {
        let mut table = raw_table();
        table.rows[2][2] = text("lots");
        assert!(matches!(
            clean(table).unwrap_err(),
            EtlError::MalformedValue { .. }
        ));
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        let mut table = raw_table();
        table.columns[2] = "Hours".to_string();
        match clean(table).unwrap_err() {
            EtlError::SchemaMismatch { column, .. } => assert_eq!(column, "play_time_hours"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_colliding_names_rejected() {
        let mut table = raw_table();
        table.columns[1] = "Player_ID".to_string();
        assert!(matches!(
            clean(table).unwrap_err(),
            EtlError::InvalidColumnName { .. }
        ));
    }

    #[test]
    fn test_clean_is_deterministic() {
        let (a, _) = clean(raw_table()).unwrap();
        let (b, _) = clean(raw_table()).unwrap();
        assert_eq!(a, b);
    }
}
