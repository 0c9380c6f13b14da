//! Comma-delimited snapshot files.
//!
//! Every file the pipeline touches (the source dataset, the raw snapshot
//! and the clean snapshot) is a comma-delimited file with a header row and
//! no index column. Reading infers one [`ColumnType`] per column from the
//! present values; writing renders values with [`Value::render`].

use std::fs::File;
use std::path::Path;

use crate::error::{EtlError, Result};
use crate::models::{ColumnType, Table, Value};

/// Field contents treated as a missing value.
const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_missing(field: &str) -> bool {
    MISSING_MARKERS.contains(&field)
}

fn parse_bool(field: &str) -> Option<bool> {
    match field {
        "True" | "TRUE" | "true" => Some(true),
        "False" | "FALSE" | "false" => Some(false),
        _ => None,
    }
}

/// Infer the narrowest type every present field of a column fits.
fn infer_type<'a>(fields: impl Iterator<Item = &'a str> + Clone) -> ColumnType {
    let mut present = fields.filter(|f| !is_missing(f));
    if present.clone().all(|f| f.parse::<i64>().is_ok()) {
        ColumnType::Integer
    } else if present.clone().all(|f| f.parse::<f64>().is_ok()) {
        ColumnType::Real
    } else if present.all(|f| parse_bool(f).is_some()) {
        ColumnType::Boolean
    } else {
        ColumnType::Text
    }
}

fn parse_field(field: &str, ty: ColumnType) -> Value {
    if is_missing(field) {
        return Value::Null;
    }
    // `infer_type` guarantees the typed parses succeed.
    match ty {
        ColumnType::Integer => field.parse().map(Value::Integer).unwrap_or(Value::Null),
        ColumnType::Real => field.parse().map(Value::Real).unwrap_or(Value::Null),
        ColumnType::Boolean => parse_bool(field).map(Value::Boolean).unwrap_or(Value::Null),
        ColumnType::Text => Value::Text(field.to_string()),
    }
}

/// Read a snapshot fully into memory.
///
/// Fails if the file is missing, has no header row, or has a record whose
/// field count differs from the header.
pub fn read_table(path: &Path) -> Result<Table> {
    let file = File::open(path).map_err(|e| EtlError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| EtlError::snapshot(path, e))?
        .clone();
    if headers.is_empty() {
        return Err(EtlError::MissingHeader {
            path: path.to_path_buf(),
        });
    }

    let mut records = Vec::new();
    for record in reader.records() {
        records.push(record.map_err(|e| EtlError::snapshot(path, e))?);
    }

    let types: Vec<ColumnType> = (0..headers.len())
        .map(|i| infer_type(records.iter().map(move |r| r.get(i).unwrap_or(""))))
        .collect();

    let mut table = Table::new(headers.iter().map(str::to_string).collect());
    table.rows = records
        .iter()
        .map(|record| {
            record
                .iter()
                .zip(&types)
                .map(|(field, ty)| parse_field(field, *ty))
                .collect()
        })
        .collect();

    Ok(table)
}

/// Write a snapshot, replacing any existing file at `path`.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| EtlError::io(parent, e))?;
        }
    }

    let mut writer = csv::Writer::from_path(path).map_err(|e| EtlError::snapshot(path, e))?;
    writer
        .write_record(&table.columns)
        .map_err(|e| EtlError::snapshot(path, e))?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(Value::render))
            .map_err(|e| EtlError::snapshot(path, e))?;
    }
    writer.flush().map_err(|e| EtlError::io(path, e))?;
    Ok(())
}

/// Number of data records in a snapshot, without type inference.
pub fn count_records(path: &Path) -> Result<usize> {
    let file = File::open(path).map_err(|e| EtlError::io(path, e))?;
    let mut reader = csv::Reader::from_reader(file);
    let mut count = 0;
    for record in reader.records() {
        record.map_err(|e| EtlError::snapshot(path, e))?;
        count += 1;
    }
    Ok(count)
}
