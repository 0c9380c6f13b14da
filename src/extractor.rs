//! Stage 2: relational table into the raw snapshot.

use sqlx::any::AnyRow;
use sqlx::{Column, Row};
use tracing::info;

use crate::config::Config;
use crate::db::{self, quote_ident, Session};
use crate::error::Result;
use crate::models::{Table, Value};
use crate::snapshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractReport {
    pub table: String,
    pub rows: usize,
}

pub async fn run_extract(config: &Config) -> Result<ExtractReport> {
    let table_name = &config.db.table;
    let raw_path = &config.paths.raw_snapshot;
    info!(table = %table_name, "extract started");

    let mut session = db::connect(config).await?;
    let result = read_table(&mut session, table_name).await;
    let table = db::close(session, result).await?;

    snapshot::write_table(raw_path, &table)?;

    info!(path = %raw_path.display(), rows = table.len(), "extract finished");
    Ok(ExtractReport {
        table: table_name.clone(),
        rows: table.len(),
    })
}

/// Read every row of `name`, in stored column order.
pub async fn read_table(session: &mut Session, name: &str) -> Result<Table> {
    let sql = format!("SELECT * FROM {}", quote_ident(name));
    let rows: Vec<AnyRow> = sqlx::query(&sql).fetch_all(&mut session.conn).await?;

    let columns = match rows.first() {
        Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
        None => column_names(session, name).await?,
    };

    let mut table = Table::new(columns);
    for row in &rows {
        let cells = (0..row.len())
            .map(|i| decode_cell(row, i))
            .collect::<Result<Vec<Value>>>()?;
        table.rows.push(cells);
    }
    Ok(table)
}

/// Column names of an empty table, from a statement description.
async fn column_names(session: &mut Session, name: &str) -> Result<Vec<String>> {
    use sqlx::Executor;

    let sql = format!("SELECT * FROM {}", quote_ident(name));
    let describe = (&mut session.conn).describe(&sql).await?;
    Ok(describe
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect())
}

/// Decode one cell, trying integer, real, boolean, then text.
fn decode_cell(row: &AnyRow, index: usize) -> Result<Value> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.map_or(Value::Null, Value::Integer));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v.map_or(Value::Null, Value::Real));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return Ok(v.map_or(Value::Null, Value::Boolean));
    }
    let v = row.try_get::<Option<String>, _>(index)?;
    Ok(v.map_or(Value::Null, Value::Text))
}
