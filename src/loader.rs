//! Stage 1: source file into the relational table.
//!
//! Full refresh. The table is dropped, recreated from the source header
//! and inferred column types, and filled with every source row, all in one
//! transaction.

use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;
use sqlx::Connection;
use tracing::info;

use crate::config::Config;
use crate::db::{self, quote_ident, Session};
use crate::error::Result;
use crate::models::{ColumnType, Table, Value};
use crate::snapshot;

/// Outcome of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub columns: usize,
    pub rows: u64,
}

pub async fn run_load(config: &Config) -> Result<LoadReport> {
    let source = &config.paths.source;
    let table_name = &config.db.table;
    info!(path = %source.display(), table = %table_name, "load started");

    let table = snapshot::read_table(source)?;

    let mut session = db::connect(config).await?;
    let result = replace_table(&mut session, table_name, &table).await;
    let rows = db::close(session, result).await?;

    info!(table = %table_name, rows, "load finished");
    Ok(LoadReport {
        table: table_name.clone(),
        columns: table.columns.len(),
        rows,
    })
}

/// Replace `name` with the contents of `table`, returning the stored row count.
pub async fn replace_table(session: &mut Session, name: &str, table: &Table) -> Result<u64> {
    let types = table.column_types();
    let quoted = quote_ident(name);

    let column_defs: Vec<String> = table
        .columns
        .iter()
        .zip(&types)
        .map(|(column, ty)| format!("{} {}", quote_ident(column), ty.sql_type()))
        .collect();
    let create_sql = format!("CREATE TABLE {} ({})", quoted, column_defs.join(", "));

    let column_list: Vec<String> = table.columns.iter().map(|c| quote_ident(c)).collect();
    let placeholders: Vec<String> = (1..=table.columns.len())
        .map(|n| session.dialect.placeholder(n))
        .collect();
    let insert_sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quoted,
        column_list.join(", "),
        placeholders.join(", ")
    );

    let mut tx = session.conn.begin().await?;

    sqlx::query(&format!("DROP TABLE IF EXISTS {}", quoted))
        .execute(&mut *tx)
        .await?;
    sqlx::query(&create_sql).execute(&mut *tx).await?;

    for row in &table.rows {
        let mut query = sqlx::query(&insert_sql);
        for (value, ty) in row.iter().zip(&types) {
            query = bind_value(query, value, *ty);
        }
        query.execute(&mut *tx).await?;
    }

    let count_sql = format!("SELECT COUNT(*) FROM {}", quoted);
    let stored: i64 = sqlx::query_scalar(&count_sql).fetch_one(&mut *tx).await?;

    tx.commit().await?;
    Ok(stored as u64)
}

fn bind_value<'q>(
    query: Query<'q, Any, AnyArguments<'q>>,
    value: &Value,
    ty: ColumnType,
) -> Query<'q, Any, AnyArguments<'q>> {
    match value {
        Value::Integer(i) if ty == ColumnType::Real => query.bind(*i as f64),
        Value::Integer(i) => query.bind(*i),
        Value::Real(r) => query.bind(*r),
        Value::Boolean(b) => query.bind(*b),
        Value::Text(s) => query.bind(s.clone()),
        Value::Null => match ty {
            ColumnType::Integer => query.bind(None::<i64>),
            ColumnType::Real => query.bind(None::<f64>),
            ColumnType::Boolean => query.bind(None::<bool>),
            ColumnType::Text => query.bind(None::<String>),
        },
    }
}
