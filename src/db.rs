//! Relational store access.
//!
//! Stages never share a connection. Each one calls [`connect`], does its
//! work, and hands the connection back to [`close`], whether the work
//! succeeded or not.

use sqlx::any::install_default_drivers;
use sqlx::{AnyConnection, Connection};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{EtlError, Result};

/// SQL flavour of the configured store. Only placeholder syntax differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

impl Dialect {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("sqlite:") {
            Dialect::Sqlite
        } else {
            Dialect::Postgres
        }
    }

    /// Bind placeholder for the 1-based parameter `n`.
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Postgres => format!("${}", n),
            Dialect::Sqlite => "?".to_string(),
        }
    }
}

/// An open connection scoped to one stage.
pub struct Session {
    pub conn: AnyConnection,
    pub dialect: Dialect,
}

pub async fn connect(config: &Config) -> Result<Session> {
    install_default_drivers();

    let url = config
        .db
        .connection_url()
        .map_err(|e| EtlError::Connectivity {
            store: "relational store",
            message: e.to_string(),
        })?;
    let dialect = Dialect::from_url(&url);

    debug!(?dialect, "opening relational connection");
    let conn = AnyConnection::connect(&url)
        .await
        .map_err(EtlError::from_connect)?;

    Ok(Session { conn, dialect })
}

/// Close the session and pass `result` through.
///
/// A close failure only surfaces when the work itself succeeded.
pub async fn close<T>(session: Session, result: Result<T>) -> Result<T> {
    match session.conn.close().await {
        Ok(()) => result,
        Err(e) => {
            warn!(error = %e, "closing relational connection failed");
            match result {
                Ok(_) => Err(EtlError::Database(e)),
                Err(original) => Err(original),
            }
        }
    }
}

/// `SELECT COUNT(*)` over a table.
pub async fn count_rows(session: &mut Session, table: &str) -> Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
    let count: i64 = sqlx::query_scalar(&sql)
        .fetch_one(&mut session.conn)
        .await?;
    Ok(count)
}

/// Double-quote an identifier verbatim, preserving its case.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
