//! Core data models used throughout the pipeline.
//!
//! A [`Table`] is the in-memory form of every representation the dataset
//! takes: the source file, the relational table, and both snapshots.

use std::fmt;

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn column_type(&self) -> Option<ColumnType> {
        match self {
            Value::Null => None,
            Value::Integer(_) => Some(ColumnType::Integer),
            Value::Real(_) => Some(ColumnType::Real),
            Value::Boolean(_) => Some(ColumnType::Boolean),
            Value::Text(_) => Some(ColumnType::Text),
        }
    }

    /// The comma-delimited field form of this value. Missing is empty.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Integer(i) => i.to_string(),
            Value::Real(r) => format_real(*r),
            Value::Boolean(true) => "True".to_string(),
            Value::Boolean(false) => "False".to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Integer(i) => serde_json::Value::from(*i),
            Value::Real(r) => serde_json::Number::from_f64(*r)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Text(s) => serde_json::Value::String(s.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Reals without a fractional part keep one decimal so they read back as reals.
fn format_real(r: f64) -> String {
    if r.is_finite() && r.fract() == 0.0 {
        format!("{:.1}", r)
    } else {
        r.to_string()
    }
}

/// Storage type of a column, inferred from its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    Real,
    Boolean,
    Text,
}

impl ColumnType {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "BIGINT",
            ColumnType::Real => "DOUBLE PRECISION",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Text => "TEXT",
        }
    }
}

/// Named columns and rows of cells, in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Type of each column, taken from its first present value.
    ///
    /// Columns with no present value are typed as text.
    pub fn column_types(&self) -> Vec<ColumnType> {
        (0..self.columns.len())
            .map(|i| {
                self.rows
                    .iter()
                    .find_map(|row| row.get(i).and_then(Value::column_type))
                    .unwrap_or(ColumnType::Text)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_reals() {
        assert_eq!(Value::Real(3.0).render(), "3.0");
        assert_eq!(Value::Real(12.35).render(), "12.35");
        assert_eq!(Value::Real(-0.5).render(), "-0.5");
        assert_eq!(Value::Real(1e17).render(), "100000000000000000.0");
    }

    #[test]
    fn test_render_null_is_empty() {
        assert_eq!(Value::Null.render(), "");
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_to_json_types() {
        assert_eq!(Value::Integer(7).to_json(), serde_json::json!(7));
        assert_eq!(Value::Real(1.25).to_json(), serde_json::json!(1.25));
        assert_eq!(Value::Boolean(true).to_json(), serde_json::json!(true));
        assert_eq!(
            Value::Text("Yes".to_string()).to_json(),
            serde_json::json!("Yes")
        );
        assert_eq!(Value::Real(f64::NAN).to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_column_types_skip_leading_nulls() {
        let mut table = Table::new(vec!["a".to_string(), "b".to_string()]);
        table.rows.push(vec![Value::Null, Value::Null]);
        table.rows.push(vec![Value::Real(1.5), Value::Null]);
        assert_eq!(
            table.column_types(),
            vec![ColumnType::Real, ColumnType::Text]
        );
    }
}
