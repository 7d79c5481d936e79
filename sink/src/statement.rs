//! SQL statement construction.
//!
//! The builders are pure: they derive the statement text and its ordered bind values from a
//! record and the inspected [`TableSchema`] without touching the store. Identifiers are quoted
//! and every value is bound through a `?` placeholder.

use crate::types::{
    Cell, ColumnMetadata, Record, TableName, TableSchema, ValidationFailure, quote_identifier,
};

/// The kind of a built [`Statement`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
    Exists,
}

/// A parameterized statement with its bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    kind: StatementKind,
    table: TableName,
    /// Columns assigned by the statement, in schema declaration order.
    columns: Vec<String>,
    /// Columns of the `WHERE` clause, in key order.
    key_columns: Vec<String>,
    sql: String,
    /// Values for the assigned columns followed by the key values.
    values: Vec<Cell>,
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[Cell] {
        &self.values
    }

    /// Returns the value bound to `column`, looking at assignments before keys.
    pub fn value_of(&self, column: &str) -> Option<&Cell> {
        self.columns
            .iter()
            .chain(self.key_columns.iter())
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
    }
}

/// Builds an `INSERT` for `record`.
///
/// A column is included when the record has a value for it and the column is writable, i.e.
/// neither auto-generated nor defaulted by the server at write time. Primary key columns are
/// included like any other column. Record fields without a matching column are ignored.
pub fn build_insert(table_name: &TableName, record: &Record, schema: &TableSchema) -> Statement {
    let (columns, values) = assigned_columns(record, schema, |_| true);

    let quoted_columns = columns
        .iter()
        .map(|column| quote_identifier(column))
        .collect::<Vec<_>>()
        .join(", ");
    let placeholders = vec!["?"; columns.len()].join(", ");

    let sql = format!(
        "INSERT INTO {} ({quoted_columns}) VALUES ({placeholders})",
        table_name.as_quoted_identifier()
    );

    Statement {
        kind: StatementKind::Insert,
        table: table_name.clone(),
        columns,
        key_columns: vec![],
        sql,
        values,
    }
}

/// Builds an `UPDATE` of the row identified by `primary_keys`.
///
/// Assigns every writable, non-key column present in the record. The `WHERE` clause binds the
/// key columns in the given order after the assigned values.
///
/// Fails with [`ValidationFailure::MissingPrimaryKey`] if a key column has no value in the
/// record and with [`ValidationFailure::EmptyUpdate`] if no column would be assigned.
pub fn build_update(
    table_name: &TableName,
    record: &Record,
    primary_keys: &[String],
    schema: &TableSchema,
) -> Result<Statement, ValidationFailure> {
    let key_values = key_values(record, primary_keys)?;

    let (columns, mut values) =
        assigned_columns(record, schema, |column| !primary_keys.contains(&column.name));
    if columns.is_empty() {
        return Err(ValidationFailure::EmptyUpdate);
    }

    let assignments = columns
        .iter()
        .map(|column| format!("{} = ?", quote_identifier(column)))
        .collect::<Vec<_>>()
        .join(", ");

    let sql = format!(
        "UPDATE {} SET {assignments} WHERE {}",
        table_name.as_quoted_identifier(),
        where_clause(primary_keys)
    );

    values.extend(key_values);

    Ok(Statement {
        kind: StatementKind::Update,
        table: table_name.clone(),
        columns,
        key_columns: primary_keys.to_vec(),
        sql,
        values,
    })
}

/// Builds a query counting the rows whose key matches the record.
///
/// Fails with [`ValidationFailure::MissingPrimaryKey`] if a key column has no value in the
/// record, since existence cannot be decided without the full key.
pub fn build_exists(
    table_name: &TableName,
    record: &Record,
    primary_keys: &[String],
) -> Result<Statement, ValidationFailure> {
    let values = key_values(record, primary_keys)?;

    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        table_name.as_quoted_identifier(),
        where_clause(primary_keys)
    );

    Ok(Statement {
        kind: StatementKind::Exists,
        table: table_name.clone(),
        columns: vec![],
        key_columns: primary_keys.to_vec(),
        sql,
        values,
    })
}

/// Collects writable columns present in the record, in declaration order.
fn assigned_columns<F>(record: &Record, schema: &TableSchema, include: F) -> (Vec<String>, Vec<Cell>)
where
    F: Fn(&ColumnMetadata) -> bool,
{
    schema
        .columns
        .iter()
        .filter(|column| column.is_writable() && include(column))
        .filter_map(|column| {
            record
                .get(&column.name)
                .map(|value| (column.name.clone(), value.clone()))
        })
        .unzip()
}

fn key_values(record: &Record, primary_keys: &[String]) -> Result<Vec<Cell>, ValidationFailure> {
    primary_keys
        .iter()
        .map(|key| {
            record
                .get(key)
                .cloned()
                .ok_or_else(|| ValidationFailure::MissingPrimaryKey {
                    column: key.clone(),
                })
        })
        .collect()
}

fn where_clause(primary_keys: &[String]) -> String {
    primary_keys
        .iter()
        .map(|key| format!("{} = ?", quote_identifier(key)))
        .collect::<Vec<_>>()
        .join(" AND ")
}
