//! Table metadata inspection.
//!
//! Reads column metadata and primary key composition from MySQL's `information_schema`.

use sqlx::{MySqlConnection, Row};
use thiserror::Error;
use tracing::debug;

use crate::types::{ColumnMetadata, TableName, TableSchema};

/// Errors that can occur while inspecting a table.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Table {0} not found")]
    TableNotFound(String),

    #[error("Table {0} has no primary key")]
    MissingPrimaryKey(String),
}

/// Columns of a table in declaration order.
///
/// Attributes are cast to `CHAR` since some server versions report them as binary strings.
const COLUMNS_QUERY: &str = r#"
    SELECT
        CAST(c.COLUMN_NAME AS CHAR) AS column_name,
        CAST(c.IS_NULLABLE AS CHAR) AS is_nullable,
        CAST(c.COLUMN_DEFAULT AS CHAR) AS column_default,
        CAST(c.EXTRA AS CHAR) AS extra
    FROM information_schema.COLUMNS c
    WHERE c.TABLE_SCHEMA = COALESCE(?, DATABASE())
    AND c.TABLE_NAME = ?
    ORDER BY c.ORDINAL_POSITION
"#;

/// Primary key columns in key order.
const PRIMARY_KEY_QUERY: &str = r#"
    SELECT CAST(k.COLUMN_NAME AS CHAR) AS column_name
    FROM information_schema.KEY_COLUMN_USAGE k
    WHERE k.TABLE_SCHEMA = COALESCE(?, DATABASE())
    AND k.TABLE_NAME = ?
    AND k.CONSTRAINT_NAME = 'PRIMARY'
    ORDER BY k.ORDINAL_POSITION
"#;

/// Retrieves the columns and primary key of a table.
///
/// Fails with [`SchemaError::TableNotFound`] when the table has no visible columns and with
/// [`SchemaError::MissingPrimaryKey`] when it declares no primary key, since rows of such a
/// table cannot be addressed for updates.
pub async fn get_table_schema(
    connection: &mut MySqlConnection,
    table_name: &TableName,
) -> Result<TableSchema, SchemaError> {
    let columns = get_table_columns(connection, table_name).await?;
    if columns.is_empty() {
        return Err(SchemaError::TableNotFound(table_name.to_string()));
    }

    let primary_keys = get_primary_key_columns(connection, table_name).await?;
    if primary_keys.is_empty() {
        return Err(SchemaError::MissingPrimaryKey(table_name.to_string()));
    }

    debug!(
        table = %table_name,
        columns = columns.len(),
        primary_keys = ?primary_keys,
        "inspected table schema"
    );

    Ok(TableSchema::new(table_name.clone(), columns, primary_keys))
}

async fn get_table_columns(
    connection: &mut MySqlConnection,
    table_name: &TableName,
) -> Result<Vec<ColumnMetadata>, SchemaError> {
    let rows = sqlx::query(COLUMNS_QUERY)
        .bind(table_name.schema.as_deref())
        .bind(&table_name.name)
        .fetch_all(&mut *connection)
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let name: String = row.try_get("column_name")?;
        let is_nullable: String = row.try_get("is_nullable")?;
        let default_expr: Option<String> = row.try_get("column_default")?;
        let extra: Option<String> = row.try_get("extra")?;

        columns.push(ColumnMetadata::from_information_schema(
            name,
            &is_nullable,
            default_expr,
            extra.as_deref().unwrap_or_default(),
        ));
    }

    Ok(columns)
}

async fn get_primary_key_columns(
    connection: &mut MySqlConnection,
    table_name: &TableName,
) -> Result<Vec<String>, SchemaError> {
    let rows = sqlx::query(PRIMARY_KEY_QUERY)
        .bind(table_name.schema.as_deref())
        .bind(&table_name.name)
        .fetch_all(&mut *connection)
        .await?;

    rows.iter()
        .map(|row| row.try_get::<String, _>("column_name").map_err(SchemaError::from))
        .collect()
}
