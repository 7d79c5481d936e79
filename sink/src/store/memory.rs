use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bail;
use crate::error::{ErrorKind, SinkResult};
use crate::statement::{Statement, StatementKind};
use crate::store::base::{StoreSession, UpsertStore};
use crate::types::{Cell, ColumnMetadata, TableName, TableSchema};

/// A stored row, keyed by column name.
pub type MemoryRow = BTreeMap<String, Cell>;

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    rows: Vec<MemoryRow>,
    next_auto_id: i64,
}

impl MemoryTable {
    fn key_of<'a>(&self, row: &'a MemoryRow) -> Vec<Option<&'a Cell>> {
        self.schema
            .primary_keys
            .iter()
            .map(|key| row.get(key))
            .collect()
    }

    /// Builds the row stored for an insert, filling columns the statement leaves out.
    fn materialize(&mut self, statement: &Statement) -> MemoryRow {
        let columns = self.schema.columns.clone();

        let mut row = MemoryRow::new();
        for column in &columns {
            let value = match statement.value_of(&column.name) {
                Some(value) => value.clone(),
                None => self.default_value(column),
            };

            if let Cell::I64(id) = value {
                if self.is_auto_increment(column) && id >= self.next_auto_id {
                    self.next_auto_id = id + 1;
                }
            }

            row.insert(column.name.clone(), value);
        }

        row
    }

    fn default_value(&mut self, column: &ColumnMetadata) -> Cell {
        if self.is_auto_increment(column) {
            let id = self.next_auto_id;
            self.next_auto_id += 1;
            return Cell::I64(id);
        }

        if column.has_live_default() || column.auto_generated {
            return Cell::String(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());
        }

        match &column.default_expr {
            Some(default) => Cell::String(default.clone()),
            None => Cell::Null,
        }
    }

    /// Auto generated key columns without a default behave as auto increment counters.
    fn is_auto_increment(&self, column: &ColumnMetadata) -> bool {
        column.auto_generated
            && column.default_expr.is_none()
            && self.schema.is_primary_key(&column.name)
    }

    fn check_not_null<'a, I>(&self, assignments: I) -> SinkResult<()>
    where
        I: IntoIterator<Item = (&'a String, &'a Cell)>,
    {
        for (name, value) in assignments {
            let nullable = self
                .schema
                .column(name)
                .map(|column| column.nullable)
                .unwrap_or(true);

            if value.is_null() && !nullable {
                bail!(
                    ErrorKind::ConstraintViolation,
                    "Column cannot be null",
                    format!("column `{name}` of table {} cannot be null", self.schema.name)
                );
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
enum PendingWrite {
    Insert {
        table: TableName,
        row: MemoryRow,
    },
    Update {
        table: TableName,
        key: Vec<(String, Cell)>,
        assignments: Vec<(String, Cell)>,
    },
}

#[derive(Debug, Default)]
struct Inner {
    tables: HashMap<TableName, MemoryTable>,
    sessions_started: usize,
}

/// In-memory store for tests and local development.
///
/// Tables are registered up front with [`MemoryStore::create_table`]. Sessions buffer their
/// writes and apply them on commit, enforcing NOT NULL columns and primary key uniqueness the
/// way the server would. Counters expose how many sessions were started and how many are
/// still open, so callers can observe storage access and release discipline.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    open_sessions: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an empty table, replacing any existing table with the same name.
    pub async fn create_table(&self, schema: TableSchema) {
        let mut inner = self.inner.lock().await;
        let table = MemoryTable {
            schema,
            rows: Vec::new(),
            next_auto_id: 1,
        };
        inner.tables.insert(table.schema.name.clone(), table);
    }

    /// Returns a copy of the committed rows of a table.
    pub async fn rows(&self, table_name: &TableName) -> Vec<MemoryRow> {
        let inner = self.inner.lock().await;
        inner
            .tables
            .get(table_name)
            .map(|table| table.rows.clone())
            .unwrap_or_default()
    }

    /// Returns the committed row whose key columns hold the given values.
    pub async fn find_row(&self, table_name: &TableName, key: &[(&str, Cell)]) -> Option<MemoryRow> {
        let inner = self.inner.lock().await;
        let table = inner.tables.get(table_name)?;

        table
            .rows
            .iter()
            .find(|row| key.iter().all(|(column, value)| row.get(*column) == Some(value)))
            .cloned()
    }

    /// Returns how many sessions have been started since creation.
    pub async fn sessions_started(&self) -> usize {
        self.inner.lock().await.sessions_started
    }

    /// Returns how many sessions are currently open.
    pub fn open_sessions(&self) -> usize {
        self.open_sessions.load(Ordering::SeqCst)
    }
}

impl UpsertStore for MemoryStore {
    type Session = MemorySession;

    async fn begin(&self) -> SinkResult<Self::Session> {
        self.inner.lock().await.sessions_started += 1;
        self.open_sessions.fetch_add(1, Ordering::SeqCst);

        Ok(MemorySession {
            inner: self.inner.clone(),
            open_sessions: self.open_sessions.clone(),
            pending: Vec::new(),
        })
    }
}

/// A unit of work on a [`MemoryStore`].
///
/// Writes are buffered until [`StoreSession::commit`] and discarded on rollback or drop.
#[derive(Debug)]
pub struct MemorySession {
    inner: Arc<Mutex<Inner>>,
    open_sessions: Arc<AtomicUsize>,
    pending: Vec<PendingWrite>,
}

impl MemorySession {
    fn pending_rows<'a>(&'a self, table_name: &'a TableName) -> impl Iterator<Item = &'a MemoryRow> {
        self.pending.iter().filter_map(move |write| match write {
            PendingWrite::Insert { table, row } if table == table_name => Some(row),
            _ => None,
        })
    }
}

impl StoreSession for MemorySession {
    async fn table_schema(&mut self, table_name: &TableName) -> SinkResult<TableSchema> {
        let inner = self.inner.lock().await;
        match inner.tables.get(table_name) {
            Some(table) => Ok(table.schema.clone()),
            None => bail!(
                ErrorKind::SchemaUnavailable,
                "Table not found",
                format!("table {table_name} does not exist")
            ),
        }
    }

    async fn row_exists(&mut self, statement: &Statement) -> SinkResult<bool> {
        if statement.kind() != StatementKind::Exists {
            bail!(
                ErrorKind::InvalidState,
                "Statement is not an existence query",
                statement.sql()
            );
        }

        let inner = self.inner.lock().await;
        let Some(table) = inner.tables.get(statement.table()) else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Table not found",
                format!("table {} does not exist", statement.table())
            );
        };

        let key: Vec<(&String, &Cell)> = statement
            .key_columns()
            .iter()
            .zip(statement.values())
            .collect();
        let exists = table
            .rows
            .iter()
            .chain(self.pending_rows(statement.table()))
            .any(|row| matches_key(row, &key));

        Ok(exists)
    }

    async fn execute(&mut self, statement: &Statement) -> SinkResult<u64> {
        let mut inner = self.inner.lock().await;
        let Some(table) = inner.tables.get_mut(statement.table()) else {
            bail!(
                ErrorKind::DestinationQueryFailed,
                "Table not found",
                format!("table {} does not exist", statement.table())
            );
        };

        for column in statement.columns() {
            if table.schema.column(column).is_none() {
                bail!(
                    ErrorKind::DestinationQueryFailed,
                    "Unknown column",
                    format!("column `{column}` does not exist in table {}", table.schema.name)
                );
            }
        }

        match statement.kind() {
            StatementKind::Insert => {
                let row = table.materialize(statement);
                table.check_not_null(row.iter())?;

                let key = table.key_of(&row);
                let duplicate = table
                    .rows
                    .iter()
                    .chain(self.pending_rows(statement.table()))
                    .any(|existing| table.key_of(existing) == key);
                if duplicate {
                    bail!(
                        ErrorKind::ConstraintViolation,
                        "Duplicate primary key",
                        format!("a row with the same primary key exists in {}", table.schema.name)
                    );
                }

                debug!(table = %statement.table(), "buffered insert");
                self.pending.push(PendingWrite::Insert {
                    table: statement.table().clone(),
                    row,
                });

                Ok(1)
            }
            StatementKind::Update => {
                let split = statement.columns().len();
                let assignments: Vec<(String, Cell)> = statement
                    .columns()
                    .iter()
                    .cloned()
                    .zip(statement.values()[..split].iter().cloned())
                    .collect();
                let key: Vec<(String, Cell)> = statement
                    .key_columns()
                    .iter()
                    .cloned()
                    .zip(statement.values()[split..].iter().cloned())
                    .collect();

                table.check_not_null(assignments.iter().map(|(name, value)| (name, value)))?;

                let key_refs: Vec<(&String, &Cell)> =
                    key.iter().map(|(name, value)| (name, value)).collect();
                let matched = table
                    .rows
                    .iter()
                    .filter(|row| matches_key(row, &key_refs))
                    .count();

                debug!(table = %statement.table(), matched, "buffered update");
                self.pending.push(PendingWrite::Update {
                    table: statement.table().clone(),
                    key,
                    assignments,
                });

                Ok(matched as u64)
            }
            StatementKind::Exists => bail!(
                ErrorKind::InvalidState,
                "Existence queries cannot be executed as writes",
                statement.sql()
            ),
        }
    }

    async fn commit(mut self) -> SinkResult<()> {
        let pending = std::mem::take(&mut self.pending);
        let mut inner = self.inner.lock().await;

        for write in pending {
            match write {
                PendingWrite::Insert { table, row } => {
                    if let Some(table) = inner.tables.get_mut(&table) {
                        table.rows.push(row);
                    }
                }
                PendingWrite::Update {
                    table,
                    key,
                    assignments,
                } => {
                    let Some(table) = inner.tables.get_mut(&table) else {
                        continue;
                    };

                    let key_refs: Vec<(&String, &Cell)> =
                        key.iter().map(|(name, value)| (name, value)).collect();
                    for row in table.rows.iter_mut() {
                        if matches_key(row, &key_refs) {
                            for (name, value) in &assignments {
                                row.insert(name.clone(), value.clone());
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }

    async fn rollback(mut self) -> SinkResult<()> {
        self.pending.clear();

        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

fn matches_key(row: &MemoryRow, key: &[(&String, &Cell)]) -> bool {
    key.iter()
        .all(|(column, value)| !value.is_null() && row.get(column.as_str()) == Some(*value))
}
