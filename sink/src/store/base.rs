use std::future::Future;

use crate::error::SinkResult;
use crate::statement::Statement;
use crate::types::{TableName, TableSchema};

/// A store that records can be upserted into.
///
/// Implementations must be cheap to clone, since clones are expected to share the underlying
/// resources (connection pool or in-memory state).
pub trait UpsertStore {
    /// The unit of work handed out by [`UpsertStore::begin`].
    type Session: StoreSession + Send;

    /// Acquires a connection and opens a transaction on it.
    fn begin(&self) -> impl Future<Output = SinkResult<Self::Session>> + Send;
}

/// A single unit of work against the store.
///
/// Statements executed through a session become visible to other sessions only once
/// [`StoreSession::commit`] succeeds. Dropping a session without committing rolls back its
/// writes and releases the connection.
pub trait StoreSession {
    /// Inspects the columns and primary key of a table.
    ///
    /// Fails with [`crate::error::ErrorKind::SchemaUnavailable`] when the table does not exist
    /// or has no primary key.
    fn table_schema(
        &mut self,
        table_name: &TableName,
    ) -> impl Future<Output = SinkResult<TableSchema>> + Send;

    /// Runs an existence query and returns whether a matching row is present.
    fn row_exists(&mut self, statement: &Statement) -> impl Future<Output = SinkResult<bool>> + Send;

    /// Executes an insert or update and returns the number of affected rows.
    fn execute(&mut self, statement: &Statement) -> impl Future<Output = SinkResult<u64>> + Send;

    /// Commits the unit of work and releases the connection.
    fn commit(self) -> impl Future<Output = SinkResult<()>> + Send;

    /// Rolls back the unit of work and releases the connection.
    fn rollback(self) -> impl Future<Output = SinkResult<()>> + Send;
}
