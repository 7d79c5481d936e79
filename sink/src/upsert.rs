//! Insert-or-update of a single record.
//!
//! The [`Upserter`] inspects the target table inside a fresh unit of work, decides between
//! insert and update by checking whether a row with the record's key exists, and runs the
//! statement built for that branch. Validation and storage failures are returned as
//! [`PersistOutcome`]s; anything else propagates as an error.

use tracing::{Instrument, debug, info_span, warn};

use crate::error::{ErrorKind, SinkError, SinkResult};
use crate::statement::{build_exists, build_insert, build_update};
use crate::store::{StoreSession, UpsertStore};
use crate::types::{
    PersistOutcome, Record, StorageFailure, TableName, TableSchema, ValidationFailure,
};

/// Result of running the upsert steps inside a session, before the session is closed.
enum Decision {
    /// A statement was executed and the session must be committed.
    Written(PersistOutcome),
    /// The record was rejected and nothing was written.
    Rejected(ValidationFailure),
}

/// Applies records to a table as inserts or updates.
#[derive(Debug, Clone)]
pub struct Upserter<S> {
    store: S,
}

impl<S> Upserter<S>
where
    S: UpsertStore,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Inserts `record` into `table_name`, or updates the row with the same primary key.
    ///
    /// The schema is inspected on every call. Everything runs inside one unit of work that is
    /// committed after a successful write and rolled back otherwise; the connection is released
    /// on every path.
    pub async fn upsert(&self, table_name: &TableName, record: Record) -> SinkResult<PersistOutcome> {
        let span = info_span!("upsert", table = %table_name);
        self.upsert_in_session(table_name, record)
            .instrument(span)
            .await
    }

    async fn upsert_in_session(
        &self,
        table_name: &TableName,
        record: Record,
    ) -> SinkResult<PersistOutcome> {
        let mut session = match self.store.begin().await {
            Ok(session) => session,
            Err(err) => return recover(table_name, err),
        };

        match apply(&mut session, table_name, &record).await {
            Ok(Decision::Written(outcome)) => match session.commit().await {
                Ok(()) => Ok(outcome),
                Err(err) => recover(table_name, err),
            },
            Ok(Decision::Rejected(failure)) => {
                release(session).await;
                Ok(PersistOutcome::ValidationFailed(failure))
            }
            Err(err) => {
                release(session).await;
                recover(table_name, err)
            }
        }
    }
}

/// Runs inspection, existence check and the write for one record.
async fn apply<T>(session: &mut T, table_name: &TableName, record: &Record) -> SinkResult<Decision>
where
    T: StoreSession,
{
    let schema = session.table_schema(table_name).await?;

    let exists = match missing_key(&schema, record) {
        None => {
            let statement = match build_exists(table_name, record, &schema.primary_keys) {
                Ok(statement) => statement,
                Err(failure) => return Ok(Decision::Rejected(failure)),
            };
            session.row_exists(&statement).await?
        }
        // A row cannot exist yet for a key the server has not generated.
        Some(MissingKey::Generated) => false,
        Some(MissingKey::Supplied(column)) => {
            return Ok(Decision::Rejected(ValidationFailure::MissingPrimaryKey {
                column,
            }));
        }
    };
    debug!(exists, "checked for existing row");

    if exists {
        let statement = match build_update(table_name, record, &schema.primary_keys, &schema) {
            Ok(statement) => statement,
            Err(failure) => return Ok(Decision::Rejected(failure)),
        };
        session.execute(&statement).await?;

        Ok(Decision::Written(PersistOutcome::Updated))
    } else {
        if let Err(failure) = validate_required_fields(record, &schema) {
            return Ok(Decision::Rejected(failure));
        }

        let statement = build_insert(table_name, record, &schema);
        session.execute(&statement).await?;

        Ok(Decision::Written(PersistOutcome::Inserted))
    }
}

/// A primary key column without a value in the record.
enum MissingKey {
    /// Only server generated key columns are missing.
    Generated,
    /// The first missing key column the record is expected to supply.
    Supplied(String),
}

fn missing_key(schema: &TableSchema, record: &Record) -> Option<MissingKey> {
    let mut missing = schema
        .primary_keys
        .iter()
        .filter(|key| !record.contains(key))
        .peekable();
    missing.peek()?;

    for key in missing {
        let generated = schema
            .column(key)
            .is_some_and(|column| column.auto_generated);
        if !generated {
            return Some(MissingKey::Supplied(key.clone()));
        }
    }

    Some(MissingKey::Generated)
}

/// Checks that every non-nullable column the server does not fill is present in the record.
///
/// Columns are checked in declaration order and the first missing one is reported.
pub fn validate_required_fields(
    record: &Record,
    schema: &TableSchema,
) -> Result<(), ValidationFailure> {
    match schema
        .columns
        .iter()
        .find(|column| column.is_required() && !record.contains(&column.name))
    {
        Some(column) => Err(ValidationFailure::RequiredFieldMissing {
            column: column.name.clone(),
        }),
        None => Ok(()),
    }
}

/// Rolls back a session that will not be committed.
///
/// A failed rollback is only logged, the connection is released when the session drops.
async fn release<T>(session: T)
where
    T: StoreSession,
{
    if let Err(err) = session.rollback().await {
        warn!(error = %err.reason(), "failed to roll back unit of work");
    }
}

/// Turns storage failures into outcomes and propagates every other error.
fn recover(table_name: &TableName, err: SinkError) -> SinkResult<PersistOutcome> {
    match err.kind() {
        ErrorKind::SchemaUnavailable => Ok(PersistOutcome::StorageFailed(
            StorageFailure::SchemaUnavailable {
                table: table_name.to_string(),
                reason: err.reason().to_string(),
            },
        )),
        kind if kind.is_storage_failure() => {
            Ok(PersistOutcome::StorageFailed(StorageFailure::Execution {
                reason: err.reason().to_string(),
            }))
        }
        _ => Err(err),
    }
}
