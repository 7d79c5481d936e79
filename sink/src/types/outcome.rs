use thiserror::Error;

/// Result of persisting a single record.
///
/// Validation and storage failures are outcomes rather than errors so that one record cannot
/// abort the rest of its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    Inserted,
    Updated,
    /// The record was rejected before any statement ran.
    ValidationFailed(ValidationFailure),
    /// The store rejected or could not run the statement. The unit of work was rolled back.
    StorageFailed(StorageFailure),
}

impl PersistOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PersistOutcome::Inserted | PersistOutcome::Updated)
    }
}

/// Reasons for rejecting a record without writing it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationFailure {
    #[error("primary key column `{column}` is missing from the record")]
    MissingPrimaryKey { column: String },

    #[error("column `{column}` is not nullable and has no value in the record")]
    RequiredFieldMissing { column: String },

    #[error("the record does not assign any updatable column")]
    EmptyUpdate,
}

/// Reasons a write could not be completed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageFailure {
    #[error("schema of table {table} is unavailable: {reason}")]
    SchemaUnavailable { table: String, reason: String },

    #[error("statement execution failed: {reason}")]
    Execution { reason: String },
}
