//! Batch processing.
//!
//! A batch is applied record by record in arrival order. Each active record is upserted in its
//! own unit of work, so one failing record never blocks the records after it.

use serde::Serialize;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::error::SinkResult;
use crate::store::UpsertStore;
use crate::types::{PersistOutcome, RecordOrigin, StatusRecord, TableName};
use crate::upsert::Upserter;

/// Outcome of a single active record of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordReport {
    /// Position of the record in the batch.
    pub index: usize,
    pub origin: Option<RecordOrigin>,
    pub outcome: PersistOutcome,
}

/// Outcomes of all records of a batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// One entry per active record, in batch order.
    pub records: Vec<RecordReport>,
    /// Number of records skipped because they were not active.
    pub skipped: usize,
}

impl BatchReport {
    pub fn outcomes(&self) -> impl Iterator<Item = &PersistOutcome> {
        self.records.iter().map(|report| &report.outcome)
    }

    /// Folds the report into per-outcome counts.
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            skipped: self.skipped,
            ..BatchSummary::default()
        };

        for outcome in self.outcomes() {
            match outcome {
                PersistOutcome::Inserted => summary.inserted += 1,
                PersistOutcome::Updated => summary.updated += 1,
                PersistOutcome::ValidationFailed(_) => summary.validation_failed += 1,
                PersistOutcome::StorageFailed(_) => summary.storage_failed += 1,
            }
        }

        summary
    }
}

/// Per-outcome counts of a [`BatchReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub inserted: usize,
    pub updated: usize,
    pub validation_failed: usize,
    pub storage_failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    /// Returns `true` if every active record was written.
    pub fn all_succeeded(&self) -> bool {
        self.validation_failed == 0 && self.storage_failed == 0
    }
}

/// Drives the [`Upserter`] over the records of a batch.
#[derive(Debug, Clone)]
pub struct BatchProcessor<S> {
    upserter: Upserter<S>,
    table_name: TableName,
}

impl<S> BatchProcessor<S>
where
    S: UpsertStore,
{
    pub fn new(store: S, table_name: TableName) -> Self {
        Self {
            upserter: Upserter::new(store),
            table_name,
        }
    }

    pub fn table_name(&self) -> &TableName {
        &self.table_name
    }

    /// Upserts every active record of the batch, in order.
    ///
    /// Inactive records are skipped without touching the store. Failed records are logged and
    /// reported but do not stop the batch; only errors that are not representable as a
    /// [`PersistOutcome`] are returned, aborting the remaining records.
    pub async fn process(&self, batch: Vec<StatusRecord>) -> SinkResult<BatchReport> {
        let span = info_span!("batch", table = %self.table_name, records = batch.len());
        self.process_records(batch).instrument(span).await
    }

    async fn process_records(&self, batch: Vec<StatusRecord>) -> SinkResult<BatchReport> {
        let mut report = BatchReport::default();

        for (index, item) in batch.into_iter().enumerate() {
            let origin = item.origin.as_ref().map(ToString::to_string);

            if !item.active {
                debug!(index, origin, "skipping inactive record");
                report.skipped += 1;
                continue;
            }

            let outcome = self.upserter.upsert(&self.table_name, item.record).await?;
            match &outcome {
                PersistOutcome::Inserted | PersistOutcome::Updated => {
                    debug!(index, origin, ?outcome, "record persisted");
                }
                PersistOutcome::ValidationFailed(failure) => {
                    warn!(index, origin, %failure, "record rejected");
                }
                PersistOutcome::StorageFailed(failure) => {
                    error!(index, origin, %failure, "record could not be stored");
                }
            }

            report.records.push(RecordReport {
                index,
                origin: item.origin,
                outcome,
            });
        }

        let summary = report.summary();
        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            validation_failed = summary.validation_failed,
            storage_failed = summary.storage_failed,
            skipped = summary.skipped,
            "batch processed"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StorageFailure, ValidationFailure};

    #[test]
    fn summary_counts_each_outcome() {
        let outcomes = [
            PersistOutcome::Inserted,
            PersistOutcome::Inserted,
            PersistOutcome::Updated,
            PersistOutcome::ValidationFailed(ValidationFailure::EmptyUpdate),
            PersistOutcome::StorageFailed(StorageFailure::Execution {
                reason: "connection reset".to_string(),
            }),
        ];
        let report = BatchReport {
            records: outcomes
                .into_iter()
                .enumerate()
                .map(|(index, outcome)| RecordReport {
                    index,
                    origin: None,
                    outcome,
                })
                .collect(),
            skipped: 3,
        };

        let summary = report.summary();

        assert_eq!(
            summary,
            BatchSummary {
                inserted: 2,
                updated: 1,
                validation_failed: 1,
                storage_failed: 1,
                skipped: 3,
            }
        );
        assert!(!summary.all_succeeded());
    }

    #[test]
    fn empty_report_succeeds() {
        assert!(BatchReport::default().summary().all_succeeded());
    }
}
