//! Schema-aware upsert sink.
//!
//! Applies batches of change events to a MySQL table as inserts or updates, discovering the
//! table's columns, defaults and primary key at call time. The [`batch::BatchProcessor`]
//! gates records on their status flag and drives the [`upsert::Upserter`] once per record;
//! statements come from the pure builders in [`statement`] and run through a
//! [`store::UpsertStore`].

pub mod batch;
pub mod error;
mod macros;
pub mod secrets;
pub mod statement;
pub mod store;
pub mod types;
pub mod upsert;
