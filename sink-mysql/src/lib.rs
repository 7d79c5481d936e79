//! MySQL primitives for the upsert sink.
//!
//! Provides the table metadata types, the queries that read them from `information_schema`,
//! connection pool construction and, behind the `test-utils` feature, helpers for creating
//! throwaway test databases.

pub mod db;
pub mod schema;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod types;
