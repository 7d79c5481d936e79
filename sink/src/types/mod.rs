//! Common types used throughout the sink.
//!
//! Field values, records, the incoming change event envelope and per-record outcomes.

mod cell;
mod event;
mod outcome;
mod record;

pub use cell::*;
pub use event::*;
pub use outcome::*;
pub use record::*;

// Re-exports.
pub use sink_mysql::types::*;
