//! Configuration for the upsert sink.
//!
//! Holds the shared configuration types consumed by the other crates and the loader that
//! merges configuration files with environment variable overrides.

mod environment;
mod load;
pub mod shared;

pub use environment::*;
pub use load::*;
