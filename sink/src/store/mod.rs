//! Storage abstractions for the upsert path.
//!
//! An [`UpsertStore`] hands out scoped units of work. Each [`StoreSession`] owns one connection
//! inside one transaction and is released on every exit path.

mod base;
pub mod memory;
pub mod mysql;

pub use base::{StoreSession, UpsertStore};
