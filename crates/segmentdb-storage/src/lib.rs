//! An embedded, ordered, string key-value store with registered secondary
//! indexes, backing the segment store.
//!
//! The store keeps one sorted keyspace. Callers register *secondary indexes*
//! over key patterns (one `*` wildcard): B-tree indexes order their entries
//! by the stored value under a chosen [`ValueOrdering`]; spatial indexes file
//! entries in an R-tree under rectangles extracted from the value. All reads
//! and writes run inside [`Store::view`] / [`Store::update`] closures — one
//! exclusive writer, any number of concurrent readers — and a failed update
//! closure rolls back every effect.
//!
//! Durability is a policy knob ([`SyncPolicy`]): the store is primarily an
//! in-memory structure, optionally shadowed by an append-only log that is
//! replayed on open. Index registrations are in-memory only; callers
//! re-register them after opening and registration backfills from the
//! replayed keyspace.

mod aof;
mod config;
mod error;
mod index;
mod ordering;
mod rect;
mod rtree;
mod store;

pub use config::{StorageConfig, SyncPolicy, IN_MEMORY};
pub use error::{Result, StorageError};
pub use index::RectExtractor;
pub use ordering::ValueOrdering;
pub use rect::Rect;
pub use store::{Store, Tx};
