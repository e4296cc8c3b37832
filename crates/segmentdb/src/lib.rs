//! An embedded, in-memory indexed store for *segments* — typed multi-field
//! records — queried by equality on scalar fields and by range or spatial
//! overlap on geometric fields.
//!
//! Clients define an index (a schema of named, typed fields with one primary
//! field), insert, replace, and delete segments keyed by the primary value,
//! and run lookups whose answer is the stream of primary values (or full
//! segments) matching a conjunction of per-field predicates.
//!
//! # Example
//!
//! ```
//! use segmentdb::{
//!     Database, DataType, FieldDefinition, FieldValue, IndexDefinition, IntRange, Predicate,
//!     Segment,
//! };
//!
//! # fn main() -> segmentdb::Result<()> {
//! let db = Database::open()?;
//!
//! db.create_index(
//!     &IndexDefinition::new("hello")
//!         .field(FieldDefinition::primary("name", DataType::String))
//!         .field(FieldDefinition::new("age", DataType::RangeInt)),
//! )?;
//!
//! db.insert_segment(
//!     "hello",
//!     &Segment::new()
//!         .field("name", FieldValue::String("Millennial".into()))
//!         .field("age", FieldValue::RangeInt(IntRange { min: 20, max: 39 })),
//! )?;
//!
//! let predicate =
//!     Predicate::new().field("age", FieldValue::RangeInt(IntRange { min: 21, max: 21 }));
//! let mut results = db.lookup("hello", &predicate)?;
//! assert_eq!(results.next(None)?, Some("Millennial".to_owned()));
//! assert_eq!(results.next(None)?, None);
//! # Ok(())
//! # }
//! ```
//!
//! # Storage model
//!
//! All indexes share one sorted key-value substrate. Catalog rows live under
//! the `@`, `#`, and `%` sigils, whole segments under `$:<id>:<pk>`, and
//! per-field index entries under `<id>:<field>:<pk>:<sub>`. Every logical
//! operation is one substrate write transaction, so a mid-operation crash
//! never leaves partial per-field state.

mod codec;
mod config;
mod database;
mod error;
mod index;
mod key;
mod lookup;
mod schema;
mod segment;
mod txn;


pub use config::{Config, Durability, IN_MEMORY};
pub use database::Database;
pub use error::{Error, Result};
pub use index::Index;
pub use key::Key;
pub use lookup::{Iter, Lookup};
pub use schema::{
    DataType, FieldDefinition, FieldValue, FloatRange, GeoPoint, GeoRect, IndexDefinition,
    IntRange, Predicate, PredicateField, Segment, SegmentField,
};
pub use segment::SegmentHandle;
