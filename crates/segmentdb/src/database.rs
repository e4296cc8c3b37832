//! The database handle and in-memory catalog.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use segmentdb_storage::{Rect, RectExtractor, Store, ValueOrdering};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::key;
use crate::schema::{DataType, FieldDefinition, IndexDefinition};

/// The in-memory catalog: the authoritative hot copy of every schema, plus a
/// flat per-index field map for O(1) lookup during writes.
#[derive(Default)]
pub(crate) struct Catalog {
    pub(crate) definitions: HashMap<String, IndexDefinition>,
    pub(crate) fields: HashMap<String, HashMap<String, FieldDefinition>>,
}

impl Catalog {
    pub(crate) fn load(&mut self, definition: &IndexDefinition) {
        let mut fields = HashMap::with_capacity(definition.fields.len());
        for field in &definition.fields {
            fields.insert(field.name.clone(), field.clone());
        }
        self.fields.insert(definition.name.clone(), fields);
        self.definitions.insert(definition.name.clone(), definition.clone());
    }

    pub(crate) fn remove(&mut self, name: &str) {
        self.definitions.remove(name);
        self.fields.remove(name);
    }
}

pub(crate) struct DatabaseInner {
    pub(crate) engine: Store,
    pub(crate) catalog: RwLock<Catalog>,
}

/// The segment store handle.
///
/// Cheap to clone: the store and catalog are shared behind an `Arc`, so a
/// clone is a second handle onto the same database.
#[derive(Clone)]
pub struct Database {
    pub(crate) inner: Arc<DatabaseInner>,
}

impl Database {
    /// Open a non-persistent store with the default configuration
    /// (`":memory:"`, [`crate::Durability::Ram`]).
    pub fn open() -> Result<Self> {
        Self::open_with_config(&Config::default())
    }

    /// Open a store with an explicit configuration.
    pub fn open_with_config(config: &Config) -> Result<Self> {
        let engine = Store::open(&config.path, config.durability.storage_config())?;
        let db = Self {
            inner: Arc::new(DatabaseInner { engine, catalog: RwLock::new(Catalog::default()) }),
        };
        db.init()?;
        Ok(db)
    }

    /// Warm the catalog and secondary-index registrations.
    ///
    /// A registered `@` index marks a warm start: registrations are live and
    /// only the catalog needs reloading. Otherwise this is a cold start —
    /// possibly over a replayed keyspace — so the catalog registrations are
    /// created and every recovered schema gets its segment-scope and
    /// per-field indexes re-registered (registration backfills from the
    /// keyspace).
    fn init(&self) -> Result<()> {
        let engine = &self.inner.engine;
        if engine.indexes().iter().any(|name| name == key::INDEX_NAME_BY_ID) {
            self.load_definitions()?;
            return Ok(());
        }

        engine.create_index(
            key::INDEX_NAME_BY_ID,
            &key::join(&[key::INDEX_NAME_BY_ID, key::WILDCARD]),
            ValueOrdering::Int,
        )?;
        engine.create_index(
            key::INDEX_ID_BY_NAME,
            &key::join(&[key::INDEX_ID_BY_NAME, key::WILDCARD]),
            ValueOrdering::String,
        )?;

        self.load_definitions()?;
        self.reregister_indexes()
    }

    /// Rebuild the in-memory catalog from the persisted `%` rows.
    fn load_definitions(&self) -> Result<()> {
        let mut definitions = Vec::new();
        self.inner.engine.view(|tx| {
            tx.ascend_keys(
                &key::join(&[key::DEFINITION_BY_NAME, key::WILDCARD]),
                |row, text| {
                    match IndexDefinition::decode(text) {
                        Ok(definition) => definitions.push(definition),
                        Err(_) => warn!(row = %row, "skipping undecodable index definition"),
                    }
                    true
                },
            )?;
            Ok::<_, Error>(())
        })?;

        let mut catalog = self.inner.catalog.write();
        for definition in &definitions {
            catalog.load(definition);
        }
        Ok(())
    }

    /// Re-register segment-scope and per-field secondary indexes for every
    /// catalog entry. Index registrations do not persist with the store, so
    /// a reopened database must rebuild them from the recovered schemas.
    fn reregister_indexes(&self) -> Result<()> {
        let definitions: Vec<IndexDefinition> =
            self.inner.catalog.read().definitions.values().cloned().collect();

        for definition in definitions {
            let id = self.inner.engine.view(|tx| {
                Ok::<_, Error>(tx.get(&key::join(&[key::INDEX_ID_BY_NAME, &definition.name])))
            })?;
            let Some(id) = id else {
                warn!(index = %definition.name, "schema row without an id; skipping");
                continue;
            };

            debug!(index = %definition.name, id = %id, "re-registering secondary indexes");
            self.inner.engine.create_index(
                &id,
                &key::join(&[&id, key::WILDCARD]),
                ValueOrdering::String,
            )?;
            let segment_scope = key::join(&[key::SEGMENT_BY_PRIMARY, &id]);
            self.inner.engine.create_index(
                &segment_scope,
                &key::join(&[&segment_scope, key::WILDCARD]),
                ValueOrdering::String,
            )?;
            self.create_index_fields(&id, &definition.fields)?;
        }
        Ok(())
    }

    /// Register one secondary index per field, recursing into nested fields
    /// with the parent's key prefix.
    pub(crate) fn create_index_fields(&self, path: &str, fields: &[FieldDefinition]) -> Result<()> {
        for field in fields {
            self.create_index_field(path, field)?;
        }
        Ok(())
    }

    fn create_index_field(&self, path: &str, field: &FieldDefinition) -> Result<()> {
        let name = key::join(&[path, &field.name]);
        let pattern = key::join(&[&name, key::WILDCARD]);

        if field.data_type.is_geometric() {
            self.inner.engine.create_spatial_index(&name, &pattern, rect_extractor())?;
        } else {
            let ordering = scalar_ordering(field.data_type);
            self.inner.engine.create_index(&name, &pattern, ordering)?;
        }

        for nested in &field.fields {
            self.create_index_field(&name, nested)?;
        }
        Ok(())
    }
}

/// Scalar ordering for a B-tree field index.
fn scalar_ordering(data_type: DataType) -> ValueOrdering {
    match data_type {
        DataType::Undefined | DataType::String | DataType::Blob => ValueOrdering::String,
        DataType::Int | DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            ValueOrdering::Int
        }
        DataType::Uint
        | DataType::Uint8
        | DataType::Uint16
        | DataType::Uint32
        | DataType::Uint64 => ValueOrdering::Uint,
        DataType::Float | DataType::Float32 | DataType::Float64 => ValueOrdering::Float,
        DataType::Bool => ValueOrdering::Binary,
        DataType::Range
        | DataType::RangeInt
        | DataType::RangeFloat
        | DataType::Geo
        | DataType::GeoRect
        | DataType::GeoPoint => {
            // Geometric types never reach here; registration dispatches them
            // to the spatial path first.
            ValueOrdering::String
        }
    }
}

/// The rectangle extractor every spatial field index uses: collect the
/// bracketed groups of the stored value, first group min corner, last group
/// max corner.
pub(crate) fn rect_extractor() -> RectExtractor {
    Arc::new(|value: &str| Rect::parse(value))
}
