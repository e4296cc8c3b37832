//! Catalog operations and the index handle.

use segmentdb_storage::ValueOrdering;

use crate::codec;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::key;
use crate::schema::{FieldDefinition, IndexDefinition, SegmentField};

/// A handle onto one index: the shared store plus a snapshot of the schema
/// taken when the handle was created.
#[derive(Clone)]
pub struct Index {
    pub(crate) db: Database,
    pub(crate) definition: IndexDefinition,
}

impl Database {
    /// Create a new index from a definition and return its handle.
    ///
    /// Fails with [`Error::IndexExists`] if the name is taken and
    /// [`Error::UnknownDataType`] if the schema declares a repeated primary
    /// field.
    pub fn create_index(&self, definition: &IndexDefinition) -> Result<Index> {
        let index = Index { db: self.clone(), definition: definition.clone() };
        index.create()?;
        Ok(index)
    }

    /// Fetch a handle for a known index.
    pub fn get_index(&self, name: &str) -> Result<Index> {
        let catalog = self.inner.catalog.read();
        let definition = catalog.definitions.get(name).ok_or(Error::IndexUnknown)?;
        Ok(Index { db: self.clone(), definition: definition.clone() })
    }

    /// Snapshot of every known index definition.
    pub fn list_indexes(&self) -> Vec<IndexDefinition> {
        self.inner.catalog.read().definitions.values().cloned().collect()
    }

    /// Delete every segment of an index, keeping its schema and secondary
    /// indexes.
    pub fn truncate_index(&self, name: &str) -> Result<()> {
        self.get_index(name)?.truncate()
    }

    /// Delete an index: its segments, catalog rows, and secondary indexes.
    /// Returns the handle of the removed index.
    pub fn delete_index(&self, name: &str) -> Result<Index> {
        let index = self.get_index(name)?;
        index.delete()?;
        Ok(index)
    }
}

impl Index {
    /// The schema this handle was created with.
    #[must_use]
    pub fn definition(&self) -> &IndexDefinition {
        &self.definition
    }

    /// Whether the index is known to the catalog.
    pub fn exists(&self) -> Result<bool> {
        if self.definition.name.is_empty() {
            return Err(Error::IndexUnknown);
        }
        Ok(self.db.inner.catalog.read().definitions.contains_key(&self.definition.name))
    }

    /// Run the create-index protocol for this handle's definition.
    pub(crate) fn create(&self) -> Result<()> {
        if self.exists()? {
            return Err(Error::IndexExists);
        }
        validate_fields(&self.definition.fields)?;

        let definition_text = self.definition.encode()?;
        let name = self.definition.name.clone();

        let id = self.db.inner.engine.update(|tx| {
            // Next id is one past the maximum visible in the `@` rows.
            let mut max_id: i64 = 0;
            if tx.len() > 0 {
                tx.descend(key::INDEX_NAME_BY_ID, |row, _| {
                    if let Some(id) = row.split(key::SEPARATOR).nth(1) {
                        if let Ok(id) = id.parse::<i64>() {
                            max_id = max_id.max(id);
                        }
                    }
                    true
                })?;
            }
            let id = (max_id + 1).to_string();

            // Segment-scope registrations used by truncate and enumeration.
            tx.create_index(&id, &key::join(&[&id, key::WILDCARD]), ValueOrdering::String)?;
            let segment_scope = key::join(&[key::SEGMENT_BY_PRIMARY, &id]);
            tx.create_index(
                &segment_scope,
                &key::join(&[&segment_scope, key::WILDCARD]),
                ValueOrdering::String,
            )?;

            if tx.set(&key::join(&[key::INDEX_NAME_BY_ID, &id]), &name)? {
                return Err(Error::IndexExists);
            }
            tx.set(&key::join(&[key::INDEX_ID_BY_NAME, &name]), &id)?;
            tx.set(&key::join(&[key::DEFINITION_BY_NAME, &name]), &definition_text)?;

            Ok(id)
        })?;

        // In-memory catalog after the commit.
        self.db.inner.catalog.write().load(&self.definition);

        // Field registrations happen outside the transaction; a failure here
        // is repaired by the next cold start, which re-registers from the
        // persisted schema.
        self.db.create_index_fields(&id, &self.definition.fields)
    }

    /// Delete every segment of the index. The schema and all secondary-index
    /// registrations stay.
    pub fn truncate(&self) -> Result<()> {
        let name = &self.definition.name;
        self.db.inner.engine.update(|tx| {
            let id = tx.get(&key::join(&[key::INDEX_ID_BY_NAME, name])).ok_or(Error::Internal)?;

            let mut doomed = Vec::new();
            tx.ascend(&id, |row, _| {
                doomed.push(row.to_owned());
                true
            })?;
            tx.ascend(&key::join(&[key::SEGMENT_BY_PRIMARY, &id]), |row, _| {
                doomed.push(row.to_owned());
                true
            })?;

            for row in &doomed {
                tx.delete(row)?;
            }
            Ok(())
        })
    }

    /// Truncate, then remove the catalog rows and every secondary-index
    /// registration of this index.
    pub fn delete(&self) -> Result<()> {
        self.truncate()?;

        let name = &self.definition.name;
        let fields = &self.definition.fields;
        self.db.inner.engine.update(|tx| {
            let id = tx.get(&key::join(&[key::INDEX_ID_BY_NAME, name])).ok_or(Error::Internal)?;

            for row in [
                key::join(&[key::INDEX_ID_BY_NAME, name]),
                key::join(&[key::DEFINITION_BY_NAME, name]),
                key::join(&[key::INDEX_NAME_BY_ID, &id]),
            ] {
                if !tx.delete(&row)? {
                    return Err(Error::Internal);
                }
            }

            tx.drop_index(&id)?;
            tx.drop_index(&key::join(&[key::SEGMENT_BY_PRIMARY, &id]))?;
            drop_field_indexes(tx, &id, fields)?;
            Ok(())
        })?;

        self.db.inner.catalog.write().remove(name);
        Ok(())
    }

    /// Decode the stored text of a primary value back into a tagged field.
    ///
    /// Fails with [`Error::PrimaryKeyMissing`] when the schema has no primary
    /// field and [`Error::NotImplemented`] for geometric primaries.
    pub fn unmarshal_primary_value(&self, value: &str) -> Result<SegmentField> {
        let primary = self.definition.primary_field().ok_or(Error::PrimaryKeyMissing)?;
        codec::decode_primary_scalar(primary, value)
    }
}

fn drop_field_indexes(
    tx: &mut segmentdb_storage::Tx<'_>,
    path: &str,
    fields: &[FieldDefinition],
) -> Result<()> {
    for field in fields {
        let name = key::join(&[path, &field.name]);
        tx.drop_index(&name)?;
        drop_field_indexes(tx, &name, &field.fields)?;
    }
    Ok(())
}

/// Schema validation at create time. A repeated primary field cannot key
/// segments (only sub-key `"0"` ever identifies one), so it is rejected
/// outright.
fn validate_fields(fields: &[FieldDefinition]) -> Result<()> {
    for field in fields {
        if field.is_primary && field.repeated {
            return Err(Error::UnknownDataType);
        }
        validate_fields(&field.fields)?;
    }
    Ok(())
}
