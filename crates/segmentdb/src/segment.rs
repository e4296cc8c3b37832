//! The segment write path.
//!
//! A segment is translated into per-field index entries by
//! `generate_index_map`: field name → sub-key → codec-encoded value. Insert
//! and delete are [`Action`]s over those maps, composed into a single write
//! transaction per logical call, so observers only ever see a segment whole
//! or absent. The delete map is always generated from the *persisted*
//! segment, never from caller input.

use std::collections::BTreeMap;

use segmentdb_storage::Tx;

use crate::codec;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::key;
use crate::schema::Segment;
use crate::txn::{Action, Txn};

/// Per-field encoded entries: field name → sub-key → encoded value.
type FieldsMap = BTreeMap<String, BTreeMap<String, String>>;

/// A handle onto one stored (or about-to-be-stored) segment.
#[derive(Clone)]
pub struct SegmentHandle {
    db: Database,
    index: Index,
    segment: Segment,
}

impl Database {
    /// Insert a segment into an index. The write is a single atomic
    /// transaction over every per-field entry plus the segment row.
    pub fn insert_segment(&self, index_name: &str, segment: &Segment) -> Result<SegmentHandle> {
        let index = self.get_index(index_name)?;
        let handle = SegmentHandle { db: self.clone(), index, segment: segment.clone() };
        handle.insert()?;
        Ok(handle)
    }

    /// Build an unsaved segment handle; store it later with
    /// [`SegmentHandle::insert`].
    pub fn new_segment(&self, index_name: &str, segment: &Segment) -> Result<SegmentHandle> {
        let index = self.get_index(index_name)?;
        Ok(SegmentHandle { db: self.clone(), index, segment: segment.clone() })
    }

    /// Fetch the segment stored under a primary value.
    pub fn get_segment_by_key(&self, index_name: &str, key: &str) -> Result<SegmentHandle> {
        self.get_index(index_name)?.get_segment_by_key(key)
    }

    /// Visit every segment of an index in primary-value order. The visitor
    /// returns `false` to stop early.
    pub fn get_all_segments(
        &self,
        index_name: &str,
        visitor: impl FnMut(&str, Segment) -> bool,
    ) -> Result<()> {
        self.get_index(index_name)?.get_all_segments(visitor)
    }

    /// Delete the segment stored under a primary value, returning its
    /// handle.
    pub fn delete_segment(&self, index_name: &str, key: &str) -> Result<SegmentHandle> {
        self.get_index(index_name)?.delete_segment(key)
    }

    /// Atomically replace the segment stored under a primary value. The new
    /// segment may carry a different primary value, re-keying the segment.
    pub fn replace_segment(
        &self,
        index_name: &str,
        key: &str,
        new_segment: &Segment,
    ) -> Result<SegmentHandle> {
        self.get_index(index_name)?.replace_segment(key, new_segment)
    }
}

impl Index {
    /// Insert a segment into this index.
    pub fn insert_segment(&self, segment: &Segment) -> Result<SegmentHandle> {
        let handle =
            SegmentHandle { db: self.db.clone(), index: self.clone(), segment: segment.clone() };
        handle.insert()?;
        Ok(handle)
    }

    /// Build an unsaved segment handle for this index.
    #[must_use]
    pub fn new_segment(&self, segment: &Segment) -> SegmentHandle {
        SegmentHandle { db: self.db.clone(), index: self.clone(), segment: segment.clone() }
    }

    /// Fetch the segment stored under a primary value.
    pub fn get_segment_by_key(&self, key: &str) -> Result<SegmentHandle> {
        let name = &self.definition.name;
        let text = self.db.inner.engine.view(|tx| {
            let id = tx.get(&key::join(&[key::INDEX_ID_BY_NAME, name])).ok_or(Error::Internal)?;
            tx.get(&key::join(&[key::SEGMENT_BY_PRIMARY, &id, key]))
                .ok_or(Error::SegmentNotFound)
        })?;

        let segment = Segment::decode(&text)?;
        Ok(SegmentHandle { db: self.db.clone(), index: self.clone(), segment })
    }

    /// Visit every segment of this index in primary-value order.
    pub fn get_all_segments(&self, mut visitor: impl FnMut(&str, Segment) -> bool) -> Result<()> {
        let name = &self.definition.name;
        self.db.inner.engine.view(|tx| {
            let id = tx.get(&key::join(&[key::INDEX_ID_BY_NAME, name])).ok_or(Error::Internal)?;

            let mut decode_failure = None;
            tx.ascend(&key::join(&[key::SEGMENT_BY_PRIMARY, &id]), |row, text| {
                let primary = row.rsplit(key::SEPARATOR).next().unwrap_or_default();
                match Segment::decode(text) {
                    Ok(segment) => visitor(primary, segment),
                    Err(e) => {
                        decode_failure = Some(e);
                        false
                    }
                }
            })?;

            match decode_failure {
                Some(e) => Err(e),
                None => Ok(()),
            }
        })
    }

    /// Delete the segment stored under a primary value, returning its
    /// handle.
    pub fn delete_segment(&self, key: &str) -> Result<SegmentHandle> {
        let handle = self.get_segment_by_key(key)?;
        handle.delete()?;
        Ok(handle)
    }

    /// Atomically replace the segment stored under a primary value.
    pub fn replace_segment(&self, key: &str, new_segment: &Segment) -> Result<SegmentHandle> {
        let current = self.get_segment_by_key(key)?;
        current.replace(new_segment)
    }
}

impl SegmentHandle {
    /// The segment carried by this handle.
    #[must_use]
    pub fn segment(&self) -> &Segment {
        &self.segment
    }

    /// Store the handle's segment.
    pub fn insert(&self) -> Result<()> {
        let index_name = &self.index.definition().name;
        let (primary, inserts) = generate_index_map(&self.db, index_name, &self.segment)?;
        let key = primary_value(&primary, &inserts)?;

        let mut txn = Txn::new(&self.db, true);
        txn.add_action(Box::new(InsertSegmentAction {
            index_name: index_name.clone(),
            key,
            fields_map: inserts,
            segment_text: self.segment.encode()?,
        }));
        txn.settle()
    }

    /// Remove the handle's segment from its index.
    pub fn delete(&self) -> Result<()> {
        let index_name = &self.index.definition().name;
        let (primary, deletes) = generate_index_map(&self.db, index_name, &self.segment)?;
        let key = primary_value(&primary, &deletes)?;

        let mut txn = Txn::new(&self.db, true);
        txn.add_action(Box::new(DeleteSegmentAction {
            index_name: index_name.clone(),
            key,
            fields_map: deletes,
        }));
        txn.settle()
    }

    /// Atomically replace the handle's segment with `new_segment`: the old
    /// entries are deleted and the new ones inserted under one write
    /// transaction. A changed primary value re-keys the segment.
    pub fn replace(&self, new_segment: &Segment) -> Result<SegmentHandle> {
        let index_name = &self.index.definition().name;
        let replacement = SegmentHandle {
            db: self.db.clone(),
            index: self.index.clone(),
            segment: new_segment.clone(),
        };

        let (old_primary, deletes) = generate_index_map(&self.db, index_name, &self.segment)?;
        let (new_primary, inserts) = generate_index_map(&self.db, index_name, new_segment)?;
        let delete_key = primary_value(&old_primary, &deletes)?;
        let insert_key = primary_value(&new_primary, &inserts)?;

        let mut txn = Txn::new(&self.db, true);
        txn.add_action(Box::new(DeleteSegmentAction {
            index_name: index_name.clone(),
            key: delete_key,
            fields_map: deletes,
        }));
        txn.add_action(Box::new(InsertSegmentAction {
            index_name: index_name.clone(),
            key: insert_key,
            fields_map: inserts,
            segment_text: new_segment.encode()?,
        }));
        txn.settle()?;

        Ok(replacement)
    }
}

/// Translate a segment into its per-field entry maps. Pure: no substrate
/// access, only catalog lookups and the codec.
fn generate_index_map(
    db: &Database,
    index_name: &str,
    segment: &Segment,
) -> Result<(String, FieldsMap)> {
    let catalog = db.inner.catalog.read();
    let Some(schema_fields) = catalog.fields.get(index_name) else {
        return Err(Error::IndexUnknown);
    };

    let mut primary = String::new();
    let mut fields_map = FieldsMap::new();

    for field in &segment.fields {
        let definition = schema_fields.get(&field.name).ok_or(Error::FieldUnknown)?;
        if definition.is_primary {
            primary.clone_from(&field.name);
        }

        let mut sub_map = BTreeMap::new();
        codec::encode_value(&field.value, &mut |sub_key, text| {
            sub_map.insert(sub_key, text);
            true
        });
        fields_map.insert(field.name.clone(), sub_map);
    }

    Ok((primary, fields_map))
}

/// The segment's primary value: the `"0"` sub-key entry of its primary
/// field.
fn primary_value(primary: &str, fields_map: &FieldsMap) -> Result<String> {
    fields_map
        .get(primary)
        .and_then(|subs| subs.get("0"))
        .cloned()
        .ok_or(Error::PrimaryKeyMissing)
}

struct InsertSegmentAction {
    index_name: String,
    key: String,
    fields_map: FieldsMap,
    segment_text: String,
}

impl Action for InsertSegmentAction {
    fn call(&self, tx: &mut Tx<'_>) -> Result<()> {
        let id = tx
            .get(&key::join(&[key::INDEX_ID_BY_NAME, &self.index_name]))
            .ok_or(Error::Internal)?;

        for (field_name, sub_map) in &self.fields_map {
            for (sub_key, value) in sub_map {
                tx.set(&key::join(&[&id, field_name, &self.key, sub_key]), value)?;
            }
        }

        tx.set(&key::join(&[key::SEGMENT_BY_PRIMARY, &id, &self.key]), &self.segment_text)?;
        Ok(())
    }
}

struct DeleteSegmentAction {
    index_name: String,
    key: String,
    fields_map: FieldsMap,
}

impl Action for DeleteSegmentAction {
    fn call(&self, tx: &mut Tx<'_>) -> Result<()> {
        let id = tx
            .get(&key::join(&[key::INDEX_ID_BY_NAME, &self.index_name]))
            .ok_or(Error::Internal)?;

        for (field_name, sub_map) in &self.fields_map {
            for sub_key in sub_map.keys() {
                tx.delete(&key::join(&[&id, field_name, &self.key, sub_key]))?;
            }
        }

        tx.delete(&key::join(&[key::SEGMENT_BY_PRIMARY, &id, &self.key]))?;
        Ok(())
    }
}
