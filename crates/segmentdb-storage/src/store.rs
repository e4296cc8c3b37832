//! The store and its transactions.
//!
//! A [`Store`] is an ordered `String` → `String` keyspace plus a set of
//! registered secondary indexes. All access happens through [`Store::update`]
//! (one exclusive writer) or [`Store::view`] (shared readers). Writes apply
//! immediately under the exclusive lock and are undone in reverse order if
//! the closure fails, so readers only ever observe committed state.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::RwLock;

use crate::aof::{Aof, LogRecord};
use crate::config::{StorageConfig, IN_MEMORY};
use crate::error::{Result, StorageError};
use crate::index::{IndexKind, Pattern, RectExtractor, SecondaryIndex};
use crate::ordering::ValueOrdering;
use crate::rect::Rect;

/// An embedded ordered key-value store with secondary indexes.
pub struct Store {
    inner: RwLock<Inner>,
}

struct Inner {
    keys: BTreeMap<String, String>,
    indexes: BTreeMap<String, SecondaryIndex>,
    aof: Option<Aof>,
}

impl Store {
    /// Open a store. The [`IN_MEMORY`] sentinel selects a non-persistent
    /// store; any other path opens (or creates) a persistence log and
    /// replays it.
    pub fn open(path: &str, config: StorageConfig) -> Result<Self> {
        let (aof, keys) = if path == IN_MEMORY {
            (None, BTreeMap::new())
        } else {
            let (aof, keys) = Aof::open(Path::new(path), &config)?;
            (Some(aof), keys)
        };

        Ok(Self { inner: RwLock::new(Inner { keys, indexes: BTreeMap::new(), aof }) })
    }

    /// Run `f` under the exclusive write transaction. Commits on `Ok`,
    /// rolls every effect back on `Err`.
    pub fn update<T, E>(&self, f: impl FnOnce(&mut Tx<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let guard = self.inner.write();
        let mut tx = Tx { guard: TxGuard::Write(guard), undo: Vec::new(), redo: Vec::new() };
        match f(&mut tx) {
            Ok(value) => {
                tx.commit().map_err(E::from)?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback_effects();
                Err(e)
            }
        }
    }

    /// Run `f` under a shared read transaction. Write operations inside the
    /// closure fail with [`StorageError::ReadOnly`].
    pub fn view<T, E>(&self, f: impl FnOnce(&mut Tx<'_>) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        let guard = self.inner.read();
        let mut tx = Tx { guard: TxGuard::Read(guard), undo: Vec::new(), redo: Vec::new() };
        f(&mut tx)
    }

    /// Register a B-tree secondary index over a key pattern and backfill it
    /// from the existing keyspace.
    pub fn create_index(&self, name: &str, pattern: &str, ordering: ValueOrdering) -> Result<()> {
        let pattern = Pattern::compile(pattern)?;
        self.inner.write().register(SecondaryIndex::btree(name, pattern, ordering))
    }

    /// Register a spatial (R-tree) secondary index over a key pattern and
    /// backfill it from the existing keyspace.
    pub fn create_spatial_index(
        &self,
        name: &str,
        pattern: &str,
        extractor: RectExtractor,
    ) -> Result<()> {
        let pattern = Pattern::compile(pattern)?;
        self.inner.write().register(SecondaryIndex::spatial(name, pattern, extractor))
    }

    /// Deregister a secondary index.
    pub fn drop_index(&self, name: &str) -> Result<()> {
        self.inner
            .write()
            .indexes
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StorageError::UnknownIndex(name.to_owned()))
    }

    /// Names of every registered secondary index, sorted.
    pub fn indexes(&self) -> Vec<String> {
        self.inner.read().indexes.keys().cloned().collect()
    }
}

impl Inner {
    fn register(&mut self, mut index: SecondaryIndex) -> Result<()> {
        if self.indexes.contains_key(&index.name) {
            return Err(StorageError::IndexExists(index.name.clone()));
        }
        index.backfill(&self.keys);
        self.indexes.insert(index.name.clone(), index);
        Ok(())
    }

    fn apply_set(&mut self, key: &str, value: &str) -> Option<String> {
        let prev = self.keys.insert(key.to_owned(), value.to_owned());
        for index in self.indexes.values_mut() {
            if index.matches(key) {
                if let Some(prev) = &prev {
                    index.remove(key, prev);
                }
                index.add(key, value);
            }
        }
        prev
    }

    fn apply_delete(&mut self, key: &str) -> Option<String> {
        let prev = self.keys.remove(key)?;
        for index in self.indexes.values_mut() {
            if index.matches(key) {
                index.remove(key, &prev);
            }
        }
        Some(prev)
    }

    fn commit_records(&mut self, records: &[LogRecord]) -> Result<()> {
        if let Some(aof) = &mut self.aof {
            aof.append(records)?;
            aof.maybe_shrink(&self.keys)?;
        }
        Ok(())
    }
}

enum TxGuard<'store> {
    Read(parking_lot::RwLockReadGuard<'store, Inner>),
    Write(parking_lot::RwLockWriteGuard<'store, Inner>),
}

enum UndoOp {
    /// Restore a key to its pre-transaction value (`None` = absent).
    RestoreKey { key: String, prev: Option<String> },
    /// An index was registered in this transaction.
    AddedIndex(String),
    /// An index was dropped in this transaction.
    DroppedIndex(SecondaryIndex),
}

/// An open transaction. Handed to [`Store::update`] and [`Store::view`]
/// closures; write operations require the exclusive transaction.
pub struct Tx<'store> {
    guard: TxGuard<'store>,
    undo: Vec<UndoOp>,
    redo: Vec<LogRecord>,
}

impl Tx<'_> {
    fn inner(&self) -> &Inner {
        match &self.guard {
            TxGuard::Read(guard) => guard,
            TxGuard::Write(guard) => guard,
        }
    }

    fn inner_mut(&mut self) -> Result<&mut Inner> {
        match &mut self.guard {
            TxGuard::Read(_) => Err(StorageError::ReadOnly),
            TxGuard::Write(guard) => Ok(guard),
        }
    }

    /// Fetch the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner().keys.get(key).cloned()
    }

    /// Number of keys in the keyspace.
    pub fn len(&self) -> usize {
        self.inner().keys.len()
    }

    /// Whether the keyspace is empty.
    pub fn is_empty(&self) -> bool {
        self.inner().keys.is_empty()
    }

    /// Store `value` under `key`. Returns whether an existing value was
    /// replaced.
    pub fn set(&mut self, key: &str, value: &str) -> Result<bool> {
        let prev = self.inner_mut()?.apply_set(key, value);
        let replaced = prev.is_some();
        self.undo.push(UndoOp::RestoreKey { key: key.to_owned(), prev });
        self.redo.push(LogRecord::Set { key: key.to_owned(), value: value.to_owned() });
        Ok(replaced)
    }

    /// Remove `key`. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        let Some(prev) = self.inner_mut()?.apply_delete(key) else {
            return Ok(false);
        };
        self.undo.push(UndoOp::RestoreKey { key: key.to_owned(), prev: Some(prev) });
        self.redo.push(LogRecord::Del { key: key.to_owned() });
        Ok(true)
    }

    /// Register a B-tree secondary index from inside the transaction.
    pub fn create_index(
        &mut self,
        name: &str,
        pattern: &str,
        ordering: ValueOrdering,
    ) -> Result<()> {
        let pattern = Pattern::compile(pattern)?;
        self.inner_mut()?.register(SecondaryIndex::btree(name, pattern, ordering))?;
        self.undo.push(UndoOp::AddedIndex(name.to_owned()));
        Ok(())
    }

    /// Register a spatial secondary index from inside the transaction.
    pub fn create_spatial_index(
        &mut self,
        name: &str,
        pattern: &str,
        extractor: RectExtractor,
    ) -> Result<()> {
        let pattern = Pattern::compile(pattern)?;
        self.inner_mut()?.register(SecondaryIndex::spatial(name, pattern, extractor))?;
        self.undo.push(UndoOp::AddedIndex(name.to_owned()));
        Ok(())
    }

    /// Deregister a secondary index from inside the transaction.
    pub fn drop_index(&mut self, name: &str) -> Result<()> {
        let index = self
            .inner_mut()?
            .indexes
            .remove(name)
            .ok_or_else(|| StorageError::UnknownIndex(name.to_owned()))?;
        self.undo.push(UndoOp::DroppedIndex(index));
        Ok(())
    }

    /// Scan every entry of a secondary index in ascending order. The
    /// callback returns `false` to stop.
    pub fn ascend(&self, index: &str, mut cb: impl FnMut(&str, &str) -> bool) -> Result<()> {
        match &self.index(index)?.kind {
            IndexKind::Btree { entries, .. } => {
                for (entry, value) in entries {
                    if !cb(&entry.key, value) {
                        break;
                    }
                }
            }
            IndexKind::Spatial { entries, .. } => {
                for (key, entry) in entries {
                    if !cb(key, &entry.value) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Scan every entry of a secondary index in descending order.
    pub fn descend(&self, index: &str, mut cb: impl FnMut(&str, &str) -> bool) -> Result<()> {
        match &self.index(index)?.kind {
            IndexKind::Btree { entries, .. } => {
                for (entry, value) in entries.iter().rev() {
                    if !cb(&entry.key, value) {
                        break;
                    }
                }
            }
            IndexKind::Spatial { entries, .. } => {
                for (key, entry) in entries.iter().rev() {
                    if !cb(key, &entry.value) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Scan the entries whose value compares equal to `pivot` under the
    /// index ordering.
    pub fn ascend_equal(
        &self,
        index: &str,
        pivot: &str,
        mut cb: impl FnMut(&str, &str) -> bool,
    ) -> Result<()> {
        match &self.index(index)?.kind {
            IndexKind::Btree { ordering, entries } => {
                let sort = ordering.sort_value(pivot);
                let start = crate::index::BtreeKey { sort: sort.clone(), key: String::new() };
                for (entry, value) in entries.range(start..) {
                    if entry.sort != sort {
                        break;
                    }
                    if !cb(&entry.key, value) {
                        break;
                    }
                }
            }
            IndexKind::Spatial { entries, .. } => {
                for (key, entry) in entries {
                    if entry.value == pivot && !cb(key, &entry.value) {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Scan main-keyspace keys matching a single-`*` pattern in key order.
    pub fn ascend_keys(&self, pattern: &str, mut cb: impl FnMut(&str, &str) -> bool) -> Result<()> {
        let pattern = Pattern::compile(pattern)?;
        let prefix = pattern.prefix().to_owned();
        for (key, value) in self.inner().keys.range(prefix.clone()..) {
            if !key.starts_with(prefix.as_str()) {
                break;
            }
            if pattern.matches(key) && !cb(key, value) {
                break;
            }
        }
        Ok(())
    }

    /// Visit every entry of a spatial index whose rectangle intersects
    /// `rect`.
    pub fn intersects(
        &self,
        index: &str,
        rect: &Rect,
        mut cb: impl FnMut(&str, &str) -> bool,
    ) -> Result<()> {
        match &self.index(index)?.kind {
            IndexKind::Spatial { tree, entries, .. } => {
                tree.search(rect, &mut |key, _| match entries.get(key) {
                    Some(entry) => cb(key, &entry.value),
                    None => true,
                });
                Ok(())
            }
            IndexKind::Btree { .. } => Err(StorageError::NotSpatial(index.to_owned())),
        }
    }

    fn index(&self, name: &str) -> Result<&SecondaryIndex> {
        self.inner()
            .indexes
            .get(name)
            .ok_or_else(|| StorageError::UnknownIndex(name.to_owned()))
    }

    fn commit(mut self) -> Result<()> {
        let redo = std::mem::take(&mut self.redo);
        if redo.is_empty() {
            return Ok(());
        }
        let result = match &mut self.guard {
            TxGuard::Write(guard) => guard.commit_records(&redo),
            TxGuard::Read(_) => Ok(()),
        };
        if result.is_err() {
            self.rollback_effects();
        }
        result
    }

    fn rollback_effects(&mut self) {
        let TxGuard::Write(guard) = &mut self.guard else { return };
        let inner: &mut Inner = guard;
        for op in self.undo.drain(..).rev() {
            match op {
                UndoOp::RestoreKey { key, prev: Some(value) } => {
                    inner.apply_set(&key, &value);
                }
                UndoOp::RestoreKey { key, prev: None } => {
                    inner.apply_delete(&key);
                }
                UndoOp::AddedIndex(name) => {
                    inner.indexes.remove(&name);
                }
                UndoOp::DroppedIndex(index) => {
                    inner.indexes.insert(index.name.clone(), index);
                }
            }
        }
        self.redo.clear();
    }
}
