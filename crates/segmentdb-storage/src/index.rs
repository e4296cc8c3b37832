//! Secondary index registrations.
//!
//! An index is a named key *pattern* (one `*` wildcard) plus either a B-tree
//! ordered by the stored values or an R-tree keyed by rectangles extracted
//! from them. Registration backfills from the keys already in the store, so
//! indexes can be re-registered over a replayed keyspace after a restart.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Result, StorageError};
use crate::ordering::{SortValue, ValueOrdering};
use crate::rect::Rect;
use crate::rtree::RTree;

/// Extracts the bounding rectangle a spatial index files a value under.
pub type RectExtractor = Arc<dyn Fn(&str) -> Rect + Send + Sync>;

/// A compiled single-`*` key pattern.
#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    prefix: String,
    suffix: String,
}

impl Pattern {
    pub(crate) fn compile(pattern: &str) -> Result<Self> {
        let mut parts = pattern.split('*');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(prefix), Some(suffix), None) => {
                Ok(Self { prefix: prefix.to_owned(), suffix: suffix.to_owned() })
            }
            _ => Err(StorageError::InvalidPattern(pattern.to_owned())),
        }
    }

    pub(crate) fn matches(&self, key: &str) -> bool {
        key.len() >= self.prefix.len() + self.suffix.len()
            && key.starts_with(&self.prefix)
            && key.ends_with(&self.suffix)
    }

    /// The literal prefix, used to bound ordered key scans.
    pub(crate) fn prefix(&self) -> &str {
        &self.prefix
    }
}

/// Composite B-tree key: value sort key first, entry key as tiebreak.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct BtreeKey {
    pub(crate) sort: SortValue,
    pub(crate) key: String,
}

#[derive(Debug, Clone)]
pub(crate) struct SpatialEntry {
    pub(crate) rect: Rect,
    pub(crate) value: String,
}

pub(crate) enum IndexKind {
    Btree { ordering: ValueOrdering, entries: BTreeMap<BtreeKey, String> },
    Spatial { extractor: RectExtractor, tree: RTree, entries: BTreeMap<String, SpatialEntry> },
}

pub(crate) struct SecondaryIndex {
    pub(crate) name: String,
    pub(crate) pattern: Pattern,
    pub(crate) kind: IndexKind,
}

impl SecondaryIndex {
    pub(crate) fn btree(name: &str, pattern: Pattern, ordering: ValueOrdering) -> Self {
        Self {
            name: name.to_owned(),
            pattern,
            kind: IndexKind::Btree { ordering, entries: BTreeMap::new() },
        }
    }

    pub(crate) fn spatial(name: &str, pattern: Pattern, extractor: RectExtractor) -> Self {
        Self {
            name: name.to_owned(),
            pattern,
            kind: IndexKind::Spatial { extractor, tree: RTree::new(), entries: BTreeMap::new() },
        }
    }

    pub(crate) fn matches(&self, key: &str) -> bool {
        self.pattern.matches(key)
    }

    /// Index every matching key of an existing keyspace.
    pub(crate) fn backfill(&mut self, keys: &BTreeMap<String, String>) {
        let prefix = self.pattern.prefix().to_owned();
        for (key, value) in keys.range(prefix.clone()..) {
            if !key.starts_with(prefix.as_str()) {
                break;
            }
            if self.pattern.matches(key) {
                self.add(key, value);
            }
        }
    }

    pub(crate) fn add(&mut self, key: &str, value: &str) {
        match &mut self.kind {
            IndexKind::Btree { ordering, entries } => {
                let sort = ordering.sort_value(value);
                entries.insert(BtreeKey { sort, key: key.to_owned() }, value.to_owned());
            }
            IndexKind::Spatial { extractor, tree, entries } => {
                let rect = extractor(value);
                tree.insert(rect.clone(), key.to_owned());
                entries.insert(key.to_owned(), SpatialEntry { rect, value: value.to_owned() });
            }
        }
    }

    pub(crate) fn remove(&mut self, key: &str, value: &str) {
        match &mut self.kind {
            IndexKind::Btree { ordering, entries } => {
                let sort = ordering.sort_value(value);
                entries.remove(&BtreeKey { sort, key: key.to_owned() });
            }
            IndexKind::Spatial { tree, entries, .. } => {
                if let Some(entry) = entries.remove(key) {
                    tree.remove(&entry.rect, key);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_prefix_wildcard() {
        let p = Pattern::compile("3:*").unwrap();
        assert!(p.matches("3:name:pk:0"));
        assert!(!p.matches("30:name:pk:0"));
        assert!(!p.matches("2:name:pk:0"));
    }

    #[test]
    fn pattern_requires_exactly_one_wildcard() {
        assert!(Pattern::compile("a:*:*").is_err());
        assert!(Pattern::compile("no-wildcard").is_err());
        assert!(Pattern::compile("*").is_ok());
    }

    #[test]
    fn btree_backfill_orders_by_value() {
        let mut keys = BTreeMap::new();
        keys.insert("n:a".to_owned(), "9".to_owned());
        keys.insert("n:b".to_owned(), "10".to_owned());
        keys.insert("other".to_owned(), "1".to_owned());

        let mut index = SecondaryIndex::btree(
            "n",
            Pattern::compile("n:*").unwrap(),
            ValueOrdering::Int,
        );
        index.backfill(&keys);

        let IndexKind::Btree { entries, .. } = &index.kind else { unreachable!() };
        let order: Vec<_> = entries.keys().map(|k| k.key.clone()).collect();
        assert_eq!(order, vec!["n:a", "n:b"]);
    }
}
