//! The lookup engine.
//!
//! A lookup answers a [`Predicate`] — a conjunction of per-field probes —
//! with the set of matching primary values, streamed through [`Iter`]. One
//! batch runs the whole intersection inside a single read transaction:
//! scalar probes scan their field's B-tree index with `ascend_equal`,
//! geometric probes query the R-tree with `intersects`, and a running
//! intersection narrows the candidate set field by field. The buffer keeps
//! the first field's observation order, so result order is the first
//! probe's scan order.

use std::collections::HashSet;
use std::collections::VecDeque;

use segmentdb_storage::Rect;
use tracing::warn;

use crate::codec;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::index::Index;
use crate::key::{self, Key};
use crate::schema::{Predicate, Segment};

/// A prepared lookup, optionally bound to an index.
pub struct Lookup {
    db: Database,
    index: Option<Index>,
    predicate: Predicate,
    keys_only: bool,
}

impl Database {
    /// Look up matching primary values. Keys-only: the fastest path.
    pub fn lookup(&self, index_name: &str, predicate: &Predicate) -> Result<Iter> {
        Ok(Lookup::new(self, predicate.clone(), true).run_on_index(index_name))
    }

    /// Look up matching segments. Slower than [`Database::lookup`]: every
    /// key costs an extra segment fetch and decode.
    pub fn lookup_segments(&self, index_name: &str, predicate: &Predicate) -> Result<Iter> {
        Ok(Lookup::new(self, predicate.clone(), false).run_on_index(index_name))
    }
}

impl Index {
    /// Look up matching primary values in this index.
    pub fn lookup(&self, predicate: &Predicate) -> Result<Iter> {
        self.db.lookup(&self.definition.name, predicate)
    }

    /// Look up matching segments in this index.
    pub fn lookup_segments(&self, predicate: &Predicate) -> Result<Iter> {
        self.db.lookup_segments(&self.definition.name, predicate)
    }
}

impl Lookup {
    /// A lookup with no index binding; bind one with [`Lookup::bind`] or run
    /// it directly on a named index.
    #[must_use]
    pub fn new(db: &Database, predicate: Predicate, keys_only: bool) -> Self {
        Self { db: db.clone(), index: None, predicate, keys_only }
    }

    /// Bind the lookup to an index handle.
    #[must_use]
    pub fn bind(mut self, index: &Index) -> Self {
        self.index = Some(index.clone());
        self
    }

    /// Run against the bound index. An unbound lookup yields an iterator
    /// whose every `next` fails with [`Error::IndexNotSet`].
    #[must_use]
    pub fn run(self) -> Iter {
        match &self.index {
            Some(index) => {
                let name = index.definition().name.clone();
                self.run_on_index(&name)
            }
            None => Iter::failed(self, Error::IndexNotSet),
        }
    }

    /// Run against a named index.
    #[must_use]
    pub fn run_on_index(self, index_name: &str) -> Iter {
        Iter::new(index_name.to_owned(), self)
    }
}

enum IterState {
    /// No batch has run yet.
    Fresh,
    /// The buffer is populated and draining.
    Batched,
    /// The last buffered key was returned; the next call reports the end.
    Armed,
    /// End of stream was reported.
    Terminal,
    /// A failure occurred; it is sticky.
    Failed(Error),
}

/// A resumable iterator over lookup results.
///
/// `next` returns `Ok(Some(primary_value))` per match, `Ok(None)` at end of
/// stream, and repeats the same error forever once one occurs.
pub struct Iter {
    index_name: String,
    lookup: Lookup,
    keys: VecDeque<String>,
    state: IterState,
}

impl Iter {
    fn new(index_name: String, lookup: Lookup) -> Self {
        Self { index_name, lookup, keys: VecDeque::new(), state: IterState::Fresh }
    }

    fn failed(lookup: Lookup, error: Error) -> Self {
        Self {
            index_name: String::new(),
            lookup,
            keys: VecDeque::new(),
            state: IterState::Failed(error),
        }
    }

    /// Advance to the next matching primary value.
    ///
    /// On the first call the full lookup batch runs under one read
    /// transaction. For a segments lookup, the stored segment is fetched and
    /// merged into `dst` when one is supplied; keys-only lookups leave `dst`
    /// untouched.
    pub fn next(&mut self, dst: Option<&mut Segment>) -> Result<Option<String>> {
        match &self.state {
            IterState::Fresh => match run_batch(&self.lookup, &self.index_name) {
                Ok(keys) => {
                    self.keys = keys.into();
                    self.state = IterState::Batched;
                    self.pop(dst)
                }
                Err(Error::LookupEmpty) => {
                    self.state = IterState::Terminal;
                    Ok(None)
                }
                Err(e) => {
                    self.state = IterState::Failed(e);
                    Err(e)
                }
            },
            IterState::Batched => self.pop(dst),
            IterState::Armed => {
                self.state = IterState::Terminal;
                Ok(None)
            }
            IterState::Terminal => Ok(None),
            IterState::Failed(e) => Err(*e),
        }
    }

    fn pop(&mut self, dst: Option<&mut Segment>) -> Result<Option<String>> {
        let Some(primary) = self.keys.pop_front() else {
            self.state = IterState::Terminal;
            return Ok(None);
        };
        if self.keys.is_empty() {
            self.state = IterState::Armed;
        }

        if !self.lookup.keys_only {
            if let Some(dst) = dst {
                match self.fetch_segment(&primary) {
                    Ok(segment) => dst.merge_from(&segment),
                    Err(e) => {
                        warn!(index = %self.index_name, primary = %primary, "segment row missing during lookup");
                        self.state = IterState::Failed(e);
                        return Err(e);
                    }
                }
            }
        }

        Ok(Some(primary))
    }

    /// Fetch and decode the stored segment for a matched key. A missing or
    /// undecodable row indicates corruption or a racing delete.
    fn fetch_segment(&self, primary: &str) -> Result<Segment> {
        let text = self.lookup.db.inner.engine.view(|tx| {
            let id = tx
                .get(&key::join(&[key::INDEX_ID_BY_NAME, &self.index_name]))
                .ok_or(Error::SegmentMissing)?;
            tx.get(&key::join(&[key::SEGMENT_BY_PRIMARY, &id, primary]))
                .ok_or(Error::SegmentMissing)
        })?;
        Segment::decode(&text).map_err(|_| Error::SegmentMissing)
    }
}

/// One full lookup batch under a single read transaction.
fn run_batch(lookup: &Lookup, index_name: &str) -> Result<Vec<String>> {
    let predicate = &lookup.predicate;
    if predicate.fields.is_empty() {
        return Err(Error::LookupEmpty);
    }

    lookup.db.inner.engine.view(|tx| {
        let id =
            tx.get(&key::join(&[key::INDEX_ID_BY_NAME, index_name])).ok_or(Error::Internal)?;

        // Buffer of matches in first-field observation order, plus the
        // membership set the running intersection filters against.
        let mut buffer: Vec<String> = Vec::new();
        let mut reference: HashSet<String> = HashSet::new();

        for (position, field) in predicate.fields.iter().enumerate() {
            let first = position == 0;
            let field_index = key::join(&[&id, &field.name]);

            let mut encoded = Vec::new();
            codec::encode_value(&field.value, &mut |_, text| {
                encoded.push(text);
                true
            });

            let mut matched: HashSet<String> = HashSet::new();
            for value in &encoded {
                let collect = |row: &str, _: &str| {
                    let parsed = Key::parse(row);
                    let Some(primary) = parsed.segment_key() else { return true };
                    if first || reference.contains(primary) {
                        if !matched.contains(primary) {
                            if first {
                                buffer.push(primary.to_owned());
                            }
                            matched.insert(primary.to_owned());
                        }
                    }
                    true
                };

                let scanned = if field.value.is_geometric() {
                    tx.intersects(&field_index, &Rect::parse(value), collect)
                } else {
                    tx.ascend_equal(&field_index, value, collect)
                };
                scanned.map_err(|_| Error::LookupFailure)?;
            }

            if !first {
                buffer.retain(|primary| matched.contains(primary));
            }
            if buffer.is_empty() {
                return Err(Error::LookupEmpty);
            }
            reference = matched;
        }

        Ok(buffer)
    })
}
