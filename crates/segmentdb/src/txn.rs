//! Transaction façade.
//!
//! A [`Txn`] batches ordered [`Action`]s and settles them under a single
//! substrate transaction: a write transaction when `safe`, a read
//! transaction otherwise. Actions run in insertion order; the first error
//! aborts and rolls the whole batch back.

use segmentdb_storage::Tx;

use crate::database::Database;
use crate::error::Result;

/// One step of a batched transaction.
pub(crate) trait Action {
    fn call(&self, tx: &mut Tx<'_>) -> Result<()>;
}

pub(crate) struct Txn<'db> {
    db: &'db Database,
    safe: bool,
    stack: Vec<Box<dyn Action>>,
}

impl<'db> Txn<'db> {
    pub(crate) fn new(db: &'db Database, safe: bool) -> Self {
        Self { db, safe, stack: Vec::new() }
    }

    pub(crate) fn add_action(&mut self, action: Box<dyn Action>) {
        self.stack.push(action);
    }

    #[allow(dead_code)]
    pub(crate) fn reset(&mut self) {
        self.stack.clear();
    }

    pub(crate) fn settle(&self) -> Result<()> {
        let run = |tx: &mut Tx<'_>| {
            for action in &self.stack {
                action.call(tx)?;
            }
            Ok(())
        };

        if self.safe {
            self.db.inner.engine.update(run)
        } else {
            self.db.inner.engine.view(run)
        }
    }
}
