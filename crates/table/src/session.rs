//! The transaction context a table mutates rows under.

use crate::error::TableError;
use crate::row::Row;
use crate::value::Value;
use crate::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tessera_primitives::{SessionId, TableId};

/// Long row batches poll for cancellation once per this many rows.
pub const CANCEL_CHECK_INTERVAL: usize = 128;

/// The kind of row operation an undo record reverts.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UndoOp {
    /// The row was inserted; undo removes it.
    Insert,
    /// The row was deleted; undo re-inserts it.
    Delete,
}

/// One entry of a session's undo log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoLogRecord {
    pub table: TableId,
    pub op: UndoOp,
    pub row: Row,
}

/// A session, i.e. one connection's transaction context.
///
/// The session owns the undo log; the table appends to it
/// and rolls it back to savepoints, but never reads it.
pub trait Session: Send + Sync {
    fn id(&self) -> SessionId;

    /// The current length of the undo log, usable as a savepoint.
    fn undo_log_pos(&self) -> usize;

    /// Appends an undo record for `row` of `table`.
    fn log(&self, table: TableId, op: UndoOp, row: Row) -> Result<()>;

    /// Undoes every operation logged after `savepoint`, most recent first.
    ///
    /// With `trim_to_size` unset, the undo log keeps its allocated capacity.
    fn rollback_to(&self, savepoint: usize, trim_to_size: bool) -> Result<()>;

    /// Remembers the value most recently drawn from an identity sequence.
    fn set_last_identity(&self, _value: &Value) {}
}

/// The statement a batch operation runs on behalf of.
pub trait Statement {
    /// Fails with [`TableError::StatementCanceled`] if the statement was canceled.
    fn check_canceled(&self) -> Result<()>;
}

/// A cancellation flag shared between a running statement and whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Statement for CancelHandle {
    fn check_canceled(&self) -> Result<()> {
        if self.is_canceled() {
            return Err(TableError::StatementCanceled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_observed_by_clones() {
        let handle = CancelHandle::new();
        let statement = handle.clone();
        assert_eq!(statement.check_canceled(), Ok(()));
        handle.cancel();
        assert_eq!(statement.check_canceled(), Err(TableError::StatementCanceled));
    }
}
