//! The capability contract every storage backend implements.

use crate::catalog::{Database, TableType};
use crate::compare::Collation;
use crate::deadlock::DeadlockCheck;
use crate::error::TableError;
use crate::index::{Index, IndexColumn, IndexType};
use crate::row::Row;
use crate::session::{Session, UndoOp};
use crate::Result;
use std::sync::Arc;
use tessera_data_structures::map::IntSet;
use tessera_primitives::{ColId, IndexId, SessionId};

/// The storage side of a table: locking, row mutation, indexes, and sizing.
///
/// The shared catalog state of a table lives in [`crate::Table`],
/// which holds an engine and delegates storage operations to it.
pub trait TableEngine: Send + Sync {
    /// Blocks until `session` holds the requested lock mode on the table.
    ///
    /// `force` bypasses the relaxed locking of multi-version engines.
    /// Fails with [`TableError::LockTimeout`] or [`TableError::Deadlock`].
    fn lock(&self, session: &dyn Session, exclusive: bool, force: bool) -> Result<()>;

    /// Flushes and releases the resources of the table.
    fn close(&self, session: &dyn Session) -> Result<()>;

    /// Releases any lock `session` holds on the table.
    fn unlock(&self, session: &dyn Session);

    /// Creates an index; with `create` set, it is populated from the stored rows.
    #[allow(clippy::too_many_arguments)]
    fn add_index(
        &self,
        session: &dyn Session,
        name: &str,
        id: IndexId,
        columns: &[IndexColumn],
        index_type: IndexType,
        create: bool,
        comment: Option<&str>,
    ) -> Result<Arc<dyn Index>>;

    /// Detaches an index, returning it if it was attached.
    fn remove_index(&self, id: IndexId) -> Option<Arc<dyn Index>>;

    /// Deletes `row` from storage and all indexes.
    fn remove_row(&self, session: &dyn Session, row: &Row) -> Result<()>;

    /// Removes all rows.
    fn truncate(&self, session: &dyn Session) -> Result<()>;

    /// Inserts `row` into storage and all indexes, assigning its key if unset.
    ///
    /// Fails on a uniqueness conflict,
    /// or with [`TableError::ConcurrentUpdate`] under optimistic concurrency control.
    fn add_row(&self, session: &dyn Session, row: &mut Row) -> Result<()>;

    /// Fails if structural `ALTER` is unsupported.
    fn check_support_alter(&self) -> Result<()>;

    fn table_type(&self) -> TableType;

    fn scan_index(&self, session: &dyn Session) -> Arc<dyn Index>;

    fn unique_index(&self) -> Option<Arc<dyn Index>>;

    /// All indexes; the scan index comes first.
    fn indexes(&self) -> Vec<Arc<dyn Index>>;

    fn is_locked_exclusively(&self) -> bool;

    /// Increases with every modification of the stored data.
    fn max_data_modification_id(&self) -> u64;

    fn is_deterministic(&self) -> bool;

    fn can_get_row_count(&self) -> bool;

    fn can_drop(&self) -> bool;

    fn row_count(&self, session: &dyn Session) -> Result<u64>;

    fn row_count_approximation(&self) -> u64;

    fn disk_space_used(&self) -> u64;

    /// Finalizes a tentative write. Only multi-version engines need this.
    fn commit(&self, _op: UndoOp, _row: &Row) {}

    fn can_reference(&self) -> bool {
        true
    }

    fn can_truncate(&self) -> bool {
        false
    }

    fn is_global_temporary(&self) -> bool {
        false
    }

    fn is_locked_exclusively_by(&self, _session: SessionId) -> bool {
        false
    }

    /// The column that exposes the row key, if the engine has one.
    fn row_id_column(&self) -> Option<ColId> {
        None
    }

    /// Is `session`, waiting for a lock of this table, on a wait-for cycle back to `clash`?
    ///
    /// Engines without locking never deadlock.
    fn check_deadlock(
        &self,
        _session: SessionId,
        _clash: Option<SessionId>,
        _visited: &mut IntSet<SessionId>,
    ) -> DeadlockCheck {
        DeadlockCheck::NoCycle
    }

    /// The `CREATE TABLE` statement for a copy of this table named `table_name`.
    fn create_sql_for_copy(&self, table_name: &str, _quoted_name: &str) -> Result<String> {
        Err(TableError::Internal(format!(
            "{} does not support copying `{table_name}`",
            self.table_type()
        )))
    }

    /// The collation tables over this engine compare text with,
    /// unless the catalog sets a comparison mode.
    fn collation(&self) -> Collation {
        Collation::default()
    }

    fn check_writing_allowed(&self, database: &dyn Database) -> Result<()> {
        database.check_writing_allowed()
    }
}
