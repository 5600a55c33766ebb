//! Doubles for the services a [`Table`] calls into, and helpers to build tables over them.

use crate::catalog::{Database, DbObjectId, Right, TableType};
use crate::column::Column;
use crate::compare::{Collation, CompareMode};
use crate::config::Options;
use crate::constraint::{Constraint, ConstraintKind};
use crate::deadlock::DeadlockCheck;
use crate::engine::TableEngine;
use crate::error::TableError;
use crate::index::{Index, IndexColumn, IndexType};
use crate::memory::{MemoryEngine, TableLockManager};
use crate::row::Row;
use crate::session::{Session, UndoLogRecord, UndoOp};
use crate::table::{Table, TableDef};
use crate::trigger::{Trigger, TriggerEvents};
use crate::value::Value;
use crate::Result;
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tessera_data_structures::map::{HashCollectionExt as _, IntMap, IntSet};
use tessera_primitives::{ColId, ConstraintId, IndexId, RightId, SchemaId, SequenceId, SessionId, TableId, TriggerId};

/// A session with an in-memory undo log.
///
/// Rolling back replays the log backwards against the engines registered with [`TestSession::register`].
pub struct TestSession {
    id: SessionId,
    undo_log: Mutex<Vec<UndoLogRecord>>,
    engines: Mutex<IntMap<TableId, Arc<dyn TableEngine>>>,
    last_identity: Mutex<Option<Value>>,
}

impl TestSession {
    pub fn new(id: u32) -> Self {
        Self {
            id: SessionId(id),
            undo_log: Mutex::new(Vec::new()),
            engines: Mutex::new(IntMap::new()),
            last_identity: Mutex::new(None),
        }
    }

    /// Lets rollbacks reach the rows of `table`.
    pub fn register(&self, table: TableId, engine: Arc<dyn TableEngine>) {
        self.engines.lock().insert(table, engine);
    }

    pub fn undo_log(&self) -> Vec<UndoLogRecord> {
        self.undo_log.lock().clone()
    }

    pub fn last_identity(&self) -> Option<Value> {
        self.last_identity.lock().clone()
    }
}

impl Session for TestSession {
    fn id(&self) -> SessionId {
        self.id
    }

    fn undo_log_pos(&self) -> usize {
        self.undo_log.lock().len()
    }

    fn log(&self, table: TableId, op: UndoOp, row: Row) -> Result<()> {
        self.undo_log.lock().push(UndoLogRecord { table, op, row });
        Ok(())
    }

    fn rollback_to(&self, savepoint: usize, trim_to_size: bool) -> Result<()> {
        let undone = {
            let mut log = self.undo_log.lock();
            let len = log.len();
            let undone = log.split_off(savepoint.min(len));
            if trim_to_size {
                log.shrink_to_fit();
            }
            undone
        };
        for record in undone.into_iter().rev() {
            let engine = self
                .engines
                .lock()
                .get(&record.table)
                .cloned()
                .ok_or_else(|| TableError::Internal(format!("no engine registered for table {}", record.table)))?;
            match record.op {
                UndoOp::Insert => engine.remove_row(self, &record.row)?,
                UndoOp::Delete => engine.add_row(self, &mut record.row.clone())?,
            }
        }
        Ok(())
    }

    fn set_last_identity(&self, value: &Value) {
        *self.last_identity.lock() = Some(value.clone());
    }
}

/// A call a table made into its [`TestDatabase`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogEvent {
    RemoveSchemaObject(DbObjectId),
    RemoveDatabaseObject(DbObjectId),
    RemoveMeta(TableId),
    Update(DbObjectId),
}

/// A database that records the catalog calls it receives.
#[derive(Default)]
pub struct TestDatabase {
    events: Mutex<Vec<CatalogEvent>>,
    rights: Mutex<Vec<Right>>,
    sequence_users: Mutex<Vec<(SequenceId, TableId)>>,
    read_only: AtomicBool,
    compare_mode: Option<CompareMode>,
}

impl TestDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compare_mode(compare_mode: CompareMode) -> Self {
        Self {
            compare_mode: Some(compare_mode),
            ..Self::default()
        }
    }

    pub fn events(&self) -> Vec<CatalogEvent> {
        self.events.lock().clone()
    }

    pub fn add_right(&self, id: u32, grantee: &str, granted_table: Option<TableId>) {
        self.rights.lock().push(Right {
            id: RightId(id),
            grantee: grantee.into(),
            granted_table,
        });
    }

    /// Records that `table` uses `sequence`.
    pub fn use_sequence(&self, sequence: SequenceId, table: TableId) {
        self.sequence_users.lock().push((sequence, table));
    }

    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::Relaxed);
    }

    fn record(&self, event: CatalogEvent) {
        self.events.lock().push(event);
    }
}

impl Database for TestDatabase {
    fn remove_schema_object(&self, _: &dyn Session, object: DbObjectId) -> Result<()> {
        self.record(CatalogEvent::RemoveSchemaObject(object));
        Ok(())
    }

    fn remove_database_object(&self, _: &dyn Session, object: DbObjectId) -> Result<()> {
        if let DbObjectId::Right(id) = object {
            self.rights.lock().retain(|r| r.id != id);
        }
        self.record(CatalogEvent::RemoveDatabaseObject(object));
        Ok(())
    }

    fn remove_meta(&self, _: &dyn Session, table: TableId) -> Result<()> {
        self.record(CatalogEvent::RemoveMeta(table));
        Ok(())
    }

    fn update(&self, _: &dyn Session, object: DbObjectId) -> Result<()> {
        self.record(CatalogEvent::Update(object));
        Ok(())
    }

    fn rights(&self) -> Vec<Right> {
        self.rights.lock().clone()
    }

    fn dependent_table(&self, sequence: SequenceId, except: TableId) -> Option<TableId> {
        self.sequence_users
            .lock()
            .iter()
            .find(|(s, t)| *s == sequence && *t != except)
            .map(|(_, t)| *t)
    }

    fn is_read_only(&self) -> bool {
        self.read_only.load(Ordering::Relaxed)
    }

    fn compare_mode(&self) -> Option<CompareMode> {
        self.compare_mode
    }
}

/// The entries row triggers and constraints append as they run, shared between them.
pub type FireLog = Arc<Mutex<Vec<String>>>;

/// A trigger that logs `"<name> <before|after>[ rollback]"` when it fires.
#[derive(Debug)]
pub struct RecordingTrigger {
    pub id: TriggerId,
    pub name: Box<str>,
    pub events: TriggerEvents,
    pub before: bool,
    pub row_based: bool,
    /// Handle the row change instead of letting it reach storage.
    pub instead_of: bool,
    pub log: FireLog,
}

impl RecordingTrigger {
    /// A row trigger on insert, update, and delete.
    pub fn row(id: u32, name: &str, before: bool, log: &FireLog) -> Self {
        Self {
            id: TriggerId(id),
            name: name.into(),
            events: TriggerEvents::INSERT | TriggerEvents::UPDATE | TriggerEvents::DELETE,
            before,
            row_based: true,
            instead_of: false,
            log: log.clone(),
        }
    }

    pub fn instead_of(mut self) -> Self {
        self.instead_of = true;
        self
    }
}

impl Trigger for RecordingTrigger {
    fn id(&self) -> TriggerId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> TriggerEvents {
        self.events
    }

    fn is_before(&self) -> bool {
        self.before
    }

    fn is_row_based(&self) -> bool {
        self.row_based
    }

    fn fire(&self, _: &dyn Session, _: TriggerEvents, before: bool) -> Result<()> {
        let phase = if before { "before" } else { "after" };
        self.log.lock().push(format!("{} {phase} statement", self.name));
        Ok(())
    }

    fn fire_row(&self, _: &dyn Session, _: Option<&Row>, _: Option<&Row>, rollback: bool) -> Result<bool> {
        let phase = if self.before { "before" } else { "after" };
        let suffix = if rollback { " rollback" } else { "" };
        self.log.lock().push(format!("{} {phase}{suffix}", self.name));
        Ok(self.instead_of)
    }
}

/// A constraint that logs `"<name> checked"` and rejects rows holding `reject` in `column`.
#[derive(Debug)]
pub struct RecordingConstraint {
    pub id: ConstraintId,
    pub name: Box<str>,
    pub before: bool,
    pub column: ColId,
    pub reject: Option<Value>,
    pub log: FireLog,
}

impl RecordingConstraint {
    pub fn new(id: u32, name: &str, before: bool, column: u32, log: &FireLog) -> Self {
        Self {
            id: ConstraintId(id),
            name: name.into(),
            before,
            column: ColId(column),
            reject: None,
            log: log.clone(),
        }
    }

    pub fn rejecting(mut self, value: impl Into<Value>) -> Self {
        self.reject = Some(value.into());
        self
    }
}

impl Constraint for RecordingConstraint {
    fn id(&self) -> ConstraintId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ConstraintKind {
        ConstraintKind::Check
    }

    fn is_before(&self) -> bool {
        self.before
    }

    fn check_row(&self, _: &dyn Session, _: &Table, _: Option<&Row>, new: Option<&Row>) -> Result<()> {
        self.log.lock().push(format!("{} checked", self.name));
        match (new, &self.reject) {
            (Some(row), Some(reject)) if row.value(self.column.idx()) == reject => {
                Err(TableError::CheckConstraintViolated {
                    constraint: self.name.clone(),
                    detail: row.to_string(),
                })
            }
            _ => Ok(()),
        }
    }

    fn referenced_columns(&self, _: &Table) -> SmallVec<[ColId; 2]> {
        SmallVec::from_elem(self.column, 1)
    }

    fn check_existing_data(&self, session: &dyn Session, table: &Table) -> Result<()> {
        for row in table.scan_index(session).rows(session)? {
            self.check_row(session, table, None, Some(&row))?;
        }
        Ok(())
    }

    fn sql(&self) -> String {
        format!("CONSTRAINT \"{}\" CHECK (\"{}\")", self.name, self.column)
    }
}

/// A [`MemoryEngine`] that fails inserts of rows holding `poison`
/// with [`TableError::ConcurrentUpdate`], as an optimistic engine would on a conflict.
pub struct ConflictingEngine {
    pub inner: Arc<MemoryEngine>,
    pub poison: Value,
    pub table_name: Box<str>,
}

impl TableEngine for ConflictingEngine {
    fn lock(&self, session: &dyn Session, exclusive: bool, force: bool) -> Result<()> {
        self.inner.lock(session, exclusive, force)
    }

    fn close(&self, session: &dyn Session) -> Result<()> {
        self.inner.close(session)
    }

    fn unlock(&self, session: &dyn Session) {
        self.inner.unlock(session)
    }

    fn add_index(
        &self,
        session: &dyn Session,
        name: &str,
        id: IndexId,
        columns: &[IndexColumn],
        index_type: IndexType,
        create: bool,
        comment: Option<&str>,
    ) -> Result<Arc<dyn Index>> {
        self.inner
            .add_index(session, name, id, columns, index_type, create, comment)
    }

    fn remove_index(&self, id: IndexId) -> Option<Arc<dyn Index>> {
        self.inner.remove_index(id)
    }

    fn remove_row(&self, session: &dyn Session, row: &Row) -> Result<()> {
        self.inner.remove_row(session, row)
    }

    fn truncate(&self, session: &dyn Session) -> Result<()> {
        self.inner.truncate(session)
    }

    fn add_row(&self, session: &dyn Session, row: &mut Row) -> Result<()> {
        if row.values().any(|v| *v == self.poison) {
            return Err(TableError::ConcurrentUpdate {
                table: self.table_name.clone(),
            });
        }
        self.inner.add_row(session, row)
    }

    fn check_support_alter(&self) -> Result<()> {
        self.inner.check_support_alter()
    }

    fn table_type(&self) -> TableType {
        self.inner.table_type()
    }

    fn scan_index(&self, session: &dyn Session) -> Arc<dyn Index> {
        self.inner.scan_index(session)
    }

    fn unique_index(&self) -> Option<Arc<dyn Index>> {
        self.inner.unique_index()
    }

    fn indexes(&self) -> Vec<Arc<dyn Index>> {
        self.inner.indexes()
    }

    fn is_locked_exclusively(&self) -> bool {
        self.inner.is_locked_exclusively()
    }

    fn max_data_modification_id(&self) -> u64 {
        self.inner.max_data_modification_id()
    }

    fn is_deterministic(&self) -> bool {
        self.inner.is_deterministic()
    }

    fn can_get_row_count(&self) -> bool {
        self.inner.can_get_row_count()
    }

    fn can_drop(&self) -> bool {
        self.inner.can_drop()
    }

    fn row_count(&self, session: &dyn Session) -> Result<u64> {
        self.inner.row_count(session)
    }

    fn row_count_approximation(&self) -> u64 {
        self.inner.row_count_approximation()
    }

    fn disk_space_used(&self) -> u64 {
        self.inner.disk_space_used()
    }

    fn check_deadlock(&self, session: SessionId, clash: Option<SessionId>, visited: &mut IntSet<SessionId>) -> DeadlockCheck {
        self.inner.check_deadlock(session, clash, visited)
    }

    fn collation(&self) -> Collation {
        self.inner.collation()
    }
}

/// A table over a fresh [`MemoryEngine`], with everything a test needs to inspect it.
pub struct TestTable {
    pub table: Table,
    pub engine: Arc<MemoryEngine>,
    pub database: Arc<TestDatabase>,
    pub session: TestSession,
}

/// Options with a lock timeout short enough for tests that expect to time out.
pub fn test_options() -> Options {
    Options {
        lock_timeout: Duration::from_millis(50),
        ..Options::default()
    }
}

/// Builds table `name` with id `id` over a memory engine,
/// registered with a session of id 1 for rollbacks.
pub fn memory_table(id: u32, name: &str, columns: Vec<Column>) -> Result<TestTable> {
    let database = Arc::new(TestDatabase::new());
    let locks = Arc::new(TableLockManager::new(test_options()));
    let engine = Arc::new(MemoryEngine::new(TableId(id), name, locks));
    let table = Table::new(
        TableDef::new(SchemaId(0), TableId(id), name, columns),
        database.clone(),
        engine.clone(),
    )?;
    let session = TestSession::new(1);
    session.register(TableId(id), engine.clone());
    Ok(TestTable {
        table,
        engine,
        database,
        session,
    })
}

/// Like [`memory_table`], but inserts of rows holding `poison` fail with a concurrent update.
pub fn conflicting_table(id: u32, name: &str, columns: Vec<Column>, poison: impl Into<Value>) -> Result<TestTable> {
    let database = Arc::new(TestDatabase::new());
    let locks = Arc::new(TableLockManager::new(test_options()));
    let engine = Arc::new(MemoryEngine::new(TableId(id), name, locks));
    let conflicting = Arc::new(ConflictingEngine {
        inner: engine.clone(),
        poison: poison.into(),
        table_name: name.into(),
    });
    let table = Table::new(
        TableDef::new(SchemaId(0), TableId(id), name, columns),
        database.clone(),
        conflicting,
    )?;
    let session = TestSession::new(1);
    session.register(TableId(id), engine.clone());
    Ok(TestTable {
        table,
        engine,
        database,
        session,
    })
}
