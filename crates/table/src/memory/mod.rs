//! An in-memory [`TableEngine`]: rows live in a map keyed by [`RowKey`],
//! secondary indexes are ordered multimaps, and locks are table-level.

mod index;
mod lock;
mod multimap;

pub use index::{IndexKey, ScanIndex, TreeIndex};
pub use lock::TableLockManager;
pub use multimap::MultiMap;

use crate::catalog::TableType;
use crate::compare::Collation;
use crate::deadlock::DeadlockCheck;
use crate::error::TableError;
use crate::index::{Index, IndexColumn, IndexType};
use crate::row::{Row, RowKey};
use crate::session::Session;
use crate::Result;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tessera_data_structures::map::IntSet;
use tessera_primitives::{IndexId, SessionId, TableId};

/// The id of the scan index of every memory table.
pub const SCAN_INDEX_ID: IndexId = IndexId(0);

pub struct MemoryEngine {
    table: TableId,
    name: Box<str>,
    scan: Arc<ScanIndex>,
    indexes: RwLock<Vec<Arc<TreeIndex>>>,
    /// Serializes row mutations across the scan index and the secondary indexes.
    mutation: Mutex<()>,
    next_key: AtomicU64,
    modification_id: AtomicU64,
    locks: Arc<TableLockManager>,
}

impl MemoryEngine {
    pub fn new(table: TableId, name: &str, locks: Arc<TableLockManager>) -> Self {
        Self {
            table,
            name: name.into(),
            scan: Arc::new(ScanIndex::new(SCAN_INDEX_ID, table, name)),
            indexes: RwLock::new(Vec::new()),
            mutation: Mutex::new(()),
            next_key: AtomicU64::new(0),
            modification_id: AtomicU64::new(0),
            locks,
        }
    }

    /// A snapshot of all stored rows, in key order.
    pub fn rows(&self) -> Vec<Row> {
        self.scan.snapshot()
    }

    pub fn get(&self, key: RowKey) -> Option<Row> {
        self.scan.get(key)
    }

    fn modified(&self) {
        self.modification_id.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("table", &self.table)
            .field("name", &self.name)
            .field("rows", &self.scan.len())
            .field("indexes", &self.indexes.read().len())
            .finish()
    }
}

impl crate::engine::TableEngine for MemoryEngine {
    fn lock(&self, session: &dyn Session, exclusive: bool, force: bool) -> Result<()> {
        self.locks.lock(self.table, &self.name, session.id(), exclusive, force)
    }

    fn close(&self, _session: &dyn Session) -> Result<()> {
        Ok(())
    }

    fn unlock(&self, session: &dyn Session) {
        self.locks.unlock(self.table, session.id());
    }

    fn add_index(
        &self,
        _session: &dyn Session,
        name: &str,
        id: IndexId,
        columns: &[IndexColumn],
        index_type: IndexType,
        create: bool,
        comment: Option<&str>,
    ) -> Result<Arc<dyn Index>> {
        if columns.is_empty() {
            return Err(TableError::Internal(format!("index `{name}` on `{}` has no columns", self.name)));
        }
        let _guard = self.mutation.lock();
        if id == SCAN_INDEX_ID || self.indexes.read().iter().any(|idx| idx.id() == id) {
            return Err(TableError::Internal(format!("index id {id} is already taken in `{}`", self.name)));
        }
        let index = Arc::new(TreeIndex::new(
            id,
            name,
            &self.name,
            columns,
            index_type,
            comment,
            self.scan.clone(),
        ));
        if create {
            for row in self.scan.snapshot() {
                let key = row
                    .key
                    .ok_or_else(|| TableError::Internal(format!("stored row without key in `{}`", self.name)))?;
                index.insert(&row, key)?;
            }
        }
        log::trace!("INDEX CREATED: {name}, table: {}", self.name);
        self.indexes.write().push(index.clone());
        Ok(index)
    }

    fn remove_index(&self, id: IndexId) -> Option<Arc<dyn Index>> {
        let mut indexes = self.indexes.write();
        let pos = indexes.iter().position(|idx| idx.id() == id)?;
        let index = indexes.remove(pos);
        log::trace!("INDEX DROPPED: {}, table: {}", index.name(), self.name);
        Some(index)
    }

    fn remove_row(&self, _session: &dyn Session, row: &Row) -> Result<()> {
        let _guard = self.mutation.lock();
        let not_found = || TableError::RowNotFound(self.name.clone());
        let key = row.key.ok_or_else(not_found)?;
        let stored = self.scan.remove(key).ok_or_else(not_found)?;
        for index in self.indexes.read().iter() {
            index.remove(&stored, key);
        }
        self.modified();
        Ok(())
    }

    fn truncate(&self, _session: &dyn Session) -> Result<()> {
        let _guard = self.mutation.lock();
        self.scan.clear();
        for index in self.indexes.read().iter() {
            index.clear();
        }
        self.modified();
        Ok(())
    }

    fn add_row(&self, _session: &dyn Session, row: &mut Row) -> Result<()> {
        let _guard = self.mutation.lock();
        let key = match row.key {
            Some(key) if self.scan.contains(key) => {
                return Err(TableError::Internal(format!(
                    "row key {key} already exists in `{}`",
                    self.name
                )));
            }
            Some(key) => {
                self.next_key.fetch_max(key.0 + 1, Ordering::Relaxed);
                key
            }
            None => RowKey(self.next_key.fetch_add(1, Ordering::Relaxed)),
        };

        let indexes = self.indexes.read();
        for (i, index) in indexes.iter().enumerate() {
            if let Err(e) = index.insert(row, key) {
                for index in &indexes[..i] {
                    index.remove(row, key);
                }
                return Err(e);
            }
        }
        row.key = Some(key);
        self.scan.insert(key, row.clone());
        self.modified();
        Ok(())
    }

    fn check_support_alter(&self) -> Result<()> {
        Ok(())
    }

    fn table_type(&self) -> TableType {
        TableType::Table
    }

    fn scan_index(&self, _session: &dyn Session) -> Arc<dyn Index> {
        self.scan.clone()
    }

    fn unique_index(&self) -> Option<Arc<dyn Index>> {
        self.indexes
            .read()
            .iter()
            .find(|idx| idx.index_type().unique)
            .map(|idx| idx.clone() as Arc<dyn Index>)
    }

    fn indexes(&self) -> Vec<Arc<dyn Index>> {
        let indexes = self.indexes.read();
        let mut all: Vec<Arc<dyn Index>> = Vec::with_capacity(indexes.len() + 1);
        all.push(self.scan.clone());
        all.extend(indexes.iter().map(|idx| idx.clone() as Arc<dyn Index>));
        all
    }

    fn is_locked_exclusively(&self) -> bool {
        self.locks.is_locked_exclusively(self.table)
    }

    fn is_locked_exclusively_by(&self, session: SessionId) -> bool {
        self.locks.is_locked_exclusively_by(self.table, session)
    }

    fn max_data_modification_id(&self) -> u64 {
        self.modification_id.load(Ordering::Relaxed)
    }

    fn is_deterministic(&self) -> bool {
        true
    }

    fn can_get_row_count(&self) -> bool {
        true
    }

    fn can_drop(&self) -> bool {
        true
    }

    fn can_truncate(&self) -> bool {
        true
    }

    fn row_count(&self, _session: &dyn Session) -> Result<u64> {
        Ok(self.scan.len() as u64)
    }

    fn row_count_approximation(&self) -> u64 {
        self.scan.len() as u64
    }

    fn disk_space_used(&self) -> u64 {
        0
    }

    fn check_deadlock(
        &self,
        session: SessionId,
        clash: Option<SessionId>,
        visited: &mut IntSet<SessionId>,
    ) -> DeadlockCheck {
        self.locks.check_deadlock(session, clash, visited)
    }

    fn collation(&self) -> Collation {
        self.locks.options().collation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::engine::TableEngine;
    use crate::test_utils::TestSession;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn engine() -> MemoryEngine {
        MemoryEngine::new(TableId(1), "T", Arc::new(TableLockManager::new(Options::default())))
    }

    fn row(id: i32, name: &str) -> Row {
        [Value::Int(id), Value::from(name)].into_iter().collect()
    }

    #[test]
    fn add_row_assigns_increasing_keys() {
        let session = TestSession::new(1);
        let engine = engine();
        let mut a = row(1, "a");
        let mut b = row(2, "b");
        engine.add_row(&session, &mut a).unwrap();
        engine.add_row(&session, &mut b).unwrap();
        assert_eq!(a.key, Some(RowKey(0)));
        assert_eq!(b.key, Some(RowKey(1)));

        let mut c = row(3, "c");
        c.key = Some(RowKey(10));
        engine.add_row(&session, &mut c).unwrap();
        let mut d = row(4, "d");
        engine.add_row(&session, &mut d).unwrap();
        assert_eq!(d.key, Some(RowKey(11)));
        assert_eq!(engine.max_data_modification_id(), 4);
    }

    #[test]
    fn unique_conflict_leaves_no_trace() {
        let session = TestSession::new(1);
        let engine = engine();
        engine
            .add_index(&session, "BY_NAME", IndexId(1), &[IndexColumn::asc(1u32)], IndexType::non_unique(), true, None)
            .unwrap();
        engine
            .add_index(&session, "BY_ID", IndexId(2), &[IndexColumn::asc(0u32)], IndexType::unique(), true, None)
            .unwrap();
        engine.add_row(&session, &mut row(1, "a")).unwrap();

        let err = engine.add_row(&session, &mut row(1, "b")).unwrap_err();
        assert!(err.is_constraint_violation(), "{err}");
        assert_eq!(engine.rows().len(), 1);
        let by_name = &engine.indexes()[1];
        assert_eq!(by_name.row_count(&session), 1);
    }

    #[test]
    fn remove_row_requires_stored_key() {
        let session = TestSession::new(1);
        let engine = engine();
        let mut a = row(1, "a");
        assert_eq!(
            engine.remove_row(&session, &a),
            Err(TableError::RowNotFound("T".into()))
        );
        engine.add_row(&session, &mut a).unwrap();
        engine.remove_row(&session, &a).unwrap();
        assert_eq!(engine.row_count(&session), Ok(0));
    }

    #[test]
    fn created_index_is_populated() {
        let session = TestSession::new(1);
        let engine = engine();
        for (id, name) in [(2, "b"), (1, "a")] {
            engine.add_row(&session, &mut row(id, name)).unwrap();
        }
        let index = engine
            .add_index(&session, "BY_ID", IndexId(1), &[IndexColumn::asc(0u32)], IndexType::unique(), true, None)
            .unwrap();
        let ids: Vec<_> = index.rows(&session).unwrap().iter().map(|r| r.value(0).clone()).collect();
        assert_eq!(ids, [Value::Int(1), Value::Int(2)]);
        assert_eq!(engine.unique_index().map(|i| i.id()), Some(IndexId(1)));

        assert!(engine.remove_index(IndexId(1)).is_some());
        assert!(engine.remove_index(IndexId(1)).is_none());
        assert_eq!(engine.indexes().len(), 1);
    }

    #[test]
    fn truncate_clears_everything() {
        let session = TestSession::new(1);
        let engine = engine();
        engine
            .add_index(&session, "BY_ID", IndexId(1), &[IndexColumn::asc(0u32)], IndexType::unique(), true, None)
            .unwrap();
        engine.add_row(&session, &mut row(1, "a")).unwrap();
        engine.truncate(&session).unwrap();
        assert_eq!(engine.row_count(&session), Ok(0));
        engine.add_row(&session, &mut row(1, "a")).unwrap();
    }
}
