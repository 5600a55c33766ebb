use crate::config::Options;
use crate::deadlock::{find_cycle, DeadlockCheck, WaitForGraph};
use crate::error::TableError;
use crate::Result;
use itertools::Itertools as _;
use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;
use std::time::Instant;
use tessera_data_structures::map::{HashCollectionExt as _, IntMap, IntSet};
use tessera_primitives::{SessionId, TableId};

/// The holders of the lock of one table.
#[derive(Debug, Default)]
struct TableLock {
    exclusive: Option<SessionId>,
    shared: IntSet<SessionId>,
}

impl TableLock {
    fn try_acquire(&mut self, session: SessionId, exclusive: bool) -> bool {
        match self.exclusive {
            Some(holder) => holder == session,
            None if exclusive => {
                let sole_reader = self.shared.is_empty() || (self.shared.len() == 1 && self.shared.contains(&session));
                if sole_reader {
                    self.exclusive = Some(session);
                }
                sole_reader
            }
            None => {
                self.shared.insert(session);
                true
            }
        }
    }

    fn holders(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.shared.iter().copied().chain(self.exclusive)
    }

    fn is_free(&self) -> bool {
        self.exclusive.is_none() && self.shared.is_empty()
    }
}

#[derive(Debug, Default)]
struct LockState {
    tables: IntMap<TableId, TableLock>,
    /// The table each blocked session waits for.
    waiting: IntMap<SessionId, TableId>,
}

impl WaitForGraph for LockState {
    fn blockers(&self, session: SessionId) -> SmallVec<[SessionId; 4]> {
        self.waiting
            .get(&session)
            .and_then(|table| self.tables.get(table))
            .into_iter()
            .flat_map(|lock| lock.holders())
            .filter(|&holder| holder != session)
            .collect()
    }
}

/// The table locks of a database, shared by the engines of all its tables.
///
/// A session may hold a shared or an exclusive lock per table,
/// and may upgrade from shared to exclusive when it is the only reader.
/// A blocked session is checked for deadlocks before each wait.
#[derive(Debug)]
pub struct TableLockManager {
    state: Mutex<LockState>,
    released: Condvar,
    options: Options,
}

impl TableLockManager {
    pub fn new(options: Options) -> Self {
        Self {
            state: Mutex::new(LockState {
                tables: IntMap::new(),
                waiting: IntMap::new(),
            }),
            released: Condvar::new(),
            options,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Blocks until `session` holds the lock of `table`
    /// in the requested mode, or the lock timeout expires.
    ///
    /// Under multi-version concurrency control, unless `force` is set,
    /// shared requests lock nothing and exclusive requests only lock shared.
    pub fn lock(&self, table: TableId, table_name: &str, session: SessionId, exclusive: bool, force: bool) -> Result<()> {
        let exclusive = match (self.options.multi_version && !force, exclusive) {
            (true, false) => return Ok(()),
            (true, true) => false,
            (false, exclusive) => exclusive,
        };
        let deadline = Instant::now() + self.options.lock_timeout;
        let mut state = self.state.lock();
        loop {
            if state.tables.entry(table).or_default().try_acquire(session, exclusive) {
                state.waiting.remove(&session);
                log::trace!("TABLE LOCKED: {table_name}, session: {session}, exclusive: {exclusive}");
                return Ok(());
            }

            state.waiting.insert(session, table);
            if let DeadlockCheck::Cycle(sessions) = find_cycle(&*state, session, None, &mut IntSet::new()) {
                state.waiting.remove(&session);
                let sessions = sessions.iter().join(", ");
                log::warn!("TABLE LOCK DEADLOCK: {table_name}, sessions: {sessions}");
                return Err(TableError::Deadlock {
                    table: table_name.into(),
                    sessions,
                });
            }

            if self.released.wait_until(&mut state, deadline).timed_out()
                && !state.tables.entry(table).or_default().try_acquire(session, exclusive)
            {
                state.waiting.remove(&session);
                log::debug!("TABLE LOCK TIMEOUT: {table_name}, session: {session}");
                return Err(TableError::LockTimeout(table_name.into()));
            }
        }
    }

    /// Releases the lock `session` holds on `table`, waking up waiting sessions.
    pub fn unlock(&self, table: TableId, session: SessionId) {
        let mut state = self.state.lock();
        let Some(lock) = state.tables.get_mut(&table) else {
            return;
        };
        if lock.exclusive == Some(session) {
            lock.exclusive = None;
        }
        lock.shared.remove(&session);
        if lock.is_free() {
            state.tables.remove(&table);
        }
        drop(state);
        self.released.notify_all();
    }

    pub fn is_locked_exclusively(&self, table: TableId) -> bool {
        self.state
            .lock()
            .tables
            .get(&table)
            .is_some_and(|lock| lock.exclusive.is_some())
    }

    pub fn is_locked_exclusively_by(&self, table: TableId, session: SessionId) -> bool {
        self.state
            .lock()
            .tables
            .get(&table)
            .is_some_and(|lock| lock.exclusive == Some(session))
    }

    /// Continues a deadlock search through the current wait-for graph.
    pub fn check_deadlock(
        &self,
        session: SessionId,
        clash: Option<SessionId>,
        visited: &mut IntSet<SessionId>,
    ) -> DeadlockCheck {
        find_cycle(&*self.state.lock(), session, clash, visited)
    }
}
