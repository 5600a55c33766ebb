use crate::catalog::{Database, DbObjectId, TableType, TableView};
use crate::column::Column;
use crate::compare::CompareMode;
use crate::constraint::Constraint;
use crate::deadlock::DeadlockCheck;
use crate::engine::TableEngine;
use crate::error::TableError;
use crate::expr::DependencyVisitor;
use crate::index::{Index, IndexColumn, IndexCondition, IndexType, PlanItem, SortOrder};
use crate::row::{Row, SearchRow};
use crate::sequence::Sequence;
use crate::session::{Session, Statement, UndoOp, CANCEL_CHECK_INTERVAL};
use crate::trigger::{Trigger, TriggerEvents};
use crate::value::{DataType, Value};
use crate::Result;
use core::cmp::Ordering;
use once_cell::sync::OnceCell;
use std::borrow::Cow;
use std::sync::Arc;
use tessera_data_structures::map::{Entry, HashCollectionExt as _, HashMap, HashSet, IntSet};
use tessera_primitives::{ColId, ConstraintId, IndexId, SchemaId, SequenceId, SessionId, TableId, TriggerId, ViewId};

/// The creation data of a [`Table`].
#[derive(Debug, Clone)]
pub struct TableDef {
    pub schema: SchemaId,
    pub id: TableId,
    pub name: Box<str>,
    pub columns: Vec<Column>,
    pub persist_indexes: bool,
    pub persist_data: bool,
    pub temporary: bool,
}

impl TableDef {
    /// A persistent table.
    pub fn new(schema: SchemaId, id: TableId, name: impl Into<Box<str>>, columns: Vec<Column>) -> Self {
        Self {
            schema,
            id,
            name: name.into(),
            columns,
            persist_indexes: true,
            persist_data: true,
            temporary: false,
        }
    }
}

/// The two halves of the bracket around a row mutation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FirePhase {
    Before,
    After,
}

/// A table: its columns and the objects attached to it,
/// over a [`TableEngine`] that stores its rows.
///
/// Structural changes (`&mut self`) are expected to run under the schema lock of the caller.
/// Row operations (`&self`) may run concurrently; the engine makes them safe.
pub struct Table {
    id: TableId,
    schema: SchemaId,
    name: Box<str>,
    database: Arc<dyn Database>,
    engine: Arc<dyn TableEngine>,
    columns: Vec<Column>,
    /// Always in sync with `columns`.
    column_map: HashMap<Box<str>, ColId>,
    persist_indexes: bool,
    persist_data: bool,
    temporary: bool,
    compare_mode: CompareMode,
    hidden: bool,
    table_engine: Option<Box<str>>,
    on_commit_drop: bool,
    on_commit_truncate: bool,
    check_foreign_key_constraints: bool,
    constraints: Vec<Arc<dyn Constraint>>,
    triggers: Vec<Arc<dyn Trigger>>,
    sequences: Vec<Arc<Sequence>>,
    views: Vec<Arc<TableView>>,
    /// Built on first use; reset whenever the columns change.
    null_row: OnceCell<Arc<Row>>,
}

impl Table {
    pub fn new(def: TableDef, database: Arc<dyn Database>, engine: Arc<dyn TableEngine>) -> Result<Self> {
        let TableDef {
            schema,
            id,
            name,
            columns,
            persist_indexes,
            persist_data,
            temporary,
        } = def;
        let mut table = Self {
            id,
            schema,
            name,
            compare_mode: database
                .compare_mode()
                .unwrap_or_else(|| CompareMode::new(engine.collation())),
            database,
            engine,
            columns: Vec::new(),
            column_map: HashMap::new(),
            persist_indexes,
            persist_data,
            temporary,
            hidden: false,
            table_engine: None,
            on_commit_drop: false,
            on_commit_truncate: false,
            check_foreign_key_constraints: true,
            constraints: Vec::new(),
            triggers: Vec::new(),
            sequences: Vec::new(),
            views: Vec::new(),
            null_row: OnceCell::new(),
        };
        table.set_columns(columns)?;
        log::trace!("TABLE CREATED: {}, table_id: {id}", table.name);
        Ok(table)
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    pub fn schema(&self) -> SchemaId {
        self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the table and lets every constraint regenerate its definition.
    pub fn rename(&mut self, new_name: &str) -> Result<()> {
        let old = core::mem::replace(&mut self.name, new_name.into());
        for constraint in &self.constraints {
            constraint.rebuild()?;
        }
        log::trace!("TABLE RENAMED: {old} -> {new_name}, table_id: {}", self.id);
        Ok(())
    }

    pub fn engine(&self) -> &Arc<dyn TableEngine> {
        &self.engine
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.database
    }

    // Columns.

    /// Installs `columns`, replacing the current ones.
    ///
    /// Fails with [`TableError::UnknownDataType`] if a column has no resolved type,
    /// or with [`TableError::DuplicateColumnName`] if two columns share a name.
    /// On failure, the current columns are kept.
    pub fn set_columns(&mut self, columns: Vec<Column>) -> Result<()> {
        self.install_columns(columns, true)
    }

    /// Like [`Table::set_columns`], but accepts columns whose type is not resolved yet.
    pub fn set_columns_no_check(&mut self, columns: Vec<Column>) -> Result<()> {
        self.install_columns(columns, false)
    }

    fn install_columns(&mut self, mut columns: Vec<Column>, check_types: bool) -> Result<()> {
        let mut column_map = HashMap::with_capacity(columns.len());
        for (pos, column) in columns.iter_mut().enumerate() {
            if check_types && column.data_type() == DataType::Unknown {
                return Err(TableError::UnknownDataType(column.sql()));
            }
            column.set_table(self.id, ColId::from(pos));
            match column_map.entry(Box::<str>::from(column.name())) {
                Entry::Occupied(_) => return Err(TableError::DuplicateColumnName(column.name().into())),
                Entry::Vacant(slot) => {
                    slot.insert(ColId::from(pos));
                }
            }
        }
        self.columns = columns;
        self.column_map = column_map;
        self.null_row = OnceCell::new();
        log::trace!("TABLE COLUMNS SET: {}, columns: {}", self.name, self.columns.len());
        Ok(())
    }

    /// Renames a column, failing with [`TableError::DuplicateColumnName`]
    /// if a sibling already has `new_name`.
    pub fn rename_column(&mut self, column: ColId, new_name: &str) -> Result<()> {
        if self
            .columns
            .iter()
            .any(|c| c.position() != column && c.name() == new_name)
        {
            return Err(TableError::DuplicateColumnName(new_name.into()));
        }
        let Some(col) = self.columns.get_mut(column.idx()) else {
            return Err(TableError::ColumnNotFound(column.to_string().into()));
        };
        self.column_map.remove(col.name());
        col.set_name(new_name.into());
        self.column_map.insert(new_name.into(), column);
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the column at `id`.
    ///
    /// `id` must be a valid position for this table's rows.
    pub fn column(&self, id: ColId) -> &Column {
        &self.columns[id.idx()]
    }

    pub fn column_by_name(&self, name: &str) -> Result<&Column> {
        match self.column_map.get(name) {
            Some(id) => Ok(self.column(*id)),
            None => Err(TableError::ColumnNotFound(name.into())),
        }
    }

    pub fn does_column_exist(&self, name: &str) -> bool {
        self.column_map.contains_key(name)
    }

    /// A row as wide as this table, with every slot unset.
    pub fn template_row(&self) -> Row {
        Row::template(self.columns.len())
    }

    pub fn template_search_row(&self) -> SearchRow {
        SearchRow::template(self.columns.len())
    }

    /// Returns the row of all NULLs used to pad outer joins.
    pub fn null_row(&self) -> Arc<Row> {
        self.null_row
            .get_or_init(|| Arc::new(Row::nulls(self.columns.len())))
            .clone()
    }

    /// Drops the constraints and indexes that reference only `column`,
    /// ahead of dropping the column itself.
    ///
    /// Fails with [`TableError::ColumnIsReferenced`], before dropping anything,
    /// if a constraint or index references `column` together with other columns.
    pub fn drop_single_column_constraints_and_indexes(&mut self, session: &dyn Session, column: ColId) -> Result<()> {
        let mut constraints_to_drop = Vec::new();
        for constraint in &self.constraints {
            let columns = constraint.referenced_columns(self);
            if !columns.contains(&column) {
                continue;
            }
            if columns.len() > 1 {
                return Err(TableError::ColumnIsReferenced(constraint.sql()));
            }
            constraints_to_drop.push(constraint.id());
        }
        let mut indexes_to_drop = Vec::new();
        for index in self.engine.indexes() {
            let Some(sql) = index.create_sql() else {
                continue;
            };
            if index.column_index(column).is_none() {
                continue;
            }
            if index.columns().len() > 1 {
                return Err(TableError::ColumnIsReferenced(sql));
            }
            indexes_to_drop.push(index.id());
        }

        for id in constraints_to_drop {
            self.database.remove_schema_object(session, DbObjectId::Constraint(id))?;
            self.remove_constraint(id);
        }
        for id in indexes_to_drop {
            // Dropping a constraint may have taken its index along.
            if self.engine.indexes().iter().any(|i| i.id() == id) {
                self.database.remove_schema_object(session, DbObjectId::Index(id))?;
                self.remove_index(id);
            }
        }
        Ok(())
    }

    // Flags.

    pub fn is_persist_indexes(&self) -> bool {
        self.persist_indexes
    }

    pub fn is_persist_data(&self) -> bool {
        self.persist_data
    }

    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    pub fn set_temporary(&mut self, temporary: bool) {
        self.temporary = temporary;
    }

    /// Hidden tables are left out of catalog listings and dumps.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        self.hidden = hidden;
    }

    pub fn table_engine(&self) -> Option<&str> {
        self.table_engine.as_deref()
    }

    pub fn set_table_engine(&mut self, table_engine: Option<&str>) {
        self.table_engine = table_engine.map(Into::into);
    }

    pub fn on_commit_drop(&self) -> bool {
        self.on_commit_drop
    }

    pub fn set_on_commit_drop(&mut self, on_commit_drop: bool) {
        self.on_commit_drop = on_commit_drop;
    }

    pub fn on_commit_truncate(&self) -> bool {
        self.on_commit_truncate
    }

    pub fn set_on_commit_truncate(&mut self, on_commit_truncate: bool) {
        self.on_commit_truncate = on_commit_truncate;
    }

    pub fn compare_mode(&self) -> &CompareMode {
        &self.compare_mode
    }

    pub fn check_foreign_key_constraints(&self) -> bool {
        self.check_foreign_key_constraints
    }

    /// Turns foreign key checking on or off.
    ///
    /// Turning it on with `check_existing` first validates the stored rows
    /// against every constraint, and leaves the flag unchanged if that fails.
    pub fn set_check_foreign_key_constraints(
        &mut self,
        session: &dyn Session,
        enabled: bool,
        check_existing: bool,
    ) -> Result<()> {
        if enabled && check_existing {
            for constraint in &self.constraints {
                constraint.check_existing_data(session, self)?;
            }
        }
        self.check_foreign_key_constraints = enabled;
        Ok(())
    }

    pub fn check_writing_allowed(&self) -> Result<()> {
        self.engine.check_writing_allowed(&*self.database)
    }

    // Planning.

    /// Picks the cheapest access path for a query.
    ///
    /// The scan index is the baseline.
    /// Other indexes are only considered when the query has predicate `masks`,
    /// and must be strictly cheaper to win, so ties keep the earlier index.
    pub fn best_plan_item(
        &self,
        session: &dyn Session,
        masks: Option<&[IndexCondition]>,
        sort: Option<&SortOrder>,
    ) -> PlanItem {
        let scan = self.engine.scan_index(session);
        let mut best = PlanItem {
            cost: scan.cost(session, None, None),
            index: scan,
        };
        if let Some(masks) = masks {
            for index in self.engine.indexes().into_iter().skip(1) {
                let cost = index.cost(session, Some(masks), sort);
                if cost < best.cost {
                    best = PlanItem { index, cost };
                }
            }
        }
        best
    }

    pub fn find_primary_key(&self) -> Option<Arc<dyn Index>> {
        self.engine
            .indexes()
            .into_iter()
            .find(|index| index.index_type().primary_key)
    }

    pub fn primary_key(&self) -> Result<Arc<dyn Index>> {
        self.find_primary_key()
            .ok_or_else(|| TableError::IndexNotFound(format!("PRIMARY KEY of {}", self.name).into()))
    }

    /// Returns the first index led by `column` that can return its first or last row directly.
    pub fn index_for_column(&self, column: ColId) -> Option<Arc<dyn Index>> {
        self.engine
            .indexes()
            .into_iter()
            .skip(1)
            .find(|index| index.can_get_first_or_last() && index.column_index(column) == Some(0))
    }

    // Indexes.

    /// Creates an index on the engine.
    /// The columns of a primary key index become primary key columns.
    #[allow(clippy::too_many_arguments)]
    pub fn add_index(
        &mut self,
        session: &dyn Session,
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
        for c in columns {
            let column = self
                .columns
                .get(c.column.idx())
                .ok_or_else(|| TableError::ColumnNotFound(c.column.to_string().into()))?;
            if index_type.primary_key && column.is_nullable() {
                return Err(TableError::NullNotAllowed(column.name().into()));
            }
        }
        let index = self
            .engine
            .add_index(session, name, id, columns, index_type, create, comment)?;
        if index_type.primary_key {
            for c in columns {
                if let Some(column) = self.columns.get_mut(c.column.idx()) {
                    column.set_primary_key(true);
                }
            }
        }
        log::trace!("INDEX CREATED: {name}, index_id: {id}, table: {}", self.name);
        Ok(index)
    }

    /// Detaches an index from the engine.
    /// Dropping the primary key clears the primary key flag of its columns.
    pub fn remove_index(&mut self, id: IndexId) -> Option<Arc<dyn Index>> {
        let index = self.engine.remove_index(id)?;
        if index.index_type().primary_key {
            for c in index.columns() {
                if let Some(column) = self.columns.get_mut(c.column.idx()) {
                    column.set_primary_key(false);
                }
            }
        }
        log::trace!("INDEX DROPPED: {id}, table: {}", self.name);
        Some(index)
    }

    /// Drops an index unless a constraint still enforces itself through it,
    /// in which case that constraint becomes its owner.
    pub fn remove_index_or_transfer_ownership(&mut self, session: &dyn Session, id: IndexId) -> Result<()> {
        let mut still_needed = false;
        for constraint in &self.constraints {
            if constraint.uses_index(id) {
                constraint.set_index_owner(id);
                self.database
                    .update(session, DbObjectId::Constraint(constraint.id()))?;
                still_needed = true;
            }
        }
        if !still_needed {
            self.database.remove_schema_object(session, DbObjectId::Index(id))?;
            self.remove_index(id);
        }
        Ok(())
    }

    // Attached objects.

    pub fn views(&self) -> &[Arc<TableView>] {
        &self.views
    }

    pub fn add_view(&mut self, view: Arc<TableView>) {
        self.views.push(view);
    }

    pub fn remove_view(&mut self, id: ViewId) -> Option<Arc<TableView>> {
        let pos = self.views.iter().position(|v| v.id == id)?;
        Some(self.views.remove(pos))
    }

    pub fn constraints(&self) -> &[Arc<dyn Constraint>] {
        &self.constraints
    }

    /// Attaches a constraint, unless one with the same id already is.
    pub fn add_constraint(&mut self, constraint: Arc<dyn Constraint>) {
        if self.constraints.iter().any(|c| c.id() == constraint.id()) {
            log::trace!("CONSTRAINT ALREADY ATTACHED: {}, table: {}", constraint.id(), self.name);
            return;
        }
        self.constraints.push(constraint);
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Option<Arc<dyn Constraint>> {
        let pos = self.constraints.iter().position(|c| c.id() == id)?;
        Some(self.constraints.remove(pos))
    }

    pub fn sequences(&self) -> &[Arc<Sequence>] {
        &self.sequences
    }

    pub fn add_sequence(&mut self, sequence: Arc<Sequence>) {
        self.sequences.push(sequence);
    }

    pub fn remove_sequence(&mut self, id: SequenceId) -> Option<Arc<Sequence>> {
        let pos = self.sequences.iter().position(|s| s.id() == id)?;
        Some(self.sequences.remove(pos))
    }

    pub fn triggers(&self) -> &[Arc<dyn Trigger>] {
        &self.triggers
    }

    pub fn add_trigger(&mut self, trigger: Arc<dyn Trigger>) {
        self.triggers.push(trigger);
    }

    pub fn remove_trigger(&mut self, id: TriggerId) -> Option<Arc<dyn Trigger>> {
        let pos = self.triggers.iter().position(|t| t.id() == id)?;
        Some(self.triggers.remove(pos))
    }

    // Firing.

    /// Is there any row-level work around mutations at all?
    pub fn fire_row(&self) -> bool {
        !self.constraints.is_empty() || !self.triggers.is_empty()
    }

    pub fn has_select_trigger(&self) -> bool {
        self.triggers.iter().any(|t| t.is_select_trigger())
    }

    /// Fires the statement-level triggers registered for `events`.
    pub fn fire(&self, session: &dyn Session, events: TriggerEvents, before: bool) -> Result<()> {
        for trigger in &self.triggers {
            if !trigger.is_row_based() && trigger.is_before() == before && trigger.events().intersects(events) {
                trigger.fire(session, events, before)?;
            }
        }
        Ok(())
    }

    /// Runs the before half of the bracket around a row mutation.
    ///
    /// Returns `true` if a trigger handled the mutation itself;
    /// the caller must then skip the storage mutation.
    pub fn fire_before_row(&self, session: &dyn Session, old: Option<&Row>, new: Option<&Row>) -> Result<bool> {
        self.fire_row_phase(FirePhase::Before, session, old, new, false)
    }

    /// Runs the after half of the bracket around a row mutation.
    ///
    /// With `rollback` set, the mutation undoes earlier work:
    /// triggers still fire, constraints are not checked.
    pub fn fire_after_row(
        &self,
        session: &dyn Session,
        old: Option<&Row>,
        new: Option<&Row>,
        rollback: bool,
    ) -> Result<()> {
        self.fire_row_phase(FirePhase::After, session, old, new, rollback)
            .map(drop)
    }

    fn fire_row_phase(
        &self,
        phase: FirePhase,
        session: &dyn Session,
        old: Option<&Row>,
        new: Option<&Row>,
        rollback: bool,
    ) -> Result<bool> {
        let before = phase == FirePhase::Before;
        let handled = self.fire_row_triggers(session, old, new, before, rollback)?;
        let check_constraints = match (phase, rollback) {
            (FirePhase::Before, false) => !handled,
            (FirePhase::After, false) => true,
            // Rows being undone were checked when first written.
            (FirePhase::Before, true) | (FirePhase::After, true) => false,
        };
        if check_constraints {
            for constraint in &self.constraints {
                if constraint.is_before() == before {
                    constraint.check_row(session, self, old, new)?;
                }
            }
        }
        Ok(handled)
    }

    /// Fires the row triggers of one phase in registration order,
    /// stopping at the first that handles the mutation.
    fn fire_row_triggers(
        &self,
        session: &dyn Session,
        old: Option<&Row>,
        new: Option<&Row>,
        before: bool,
        rollback: bool,
    ) -> Result<bool> {
        let events = TriggerEvents::of_row_change(old, new);
        for trigger in &self.triggers {
            if !trigger.is_row_based() || trigger.is_before() != before || !trigger.events().intersects(events) {
                continue;
            }
            if trigger.fire_row(session, old, new, rollback)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // Row mutation.

    /// Applies an update as delete-then-reinsert of every `(old, new)` pair.
    ///
    /// All old rows are removed before any new row is inserted,
    /// so rows trading unique keys never collide.
    /// If an insert hits a concurrent update,
    /// the session is rolled back to where the update started before the error is returned.
    pub fn update_rows(
        &self,
        statement: &dyn Statement,
        session: &dyn Session,
        rows: &mut [(Row, Row)],
    ) -> Result<()> {
        let savepoint = session.undo_log_pos();
        let mut scanned = 0usize;
        let mut check_canceled = || {
            scanned += 1;
            if scanned % CANCEL_CHECK_INTERVAL == 0 {
                statement.check_canceled()?;
            }
            Ok::<_, TableError>(())
        };

        for (old, _) in rows.iter() {
            check_canceled()?;
            self.engine.remove_row(session, old)?;
            session.log(self.id, UndoOp::Delete, old.clone())?;
        }
        for (_, new) in rows.iter_mut() {
            check_canceled()?;
            if let Err(e) = self.engine.add_row(session, new) {
                if e.is_concurrent_update() {
                    log::debug!(
                        "TABLE UPDATE ROLLED BACK: {}, savepoint: {savepoint}, cause: {e}",
                        self.name
                    );
                    session.rollback_to(savepoint, false)?;
                }
                return Err(e);
            }
            session.log(self.id, UndoOp::Insert, new.clone())?;
        }
        Ok(())
    }

    /// Inserts one row: defaults and conversions, the before bracket,
    /// storage, the undo log, and the after bracket.
    ///
    /// Returns `false` if a trigger handled the insert instead.
    pub fn insert(&self, session: &dyn Session, row: &mut Row) -> Result<bool> {
        self.check_writing_allowed()?;
        self.lock(session, true, false)?;
        self.validate_convert_update_sequence(session, row)?;
        let fire = self.fire_row();
        if fire && self.fire_before_row(session, None, Some(row))? {
            return Ok(false);
        }
        self.engine.add_row(session, row)?;
        session.log(self.id, UndoOp::Insert, row.clone())?;
        if fire {
            self.fire_after_row(session, None, Some(row), false)?;
        }
        Ok(true)
    }

    /// Deletes one stored row.
    ///
    /// Returns `false` if a trigger handled the delete instead.
    pub fn delete(&self, session: &dyn Session, row: &Row) -> Result<bool> {
        self.check_writing_allowed()?;
        self.lock(session, true, false)?;
        let fire = self.fire_row();
        if fire && self.fire_before_row(session, Some(row), None)? {
            return Ok(false);
        }
        self.engine.remove_row(session, row)?;
        session.log(self.id, UndoOp::Delete, row.clone())?;
        if fire {
            self.fire_after_row(session, Some(row), None, false)?;
        }
        Ok(true)
    }

    /// Updates stored rows, each new row keeping the key of its old row.
    ///
    /// Pairs handled by a trigger are left out of the storage update.
    /// Returns the number of pairs applied to storage.
    pub fn update(
        &self,
        statement: &dyn Statement,
        session: &dyn Session,
        rows: Vec<(Row, Row)>,
    ) -> Result<usize> {
        self.check_writing_allowed()?;
        self.lock(session, true, false)?;
        let fire = self.fire_row();
        let mut pending = Vec::with_capacity(rows.len());
        for (old, mut new) in rows {
            new.key = old.key;
            self.validate_convert_update_sequence(session, &mut new)?;
            if fire && self.fire_before_row(session, Some(&old), Some(&new))? {
                continue;
            }
            pending.push((old, new));
        }
        self.update_rows(statement, session, &mut pending)?;
        if fire {
            for (old, new) in &pending {
                self.fire_after_row(session, Some(old), Some(new), false)?;
            }
        }
        Ok(pending.len())
    }

    // Dependencies and teardown.

    /// Adds every catalog object this table depends on, and the table itself, to `dependencies`.
    pub fn add_dependencies(&self, dependencies: &mut HashSet<DbObjectId>) {
        let me = DbObjectId::Table(self.id);
        if dependencies.contains(&me) {
            // Already visited through a self-reference.
            return;
        }
        dependencies.extend(self.sequences.iter().map(|s| DbObjectId::Sequence(s.id())));
        let mut visitor = DependencyVisitor::new(dependencies);
        for column in &self.columns {
            column.collect_dependencies(&mut visitor);
        }
        for constraint in &self.constraints {
            constraint.collect_dependencies(&mut visitor);
        }
        dependencies.insert(me);
    }

    /// Every object owned by or granted on this table.
    pub fn children(&self) -> Vec<DbObjectId> {
        let mut children: Vec<_> = self
            .engine
            .indexes()
            .iter()
            .map(|i| DbObjectId::Index(i.id()))
            .collect();
        children.extend(self.constraints.iter().map(|c| DbObjectId::Constraint(c.id())));
        children.extend(self.triggers.iter().map(|t| DbObjectId::Trigger(t.id())));
        children.extend(self.sequences.iter().map(|s| DbObjectId::Sequence(s.id())));
        children.extend(self.views.iter().map(|v| DbObjectId::View(v.id)));
        children.extend(
            self.database
                .rights()
                .into_iter()
                .filter(|r| r.granted_table == Some(self.id))
                .map(|r| DbObjectId::Right(r.id)),
        );
        children
    }

    /// Unregisters everything that depends on this table, ahead of dropping it.
    ///
    /// The order is fixed: views, triggers, constraints, indexes, rights,
    /// the table's metadata, and sequences last.
    /// Sequences survive if the table is temporary or another table still uses them.
    pub fn remove_children_and_resources(&mut self, session: &dyn Session) -> Result<()> {
        while !self.views.is_empty() {
            let view = self.views.remove(0);
            self.database.remove_schema_object(session, DbObjectId::View(view.id))?;
        }
        while !self.triggers.is_empty() {
            let trigger = self.triggers.remove(0);
            self.database
                .remove_schema_object(session, DbObjectId::Trigger(trigger.id()))?;
        }
        while !self.constraints.is_empty() {
            let constraint = self.constraints.remove(0);
            self.database
                .remove_schema_object(session, DbObjectId::Constraint(constraint.id()))?;
        }
        for index in self.engine.indexes().into_iter().skip(1) {
            if index.create_sql().is_some() {
                self.database.remove_schema_object(session, DbObjectId::Index(index.id()))?;
            }
            self.remove_index(index.id());
        }
        for right in self.database.rights() {
            if right.granted_table == Some(self.id) {
                self.database.remove_database_object(session, DbObjectId::Right(right.id))?;
            }
        }
        self.database.remove_meta(session, self.id)?;
        while !self.sequences.is_empty() {
            let sequence = self.sequences.remove(0);
            if !self.temporary && self.database.dependent_table(sequence.id(), self.id).is_none() {
                self.database
                    .remove_schema_object(session, DbObjectId::Sequence(sequence.id()))?;
            }
        }
        log::trace!("TABLE CHILDREN REMOVED: {}, table_id: {}", self.name, self.id);
        Ok(())
    }

    /// Is `session` on a lock wait-for cycle back to `clash`?
    /// See [`crate::deadlock::find_cycle`].
    pub fn check_deadlock(
        &self,
        session: SessionId,
        clash: Option<SessionId>,
        visited: &mut IntSet<SessionId>,
    ) -> DeadlockCheck {
        self.engine.check_deadlock(session, clash, visited)
    }

    // Values.

    /// Prepares `row` for storage, column by column.
    ///
    /// Computed columns are recomputed, whatever was supplied.
    /// Other columns go through [`Column::validate_convert_update_sequence`],
    /// and only values it replaced are written back.
    pub fn validate_convert_update_sequence(&self, session: &dyn Session, row: &mut Row) -> Result<()> {
        if row.width() != self.columns.len() {
            return Err(TableError::Internal(format!(
                "row of width {} written to `{}` of {} columns",
                row.width(),
                self.name,
                self.columns.len()
            )));
        }
        for (pos, column) in self.columns.iter().enumerate() {
            if let Some(expr) = column.computed_expr() {
                let computed = expr.value(session, Some(row))?;
                let value = column.validate_convert_update_sequence(session, Some(&computed))?;
                row.set(pos, value.into_owned());
                continue;
            }
            let replaced = match column.validate_convert_update_sequence(session, row.get(pos))? {
                Cow::Owned(value) => Some(value),
                Cow::Borrowed(_) => None,
            };
            if let Some(value) = replaced {
                row.set(pos, value);
            }
        }
        Ok(())
    }

    /// The value a column takes when an insert leaves it out.
    pub fn default_value(&self, session: &dyn Session, column: ColId) -> Result<Value> {
        let column = self.column(column);
        let value = match column.default_expr() {
            Some(expr) => expr.value(session, None)?,
            None => column.validate_convert_update_sequence(session, None)?.into_owned(),
        };
        column.convert(&value)
    }

    /// Compares two values after promoting both to their common type,
    /// under the comparison mode of this table.
    pub fn compare_type_safe(&self, a: &Value, b: &Value) -> Result<Ordering> {
        let ty = DataType::higher_order(a.data_type(), b.data_type())?;
        let a = a.convert_to(ty)?;
        let b = b.convert_to(ty)?;
        Ok(a.compare_type_safe(&b, &self.compare_mode))
    }

    // Storage delegation.

    pub fn lock(&self, session: &dyn Session, exclusive: bool, force: bool) -> Result<()> {
        self.engine.lock(session, exclusive, force)
    }

    pub fn unlock(&self, session: &dyn Session) {
        self.engine.unlock(session)
    }

    pub fn close(&self, session: &dyn Session) -> Result<()> {
        self.engine.close(session)
    }

    pub fn add_row(&self, session: &dyn Session, row: &mut Row) -> Result<()> {
        self.engine.add_row(session, row)
    }

    pub fn remove_row(&self, session: &dyn Session, row: &Row) -> Result<()> {
        self.engine.remove_row(session, row)
    }

    pub fn truncate(&self, session: &dyn Session) -> Result<()> {
        self.engine.truncate(session)
    }

    pub fn commit(&self, op: UndoOp, row: &Row) {
        self.engine.commit(op, row)
    }

    pub fn check_support_alter(&self) -> Result<()> {
        self.engine.check_support_alter()
    }

    pub fn table_type(&self) -> TableType {
        self.engine.table_type()
    }

    pub fn scan_index(&self, session: &dyn Session) -> Arc<dyn Index> {
        self.engine.scan_index(session)
    }

    pub fn unique_index(&self) -> Option<Arc<dyn Index>> {
        self.engine.unique_index()
    }

    pub fn indexes(&self) -> Vec<Arc<dyn Index>> {
        self.engine.indexes()
    }

    pub fn is_locked_exclusively(&self) -> bool {
        self.engine.is_locked_exclusively()
    }

    pub fn is_locked_exclusively_by(&self, session: SessionId) -> bool {
        self.engine.is_locked_exclusively_by(session)
    }

    pub fn max_data_modification_id(&self) -> u64 {
        self.engine.max_data_modification_id()
    }

    pub fn is_deterministic(&self) -> bool {
        self.engine.is_deterministic()
    }

    pub fn can_get_row_count(&self) -> bool {
        self.engine.can_get_row_count()
    }

    pub fn can_drop(&self) -> bool {
        self.engine.can_drop()
    }

    pub fn can_reference(&self) -> bool {
        self.engine.can_reference()
    }

    pub fn can_truncate(&self) -> bool {
        self.engine.can_truncate()
    }

    pub fn is_global_temporary(&self) -> bool {
        self.engine.is_global_temporary()
    }

    pub fn row_id_column(&self) -> Option<ColId> {
        self.engine.row_id_column()
    }

    pub fn row_count(&self, session: &dyn Session) -> Result<u64> {
        self.engine.row_count(session)
    }

    pub fn row_count_approximation(&self) -> u64 {
        self.engine.row_count_approximation()
    }

    pub fn disk_space_used(&self) -> u64 {
        self.engine.disk_space_used()
    }

    pub fn create_sql_for_copy(&self, table_name: &str, quoted_name: &str) -> Result<String> {
        self.engine.create_sql_for_copy(table_name, quoted_name)
    }
}

impl core::fmt::Debug for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Table")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}
