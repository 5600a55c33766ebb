use crate::error::TableError;
use crate::expr::{DependencyVisitor, Expression};
use crate::row::Row;
use crate::session::Session;
use crate::table::Table;
use crate::value::Value;
use crate::Result;
use core::fmt;
use smallvec::SmallVec;
use std::sync::Arc;
use tessera_primitives::{ColId, ConstraintId, IndexId};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ConstraintKind {
    Check,
    PrimaryKey,
    Unique,
    Referential,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Check => "CHECK",
            Self::PrimaryKey => "PRIMARY KEY",
            Self::Unique => "UNIQUE",
            Self::Referential => "REFERENTIAL",
        }
    }
}

/// A rule attached to a table and evaluated around row mutations.
pub trait Constraint: fmt::Debug + Send + Sync {
    fn id(&self) -> ConstraintId;

    fn name(&self) -> &str;

    fn kind(&self) -> ConstraintKind;

    /// Is this constraint checked before the row reaches storage?
    /// Otherwise it is checked after.
    fn is_before(&self) -> bool;

    /// Checks a mutation of `table`.
    ///
    /// `old` is `None` for an insert and `new` is `None` for a delete.
    fn check_row(&self, session: &dyn Session, table: &Table, old: Option<&Row>, new: Option<&Row>) -> Result<()>;

    /// The columns of `table` this constraint looks at.
    fn referenced_columns(&self, table: &Table) -> SmallVec<[ColId; 2]>;

    fn collect_dependencies(&self, _visitor: &mut DependencyVisitor<'_>) {}

    /// Does this constraint enforce itself through `index`?
    fn uses_index(&self, _index: IndexId) -> bool {
        false
    }

    /// Hands ownership of `index` to this constraint.
    fn set_index_owner(&self, _index: IndexId) {}

    /// Checks every row already stored in `table`.
    fn check_existing_data(&self, session: &dyn Session, table: &Table) -> Result<()>;

    /// Regenerates derived state after the table was renamed.
    fn rebuild(&self) -> Result<()> {
        Ok(())
    }

    fn sql(&self) -> String;
}

/// `CHECK (<condition>)`.
///
/// A row passes unless the condition evaluates to FALSE; NULL passes.
#[derive(Debug)]
pub struct CheckConstraint {
    id: ConstraintId,
    name: Box<str>,
    condition: Arc<dyn Expression>,
    columns: SmallVec<[ColId; 2]>,
}

impl CheckConstraint {
    pub fn new(
        id: ConstraintId,
        name: impl Into<Box<str>>,
        condition: Arc<dyn Expression>,
        columns: impl IntoIterator<Item = ColId>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            condition,
            columns: columns.into_iter().collect(),
        }
    }

    fn check(&self, session: &dyn Session, row: &Row) -> Result<()> {
        match self.condition.value(session, Some(row))? {
            Value::Boolean(false) => Err(TableError::CheckConstraintViolated {
                constraint: self.name.clone(),
                detail: format!("{} on {row}", self.condition.sql()),
            }),
            _ => Ok(()),
        }
    }
}

impl Constraint for CheckConstraint {
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
        true
    }

    fn check_row(&self, session: &dyn Session, _: &Table, _: Option<&Row>, new: Option<&Row>) -> Result<()> {
        match new {
            Some(row) => self.check(session, row),
            None => Ok(()),
        }
    }

    fn referenced_columns(&self, _: &Table) -> SmallVec<[ColId; 2]> {
        self.columns.clone()
    }

    fn collect_dependencies(&self, visitor: &mut DependencyVisitor<'_>) {
        self.condition.collect_dependencies(visitor);
    }

    fn check_existing_data(&self, session: &dyn Session, table: &Table) -> Result<()> {
        for row in table.scan_index(session).rows(session)? {
            self.check(session, &row)?;
        }
        Ok(())
    }

    fn sql(&self) -> String {
        format!("CONSTRAINT \"{}\" CHECK {}", self.name, self.condition.sql())
    }
}
