//! The catalog services a table calls into.
//!
//! Schema object lifecycle belongs to the database;
//! the table only tells it which of its dependents to unregister.

use crate::compare::CompareMode;
use crate::error::TableError;
use crate::session::Session;
use crate::Result;
use core::fmt;
use enum_as_inner::EnumAsInner;
use tessera_primitives::{ConstraintId, IndexId, RightId, SequenceId, TableId, TriggerId, ViewId};

/// Identifies any catalog object a table can depend on or own.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, EnumAsInner)]
pub enum DbObjectId {
    Table(TableId),
    Index(IndexId),
    Constraint(ConstraintId),
    Trigger(TriggerId),
    Sequence(SequenceId),
    View(ViewId),
    Right(RightId),
}

impl fmt::Display for DbObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Table(id) => write!(f, "table {id}"),
            Self::Index(id) => write!(f, "index {id}"),
            Self::Constraint(id) => write!(f, "constraint {id}"),
            Self::Trigger(id) => write!(f, "trigger {id}"),
            Self::Sequence(id) => write!(f, "sequence {id}"),
            Self::View(id) => write!(f, "view {id}"),
            Self::Right(id) => write!(f, "right {id}"),
        }
    }
}

/// An access right held in the database-wide rights registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Right {
    pub id: RightId,
    pub grantee: Box<str>,
    /// The table the right was granted on, if it is a table right.
    pub granted_table: Option<TableId>,
}

/// A view defined over a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableView {
    pub id: ViewId,
    pub name: Box<str>,
    pub query: Box<str>,
}

/// What kind of table a storage engine provides.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TableType {
    Table,
    SystemTable,
    View,
    TableLink,
    External,
}

impl TableType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::SystemTable => "SYSTEM TABLE",
            Self::View => "VIEW",
            Self::TableLink => "TABLE LINK",
            Self::External => "EXTERNAL",
        }
    }
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The database a table is registered in.
pub trait Database: Send + Sync {
    /// Drops a schema-scoped object (view, trigger, constraint, index, sequence).
    fn remove_schema_object(&self, session: &dyn Session, object: DbObjectId) -> Result<()>;

    /// Drops a database-scoped object (a right).
    fn remove_database_object(&self, session: &dyn Session, object: DbObjectId) -> Result<()>;

    /// Removes the metadata record of `table`.
    fn remove_meta(&self, session: &dyn Session, table: TableId) -> Result<()>;

    /// Persists the changed definition of `object`.
    fn update(&self, session: &dyn Session, object: DbObjectId) -> Result<()>;

    /// A snapshot of the rights registry.
    fn rights(&self) -> Vec<Right>;

    /// Returns a table other than `except` that still uses `sequence`, if any.
    fn dependent_table(&self, sequence: SequenceId, except: TableId) -> Option<TableId>;

    fn is_read_only(&self) -> bool {
        false
    }

    fn check_writing_allowed(&self) -> Result<()> {
        if self.is_read_only() {
            return Err(TableError::ReadOnly);
        }
        Ok(())
    }

    /// The comparison mode new tables use, if the database sets one.
    /// Otherwise tables take the collation of their engine.
    fn compare_mode(&self) -> Option<CompareMode> {
        None
    }
}
