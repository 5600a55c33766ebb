//! The contract an index exposes to the table: its shape and a cost estimate.

use crate::row::Row;
use crate::session::Session;
use crate::Result;
use bitflags::bitflags;
use core::fmt;
use smallvec::SmallVec;
use std::sync::Arc;
use tessera_primitives::{ColId, IndexId, TableId};

/// The cost added to every row count so that an empty table still has a cost.
pub const COST_ROW_OFFSET: u64 = 1000;

bitflags! {
    /// The predicates a query places on one column,
    /// as far as an index can use them.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct IndexCondition: u8 {
        /// `col = x`
        const EQUALITY = 1;
        /// `col >= x`
        const START = 2;
        /// `col <= x`
        const END = 4;
        /// `col BETWEEN x AND y`
        const RANGE = Self::START.bits() | Self::END.bits();
        /// The predicate can never hold.
        const ALWAYS_FALSE = 8;
    }
}

/// A column of an index, or of a requested sort order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IndexColumn {
    pub column: ColId,
    pub descending: bool,
}

impl IndexColumn {
    pub fn asc(column: impl Into<ColId>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }

    pub fn desc(column: impl Into<ColId>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }
}

/// The `ORDER BY` a query asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOrder {
    pub columns: SmallVec<[IndexColumn; 4]>,
}

impl SortOrder {
    pub fn new(columns: impl IntoIterator<Item = IndexColumn>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }

    /// Does an index over `index_columns` yield rows in this order?
    pub fn is_satisfied_by(&self, index_columns: &[IndexColumn]) -> bool {
        !self.columns.is_empty()
            && self.columns.len() <= index_columns.len()
            && self.columns.iter().zip(index_columns).all(|(s, i)| s == i)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// The full scan every table has.
    Scan,
    /// An ordered index.
    Tree,
    /// A hash index: equality lookups only.
    Hash,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct IndexType {
    pub kind: IndexKind,
    pub primary_key: bool,
    pub unique: bool,
    /// Created implicitly for a constraint rather than by `CREATE INDEX`.
    pub belongs_to_constraint: bool,
}

impl IndexType {
    pub const SCAN: Self = Self {
        kind: IndexKind::Scan,
        primary_key: false,
        unique: false,
        belongs_to_constraint: false,
    };

    pub fn primary_key() -> Self {
        Self {
            kind: IndexKind::Tree,
            primary_key: true,
            unique: true,
            belongs_to_constraint: false,
        }
    }

    pub fn unique() -> Self {
        Self {
            kind: IndexKind::Tree,
            primary_key: false,
            unique: true,
            belongs_to_constraint: false,
        }
    }

    pub fn non_unique() -> Self {
        Self {
            kind: IndexKind::Tree,
            primary_key: false,
            unique: false,
            belongs_to_constraint: false,
        }
    }

    pub fn for_constraint(mut self) -> Self {
        self.belongs_to_constraint = true;
        self
    }

    pub fn is_scan(&self) -> bool {
        self.kind == IndexKind::Scan
    }
}

/// An access path over a table.
pub trait Index: fmt::Debug + Send + Sync {
    fn id(&self) -> IndexId;

    fn name(&self) -> &str;

    fn table(&self) -> TableId;

    fn index_type(&self) -> &IndexType;

    /// The indexed columns, in index order. Empty for the scan index.
    fn columns(&self) -> &[IndexColumn];

    /// Returns the position of `column` within this index.
    fn column_index(&self, column: ColId) -> Option<usize> {
        self.columns().iter().position(|c| c.column == column)
    }

    /// Estimates the cost of answering a query through this index.
    ///
    /// `masks` holds one entry per table column;
    /// `None` means the query has no usable predicates.
    fn cost(&self, session: &dyn Session, masks: Option<&[IndexCondition]>, sort: Option<&SortOrder>) -> f64;

    /// Can this index return the first or last row in its order directly?
    fn can_get_first_or_last(&self) -> bool;

    /// Returns the first (or last) row whose leading indexed value is not NULL.
    fn find_first_or_last(&self, session: &dyn Session, first: bool) -> Result<Option<Row>>;

    fn row_count(&self, session: &dyn Session) -> u64;

    /// A snapshot of the rows reachable through this index, in index order.
    fn rows(&self, session: &dyn Session) -> Result<Vec<Row>>;

    fn comment(&self) -> Option<&str> {
        None
    }

    /// The statement that recreates this index.
    /// `None` for indexes that only exist as part of their table or a constraint.
    fn create_sql(&self) -> Option<String>;
}

/// The access path chosen for a query, with its estimated cost.
#[derive(Debug, Clone)]
pub struct PlanItem {
    pub index: Arc<dyn Index>,
    pub cost: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_start_and_end() {
        assert!(IndexCondition::RANGE.contains(IndexCondition::START));
        assert!(IndexCondition::RANGE.contains(IndexCondition::END));
        assert!(!IndexCondition::START.contains(IndexCondition::RANGE));
    }

    #[test]
    fn sort_order_prefix_is_satisfied() {
        let index = [IndexColumn::asc(0u32), IndexColumn::desc(1u32)];
        assert!(SortOrder::new([IndexColumn::asc(0u32)]).is_satisfied_by(&index));
        assert!(SortOrder::new(index).is_satisfied_by(&index));
        assert!(!SortOrder::new([IndexColumn::desc(0u32)]).is_satisfied_by(&index));
        assert!(!SortOrder::new([IndexColumn::asc(1u32)]).is_satisfied_by(&index));
        assert!(!SortOrder::default().is_satisfied_by(&index));
    }
}
