//! The expression contract columns and constraints are built from.
//!
//! Parsing and general evaluation live in the query layer;
//! the table only needs to evaluate defaults and computed columns
//! and to find out which catalog objects an expression depends on.

use crate::catalog::DbObjectId;
use crate::error::TableError;
use crate::row::Row;
use crate::sequence::Sequence;
use crate::session::Session;
use crate::value::{DataType, Value};
use crate::Result;
use core::cmp::Ordering;
use core::fmt;
use std::sync::Arc;
use tessera_data_structures::map::HashSet;

/// An expression tree evaluated against a session and, optionally, a row.
pub trait Expression: fmt::Debug + Send + Sync {
    fn value(&self, session: &dyn Session, row: Option<&Row>) -> Result<Value>;

    /// Reports every catalog object this expression references to `visitor`.
    fn collect_dependencies(&self, visitor: &mut DependencyVisitor<'_>);

    fn sql(&self) -> String;
}

/// Collects the catalog objects an expression tree references.
pub struct DependencyVisitor<'a> {
    dependencies: &'a mut HashSet<DbObjectId>,
}

impl<'a> DependencyVisitor<'a> {
    pub fn new(dependencies: &'a mut HashSet<DbObjectId>) -> Self {
        Self { dependencies }
    }

    pub fn add(&mut self, object: DbObjectId) {
        self.dependencies.insert(object);
    }
}

/// A constant.
#[derive(Debug, Clone)]
pub struct Literal(pub Value);

impl Expression for Literal {
    fn value(&self, _: &dyn Session, _: Option<&Row>) -> Result<Value> {
        Ok(self.0.clone())
    }

    fn collect_dependencies(&self, _: &mut DependencyVisitor<'_>) {}

    fn sql(&self) -> String {
        self.0.sql()
    }
}

/// Reads a column of the row being evaluated.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub position: usize,
    pub name: Box<str>,
}

impl Expression for ColumnRef {
    fn value(&self, _: &dyn Session, row: Option<&Row>) -> Result<Value> {
        match row {
            Some(row) if self.position < row.width() => Ok(row.value(self.position).clone()),
            Some(_) => Err(TableError::ColumnNotFound(self.name.clone())),
            None => Ok(Value::Null),
        }
    }

    fn collect_dependencies(&self, _: &mut DependencyVisitor<'_>) {}

    fn sql(&self) -> String {
        format!("\"{}\"", self.name)
    }
}

/// `NEXT VALUE FOR <sequence>`.
#[derive(Debug, Clone)]
pub struct SequenceNextValue(pub Arc<Sequence>);

impl Expression for SequenceNextValue {
    fn value(&self, _: &dyn Session, _: Option<&Row>) -> Result<Value> {
        self.0.next_value().map(Value::BigInt)
    }

    fn collect_dependencies(&self, visitor: &mut DependencyVisitor<'_>) {
        visitor.add(DbObjectId::Sequence(self.0.id()));
    }

    fn sql(&self) -> String {
        format!("NEXT VALUE FOR \"{}\"", self.0.name())
    }
}

/// Numeric addition; NULL if either side is NULL.
#[derive(Debug)]
pub struct Add(pub Box<dyn Expression>, pub Box<dyn Expression>);

impl Expression for Add {
    fn value(&self, session: &dyn Session, row: Option<&Row>) -> Result<Value> {
        let a = self.0.value(session, row)?;
        let b = self.1.value(session, row)?;
        if a.is_null() || b.is_null() {
            return Ok(Value::Null);
        }
        let ty = DataType::higher_order(a.data_type(), b.data_type())?;
        Ok(match (a.convert_to(ty)?, b.convert_to(ty)?) {
            (Value::Int(a), Value::Int(b)) => match a.checked_add(b) {
                Some(v) => Value::Int(v),
                None => Value::BigInt(a as i64 + b as i64),
            },
            (Value::BigInt(a), Value::BigInt(b)) => Value::BigInt(a.checked_add(b).ok_or_else(|| {
                TableError::DataConversion {
                    value: format!("{a} + {b}"),
                    target: DataType::BigInt,
                }
            })?),
            (Value::Double(a), Value::Double(b)) => Value::Double(a + b),
            (a, _) => {
                return Err(TableError::Unsupported(format!("addition of {} values", a.data_type())));
            }
        })
    }

    fn collect_dependencies(&self, visitor: &mut DependencyVisitor<'_>) {
        self.0.collect_dependencies(visitor);
        self.1.collect_dependencies(visitor);
    }

    fn sql(&self) -> String {
        format!("({} + {})", self.0.sql(), self.1.sql())
    }
}

/// The operator of a [`Comparison`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

impl CompareOp {
    fn holds(self, ord: Ordering) -> bool {
        match self {
            Self::Equal => ord.is_eq(),
            Self::NotEqual => ord.is_ne(),
            Self::Less => ord.is_lt(),
            Self::LessOrEqual => ord.is_le(),
            Self::Greater => ord.is_gt(),
            Self::GreaterOrEqual => ord.is_ge(),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
        }
    }
}

/// A comparison of two operands promoted to their common type; NULL if either side is NULL.
#[derive(Debug)]
pub struct Comparison {
    pub op: CompareOp,
    pub left: Box<dyn Expression>,
    pub right: Box<dyn Expression>,
}

impl Expression for Comparison {
    fn value(&self, session: &dyn Session, row: Option<&Row>) -> Result<Value> {
        let a = self.left.value(session, row)?;
        let b = self.right.value(session, row)?;
        if a.is_null() || b.is_null() {
            return Ok(Value::Null);
        }
        let ty = DataType::higher_order(a.data_type(), b.data_type())?;
        let ord = a.convert_to(ty)?.cmp(&b.convert_to(ty)?);
        Ok(Value::Boolean(self.op.holds(ord)))
    }

    fn collect_dependencies(&self, visitor: &mut DependencyVisitor<'_>) {
        self.left.collect_dependencies(visitor);
        self.right.collect_dependencies(visitor);
    }

    fn sql(&self) -> String {
        format!("({} {} {})", self.left.sql(), self.op.as_str(), self.right.sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::SequenceDef;
    use crate::test_utils::TestSession;
    use tessera_data_structures::map::HashCollectionExt as _;
    use tessera_primitives::SequenceId;

    #[test]
    fn add_promotes_and_propagates_null() {
        let session = TestSession::new(1);
        let row: Row = [Value::Int(2), Value::Double(0.5), Value::Null].into_iter().collect();
        let col = |position, name: &str| Box::new(ColumnRef { position, name: name.into() });
        let sum = Add(col(0, "A"), col(1, "B"));
        assert_eq!(sum.value(&session, Some(&row)), Ok(Value::Double(2.5)));
        let with_null = Add(col(0, "A"), col(2, "C"));
        assert_eq!(with_null.value(&session, Some(&row)), Ok(Value::Null));
        assert_eq!(sum.sql(), "(\"A\" + \"B\")");
    }

    #[test]
    fn comparison_is_null_aware() {
        let session = TestSession::new(1);
        let row: Row = [Value::Int(5), Value::Null].into_iter().collect();
        let gt = |position| Comparison {
            op: CompareOp::Greater,
            left: Box::new(ColumnRef { position, name: "X".into() }),
            right: Box::new(Literal(Value::Double(4.5))),
        };
        assert_eq!(gt(0).value(&session, Some(&row)), Ok(Value::Boolean(true)));
        assert_eq!(gt(1).value(&session, Some(&row)), Ok(Value::Null));
        assert_eq!(gt(0).sql(), "(\"X\" > 4.5)");
    }

    #[test]
    fn sequence_reference_is_a_dependency() {
        let seq = Arc::new(Sequence::new(SequenceDef::identity(SequenceId(4), "S", 1)).unwrap());
        let expr = Add(Box::new(SequenceNextValue(seq)), Box::new(Literal(Value::Int(1))));
        let mut deps = HashSet::new();
        expr.collect_dependencies(&mut DependencyVisitor::new(&mut deps));
        assert!(deps.contains(&DbObjectId::Sequence(SequenceId(4))));
        assert_eq!(deps.len(), 1);
    }
}
