use crate::error::TableError;
use crate::expr::{DependencyVisitor, Expression, SequenceNextValue};
use crate::sequence::Sequence;
use crate::session::Session;
use crate::value::{DataType, Value};
use crate::Result;
use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::Arc;
use tessera_primitives::{ColId, TableId};

/// The selectivity assumed for a column without statistics, in percent.
pub const DEFAULT_SELECTIVITY: u8 = 50;

/// A typed, named field descriptor, owned by exactly one table.
#[derive(Debug, Clone)]
pub struct Column {
    name: Box<str>,
    data_type: DataType,
    /// The owning table, assigned when the table installs its columns.
    table: Option<TableId>,
    /// The index of this column in its table's rows.
    position: ColId,
    nullable: bool,
    primary_key: bool,
    /// Percentage of distinct values, 1 to 100.
    selectivity: u8,
    default_expr: Option<Arc<dyn Expression>>,
    computed_expr: Option<Arc<dyn Expression>>,
    sequence: Option<Arc<Sequence>>,
    convert_null_to_default: bool,
}

impl Column {
    pub fn new(name: impl Into<Box<str>>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            table: None,
            position: ColId(0),
            nullable: true,
            primary_key: false,
            selectivity: DEFAULT_SELECTIVITY,
            default_expr: None,
            computed_expr: None,
            sequence: None,
            convert_null_to_default: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, expr: Arc<dyn Expression>) -> Self {
        self.default_expr = Some(expr);
        self
    }

    /// Makes this a computed column: supplied values are discarded
    /// and recomputed from `expr` on every write.
    pub fn computed(mut self, expr: Arc<dyn Expression>) -> Self {
        self.computed_expr = Some(expr);
        self
    }

    /// Makes this an identity column drawing its default from `sequence`.
    pub fn with_sequence(mut self, sequence: Arc<Sequence>) -> Self {
        self.default_expr = Some(Arc::new(SequenceNextValue(sequence.clone())));
        self.sequence = Some(sequence);
        self.nullable = false;
        self
    }

    pub fn with_selectivity(mut self, selectivity: u8) -> Self {
        self.selectivity = selectivity.clamp(1, 100);
        self
    }

    /// Substitute the default when NULL is written explicitly.
    pub fn convert_null_to_default(mut self) -> Self {
        self.convert_null_to_default = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: Box<str>) {
        self.name = name;
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    pub fn position(&self) -> ColId {
        self.position
    }

    pub(crate) fn set_table(&mut self, table: TableId, position: ColId) {
        self.table = Some(table);
        self.position = position;
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub(crate) fn set_primary_key(&mut self, primary_key: bool) {
        self.primary_key = primary_key;
    }

    pub fn selectivity(&self) -> u8 {
        self.selectivity
    }

    pub fn is_computed(&self) -> bool {
        self.computed_expr.is_some()
    }

    pub fn default_expr(&self) -> Option<&Arc<dyn Expression>> {
        self.default_expr.as_ref()
    }

    pub fn computed_expr(&self) -> Option<&Arc<dyn Expression>> {
        self.computed_expr.as_ref()
    }

    pub fn sequence(&self) -> Option<&Arc<Sequence>> {
        self.sequence.as_ref()
    }

    /// Converts `value` to the declared type of this column.
    pub fn convert(&self, value: &Value) -> Result<Value> {
        value.convert_to(self.data_type)
    }

    /// Validates a value about to be written to this column.
    ///
    /// An unset value (`None`) takes the column default.
    /// NULL is replaced by the default if the column asks for that,
    /// and then rejected if the column is not nullable.
    /// The result is converted to the declared type,
    /// and an identity sequence is moved past an explicitly supplied value.
    ///
    /// Returns `Cow::Borrowed` iff `value` was usable as-is.
    pub fn validate_convert_update_sequence<'v>(
        &self,
        session: &dyn Session,
        value: Option<&'v Value>,
    ) -> Result<Cow<'v, Value>> {
        let mut value = match value {
            Some(v) => Cow::Borrowed(v),
            None => Cow::Owned(self.evaluate_default(session)?),
        };
        if value.is_null() && self.convert_null_to_default {
            value = Cow::Owned(self.evaluate_default(session)?);
        }
        if value.is_null() {
            if !self.nullable {
                return Err(TableError::NullNotAllowed(self.name.clone()));
            }
            return Ok(value);
        }
        if value.data_type() != self.data_type {
            value = Cow::Owned(self.convert(&value)?);
        }
        if let (Some(seq), Some(v)) = (&self.sequence, value.as_i64()) {
            seq.observe(v);
        }
        Ok(value)
    }

    fn evaluate_default(&self, session: &dyn Session) -> Result<Value> {
        let Some(expr) = &self.default_expr else {
            return Ok(Value::Null);
        };
        let value = self.convert(&expr.value(session, None)?)?;
        if self.sequence.is_some() {
            session.set_last_identity(&value);
        }
        Ok(value)
    }

    pub fn collect_dependencies(&self, visitor: &mut DependencyVisitor<'_>) {
        if let Some(expr) = &self.default_expr {
            expr.collect_dependencies(visitor);
        }
        if let Some(expr) = &self.computed_expr {
            expr.collect_dependencies(visitor);
        }
    }

    /// The column definition as it appears in `CREATE TABLE`.
    pub fn sql(&self) -> String {
        let mut sql = format!("\"{}\" {}", self.name, self.data_type);
        if let Some(expr) = &self.computed_expr {
            let _ = write!(sql, " AS {}", expr.sql());
        } else if let Some(expr) = &self.default_expr {
            let _ = write!(sql, " DEFAULT {}", expr.sql());
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Literal;
    use crate::sequence::SequenceDef;
    use crate::test_utils::TestSession;
    use tessera_primitives::SequenceId;

    #[test]
    fn supplied_value_of_declared_type_is_borrowed() {
        let session = TestSession::new(1);
        let col = Column::new("ID", DataType::Int);
        let v = Value::Int(3);
        let out = col.validate_convert_update_sequence(&session, Some(&v)).unwrap();
        assert!(matches!(out, Cow::Borrowed(_)));
    }

    #[test]
    fn converts_to_declared_type() {
        let session = TestSession::new(1);
        let col = Column::new("ID", DataType::BigInt);
        let v = Value::from("12");
        let out = col.validate_convert_update_sequence(&session, Some(&v)).unwrap();
        assert_eq!(out.into_owned(), Value::BigInt(12));
    }

    #[test]
    fn unset_takes_default() {
        let session = TestSession::new(1);
        let col = Column::new("N", DataType::Int).with_default(Arc::new(Literal(Value::from("7"))));
        let out = col.validate_convert_update_sequence(&session, None).unwrap();
        assert_eq!(out.into_owned(), Value::Int(7));
    }

    #[test]
    fn null_rejected_when_not_nullable() {
        let session = TestSession::new(1);
        let col = Column::new("N", DataType::Int).not_null();
        assert_eq!(
            col.validate_convert_update_sequence(&session, Some(&Value::Null)),
            Err(TableError::NullNotAllowed("N".into()))
        );
    }

    #[test]
    fn identity_draws_from_sequence_and_observes_supplied() {
        let session = TestSession::new(1);
        let seq = Arc::new(Sequence::new(SequenceDef::identity(SequenceId(1), "ID_SEQ", 1)).unwrap());
        let col = Column::new("ID", DataType::BigInt).with_sequence(seq.clone());
        let first = col.validate_convert_update_sequence(&session, None).unwrap().into_owned();
        assert_eq!(first, Value::BigInt(1));
        assert_eq!(session.last_identity(), Some(Value::BigInt(1)));
        let supplied = Value::BigInt(10);
        col.validate_convert_update_sequence(&session, Some(&supplied)).unwrap();
        assert_eq!(seq.next_value(), Ok(11));
    }

    #[test]
    fn sql_renders_definition() {
        let col = Column::new("NAME", DataType::Text)
            .not_null()
            .with_default(Arc::new(Literal(Value::from("x"))));
        assert_eq!(col.sql(), "\"NAME\" VARCHAR DEFAULT 'x' NOT NULL");
    }
}
