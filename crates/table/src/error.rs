use crate::value::DataType;
use core::num::NonZeroU32;
use enum_as_inner::EnumAsInner;
use tessera_primitives::error_code;
use thiserror::Error;

/// Every failure the table core reports.
///
/// Each variant carries enough context (object name, column name or SQL fragment)
/// to be shown verbatim to the end user, and maps to a stable numeric code via [`TableError::code`].
#[derive(Error, Debug, Clone, PartialEq, EnumAsInner)]
pub enum TableError {
    #[error("Unknown data type: `{0}`")]
    UnknownDataType(String),
    #[error("Duplicate column name `{0}`")]
    DuplicateColumnName(Box<str>),
    #[error("Column `{0}` not found")]
    ColumnNotFound(Box<str>),
    #[error("Column may be referenced by `{0}`")]
    ColumnIsReferenced(String),
    #[error("Concurrent update in table `{table}`: another transaction has updated or deleted the same row")]
    ConcurrentUpdate { table: Box<str> },
    #[error("Index `{0}` not found")]
    IndexNotFound(Box<str>),
    #[error("Statement was canceled or the session timed out")]
    StatementCanceled,
    #[error("NULL not allowed for column `{0}`")]
    NullNotAllowed(Box<str>),
    #[error("Unique index or primary key violation: `{index}` on table `{table}`, value {value}")]
    DuplicateKey {
        table: Box<str>,
        index: Box<str>,
        value: String,
    },
    #[error("Check constraint violation: `{constraint}`: {detail}")]
    CheckConstraintViolated { constraint: Box<str>, detail: String },
    #[error("Referential integrity constraint violation: `{constraint}`: {detail}")]
    ReferentialIntegrityViolated { constraint: Box<str>, detail: String },
    #[error("Data conversion error converting `{value}` to {target}")]
    DataConversion { value: String, target: DataType },
    #[error("Timeout trying to lock table `{0}`")]
    LockTimeout(Box<str>),
    #[error("Deadlock detected while locking table `{table}`, sessions involved: {sessions}")]
    Deadlock { table: Box<str>, sessions: String },
    #[error("Row not found when trying to delete from `{0}`")]
    RowNotFound(Box<str>),
    #[error("Sequence `{0}` has run out of numbers")]
    SequenceExhausted(Box<str>),
    #[error("The database is read only")]
    ReadOnly,
    #[error("Feature not supported: {0}")]
    Unsupported(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TableError {
    /// The stable code reported alongside the message.
    pub fn code(&self) -> NonZeroU32 {
        match self {
            Self::UnknownDataType(_) => error_code::UNKNOWN_DATA_TYPE,
            Self::DuplicateColumnName(_) => error_code::DUPLICATE_COLUMN_NAME,
            Self::ColumnNotFound(_) => error_code::COLUMN_NOT_FOUND,
            Self::ColumnIsReferenced(_) => error_code::COLUMN_IS_REFERENCED,
            Self::ConcurrentUpdate { .. } => error_code::CONCURRENT_UPDATE,
            Self::IndexNotFound(_) => error_code::INDEX_NOT_FOUND,
            Self::StatementCanceled => error_code::STATEMENT_WAS_CANCELED,
            Self::NullNotAllowed(_) => error_code::NULL_NOT_ALLOWED,
            Self::DuplicateKey { .. } => error_code::DUPLICATE_KEY,
            Self::CheckConstraintViolated { .. } => error_code::CHECK_CONSTRAINT_VIOLATED,
            Self::ReferentialIntegrityViolated { .. } => error_code::REFERENTIAL_INTEGRITY_VIOLATED,
            Self::DataConversion { .. } => error_code::DATA_CONVERSION_ERROR,
            Self::LockTimeout(_) => error_code::LOCK_TIMEOUT,
            Self::Deadlock { .. } => error_code::DEADLOCK,
            Self::RowNotFound(_) => error_code::ROW_NOT_FOUND_WHEN_DELETING,
            Self::SequenceExhausted(_) => error_code::SEQUENCE_EXHAUSTED,
            Self::ReadOnly => error_code::DATABASE_IS_READ_ONLY,
            Self::Unsupported(_) => error_code::FEATURE_NOT_SUPPORTED,
            Self::Internal(_) => error_code::GENERAL_ERROR,
        }
    }

    /// Does this failure come from a constraint rejecting a row?
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::NullNotAllowed(_)
                | Self::DuplicateKey { .. }
                | Self::CheckConstraintViolated { .. }
                | Self::ReferentialIntegrityViolated { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_described() {
        let errors = [
            TableError::UnknownDataType("\"X\"".into()),
            TableError::DuplicateColumnName("ID".into()),
            TableError::ColumnNotFound("ID".into()),
            TableError::ConcurrentUpdate { table: "T".into() },
            TableError::StatementCanceled,
            TableError::Internal("copy".into()),
        ];
        for e in errors {
            assert!(error_code::describe(e.code()).is_some(), "{e} has no description");
        }
    }

    #[test]
    fn message_names_the_object() {
        let e = TableError::DuplicateColumnName("NAME".into());
        assert_eq!(e.to_string(), "Duplicate column name `NAME`");
        assert_eq!(e.code().get(), 42121);
    }
}
