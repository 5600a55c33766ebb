//! Stable numeric codes attached to every failure the table core reports.
//!
//! The numbers follow the SQLSTATE-flavoured numbering used by the catalog,
//! so a code seen by an end user never changes meaning between releases.

use core::num::NonZeroU32;

/// Takes a macro that expects `$($name:ident($code:literal, $msg:literal),)*` and invokes
/// it with the codes defined in this module.
#[macro_export]
macro_rules! error_codes {
    ($mac:ident) => {
        $mac!(
            DATA_CONVERSION_ERROR(22018, "Data conversion error"),
            NULL_NOT_ALLOWED(23502, "NULL not allowed for column"),
            REFERENTIAL_INTEGRITY_VIOLATED(23503, "Referential integrity constraint violation"),
            DUPLICATE_KEY(23505, "Unique index or primary key violation"),
            CHECK_CONSTRAINT_VIOLATED(23513, "Check constraint violation"),
            DEADLOCK(40001, "Deadlock detected"),
            INDEX_NOT_FOUND(42112, "Index not found"),
            DUPLICATE_COLUMN_NAME(42121, "Duplicate column name"),
            COLUMN_NOT_FOUND(42122, "Column not found"),
            GENERAL_ERROR(50000, "General error"),
            UNKNOWN_DATA_TYPE(50004, "Unknown data type"),
            FEATURE_NOT_SUPPORTED(50100, "Feature not supported"),
            LOCK_TIMEOUT(50200, "Timeout trying to lock table"),
            STATEMENT_WAS_CANCELED(57014, "Statement was canceled or the session timed out"),
            SEQUENCE_EXHAUSTED(90006, "Sequence has run out of numbers"),
            COLUMN_IS_REFERENCED(90083, "Column is referenced by a constraint or index"),
            DATABASE_IS_READ_ONLY(90097, "The database is read only"),
            ROW_NOT_FOUND_WHEN_DELETING(90112, "Row not found when trying to delete"),
            CONCURRENT_UPDATE(90131, "Concurrent update"),
        );
    };
}

const fn nz(n: u32) -> NonZeroU32 {
    match NonZeroU32::new(n) {
        Some(n) => n,
        None => panic!(),
    }
}

macro_rules! def_error_codes {
    ($($name:ident($code:literal, $msg:literal),)*) => {
        $(#[doc = $msg] pub const $name: NonZeroU32 = nz($code);)*

        /// Get the description of an error code, if it exists.
        pub const fn describe(code: NonZeroU32) -> Option<&'static str> {
            match code.get() {
                $($code => Some($msg),)*
                _ => None,
            }
        }
    };
}
error_codes!(def_error_codes);
