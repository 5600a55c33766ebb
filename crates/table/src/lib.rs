//! The table contract of the tessera relational engine.
//!
//! A [`Table`] owns the catalog side of a relational table:
//! its columns, and the constraints, triggers, sequences, and views attached to it.
//! It drives row mutations through a pluggable [`TableEngine`],
//! bracketing each with triggers and constraint checks
//! and recording undo information in the [`Session`].
//!
//! The [`memory`] module provides an in-memory engine with table-level locking.

pub mod catalog;
pub mod column;
pub mod compare;
pub mod config;
pub mod constraint;
pub mod deadlock;
pub mod engine;
pub mod error;
pub mod expr;
pub mod index;
pub mod memory;
pub mod row;
pub mod sequence;
pub mod session;
pub mod table;
pub mod trigger;
pub mod value;

#[cfg(any(test, feature = "test"))]
pub mod test_utils;

pub use catalog::{Database, DbObjectId, TableType};
pub use column::Column;
pub use config::Options;
pub use engine::TableEngine;
pub use error::TableError;
pub use index::{Index, IndexColumn, IndexType};
pub use row::{Row, RowKey};
pub use session::{Session, Statement};
pub use table::{Table, TableDef};
pub use value::{DataType, Value};

pub type Result<T> = core::result::Result<T, TableError>;
