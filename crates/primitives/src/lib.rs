#![cfg_attr(not(test), no_std)]

pub mod error_code;
mod ids;

pub use ids::{ColId, ConstraintId, IndexId, RightId, SchemaId, SequenceId, SessionId, TableId, TriggerId, ViewId};
