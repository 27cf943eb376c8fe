//! Module: query
//! Responsibility: the query-execution collaborator contract, the plan it
//! consumes, the fluent scoped builder, and the in-memory reference backend.
//! Does not own: persistence orchestration or relation semantics.

mod builder;
mod memory;

#[cfg(test)]
mod tests;

use crate::value::Value;
use derive_more::Display;
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

// re-exports
pub use builder::{Paginator, Query, TrashMode};
pub use memory::MemoryConnection;

///
/// Row
///
/// Plain field map as returned by and handed to a connection. Keys are
/// unqualified column names; values are storage representations.
///

pub type Row = BTreeMap<String, Value>;

///
/// StorageErrorKind
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum StorageErrorKind {
    #[display("constraint violation")]
    ConstraintViolation,
    #[display("connection failure")]
    Connection,
    #[display("storage failure")]
    Other,
}

///
/// StorageError
///
/// Failure surfaced by the query-execution collaborator. The engine never
/// interprets these beyond logging; they propagate to the caller unchanged.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("{kind}: {message}")]
pub struct StorageError {
    pub kind: StorageErrorKind,
    pub message: String,
}

impl StorageError {
    pub fn constraint(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::ConstraintViolation,
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::Connection,
            message: message.into(),
        }
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: StorageErrorKind::Other,
            message: message.into(),
        }
    }
}

///
/// Predicate
///
/// Column constraints understood by every connection. Columns may be
/// qualified (`table.column`); an unqualified column refers to the plan's
/// base table.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    Eq(String, Value),
    In(String, Vec<Value>),
    Null(String),
    NotNull(String),
}

///
/// Direction
///

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum Direction {
    #[default]
    #[display("asc")]
    Asc,
    #[display("desc")]
    Desc,
}

///
/// Join
///
/// Inner join on one column pair. `left` and `right` are qualified column
/// names.
///

#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    pub table: String,
    pub left: String,
    pub right: String,
}

///
/// Plan
///
/// Fully-built query intent handed to a connection. Scope injection has
/// already happened by the time a plan exists; connections execute it
/// verbatim.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plan {
    pub table: String,
    pub predicates: Vec<Predicate>,
    pub joins: Vec<Join>,
    pub order_by: Vec<(String, Direction)>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl Plan {
    #[must_use]
    pub fn for_table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }
}

///
/// Connection
///
/// Query-execution collaborator. Implementations own dialects, pooling,
/// and timeouts; the engine owns none of them. Rows cross the boundary as
/// plain field maps ready for hydration.
///

pub trait Connection: Send + Sync {
    fn select(&self, plan: &Plan) -> Result<Vec<Row>, StorageError>;

    fn count(&self, plan: &Plan) -> Result<u64, StorageError>;

    fn insert(&self, table: &str, row: Row) -> Result<(), StorageError>;

    /// Insert and return the generated identity for `key`.
    fn insert_returning_id(&self, table: &str, row: Row, key: &str)
    -> Result<Value, StorageError>;

    /// Apply `changes` to every row matched by the plan; returns the
    /// affected-row count.
    fn update(&self, plan: &Plan, changes: Row) -> Result<u64, StorageError>;

    fn delete(&self, plan: &Plan) -> Result<u64, StorageError>;

    /// Transactional grouping of a callback. Backends without transaction
    /// support may run the callback directly.
    fn transaction(
        &self,
        work: &mut dyn FnMut(&dyn Connection) -> Result<(), StorageError>,
    ) -> Result<(), StorageError>;
}
