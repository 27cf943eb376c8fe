use crate::{
    model::RegistryError,
    query::StorageError,
    value::{CastError, Value},
};
use thiserror::Error as ThisError;

///
/// Error
///
/// Top-level runtime error for the engine. Storage failures are carried
/// through unchanged; the persistence protocol never retries or downgrades
/// them.
///

#[derive(Debug, ThisError)]
pub enum Error {
    /// `find_or_fail` matched no row. Carries the looked-up key and the
    /// entity type name for diagnostics.
    #[error("no `{entity}` found for key {key:?}")]
    NotFound { entity: String, key: Value },

    /// Failure surfaced by the query-execution collaborator.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A declared cast could not convert a value.
    #[error(transparent)]
    Cast(#[from] CastError),

    /// Entity-type registration or lookup failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A relation name was requested that the entity type does not declare.
    #[error("entity `{entity}` declares no relation `{relation}`")]
    UnknownRelation { entity: String, relation: String },

    /// A declared relation was accessed through the wrong kind of handle.
    #[error("relation `{relation}` on `{entity}` is not a {expected} relation")]
    RelationKind {
        entity: String,
        relation: String,
        expected: &'static str,
    },

    /// A named local scope was requested that the entity type does not
    /// declare.
    #[error("entity `{entity}` declares no scope `{scope}`")]
    UnknownScope { entity: String, scope: String },

    /// An operation that requires soft deletes was invoked on a type
    /// without a marker column.
    #[error("entity `{entity}` is not soft-delete enabled")]
    NotSoftDeletable { entity: String },
}

impl Error {
    /// Construct a `NotFound` for one primary-key lookup.
    pub fn not_found(entity: impl Into<String>, key: Value) -> Self {
        Self::NotFound {
            entity: entity.into(),
            key,
        }
    }
}
