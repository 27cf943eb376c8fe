//! Core runtime for Loam: dynamic values and casts, entity-type models,
//! records with dirty tracking, scoped queries, the persistence protocol,
//! relation resolution, and hook dispatch.

pub mod db;
pub mod error;
pub mod events;
pub mod model;
pub mod query;
pub mod record;
pub mod relation;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;

///
/// CONSTANTS
///

/// Maximum number of keys sent in one `where in` batch when resolving
/// through-relations. Keeps fan-out queries bounded on large intermediate
/// sets.
pub const RELATION_KEY_BATCH: usize = 1000;

///
/// Prelude
///
/// Domain vocabulary only. Backends, dispatchers, and error internals are
/// imported from their modules directly.
///

pub mod prelude {
    pub use crate::{
        db::{Db, ModelHandle},
        model::{EntityType, EntityTypeBuilder, Guarded},
        record::Record,
        value::{CastKind, Value},
    };
}
