//! ## Crate layout
//! - `core`: the engine — values and casts, entity-type models, records,
//!   scoped queries, the persistence protocol, relations, and hook
//!   dispatch.
//!
//! The `prelude` module mirrors the surface embedders use day to day.

pub use loam_core as core;

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use loam_core::error::Error;

///
/// Prelude
/// using _ brings traits into scope and avoids name conflicts
///

pub mod prelude {
    pub use crate::core::{
        db::{Db, ModelHandle},
        events::{Dispatcher as _, Hook, HookDispatcher, NullDispatcher},
        model::{EntityType, EntityTypeBuilder, Guarded, Registry, Timestamps},
        query::{Connection as _, MemoryConnection, Paginator, Query, TrashMode},
        record::{Record, Related},
        relation::{
            BelongsTo, BelongsToMany, HasMany, HasManyThrough, HasOne, PivotChanges, RelationDef,
        },
        value::{CastKind, Value},
    };
}
