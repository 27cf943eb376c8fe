mod builder;
mod registry;


use crate::{
    error::Error,
    query::Plan,
    record::Record,
    relation::RelationDef,
    value::{CastKind, Value},
};
use std::{collections::BTreeMap, sync::Arc};

// re-exports
pub use builder::EntityTypeBuilder;
pub use registry::{Registry, RegistryError};

///
/// AccessorFn
///
/// Custom read transform for one attribute. Receives the whole record so
/// computed attributes can combine fields.
///

pub type AccessorFn = Arc<dyn Fn(&Record) -> Result<Value, Error> + Send + Sync>;

///
/// MutatorFn
///
/// Custom write transform for one attribute. The mutator assumes
/// responsibility for final storage and may call `set_raw` one or more
/// times.
///

pub type MutatorFn = Arc<dyn Fn(&mut Record, Value) -> Result<(), Error> + Send + Sync>;

///
/// ScopeFn
///
/// Named local scope: a plain plan-transforming function with optional
/// arguments, composable by chaining `Query::scope` calls.
///

pub type ScopeFn = Arc<dyn Fn(&mut Plan, &[Value]) + Send + Sync>;

///
/// Guarded
///
/// Write-denylist policy consulted by `fill` when the fillable allowlist is
/// empty. `All` is the wildcard: nothing mass-assignable.
///

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum Guarded {
    #[default]
    All,
    Fields(Vec<&'static str>),
}

///
/// Timestamps
///
/// Column names written by the persistence protocol when the type enables
/// timestamping.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Timestamps {
    pub created_at: &'static str,
    pub updated_at: &'static str,
}

impl Default for Timestamps {
    fn default() -> Self {
        Self {
            created_at: "created_at",
            updated_at: "updated_at",
        }
    }
}

///
/// EntityType
///
/// Shared schema-level descriptor for a family of records: table identity,
/// key names, write and serialization policy, cast map, soft-delete and
/// timestamp configuration, and the per-field transform registries. Built
/// once through `EntityTypeBuilder` and registered with `Registry`; never
/// mutated afterwards.
///

pub struct EntityType {
    pub(crate) name: &'static str,
    pub(crate) table: &'static str,
    pub(crate) primary_key: &'static str,
    pub(crate) fillable: Vec<&'static str>,
    pub(crate) guarded: Guarded,
    pub(crate) hidden: Vec<&'static str>,
    pub(crate) visible: Vec<&'static str>,
    pub(crate) appends: Vec<&'static str>,
    pub(crate) casts: BTreeMap<&'static str, CastKind>,
    pub(crate) soft_delete: Option<&'static str>,
    pub(crate) timestamps: Option<Timestamps>,
    pub(crate) accessors: BTreeMap<&'static str, AccessorFn>,
    pub(crate) mutators: BTreeMap<&'static str, MutatorFn>,
    pub(crate) scopes: BTreeMap<&'static str, ScopeFn>,
    pub(crate) relations: BTreeMap<&'static str, RelationDef>,
}

impl EntityType {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn table(&self) -> &'static str {
        self.table
    }

    #[must_use]
    pub const fn primary_key(&self) -> &'static str {
        self.primary_key
    }

    /// Soft-delete marker column, when the type is soft-delete enabled.
    #[must_use]
    pub const fn soft_delete_column(&self) -> Option<&'static str> {
        self.soft_delete
    }

    #[must_use]
    pub const fn timestamps(&self) -> Option<Timestamps> {
        self.timestamps
    }

    #[must_use]
    pub fn cast_for(&self, field: &str) -> Option<CastKind> {
        self.casts.get(field).copied()
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.get(name)
    }

    #[must_use]
    pub fn scope(&self, name: &str) -> Option<&ScopeFn> {
        self.scopes.get(name)
    }

    pub(crate) fn accessor(&self, field: &str) -> Option<&AccessorFn> {
        self.accessors.get(field)
    }

    pub(crate) fn mutator(&self, field: &str) -> Option<&MutatorFn> {
        self.mutators.get(field)
    }

    /// Mass-assignment policy: a non-empty fillable list is an allowlist;
    /// otherwise the guarded list is a denylist, with `Guarded::All`
    /// blocking everything.
    #[must_use]
    pub fn is_fillable(&self, field: &str) -> bool {
        if !self.fillable.is_empty() {
            return self.fillable.iter().any(|f| *f == field);
        }

        match &self.guarded {
            Guarded::All => false,
            Guarded::Fields(fields) => !fields.iter().any(|f| *f == field),
        }
    }

    /// Marker column qualified by table name, correct under joins.
    #[must_use]
    pub fn qualified_soft_delete_column(&self) -> Option<String> {
        self.soft_delete
            .map(|column| format!("{}.{column}", self.table))
    }

    #[must_use]
    pub fn qualified_key(&self) -> String {
        format!("{}.{}", self.table, self.primary_key)
    }
}

impl std::fmt::Debug for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("table", &self.table)
            .field("primary_key", &self.primary_key)
            .field("soft_delete", &self.soft_delete)
            .finish_non_exhaustive()
    }
}

/// Shared handle alias used across records, queries, and relations.
pub type EntityTypeRef = Arc<EntityType>;
