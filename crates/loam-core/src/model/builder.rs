use crate::{
    model::{AccessorFn, EntityType, Guarded, MutatorFn, ScopeFn, Timestamps},
    relation::RelationDef,
    value::CastKind,
};
use std::collections::BTreeMap;

///
/// EntityTypeBuilder
///
/// Declarative construction of one `EntityType`. All type-level
/// customization (casts, transforms, scopes, relations, boot hook) is
/// declared here and frozen at registration; there is no lazily-booted
/// mutable type state at runtime.
///

pub struct EntityTypeBuilder {
    pub(crate) name: &'static str,
    pub(crate) table: &'static str,
    primary_key: &'static str,
    fillable: Vec<&'static str>,
    guarded: Guarded,
    hidden: Vec<&'static str>,
    visible: Vec<&'static str>,
    appends: Vec<&'static str>,
    casts: BTreeMap<&'static str, CastKind>,
    soft_delete: Option<&'static str>,
    timestamps: Option<Timestamps>,
    accessors: BTreeMap<&'static str, AccessorFn>,
    mutators: BTreeMap<&'static str, MutatorFn>,
    scopes: BTreeMap<&'static str, ScopeFn>,
    relations: BTreeMap<&'static str, RelationDef>,
    pub(crate) boot: Option<Box<dyn FnOnce(&mut Self) + Send>>,
}

impl EntityTypeBuilder {
    /// Start a builder for one entity type. Timestamps default on; the
    /// primary key defaults to `id`.
    #[must_use]
    pub fn new(name: &'static str, table: &'static str) -> Self {
        Self {
            name,
            table,
            primary_key: "id",
            fillable: Vec::new(),
            guarded: Guarded::All,
            hidden: Vec::new(),
            visible: Vec::new(),
            appends: Vec::new(),
            casts: BTreeMap::new(),
            soft_delete: None,
            timestamps: Some(Timestamps::default()),
            accessors: BTreeMap::new(),
            mutators: BTreeMap::new(),
            scopes: BTreeMap::new(),
            relations: BTreeMap::new(),
            boot: None,
        }
    }

    #[must_use]
    pub const fn primary_key(mut self, key: &'static str) -> Self {
        self.primary_key = key;
        self
    }

    #[must_use]
    pub fn fillable(mut self, fields: &[&'static str]) -> Self {
        self.fillable = fields.to_vec();
        self
    }

    #[must_use]
    pub fn guarded(mut self, guarded: Guarded) -> Self {
        self.guarded = guarded;
        self
    }

    #[must_use]
    pub fn hidden(mut self, fields: &[&'static str]) -> Self {
        self.hidden = fields.to_vec();
        self
    }

    #[must_use]
    pub fn visible(mut self, fields: &[&'static str]) -> Self {
        self.visible = fields.to_vec();
        self
    }

    /// Declare computed attributes included in serialization. Each name
    /// must also have an accessor registered.
    #[must_use]
    pub fn appends(mut self, fields: &[&'static str]) -> Self {
        self.appends = fields.to_vec();
        self
    }

    #[must_use]
    pub fn cast(mut self, field: &'static str, kind: CastKind) -> Self {
        self.casts.insert(field, kind);
        self
    }

    /// Enable soft deletes with the conventional `deleted_at` marker.
    #[must_use]
    pub const fn soft_deletes(self) -> Self {
        self.soft_deletes_column("deleted_at")
    }

    #[must_use]
    pub const fn soft_deletes_column(mut self, column: &'static str) -> Self {
        self.soft_delete = Some(column);
        self
    }

    #[must_use]
    pub const fn without_timestamps(mut self) -> Self {
        self.timestamps = None;
        self
    }

    #[must_use]
    pub const fn timestamps(mut self, timestamps: Timestamps) -> Self {
        self.timestamps = Some(timestamps);
        self
    }

    #[must_use]
    pub fn accessor(mut self, field: &'static str, accessor: AccessorFn) -> Self {
        self.accessors.insert(field, accessor);
        self
    }

    #[must_use]
    pub fn mutator(mut self, field: &'static str, mutator: MutatorFn) -> Self {
        self.mutators.insert(field, mutator);
        self
    }

    #[must_use]
    pub fn scope(mut self, name: &'static str, scope: ScopeFn) -> Self {
        self.scopes.insert(name, scope);
        self
    }

    #[must_use]
    pub fn relation(mut self, name: &'static str, def: RelationDef) -> Self {
        self.relations.insert(name, def);
        self
    }

    /// One-time boot hook, run exactly once by the registry before the
    /// type is frozen. Replaces lazily-checked per-type boot flags.
    #[must_use]
    pub fn boot(mut self, hook: impl FnOnce(&mut Self) + Send + 'static) -> Self {
        self.boot = Some(Box::new(hook));
        self
    }

    // Mutating forms used from inside boot hooks.

    pub fn add_cast(&mut self, field: &'static str, kind: CastKind) {
        self.casts.insert(field, kind);
    }

    pub fn add_scope(&mut self, name: &'static str, scope: ScopeFn) {
        self.scopes.insert(name, scope);
    }

    pub fn add_accessor(&mut self, field: &'static str, accessor: AccessorFn) {
        self.accessors.insert(field, accessor);
    }

    pub(crate) fn finish(self) -> EntityType {
        EntityType {
            name: self.name,
            table: self.table,
            primary_key: self.primary_key,
            fillable: self.fillable,
            guarded: self.guarded,
            hidden: self.hidden,
            visible: self.visible,
            appends: self.appends,
            casts: self.casts,
            soft_delete: self.soft_delete,
            timestamps: self.timestamps,
            accessors: self.accessors,
            mutators: self.mutators,
            scopes: self.scopes,
            relations: self.relations,
        }
    }
}
