//! Module: record
//! Responsibility: the attribute container (current values, last-persisted
//! snapshot, dirty tracking), the mutator/cast read-write pipeline, fill
//! policy, serialization, and the persistence protocol.
//! Does not own: query planning or relation constraint math.

mod persist;


use crate::{
    error::Error,
    model::EntityTypeRef,
    query::Row,
    value::Value,
};
use std::collections::BTreeMap;

///
/// Related
///
/// Cached result of one resolved relation, kept for the record's lifetime
/// or until explicitly unloaded.
///

#[derive(Debug)]
pub enum Related {
    One(Option<Record>),
    Many(Vec<Record>),
}

///
/// Record
///
/// One in-memory instance mapped to one persisted row. `attributes` holds
/// storage representations; reads convert to in-memory form through the
/// cast/accessor pipeline. `original` is the snapshot taken at the last
/// successful load or write and drives diffing.
///

#[derive(Debug)]
pub struct Record {
    pub(crate) ty: EntityTypeRef,
    pub(crate) attributes: Row,
    pub(crate) original: Row,
    relations: BTreeMap<String, Related>,
    pub(crate) exists: bool,
    pub(crate) recently_created: bool,
}

impl Record {
    /// Bare construction: not persisted, empty snapshot.
    #[must_use]
    pub fn new(ty: EntityTypeRef) -> Self {
        Self {
            ty,
            attributes: Row::new(),
            original: Row::new(),
            relations: BTreeMap::new(),
            exists: false,
            recently_created: false,
        }
    }

    /// Hydrate from a trusted storage row: attributes land via the
    /// policy-bypassing path, the snapshot syncs immediately, and the
    /// record is marked as existing.
    #[must_use]
    pub fn hydrate(ty: EntityTypeRef, row: Row) -> Self {
        let mut record = Self::new(ty);
        for (field, value) in row {
            record.attributes.insert(field, value);
        }
        record.exists = true;
        record.sync_original();

        record
    }

    #[must_use]
    pub fn entity_type(&self) -> &EntityTypeRef {
        &self.ty
    }

    #[must_use]
    pub const fn exists(&self) -> bool {
        self.exists
    }

    #[must_use]
    pub const fn recently_created(&self) -> bool {
        self.recently_created
    }

    // ------------------------------------------------------------------
    // Attribute pipeline
    // ------------------------------------------------------------------

    /// Write one attribute. A registered mutator takes over entirely;
    /// otherwise the declared cast converts the value to storage form.
    pub fn set(&mut self, field: &str, value: impl Into<Value>) -> Result<(), Error> {
        let value = value.into();

        if let Some(mutator) = self.ty.mutator(field).cloned() {
            return mutator(self, value);
        }

        let value = match self.ty.cast_for(field) {
            Some(cast) => cast.to_storage(value)?,
            None => value,
        };
        self.set_raw(field, value);

        Ok(())
    }

    /// Store a value without casts or mutators. This is the final-storage
    /// hook mutators call, and the hydration write path.
    pub fn set_raw(&mut self, field: &str, value: Value) {
        self.attributes.insert(field.to_string(), value);
    }

    /// Read one attribute. A registered accessor wins (this also serves
    /// appended computed attributes); otherwise the declared cast converts
    /// the stored value to in-memory form.
    pub fn get(&self, field: &str) -> Result<Value, Error> {
        if let Some(accessor) = self.ty.accessor(field) {
            return accessor(self);
        }

        let stored = self.attributes.get(field).cloned().unwrap_or(Value::Null);

        match self.ty.cast_for(field) {
            Some(cast) => Ok(cast.to_memory(stored)?),
            None => Ok(stored),
        }
    }

    /// Raw stored value, no pipeline.
    #[must_use]
    pub fn get_raw(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    /// Mass-assign through the fillable/guarded policy. Keys that fail the
    /// policy are dropped with a warning, not an error.
    pub fn fill(&mut self, map: impl IntoIterator<Item = (String, Value)>) -> Result<(), Error> {
        for (field, value) in map {
            if self.ty.is_fillable(&field) {
                self.set(&field, value)?;
            } else {
                tracing::warn!(
                    entity = self.ty.name(),
                    field = field.as_str(),
                    "dropping non-fillable field in fill"
                );
            }
        }

        Ok(())
    }

    /// Mass-assign bypassing the fill policy. Values still normalize
    /// through declared casts (idempotent on trusted rows); custom
    /// mutators do not run.
    pub fn force_fill(
        &mut self,
        map: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<(), Error> {
        for (field, value) in map {
            let value = match self.ty.cast_for(&field) {
                Some(cast) => cast.to_storage(value)?,
                None => value,
            };
            self.set_raw(&field, value);
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Dirty tracking
    // ------------------------------------------------------------------

    /// Attributes that differ from the last-synced snapshot, in storage
    /// representation. This is the minimal diff the update path writes.
    #[must_use]
    pub fn dirty(&self) -> Row {
        self.attributes
            .iter()
            .filter(|(field, value)| self.original.get(field.as_str()) != Some(value))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }

    /// True iff any attribute differs from the snapshot. With `fields`,
    /// true iff at least one of the named fields is dirty.
    #[must_use]
    pub fn is_dirty(&self, fields: Option<&[&str]>) -> bool {
        let dirty = self.dirty();

        match fields {
            None => !dirty.is_empty(),
            Some(fields) => fields.iter().any(|f| dirty.contains_key(*f)),
        }
    }

    /// Copy current attributes into the snapshot and clear dirtiness.
    /// Invoked after every successful persistence operation.
    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    /// Primary-key value, read through the same pipeline as any attribute.
    pub fn get_key(&self) -> Result<Value, Error> {
        self.get(self.ty.primary_key())
    }

    pub fn set_key(&mut self, key: impl Into<Value>) -> Result<(), Error> {
        let pk = self.ty.primary_key();
        self.set(pk, key)
    }

    /// Stored (uncast) key, used to build primary-key predicates.
    #[must_use]
    pub fn stored_key(&self) -> Value {
        self.attributes
            .get(self.ty.primary_key())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Instance-level trashed predicate: true iff the soft-delete marker
    /// is set. Usable without issuing a query.
    #[must_use]
    pub fn trashed(&self) -> bool {
        self.ty
            .soft_delete_column()
            .and_then(|column| self.attributes.get(column))
            .is_some_and(|value| !value.is_null())
    }

    // ------------------------------------------------------------------
    // Relation cache
    // ------------------------------------------------------------------

    #[must_use]
    pub fn relation_cache(&self, name: &str) -> Option<&Related> {
        self.relations.get(name)
    }

    pub fn cache_relation(&mut self, name: impl Into<String>, related: Related) {
        self.relations.insert(name.into(), related);
    }

    pub fn unload_relation(&mut self, name: &str) -> Option<Related> {
        self.relations.remove(name)
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Plain field map in memory representation, honoring the visible
    /// allowlist, the hidden denylist, and appended computed attributes.
    /// Intended for downstream JSON encoding.
    pub fn to_map(&self) -> Result<BTreeMap<String, Value>, Error> {
        let mut out = BTreeMap::new();

        for field in self.attributes.keys() {
            if self.serializes(field) {
                out.insert(field.clone(), self.get(field)?);
            }
        }

        for field in &self.ty.appends {
            if self.serializes(field) {
                out.insert((*field).to_string(), self.get(field)?);
            }
        }

        Ok(out)
    }

    // Visibility policy: a non-empty visible list is an allowlist, then
    // hidden removes.
    fn serializes(&self, field: &str) -> bool {
        if !self.ty.visible.is_empty() && !self.ty.visible.iter().any(|v| *v == field) {
            return false;
        }

        !self.ty.hidden.iter().any(|h| *h == field)
    }
}
