//! Module: relation
//! Responsibility: relation descriptors, constrained query construction for
//! the five relation kinds, and relation-cache resolution on records.
//! Does not own: pivot mutation algorithms (`pivot`) or scope injection
//! (queries constructed here pass through the scope engine like any other).

mod pivot;

#[cfg(test)]
mod tests;

use crate::{
    RELATION_KEY_BATCH,
    db::Db,
    error::Error,
    model::EntityTypeRef,
    query::Query,
    record::{Record, Related},
    value::Value,
};

// re-exports
pub use pivot::{BelongsToMany, PivotChanges};

///
/// RelationDef
///
/// Static relation descriptor declared on an entity type. Key names are
/// unqualified column names; `related` (and `through`) are registered
/// entity type names resolved at access time.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RelationDef {
    HasOne {
        related: &'static str,
        foreign_key: &'static str,
        local_key: &'static str,
    },
    HasMany {
        related: &'static str,
        foreign_key: &'static str,
        local_key: &'static str,
    },
    BelongsTo {
        related: &'static str,
        foreign_key: &'static str,
        owner_key: &'static str,
    },
    BelongsToMany {
        related: &'static str,
        pivot_table: &'static str,
        foreign_pivot_key: &'static str,
        related_pivot_key: &'static str,
        parent_key: &'static str,
        related_key: &'static str,
    },
    HasManyThrough {
        related: &'static str,
        through: &'static str,
        first_key: &'static str,
        second_key: &'static str,
        local_key: &'static str,
        through_key: &'static str,
    },
}

impl RelationDef {
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::HasOne { .. } => "has_one",
            Self::HasMany { .. } => "has_many",
            Self::BelongsTo { .. } => "belongs_to",
            Self::BelongsToMany { .. } => "belongs_to_many",
            Self::HasManyThrough { .. } => "has_many_through",
        }
    }
}

///
/// HasOne
///

pub struct HasOne<'db> {
    db: &'db Db,
    related: EntityTypeRef,
    foreign_key: &'static str,
    local_value: Value,
}

impl<'db> HasOne<'db> {
    #[must_use]
    pub fn query(&self) -> Query<'db> {
        Query::new(self.db, self.related.clone()).where_eq(
            format!("{}.{}", self.related.table(), self.foreign_key),
            self.local_value.clone(),
        )
    }

    pub fn get(&self) -> Result<Option<Record>, Error> {
        self.query().first()
    }
}

///
/// HasMany
///

pub struct HasMany<'db> {
    db: &'db Db,
    related: EntityTypeRef,
    foreign_key: &'static str,
    local_value: Value,
}

impl<'db> HasMany<'db> {
    #[must_use]
    pub fn query(&self) -> Query<'db> {
        Query::new(self.db, self.related.clone()).where_eq(
            format!("{}.{}", self.related.table(), self.foreign_key),
            self.local_value.clone(),
        )
    }

    pub fn get(&self) -> Result<Vec<Record>, Error> {
        self.query().get()
    }

    /// Insert one related record with the foreign key pre-filled. `attrs`
    /// pass through the related type's fill policy.
    pub fn create(
        &self,
        attrs: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Record, Error> {
        let mut record = Record::new(self.related.clone());
        record.fill(attrs)?;
        record.force_fill([(self.foreign_key.to_string(), self.local_value.clone())])?;
        record.save(self.db)?;

        Ok(record)
    }
}

///
/// BelongsTo
///
/// Read side of the inverse relation. The in-memory mutation surface
/// (`associate`/`dissociate`) lives on `Record`, since it writes the
/// owner's foreign key.
///

pub struct BelongsTo<'db> {
    db: &'db Db,
    related: EntityTypeRef,
    owner_key: &'static str,
    foreign_value: Value,
}

impl<'db> BelongsTo<'db> {
    #[must_use]
    pub fn query(&self) -> Query<'db> {
        Query::new(self.db, self.related.clone()).where_eq(
            format!("{}.{}", self.related.table(), self.owner_key),
            self.foreign_value.clone(),
        )
    }

    pub fn get(&self) -> Result<Option<Record>, Error> {
        if self.foreign_value.is_null() {
            return Ok(None);
        }

        self.query().first()
    }
}

///
/// HasManyThrough
///
/// Resolves in two round trips: intermediate rows first, then related rows
/// for the collected intermediate keys, chunked at `RELATION_KEY_BATCH`.
///

pub struct HasManyThrough<'db> {
    db: &'db Db,
    related: EntityTypeRef,
    through: EntityTypeRef,
    first_key: &'static str,
    second_key: &'static str,
    through_key: &'static str,
    local_value: Value,
}

impl HasManyThrough<'_> {
    pub fn get(&self) -> Result<Vec<Record>, Error> {
        let intermediate = Query::new(self.db, self.through.clone())
            .where_eq(
                format!("{}.{}", self.through.table(), self.first_key),
                self.local_value.clone(),
            )
            .get()?;

        let keys: Vec<Value> = intermediate
            .iter()
            .filter_map(|row| row.get_raw(self.through_key).cloned())
            .filter(|key| !key.is_null())
            .collect();

        let mut out = Vec::new();
        for chunk in keys.chunks(RELATION_KEY_BATCH) {
            let batch = Query::new(self.db, self.related.clone())
                .where_in(
                    format!("{}.{}", self.related.table(), self.second_key),
                    chunk.to_vec(),
                )
                .get()?;
            out.extend(batch);
        }

        Ok(out)
    }
}

// ----------------------------------------------------------------------
// Record-side accessors
// ----------------------------------------------------------------------

impl Record {
    fn relation_def(&self, name: &str) -> Result<RelationDef, Error> {
        self.ty
            .relation(name)
            .cloned()
            .ok_or_else(|| Error::UnknownRelation {
                entity: self.ty.name().to_string(),
                relation: name.to_string(),
            })
    }

    fn kind_mismatch(&self, name: &str, expected: &'static str) -> Error {
        Error::RelationKind {
            entity: self.ty.name().to_string(),
            relation: name.to_string(),
            expected,
        }
    }

    pub fn has_one<'db>(&self, db: &'db Db, name: &str) -> Result<HasOne<'db>, Error> {
        match self.relation_def(name)? {
            RelationDef::HasOne {
                related,
                foreign_key,
                local_key,
            } => Ok(HasOne {
                db,
                related: db.registry().get(related)?,
                foreign_key,
                local_value: self.get_raw(local_key).cloned().unwrap_or(Value::Null),
            }),
            _ => Err(self.kind_mismatch(name, "has_one")),
        }
    }

    pub fn has_many<'db>(&self, db: &'db Db, name: &str) -> Result<HasMany<'db>, Error> {
        match self.relation_def(name)? {
            RelationDef::HasMany {
                related,
                foreign_key,
                local_key,
            } => Ok(HasMany {
                db,
                related: db.registry().get(related)?,
                foreign_key,
                local_value: self.get_raw(local_key).cloned().unwrap_or(Value::Null),
            }),
            _ => Err(self.kind_mismatch(name, "has_many")),
        }
    }

    pub fn belongs_to<'db>(&self, db: &'db Db, name: &str) -> Result<BelongsTo<'db>, Error> {
        match self.relation_def(name)? {
            RelationDef::BelongsTo {
                related,
                foreign_key,
                owner_key,
            } => Ok(BelongsTo {
                db,
                related: db.registry().get(related)?,
                owner_key,
                foreign_value: self.get_raw(foreign_key).cloned().unwrap_or(Value::Null),
            }),
            _ => Err(self.kind_mismatch(name, "belongs_to")),
        }
    }

    pub fn belongs_to_many<'db>(
        &self,
        db: &'db Db,
        name: &str,
    ) -> Result<BelongsToMany<'db>, Error> {
        match self.relation_def(name)? {
            RelationDef::BelongsToMany {
                related,
                pivot_table,
                foreign_pivot_key,
                related_pivot_key,
                parent_key,
                related_key,
            } => Ok(BelongsToMany::new(
                db,
                db.registry().get(related)?,
                pivot_table,
                foreign_pivot_key,
                related_pivot_key,
                related_key,
                self.get_raw(parent_key).cloned().unwrap_or(Value::Null),
            )),
            _ => Err(self.kind_mismatch(name, "belongs_to_many")),
        }
    }

    pub fn has_many_through<'db>(
        &self,
        db: &'db Db,
        name: &str,
    ) -> Result<HasManyThrough<'db>, Error> {
        match self.relation_def(name)? {
            RelationDef::HasManyThrough {
                related,
                through,
                first_key,
                second_key,
                local_key,
                through_key,
            } => Ok(HasManyThrough {
                db,
                related: db.registry().get(related)?,
                through: db.registry().get(through)?,
                first_key,
                second_key,
                through_key,
                local_value: self.get_raw(local_key).cloned().unwrap_or(Value::Null),
            }),
            _ => Err(self.kind_mismatch(name, "has_many_through")),
        }
    }

    /// Set this record's foreign key from the given related record, in
    /// memory only; nothing persists until the owner is saved.
    pub fn associate(&mut self, name: &str, related: &Record) -> Result<(), Error> {
        match self.relation_def(name)? {
            RelationDef::BelongsTo {
                foreign_key,
                owner_key,
                ..
            } => {
                let value = related.get_raw(owner_key).cloned().unwrap_or(Value::Null);
                self.force_fill([(foreign_key.to_string(), value)])
            }
            _ => Err(self.kind_mismatch(name, "belongs_to")),
        }
    }

    /// Null this record's foreign key, in memory only.
    pub fn dissociate(&mut self, name: &str) -> Result<(), Error> {
        match self.relation_def(name)? {
            RelationDef::BelongsTo { foreign_key, .. } => {
                self.set_raw(foreign_key, Value::Null);
                Ok(())
            }
            _ => Err(self.kind_mismatch(name, "belongs_to")),
        }
    }

    /// Resolve a relation by name and cache the result on this record.
    /// Repeat calls return the cached resolution without querying.
    pub fn load(&mut self, db: &Db, name: &str) -> Result<&Related, Error> {
        if self.relation_cache(name).is_none() {
            let related = match self.relation_def(name)? {
                RelationDef::HasOne { .. } => Related::One(self.has_one(db, name)?.get()?),
                RelationDef::BelongsTo { .. } => Related::One(self.belongs_to(db, name)?.get()?),
                RelationDef::HasMany { .. } => Related::Many(self.has_many(db, name)?.get()?),
                RelationDef::BelongsToMany { .. } => {
                    Related::Many(self.belongs_to_many(db, name)?.get()?)
                }
                RelationDef::HasManyThrough { .. } => {
                    Related::Many(self.has_many_through(db, name)?.get()?)
                }
            };
            self.cache_relation(name, related);
        }

        Ok(self
            .relation_cache(name)
            .expect("relation cached immediately above"))
    }
}
