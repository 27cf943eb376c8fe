//! Module: db
//! Responsibility: the session context (connection + dispatcher + type
//! registry) and the per-type static surface.
//! Does not own: plan execution or persistence branching.

use crate::{
    error::Error,
    events::Dispatcher,
    model::{EntityTypeBuilder, EntityTypeRef, Registry},
    query::{Connection, Query, Paginator, Row},
    record::Record,
    value::Value,
};
use std::sync::Arc;

///
/// Db
///
/// One engine session: a query-execution collaborator, an event-dispatch
/// collaborator, and the registry of entity types. Records and relation
/// handles borrow it for every database-facing operation.
///

pub struct Db {
    connection: Arc<dyn Connection>,
    events: Arc<dyn Dispatcher>,
    registry: Registry,
}

impl Db {
    #[must_use]
    pub fn new(connection: Arc<dyn Connection>, events: Arc<dyn Dispatcher>) -> Self {
        Self {
            connection,
            events,
            registry: Registry::new(),
        }
    }

    #[must_use]
    pub fn connection(&self) -> &dyn Connection {
        self.connection.as_ref()
    }

    #[must_use]
    pub fn events(&self) -> &dyn Dispatcher {
        self.events.as_ref()
    }

    #[must_use]
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Boot and register one entity type.
    pub fn register(&self, builder: EntityTypeBuilder) -> Result<EntityTypeRef, Error> {
        Ok(self.registry.register(builder)?)
    }

    /// Resolve a registered type into its static surface.
    pub fn model(&self, name: &str) -> Result<ModelHandle<'_>, Error> {
        let ty = self.registry.get(name)?;

        Ok(ModelHandle { db: self, ty })
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

///
/// ModelHandle
///
/// The per-type static surface: lookups, scoped query entry points, and
/// construction. Every query built here passes through the scope engine.
///

pub struct ModelHandle<'db> {
    db: &'db Db,
    ty: EntityTypeRef,
}

impl<'db> ModelHandle<'db> {
    #[must_use]
    pub fn entity_type(&self) -> &EntityTypeRef {
        &self.ty
    }

    #[must_use]
    pub fn query(&self) -> Query<'db> {
        Query::new(self.db, self.ty.clone())
    }

    #[must_use]
    pub fn where_eq(&self, column: impl Into<String>, value: impl Into<Value>) -> Query<'db> {
        self.query().where_eq(column, value)
    }

    /// Trashed-inclusive query variant.
    #[must_use]
    pub fn with_trashed(&self) -> Query<'db> {
        self.query().with_trashed()
    }

    /// Trashed-only query variant.
    #[must_use]
    pub fn only_trashed(&self) -> Query<'db> {
        self.query().only_trashed()
    }

    pub fn find(&self, key: impl Into<Value>) -> Result<Option<Record>, Error> {
        self.query().find(key)
    }

    /// `find` that fails with `NotFound` (carrying the key and type name)
    /// when no row matches.
    pub fn find_or_fail(&self, key: impl Into<Value>) -> Result<Record, Error> {
        let key = key.into();

        self.query()
            .find(key.clone())?
            .ok_or_else(|| Error::not_found(self.ty.name(), key))
    }

    pub fn all(&self) -> Result<Vec<Record>, Error> {
        self.query().get()
    }

    pub fn first(&self) -> Result<Option<Record>, Error> {
        self.query().first()
    }

    pub fn count(&self) -> Result<u64, Error> {
        self.query().count()
    }

    pub fn paginate(&self, per_page: usize, page: usize) -> Result<Paginator, Error> {
        self.query().paginate(per_page, page)
    }

    /// Bare record, not yet persisted.
    #[must_use]
    pub fn new_record(&self) -> Record {
        Record::new(self.ty.clone())
    }

    /// Hydrate one trusted storage row.
    #[must_use]
    pub fn hydrate(&self, row: Row) -> Record {
        Record::hydrate(self.ty.clone(), row)
    }

    /// Fill a new record through the fillable policy and save it.
    pub fn create(
        &self,
        attrs: impl IntoIterator<Item = (String, Value)>,
    ) -> Result<Record, Error> {
        let mut record = self.new_record();
        record.fill(attrs)?;
        record.save(self.db)?;

        Ok(record)
    }
}
