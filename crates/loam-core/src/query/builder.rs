use crate::{
    db::Db,
    error::Error,
    model::EntityTypeRef,
    query::{Direction, Join, Plan, Predicate, Row},
    record::Record,
    value::Value,
};
use derive_more::Display;

///
/// TrashMode
///
/// Scope-engine escape hatches for soft-delete-enabled types. `Default`
/// excludes trashed rows, `With` suppresses the injected predicate, `Only`
/// inverts it.
///

#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum TrashMode {
    #[default]
    #[display("default")]
    Default,
    #[display("with_trashed")]
    With,
    #[display("only_trashed")]
    Only,
}

///
/// Query
///
/// Fluent builder bound to one entity type and one `Db`. Intent is built
/// pure; the soft-delete scope is injected when the plan is compiled, so
/// every terminal (including `count`) executes against the scoped plan.
///

pub struct Query<'db> {
    db: &'db Db,
    ty: EntityTypeRef,
    plan: Plan,
    trash: TrashMode,
}

impl<'db> Query<'db> {
    #[must_use]
    pub fn new(db: &'db Db, ty: EntityTypeRef) -> Self {
        let plan = Plan::for_table(ty.table());

        Self {
            db,
            ty,
            plan,
            trash: TrashMode::Default,
        }
    }

    #[must_use]
    pub fn entity_type(&self) -> &EntityTypeRef {
        &self.ty
    }

    fn map_plan(mut self, map: impl FnOnce(&mut Plan)) -> Self {
        map(&mut self.plan);
        self
    }

    // ------------------------------------------------------------------
    // Refinement
    // ------------------------------------------------------------------

    #[must_use]
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        let (column, value) = (column.into(), value.into());
        self.map_plan(|plan| plan.predicates.push(Predicate::Eq(column, value)))
    }

    #[must_use]
    pub fn where_in(self, column: impl Into<String>, values: Vec<Value>) -> Self {
        let column = column.into();
        self.map_plan(|plan| plan.predicates.push(Predicate::In(column, values)))
    }

    #[must_use]
    pub fn where_null(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.map_plan(|plan| plan.predicates.push(Predicate::Null(column)))
    }

    #[must_use]
    pub fn where_not_null(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.map_plan(|plan| plan.predicates.push(Predicate::NotNull(column)))
    }

    #[must_use]
    pub fn join(
        self,
        table: impl Into<String>,
        left: impl Into<String>,
        right: impl Into<String>,
    ) -> Self {
        let join = Join {
            table: table.into(),
            left: left.into(),
            right: right.into(),
        };
        self.map_plan(|plan| plan.joins.push(join))
    }

    #[must_use]
    pub fn order_by(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.map_plan(|plan| plan.order_by.push((column, Direction::Asc)))
    }

    #[must_use]
    pub fn order_by_desc(self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.map_plan(|plan| plan.order_by.push((column, Direction::Desc)))
    }

    #[must_use]
    pub fn limit(self, limit: usize) -> Self {
        self.map_plan(|plan| plan.limit = Some(limit))
    }

    #[must_use]
    pub fn offset(self, offset: usize) -> Self {
        self.map_plan(|plan| plan.offset = Some(offset))
    }

    // ------------------------------------------------------------------
    // Scope engine
    // ------------------------------------------------------------------

    /// Include soft-deleted rows.
    #[must_use]
    pub const fn with_trashed(mut self) -> Self {
        self.trash = TrashMode::With;
        self
    }

    /// Only soft-deleted rows.
    #[must_use]
    pub const fn only_trashed(mut self) -> Self {
        self.trash = TrashMode::Only;
        self
    }

    /// Apply a named local scope declared on the entity type.
    pub fn scope(mut self, name: &str, args: &[Value]) -> Result<Self, Error> {
        let Some(scope) = self.ty.scope(name).cloned() else {
            return Err(Error::UnknownScope {
                entity: self.ty.name().to_string(),
                scope: name.to_string(),
            });
        };

        scope(&mut self.plan, args);

        Ok(self)
    }

    /// Build the executable plan. The default soft-delete predicate is
    /// injected here, table-qualified, before anything reaches the
    /// connection.
    #[must_use]
    pub fn compile(&self) -> Plan {
        let mut plan = self.plan.clone();

        if let Some(column) = self.ty.qualified_soft_delete_column() {
            match self.trash {
                TrashMode::Default => plan.predicates.push(Predicate::Null(column)),
                TrashMode::Only => plan.predicates.push(Predicate::NotNull(column)),
                TrashMode::With => {}
            }
        }

        plan
    }

    // ------------------------------------------------------------------
    // Terminals
    // ------------------------------------------------------------------

    pub fn get(&self) -> Result<Vec<Record>, Error> {
        let rows = self.db.connection().select(&self.compile())?;

        Ok(rows
            .into_iter()
            .map(|row| Record::hydrate(self.ty.clone(), row))
            .collect())
    }

    pub fn first(mut self) -> Result<Option<Record>, Error> {
        self.plan.limit = Some(1);

        Ok(self.get()?.into_iter().next())
    }

    /// Primary-key lookup through the scoped plan. The key passes through
    /// the same cast pipeline as any attribute.
    pub fn find(self, key: impl Into<Value>) -> Result<Option<Record>, Error> {
        let ty = self.ty.clone();
        let key = match ty.cast_for(ty.primary_key()) {
            Some(cast) => cast.to_storage(key.into())?,
            None => key.into(),
        };

        self.where_eq(ty.qualified_key(), key).first()
    }

    pub fn count(&self) -> Result<u64, Error> {
        Ok(self.db.connection().count(&self.compile())?)
    }

    pub fn exists(&self) -> Result<bool, Error> {
        Ok(self.count()? > 0)
    }

    /// Offset pagination. Issues one count and one windowed select, both
    /// through the same scoped plan.
    pub fn paginate(self, per_page: usize, page: usize) -> Result<Paginator, Error> {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total = self.count()?;

        let items = self
            .limit(per_page)
            .offset((page - 1) * per_page)
            .get()?;

        Ok(Paginator::new(items, total, per_page, page))
    }

    /// Bulk update of every matched row. Used by the persistence protocol
    /// with a primary-key predicate, and available for scoped bulk writes.
    pub fn update(&self, changes: Row) -> Result<u64, Error> {
        Ok(self.db.connection().update(&self.compile(), changes)?)
    }

    pub fn delete(&self) -> Result<u64, Error> {
        Ok(self.db.connection().delete(&self.compile())?)
    }
}

///
/// Paginator
///
/// One page of records plus the usual offset-pagination bookkeeping.
/// `from`/`to` are 1-based item positions, `None` on an empty page.
///

#[derive(Debug)]
pub struct Paginator {
    pub items: Vec<Record>,
    pub total: u64,
    pub per_page: usize,
    pub current_page: usize,
    pub last_page: usize,
    pub from: Option<usize>,
    pub to: Option<usize>,
}

impl Paginator {
    fn new(items: Vec<Record>, total: u64, per_page: usize, current_page: usize) -> Self {
        let last_page = usize::try_from(total.div_ceil(per_page as u64))
            .unwrap_or(usize::MAX)
            .max(1);

        let (from, to) = if items.is_empty() {
            (None, None)
        } else {
            let from = (current_page - 1) * per_page + 1;
            (Some(from), Some(from + items.len() - 1))
        };

        Self {
            items,
            total,
            per_page,
            current_page,
            last_page,
            from,
            to,
        }
    }
}
