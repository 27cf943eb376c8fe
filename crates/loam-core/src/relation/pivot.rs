//! Many-to-many pivot mutation: attach, detach, sync, toggle. All
//! operations go straight at the pivot table through the connection and
//! never touch dirty state on the owner or related records.
//!
//! `sync` and `toggle` are read-then-write sequences with no isolation
//! guarantee; concurrent callers reconciling the same owner can lose
//! updates. Callers needing atomicity must serialize externally or wrap
//! the call in their connection's transaction.

use crate::{
    db::Db,
    error::Error,
    model::EntityTypeRef,
    query::{Plan, Predicate, Query, Row},
    record::Record,
    value::Value,
};

///
/// PivotChanges
///
/// Ids attached and detached by one `sync` or `toggle` reconciliation.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PivotChanges {
    pub attached: Vec<Value>,
    pub detached: Vec<Value>,
}

///
/// BelongsToMany
///
/// One owner's view of a many-to-many relation: reads join through the
/// pivot table, writes mutate pivot rows keyed by the owner's parent key.
///

pub struct BelongsToMany<'db> {
    db: &'db Db,
    related: EntityTypeRef,
    pivot_table: &'static str,
    foreign_pivot_key: &'static str,
    related_pivot_key: &'static str,
    related_key: &'static str,
    parent_value: Value,
}

impl<'db> BelongsToMany<'db> {
    pub(crate) const fn new(
        db: &'db Db,
        related: EntityTypeRef,
        pivot_table: &'static str,
        foreign_pivot_key: &'static str,
        related_pivot_key: &'static str,
        related_key: &'static str,
        parent_value: Value,
    ) -> Self {
        Self {
            db,
            related,
            pivot_table,
            foreign_pivot_key,
            related_pivot_key,
            related_key,
            parent_value,
        }
    }

    /// Related-side query joined through the pivot and constrained to this
    /// owner. Passes through the related type's scope engine as usual.
    #[must_use]
    pub fn query(&self) -> Query<'db> {
        Query::new(self.db, self.related.clone())
            .join(
                self.pivot_table,
                format!("{}.{}", self.related.table(), self.related_key),
                format!("{}.{}", self.pivot_table, self.related_pivot_key),
            )
            .where_eq(
                format!("{}.{}", self.pivot_table, self.foreign_pivot_key),
                self.parent_value.clone(),
            )
    }

    pub fn get(&self) -> Result<Vec<Record>, Error> {
        self.query().get()
    }

    // Pivot plan for this owner, optionally narrowed to specific ids.
    fn pivot_plan(&self, ids: Option<&[Value]>) -> Plan {
        let mut plan = Plan::for_table(self.pivot_table);
        plan.predicates.push(Predicate::Eq(
            self.foreign_pivot_key.to_string(),
            self.parent_value.clone(),
        ));
        if let Some(ids) = ids {
            plan.predicates.push(Predicate::In(
                self.related_pivot_key.to_string(),
                ids.to_vec(),
            ));
        }

        plan
    }

    /// Current related-id set on the pivot for this owner.
    pub fn current_ids(&self) -> Result<Vec<Value>, Error> {
        let rows = self.db.connection().select(&self.pivot_plan(None))?;

        Ok(rows
            .into_iter()
            .filter_map(|row| row.get(self.related_pivot_key).cloned())
            .collect())
    }

    /// Insert one pivot row per id, merging `extra` columns into each.
    /// Not idempotent against duplicate ids; uniqueness is the pivot
    /// table's (and so the caller's) responsibility.
    pub fn attach(&self, ids: &[Value], extra: Option<&Row>) -> Result<(), Error> {
        for id in ids {
            let mut row = extra.cloned().unwrap_or_default();
            row.insert(
                self.foreign_pivot_key.to_string(),
                self.parent_value.clone(),
            );
            row.insert(self.related_pivot_key.to_string(), id.clone());

            self.db.connection().insert(self.pivot_table, row)?;
        }

        tracing::debug!(
            pivot = self.pivot_table,
            count = ids.len(),
            "attached pivot rows"
        );

        Ok(())
    }

    /// Delete pivot rows for this owner, narrowed to `ids` when given.
    /// Idempotent: detaching an absent id is a no-op. Returns the number
    /// of rows removed.
    pub fn detach(&self, ids: Option<&[Value]>) -> Result<u64, Error> {
        let removed = self.db.connection().delete(&self.pivot_plan(ids))?;

        tracing::debug!(pivot = self.pivot_table, removed, "detached pivot rows");

        Ok(removed)
    }

    /// Reconcile the pivot set to exactly `ids`: attach the missing ones
    /// and, when `detaching`, detach the ones no longer listed. Ids
    /// already present are left untouched. Read-then-write; see the module
    /// note on concurrency.
    pub fn sync(&self, ids: &[Value], detaching: bool) -> Result<PivotChanges, Error> {
        let current = self.current_ids()?;

        let attached: Vec<Value> = ids
            .iter()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();
        let detached: Vec<Value> = if detaching {
            current
                .iter()
                .filter(|id| !ids.contains(id))
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        if !detached.is_empty() {
            self.detach(Some(&detached))?;
        }
        if !attached.is_empty() {
            self.attach(&attached, None)?;
        }

        Ok(PivotChanges { attached, detached })
    }

    /// Flip membership per id: attach the absent, detach the present.
    /// Computed from one current-set read, like `sync`.
    pub fn toggle(&self, ids: &[Value]) -> Result<PivotChanges, Error> {
        let current = self.current_ids()?;

        let attached: Vec<Value> = ids
            .iter()
            .filter(|id| !current.contains(id))
            .cloned()
            .collect();
        let detached: Vec<Value> = ids
            .iter()
            .filter(|id| current.contains(id))
            .cloned()
            .collect();

        if !detached.is_empty() {
            self.detach(Some(&detached))?;
        }
        if !attached.is_empty() {
            self.attach(&attached, None)?;
        }

        Ok(PivotChanges { attached, detached })
    }
}
