//! Persistence protocol: insert/update branch selection, soft and hard
//! deletes, restore, timestamp injection, and lifecycle hook dispatch.
//! Timestamps are merged into the write map here, before the connection is
//! called; the connection's contract is never patched.

use crate::{
    db::Db,
    error::Error,
    events::Hook,
    query::{Query, Row},
    record::Record,
    value::Value,
};
use time::OffsetDateTime;

impl Record {
    /// Persist the record: insert when it does not exist yet, otherwise a
    /// minimal-diff update. Returns `Ok(false)` when a halting hook vetoed
    /// the operation; storage failures propagate unchanged.
    pub fn save(&mut self, db: &Db) -> Result<bool, Error> {
        if !self.fire_halting(db, Hook::Saving) {
            return Ok(false);
        }

        let saved = if self.exists {
            self.perform_update(db)?
        } else {
            self.perform_insert(db)?
        };

        if saved {
            self.fire(db, Hook::Saved);
        }

        Ok(saved)
    }

    fn perform_insert(&mut self, db: &Db) -> Result<bool, Error> {
        if !self.fire_halting(db, Hook::Creating) {
            return Ok(false);
        }

        if let Some(timestamps) = self.ty.timestamps() {
            let now = Value::DateTime(OffsetDateTime::now_utc());
            self.touch_if_clean(timestamps.created_at, now.clone())?;
            self.touch_if_clean(timestamps.updated_at, now)?;
        }

        let row = self.attributes.clone();
        let key = db
            .connection()
            .insert_returning_id(self.ty.table(), row, self.ty.primary_key())
            .inspect_err(|err| {
                tracing::debug!(entity = self.ty.name(), %err, "insert failed");
            })?;

        self.store_cast(self.ty.primary_key(), key)?;
        self.exists = true;
        self.recently_created = true;
        self.sync_original();

        tracing::debug!(entity = self.ty.name(), key = ?self.stored_key(), "inserted");
        self.fire(db, Hook::Created);

        Ok(true)
    }

    fn perform_update(&mut self, db: &Db) -> Result<bool, Error> {
        if !self.fire_halting(db, Hook::Updating) {
            return Ok(false);
        }

        // Empty diff short-circuits without issuing a write.
        if self.dirty().is_empty() {
            return Ok(true);
        }

        if let Some(timestamps) = self.ty.timestamps() {
            self.touch_if_clean(
                timestamps.updated_at,
                Value::DateTime(OffsetDateTime::now_utc()),
            )?;
        }

        let changes = self.dirty();
        let affected = self
            .key_query(db)
            .update(changes)
            .inspect_err(|err| {
                tracing::debug!(entity = self.ty.name(), %err, "update failed");
            })?;

        self.sync_original();

        tracing::debug!(
            entity = self.ty.name(),
            key = ?self.stored_key(),
            affected,
            "updated"
        );
        self.fire(db, Hook::Updated);

        Ok(true)
    }

    /// Delete the record. Soft-delete-enabled types set the marker column
    /// and keep the row; others remove the row and flip `exists` off.
    /// `Ok(false)` for unsaved records and vetoed deletes.
    pub fn delete(&mut self, db: &Db) -> Result<bool, Error> {
        if !self.exists {
            return Ok(false);
        }
        if !self.fire_halting(db, Hook::Deleting) {
            return Ok(false);
        }

        if self.ty.soft_delete_column().is_some() {
            self.perform_soft_delete(db)?;
        } else {
            self.perform_hard_delete(db)?;
        }

        self.fire(db, Hook::Deleted);

        Ok(true)
    }

    /// Hard delete regardless of soft-delete configuration.
    pub fn force_delete(&mut self, db: &Db) -> Result<bool, Error> {
        if !self.exists {
            return Ok(false);
        }

        self.perform_hard_delete(db)?;
        self.fire(db, Hook::ForceDeleted);

        Ok(true)
    }

    fn perform_soft_delete(&mut self, db: &Db) -> Result<(), Error> {
        let column = self
            .ty
            .soft_delete_column()
            .ok_or_else(|| Error::NotSoftDeletable {
                entity: self.ty.name().to_string(),
            })?;

        // Only the marker column and the update timestamp go to storage.
        // Unrelated pending attribute changes stay dirty until an explicit
        // save.
        let now = Value::DateTime(OffsetDateTime::now_utc());
        self.store_cast(column, now.clone())?;

        let mut changes = Row::new();
        changes.insert(
            column.to_string(),
            self.get_raw(column).cloned().unwrap_or(Value::Null),
        );
        if let Some(timestamps) = self.ty.timestamps() {
            self.store_cast(timestamps.updated_at, now)?;
            changes.insert(
                timestamps.updated_at.to_string(),
                self.get_raw(timestamps.updated_at)
                    .cloned()
                    .unwrap_or(Value::Null),
            );
        }

        self.key_query(db).update(changes.clone())?;
        for (field, value) in changes {
            self.original.insert(field, value);
        }

        tracing::debug!(entity = self.ty.name(), key = ?self.stored_key(), "soft deleted");

        Ok(())
    }

    fn perform_hard_delete(&mut self, db: &Db) -> Result<(), Error> {
        self.key_query(db).delete()?;
        self.exists = false;

        tracing::debug!(entity = self.ty.name(), key = ?self.stored_key(), "hard deleted");

        Ok(())
    }

    /// Clear the soft-delete marker and persist through the update path.
    /// `Ok(false)` when the restoring hook or the inner save was vetoed.
    pub fn restore(&mut self, db: &Db) -> Result<bool, Error> {
        if self.ty.soft_delete_column().is_none() {
            return Err(Error::NotSoftDeletable {
                entity: self.ty.name().to_string(),
            });
        }
        if !self.fire_halting(db, Hook::Restoring) {
            return Ok(false);
        }

        if let Some(column) = self.ty.soft_delete_column() {
            self.set_raw(column, Value::Null);
        }

        let saved = self.save(db)?;
        if saved {
            self.fire(db, Hook::Restored);
        }

        Ok(saved)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    // Primary-key-constrained query. Scope suppressed: by-key writes must
    // reach soft-deleted rows (restore routes through here).
    fn key_query<'db>(&self, db: &'db Db) -> Query<'db> {
        Query::new(db, self.ty.clone())
            .with_trashed()
            .where_eq(self.ty.qualified_key(), self.stored_key())
    }

    // Set a timestamp column unless the caller already dirtied it.
    fn touch_if_clean(&mut self, column: &str, now: Value) -> Result<(), Error> {
        if !self.is_dirty(Some(&[column])) {
            self.store_cast(column, now)?;
        }

        Ok(())
    }

    // Store through the declared cast only; mutators do not apply to
    // protocol-written columns.
    fn store_cast(&mut self, column: &str, value: Value) -> Result<(), Error> {
        let value = match self.ty.cast_for(column) {
            Some(cast) => cast.to_storage(value)?,
            None => value,
        };
        self.set_raw(column, value);

        Ok(())
    }

    fn fire_halting(&self, db: &Db, hook: Hook) -> bool {
        let vetoed = !db
            .events()
            .until(&hook.event_name(self.ty.name()), self);

        if vetoed {
            tracing::debug!(entity = self.ty.name(), hook = %hook, "operation vetoed");
        }

        !vetoed
    }

    fn fire(&self, db: &Db, hook: Hook) {
        db.events().dispatch(&hook.event_name(self.ty.name()), self);
    }
}
