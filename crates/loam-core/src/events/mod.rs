//! Module: events
//! Responsibility: lifecycle hook naming and dispatch, halting and
//! non-halting.
//! Does not own: when hooks fire — the persistence protocol does.


use crate::record::Record;
use derive_more::Display;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

///
/// Hook
///
/// Named lifecycle hook points. The `-ing` hooks are halting (a handler
/// returning false vetoes the operation); the `-ed` hooks are notify-only.
///

#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Hook {
    #[display("saving")]
    Saving,
    #[display("creating")]
    Creating,
    #[display("created")]
    Created,
    #[display("updating")]
    Updating,
    #[display("updated")]
    Updated,
    #[display("saved")]
    Saved,
    #[display("deleting")]
    Deleting,
    #[display("deleted")]
    Deleted,
    #[display("forceDeleted")]
    ForceDeleted,
    #[display("restoring")]
    Restoring,
    #[display("restored")]
    Restored,
}

impl Hook {
    /// Namespaced event name, e.g. `model.saving: Order`.
    #[must_use]
    pub fn event_name(self, entity: &str) -> String {
        format!("model.{self}: {entity}")
    }
}

///
/// Handler
///
/// Hook callback. The boolean return only matters for halting dispatch;
/// notify-only dispatch ignores it.
///

pub type Handler = Arc<dyn Fn(&Record) -> bool + Send + Sync>;

///
/// Dispatcher
///
/// Event-dispatch collaborator. `until` is halting: the first handler
/// returning false stops dispatch and reports the veto. `dispatch` notifies
/// every handler.
///

pub trait Dispatcher: Send + Sync {
    fn listen(&self, event: &str, handler: Handler);

    fn until(&self, event: &str, record: &Record) -> bool;

    fn dispatch(&self, event: &str, record: &Record);
}

///
/// HookDispatcher
///
/// Bundled in-memory dispatcher keyed by full event name.
///

#[derive(Default)]
pub struct HookDispatcher {
    handlers: Mutex<HashMap<String, Vec<Handler>>>,
}

impl HookDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Dispatcher for HookDispatcher {
    fn listen(&self, event: &str, handler: Handler) {
        self.handlers
            .lock()
            .expect("dispatcher lock poisoned")
            .entry(event.to_string())
            .or_default()
            .push(handler);
    }

    fn until(&self, event: &str, record: &Record) -> bool {
        let handlers = {
            let map = self.handlers.lock().expect("dispatcher lock poisoned");
            map.get(event).cloned().unwrap_or_default()
        };

        handlers.iter().all(|handler| handler(record))
    }

    fn dispatch(&self, event: &str, record: &Record) {
        let handlers = {
            let map = self.handlers.lock().expect("dispatcher lock poisoned");
            map.get(event).cloned().unwrap_or_default()
        };

        for handler in &handlers {
            handler(record);
        }
    }
}

///
/// NullDispatcher
///
/// No-op dispatcher for embedders that run with hooks off.
///

#[derive(Clone, Copy, Debug, Default)]
pub struct NullDispatcher;

impl Dispatcher for NullDispatcher {
    fn listen(&self, _event: &str, _handler: Handler) {}

    fn until(&self, _event: &str, _record: &Record) -> bool {
        true
    }

    fn dispatch(&self, _event: &str, _record: &Record) {}
}
