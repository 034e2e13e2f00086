use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::trace;

use super::listener::Listener;
use super::Event;

/// Named wake-up points shared by emitters and listeners
///
/// Handles are cheap to clone and share the same entries. An entry is created
/// the first time an event id is emitted or listened to and lives until
/// [`EventRegistry::remove`] is called.
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    entries: Arc<Mutex<HashMap<String, Arc<Notify>>>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake-up point for `id`, created on first use
    pub(crate) fn entry(&self, id: &str) -> Arc<Notify> {
        let mut entries = self.entries.lock();
        Arc::clone(entries.entry(id.to_string()).or_default())
    }

    /// Drop the entry for `id`
    ///
    /// Listeners already waiting on it keep their handle but no longer receive
    /// emissions; a later emit or listen creates a fresh entry.
    pub fn remove(&self, id: &str) -> bool {
        self.entries.lock().remove(id).is_some()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn emitter(&self) -> Emitter {
        Emitter {
            registry: self.clone(),
        }
    }

    pub fn listener(&self) -> Listener {
        Listener::new(self.clone())
    }
}

/// Source of event emissions
#[derive(Debug, Clone)]
pub struct Emitter {
    registry: EventRegistry,
}

impl Emitter {
    /// Wake every listener currently waiting on the event's id
    pub fn emit<E>(&self, event: &E)
    where
        E: Event + ?Sized,
    {
        trace!(event_id = event.id(), event_name = event.name(), "Event emitted");
        self.registry.entry(event.id()).notify_waiters();
    }
}
