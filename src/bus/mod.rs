pub mod event;

use dashmap::DashMap;
use std::sync::Arc;

use event::{BusEvent, Event, EventKind};

/// Error a listener returns to abort the rest of a `post`.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;
pub type ListenerResult = Result<(), ListenerError>;

type Callback = Arc<dyn Fn(&Event) -> ListenerResult + Send + Sync>;

#[derive(Clone)]
struct Registration {
    priority: i32,
    callback: Callback,
}

/// A listener failed while an event was being posted.
#[derive(Debug, thiserror::Error)]
#[error("{kind:?} listener failed: {source}")]
pub struct DispatchError {
    pub kind: EventKind,
    pub source: ListenerError,
}

/// Synchronous, priority-ordered publish/subscribe hub.
///
/// Listeners run on the posting task, highest priority first, ties in
/// registration order. The first listener to fail stops the remaining ones
/// and its error is returned from [`EventBus::post`].
#[derive(Default)]
pub struct EventBus {
    listeners: DashMap<EventKind, Vec<Registration>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed listener. There is no way to unregister.
    pub fn register<E, F>(&self, priority: i32, callback: F)
    where
        E: BusEvent,
        F: Fn(&E) -> ListenerResult + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(move |event: &Event| match E::extract(event) {
            Some(payload) => callback(payload),
            None => Ok(()),
        });

        let mut listeners = self.listeners.entry(E::KIND).or_default();
        listeners.push(Registration { priority, callback });
        // sort_by is stable, so equal priorities keep registration order
        listeners.sort_by(|a, b| b.priority.cmp(&a.priority));
    }

    /// Post an event to every listener registered for its exact kind.
    pub fn post(&self, event: impl Into<Event>) -> Result<(), DispatchError> {
        let event = event.into();
        let kind = event.kind();

        // Snapshot so listeners can register or post without holding the shard lock
        let listeners = match self.listeners.get(&kind) {
            Some(entry) => entry.value().clone(),
            None => return Ok(()),
        };

        for listener in &listeners {
            (listener.callback)(&event).map_err(|source| DispatchError { kind, source })?;
        }
        Ok(())
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.get(&kind).map(|l| l.len()).unwrap_or(0)
    }
}
