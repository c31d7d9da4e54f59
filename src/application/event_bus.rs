//! In-process event bus for domain events
//!
//! Handlers run synchronously, in subscription order, on the publishing
//! thread. A panicking handler is logged and skipped; delivery continues
//! with the next one. Async consumers can use [`EventBus::stream`] instead.

use crate::domain::call::ClientEvent;
use crate::domain::shared::events::DomainEvent;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

type Handler = Arc<dyn Fn(&ClientEvent) + Send + Sync>;

/// Default capacity of the broadcast stream
pub const DEFAULT_STREAM_CAPACITY: usize = 64;

#[derive(Default)]
struct Registry {
    next_id: u64,
    handlers: Vec<(u64, Handler)>,
}

struct BusInner {
    registry: RwLock<Registry>,
    tx: broadcast::Sender<ClientEvent>,
}

/// Event broadcaster
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// Create a bus whose broadcast stream buffers `capacity` events
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(BusInner {
                registry: RwLock::new(Registry::default()),
                tx,
            }),
        }
    }

    /// Register a handler
    pub fn subscribe<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ClientEvent) + Send + Sync + 'static,
    {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = registry.next_id;
        registry.next_id += 1;
        registry.handlers.push((id, Arc::new(handler)));
        debug!("Event handler {} subscribed", id);

        Subscription {
            id,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Subscribe to events as an async stream
    pub fn stream(&self) -> broadcast::Receiver<ClientEvent> {
        self.inner.tx.subscribe()
    }

    /// Deliver an event to every handler, then to stream subscribers
    pub fn publish(&self, event: &ClientEvent) {
        // Snapshot so handlers may subscribe or unsubscribe while running
        let handlers: Vec<(u64, Handler)> = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .clone();

        for (id, handler) in handlers {
            if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                error!(
                    "Event handler {} failed on {}: {}",
                    id,
                    event.event_type(),
                    panic_message(panic.as_ref())
                );
            }
        }

        if self.inner.tx.receiver_count() > 0 {
            if let Err(e) = self.inner.tx.send(event.clone()) {
                warn!("Failed to broadcast event: {}", e);
            }
        }
    }

    /// Number of registered handlers
    pub fn handler_count(&self) -> usize {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .handlers
            .len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_STREAM_CAPACITY)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("handlers", &self.handler_count())
            .field("streams", &self.inner.tx.receiver_count())
            .finish()
    }
}

/// Handle returned by [`EventBus::subscribe`]
///
/// Dropping it keeps the handler registered; call
/// [`Subscription::unsubscribe`] to remove it.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn unsubscribe(self) {
        if let Some(inner) = self.bus.upgrade() {
            inner
                .registry
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .handlers
                .retain(|(id, _)| *id != self.id);
            debug!("Event handler {} unsubscribed", self.id);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}
