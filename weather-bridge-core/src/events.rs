//! Host event bus.
//!
//! Handlers are registered once at startup and stay registered for the life of
//! the bus; there is no way to remove one. `ready` is delivered at most once.

use std::{
    collections::HashMap,
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::message::AppMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Ready,
    AppMessage,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Ready => "ready",
            EventKind::AppMessage => "appmessage",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The bridge environment finished initializing.
    Ready,
    /// A message from the watch application.
    AppMessage(AppMessage),
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::Ready => EventKind::Ready,
            HostEvent::AppMessage(_) => EventKind::AppMessage,
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync + Debug {
    async fn handle(&self, event: &HostEvent);
}

#[derive(Debug, Default)]
pub struct EventBus {
    handlers: HashMap<EventKind, Vec<Arc<dyn EventHandler>>>,
    ready_fired: AtomicBool,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to events of `kind`.
    pub fn on(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) -> &mut Self {
        debug!(event = %kind, "registering handler");
        self.handlers.entry(kind).or_default().push(handler);
        self
    }

    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Deliver an event to its handlers, in registration order.
    ///
    /// Returns `false` when the event was dropped: a repeated `ready`.
    pub async fn dispatch(&self, event: HostEvent) -> bool {
        let kind = event.kind();

        if kind == EventKind::Ready && self.ready_fired.swap(true, Ordering::SeqCst) {
            warn!("ready already delivered, ignoring");
            return false;
        }

        let Some(handlers) = self.handlers.get(&kind) else {
            debug!(event = %kind, "no handlers registered");
            return true;
        };

        for handler in handlers {
            handler.handle(&event).await;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Default)]
    struct Counter {
        hits: AtomicUsize,
    }

    #[async_trait]
    impl EventHandler for Counter {
        async fn handle(&self, _event: &HostEvent) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn event_names() {
        assert_eq!(EventKind::Ready.to_string(), "ready");
        assert_eq!(HostEvent::AppMessage(AppMessage::new()).kind().as_str(), "appmessage");
    }

    #[tokio::test]
    async fn ready_is_delivered_once() {
        let counter = Arc::new(Counter::default());
        let mut bus = EventBus::new();
        bus.on(EventKind::Ready, counter.clone());

        assert!(bus.dispatch(HostEvent::Ready).await);
        assert!(!bus.dispatch(HostEvent::Ready).await);

        assert_eq!(counter.hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn events_only_reach_their_subscribers() {
        let ready = Arc::new(Counter::default());
        let inbound = Arc::new(Counter::default());
        let mut bus = EventBus::new();
        bus.on(EventKind::Ready, ready.clone()).on(EventKind::AppMessage, inbound.clone());

        bus.dispatch(HostEvent::AppMessage(AppMessage::new())).await;
        bus.dispatch(HostEvent::AppMessage(AppMessage::new())).await;

        assert_eq!(ready.hits.load(Ordering::SeqCst), 0);
        assert_eq!(inbound.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dispatch_without_handlers_is_harmless() {
        let bus = EventBus::new();
        assert!(bus.dispatch(HostEvent::AppMessage(AppMessage::new())).await);
        assert_eq!(bus.handler_count(EventKind::Ready), 0);
    }
}
