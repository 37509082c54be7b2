use super::{AgentEvent, AgentEventPublisher};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

type Subscriber = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

/// In-process event queue with tag-based subscriptions.
///
/// Subscribers run synchronously on the publishing thread. A subscriber
/// registered for several tags of one event is still called once.
#[derive(Default)]
pub struct AgentEventQueue {
    by_tag: RwLock<HashMap<String, Vec<Subscriber>>>,
    all: RwLock<Vec<Subscriber>>,
}

impl AgentEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe_tag<F>(&self, tag: impl Into<String>, subscriber: F)
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.subscribe_tag_shared(tag, Arc::new(subscriber));
    }

    /// Registers an already shared subscriber, so one handler can listen on many tags.
    pub fn subscribe_tag_shared(
        &self,
        tag: impl Into<String>,
        subscriber: Arc<dyn Fn(&AgentEvent) + Send + Sync>,
    ) {
        self.by_tag
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(tag.into())
            .or_default()
            .push(subscriber);
    }

    pub fn subscribe_all<F>(&self, subscriber: F)
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.all
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(subscriber));
    }

    fn subscribers_for(&self, event: &AgentEvent) -> Vec<Subscriber> {
        let mut subscribers: Vec<Subscriber> = self
            .all
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let by_tag = self.by_tag.read().unwrap_or_else(PoisonError::into_inner);
        for tag in &event.tags {
            for subscriber in by_tag.get(tag).into_iter().flatten() {
                if !subscribers.iter().any(|s| Arc::ptr_eq(s, subscriber)) {
                    subscribers.push(Arc::clone(subscriber));
                }
            }
        }

        subscribers
    }
}

impl AgentEventPublisher for AgentEventQueue {
    fn publish(&self, event: AgentEvent) {
        let subscribers = self.subscribers_for(&event);
        trace!(tags = ?event.tags, subscribers = subscribers.len(), "Publishing event");
        for subscriber in subscribers {
            subscriber(&event);
        }
    }
}
