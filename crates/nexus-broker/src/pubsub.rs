use crate::subscription::Subscription;
use crate::{Broker, BrokerConfig, Delivery};
use nexus_core::{NexusError, NexusResult, Task};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<Task>,
}

#[derive(Default)]
struct State {
    topics: HashMap<String, Vec<Subscriber>>,
    closed: bool,
}

pub(crate) struct Inner {
    state: RwLock<State>,
    next_id: AtomicU64,
    buffer_size: usize,
}

impl Inner {
    /// Drop the sender for `(topic, id)`; the receiver drains what is
    /// buffered and then ends.
    pub(crate) fn remove(&self, topic: &str, id: u64) -> NexusResult<()> {
        let mut state = self.state.write();
        let not_found = || NexusError::SubscriptionNotFound {
            topic: topic.to_string(),
            id,
        };

        let subscribers = state.topics.get_mut(topic).ok_or_else(not_found)?;
        let pos = subscribers
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(not_found)?;
        subscribers.swap_remove(pos);
        if subscribers.is_empty() {
            state.topics.remove(topic);
        }
        debug!(topic, subscription = id, "Unsubscribed");
        Ok(())
    }
}

/// Fan-out publish/subscribe broker.
///
/// Each subscription gets its own bounded buffer. Publishing never waits:
/// a subscriber whose buffer is full simply misses that task.
#[derive(Clone)]
pub struct PubSub {
    inner: Arc<Inner>,
}

impl PubSub {
    /// Create a broker. Fails on a zero buffer size.
    pub fn new(config: BrokerConfig) -> NexusResult<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                next_id: AtomicU64::new(1),
                buffer_size: config.buffer_size,
            }),
        })
    }

    /// Per-subscription buffer capacity.
    pub fn buffer_size(&self) -> usize {
        self.inner.buffer_size
    }

    /// Live subscriptions on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .state
            .read()
            .topics
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Topics with at least one live subscription.
    pub fn topic_count(&self) -> usize {
        self.inner.state.read().topics.len()
    }

    fn add(&self, topic: &str, cancel: Option<watch::Receiver<bool>>) -> NexusResult<Subscription> {
        let mut state = self.inner.state.write();
        if state.closed {
            return Err(NexusError::BrokerClosed);
        }
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer_size);
        state
            .topics
            .entry(topic.to_string())
            .or_default()
            .push(Subscriber { id, tx });
        drop(state);

        debug!(topic, subscription = id, "Subscribed");
        Ok(Subscription::new(
            id,
            topic.to_string(),
            rx,
            Arc::downgrade(&self.inner),
            cancel,
        ))
    }
}

impl Default for PubSub {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(State::default()),
                next_id: AtomicU64::new(1),
                buffer_size: crate::DEFAULT_BUFFER_SIZE,
            }),
        }
    }
}

impl Broker for PubSub {
    fn publish(&self, topic: &str, task: &Task) -> NexusResult<Delivery> {
        let state = self.inner.state.read();
        if state.closed {
            debug!(topic, task_id = %task.id, "Publish on closed broker ignored");
            return Ok(Delivery::default());
        }

        let mut delivery = Delivery::default();
        let Some(subscribers) = state.topics.get(topic) else {
            return Ok(delivery);
        };

        for subscriber in subscribers {
            match subscriber.tx.try_send(task.clone()) {
                Ok(()) => delivery.delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    delivery.dropped += 1;
                    warn!(
                        topic,
                        subscription = subscriber.id,
                        task_id = %task.id,
                        "Subscriber buffer full, task dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    delivery.dropped += 1;
                    debug!(topic, subscription = subscriber.id, "Subscriber gone, task dropped");
                }
            }
        }
        Ok(delivery)
    }

    fn subscribe(&self, topic: &str) -> NexusResult<Subscription> {
        self.add(topic, None)
    }

    fn subscribe_with_cancel(
        &self,
        topic: &str,
        cancel: watch::Receiver<bool>,
    ) -> NexusResult<Subscription> {
        self.add(topic, Some(cancel))
    }

    fn unsubscribe(&self, topic: &str, id: u64) -> NexusResult<()> {
        self.inner.remove(topic, id)
    }

    fn close(&self) {
        let mut state = self.inner.state.write();
        if state.closed {
            return;
        }
        state.closed = true;
        let topics = std::mem::take(&mut state.topics);
        drop(state);

        let subscriptions: usize = topics.values().map(Vec::len).sum();
        info!(topics = topics.len(), subscriptions, "Broker closed");
    }

    fn is_closed(&self) -> bool {
        self.inner.state.read().closed
    }
}
