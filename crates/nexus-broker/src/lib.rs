//! In-process publish/subscribe broker used to hand routed tasks to agents.
//!
//! Topics are agent identifiers. Every subscription owns an independent
//! bounded buffer and delivery is fan-out, at most once per subscriber:
//! when a buffer is full the task is dropped for that subscriber rather than
//! blocking the publisher.
//!
//! # Main types
//!
//! - [`Broker`]: The dispatch seam the router publishes through.
//! - [`PubSub`]: Default in-memory implementation.
//! - [`Subscription`]: RAII receiving handle; unsubscribes on drop.

/// In-memory broker implementation.
pub mod pubsub;
/// Subscription handle.
pub mod subscription;

pub use pubsub::PubSub;
pub use subscription::Subscription;

use nexus_core::{NexusError, NexusResult, Task};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Default per-subscription buffer capacity.
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Broker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Capacity of each subscription's buffer.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl BrokerConfig {
    pub fn validate(&self) -> NexusResult<()> {
        if self.buffer_size == 0 {
            return Err(NexusError::Config(
                "broker buffer_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one publish across the topic's subscribers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Subscribers the task was buffered for.
    pub delivered: usize,
    /// Subscribers that missed it because their buffer was full.
    pub dropped: usize,
}

impl Delivery {
    /// True when no subscriber received the task.
    pub fn is_empty(&self) -> bool {
        self.delivered == 0
    }
}

/// Topic-addressed task dispatch.
///
/// Implementations must never block inside [`Broker::publish`].
pub trait Broker: Send + Sync {
    /// Offer `task` to every current subscriber of `topic`.
    ///
    /// A closed broker accepts the call and delivers nothing.
    fn publish(&self, topic: &str, task: &Task) -> NexusResult<Delivery>;

    /// Open a new, independent subscription on `topic`.
    ///
    /// Fails with [`NexusError::BrokerClosed`] after [`Broker::close`].
    fn subscribe(&self, topic: &str) -> NexusResult<Subscription>;

    /// Like [`Broker::subscribe`], but the subscription ends itself when
    /// `cancel` turns `true`.
    fn subscribe_with_cancel(
        &self,
        topic: &str,
        cancel: watch::Receiver<bool>,
    ) -> NexusResult<Subscription>;

    /// Remove one subscription.
    ///
    /// Fails with [`NexusError::SubscriptionNotFound`] if it is already gone.
    fn unsubscribe(&self, topic: &str, id: u64) -> NexusResult<()>;

    /// Close every subscription and refuse new ones. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
