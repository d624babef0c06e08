use crate::pubsub::Inner;
use nexus_core::Task;
use std::sync::Weak;
use tokio::sync::{mpsc, watch};

/// Receiving end of one subscription.
///
/// Dropping the handle unsubscribes it. A handle created with a cancel
/// signal stops yielding tasks, and unsubscribes, as soon as the signal
/// turns `true` or its sender goes away.
pub struct Subscription {
    id: u64,
    topic: String,
    rx: mpsc::Receiver<Task>,
    broker: Weak<Inner>,
    cancel: Option<watch::Receiver<bool>>,
    attached: bool,
}

impl Subscription {
    pub(crate) fn new(
        id: u64,
        topic: String,
        rx: mpsc::Receiver<Task>,
        broker: Weak<Inner>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Self {
        Self {
            id,
            topic,
            rx,
            broker,
            cancel,
            attached: true,
        }
    }

    /// Broker-assigned identifier, unique per broker.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next task.
    ///
    /// Returns `None` once the subscription has been cancelled, or once it
    /// was unsubscribed (or the broker closed) and the buffer is drained.
    pub async fn recv(&mut self) -> Option<Task> {
        let Some(cancel) = self.cancel.as_mut() else {
            return self.rx.recv().await;
        };

        loop {
            if *cancel.borrow_and_update() {
                break;
            }
            tokio::select! {
                biased;
                changed = cancel.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                task = self.rx.recv() => return task,
            }
        }

        self.detach();
        None
    }

    /// Take a buffered task without waiting.
    pub fn try_recv(&mut self) -> Option<Task> {
        self.rx.try_recv().ok()
    }

    /// Tasks currently waiting in the buffer.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    fn detach(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        if let Some(broker) = self.broker.upgrade() {
            // Already removed by an explicit unsubscribe or by close.
            let _ = broker.remove(&self.topic, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("attached", &self.attached)
            .finish()
    }
}
