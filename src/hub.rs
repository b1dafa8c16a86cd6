//! Event hub: live subscriber queues keyed by member.
//!
//! Each subscription owns a bounded tokio channel. Publishing uses
//! `try_send`, so a slow or stuck subscriber loses messages instead of
//! holding up the publisher. The subscriber list has its own lock,
//! independent of the snapshot lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::events::Event;

/// Identifies one subscription for [`EventHub::unsubscribe`]
pub type SubscriptionId = u64;

struct Subscriber {
    id: SubscriptionId,
    member_id: String,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Receiving end handed to a connection
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub member_id: String,
    pub receiver: mpsc::Receiver<Arc<Event>>,
}

impl Subscription {
    /// Next message; `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.receiver.recv().await
    }
}

pub struct EventHub {
    capacity: usize,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, member_id: &str) -> Subscription {
        self.subscribe_with(member_id, None)
    }

    /// Register a subscriber whose queue already holds `initial`.
    pub fn subscribe_with(&self, member_id: &str, initial: Option<Event>) -> Subscription {
        let (tx, receiver) = mpsc::channel(self.capacity);
        if let Some(event) = initial {
            // Fresh channel with capacity >= 1; cannot be full.
            let _ = tx.try_send(Arc::new(event));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                id,
                member_id: member_id.to_string(),
                tx,
            });
        debug!(subscription = id, member = member_id, "subscribed");

        Subscription {
            id,
            member_id: member_id.to_string(),
            receiver,
        }
    }

    /// Remove a subscription; its receiver then drains and ends.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|subscriber| subscriber.id != id);
        let removed = subscribers.len() != before;
        if removed {
            debug!(subscription = id, "unsubscribed");
        }
        removed
    }

    /// Enqueue to every subscriber. Returns how many accepted the message.
    pub fn broadcast(&self, event: Event) -> usize {
        self.deliver(event, |_| true)
    }

    /// Enqueue to every subscription bound to `member_id`.
    pub fn send_to_member(&self, member_id: &str, event: Event) -> usize {
        self.deliver(event, |subscriber| subscriber.member_id == member_id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn deliver(&self, event: Event, wants: impl Fn(&Subscriber) -> bool) -> usize {
        let event = Arc::new(event);
        let mut delivered = 0;
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        subscribers.retain(|subscriber| {
            if !wants(subscriber) {
                return true;
            }
            match subscriber.tx.try_send(Arc::clone(&event)) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    debug!(
                        subscription = subscriber.id,
                        kind = event.kind.as_str(),
                        "subscriber queue full; message dropped"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(subscription = subscriber.id, "pruning closed subscriber");
                    false
                }
            }
        });
        delivered
    }
}
