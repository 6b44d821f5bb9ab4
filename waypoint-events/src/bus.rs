//! Broadcast bus shared by every event stream.
//!
//! Publishing never blocks. A subscriber that falls more than `capacity`
//! events behind misses the oldest ones and is told how many it skipped.

use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};
use waypoint_core::{EventConfig, DEFAULT_EVENT_CAPACITY};

/// Event carried on a bus.
pub trait BusEvent: Clone + Send + 'static {
    /// Short name used in log fields.
    fn event_type(&self) -> &'static str;
}

/// Why a subscription produced no event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("subscriber lagged and skipped {0} events")]
    Lagged(u64),

    #[error("bus closed")]
    Closed,
}

/// Process-wide broadcast channel.
///
/// Cloning is cheap; every clone publishes to the same subscribers.
#[derive(Debug)]
pub struct EventBus<E> {
    tx: broadcast::Sender<E>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<E: BusEvent> EventBus<E> {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn from_config(config: &EventConfig) -> Self {
        Self::new(config.capacity)
    }

    /// Send an event to every current subscriber.
    ///
    /// Returns the number of subscribers that will see it.
    pub fn publish(&self, event: E) -> usize {
        let event_type = event.event_type();
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!(event_type = event_type, receivers = receivers, "Published event");
                receivers
            }
            Err(_) => {
                debug!(event_type = event_type, "No subscribers for event");
                0
            }
        }
    }

    /// Receive every event published from now on, until the subscription is dropped.
    pub fn subscribe(&self) -> Subscription<E> {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl<E: BusEvent> Default for EventBus<E> {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

/// Live subscription to an [`EventBus`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription<E> {
    rx: broadcast::Receiver<E>,
}

impl<E: BusEvent> Subscription<E> {
    /// Wait for the next event.
    pub async fn recv(&mut self) -> Result<E, BusError> {
        match self.rx.recv().await {
            Ok(event) => Ok(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Subscriber lagged behind bus");
                Err(BusError::Lagged(skipped))
            }
            Err(broadcast::error::RecvError::Closed) => Err(BusError::Closed),
        }
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<E> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!(skipped = skipped, "Subscriber lagged behind bus");
                }
                Err(_) => return None,
            }
        }
    }

    /// Drop every queued event, returning how many were discarded.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.try_recv().is_some() {
            count += 1;
        }
        count
    }
}
