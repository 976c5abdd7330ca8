use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tracing::{trace, warn};

type Filter<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Event subscriber handle. Dropping it unsubscribes.
pub struct EventSubscriber<T> {
    receiver: broadcast::Receiver<T>,
    filter: Option<Filter<T>>,
}

impl<T: Clone> EventSubscriber<T> {
    fn new(receiver: broadcast::Receiver<T>, filter: Option<Filter<T>>) -> Self {
        Self { receiver, filter }
    }

    fn accepts(&self, event: &T) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(event))
    }

    /// Next event matching the filter, or `None` once the bus is gone.
    /// Events missed because this subscriber fell behind are skipped.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Try to receive without waiting
    pub fn try_recv(&mut self) -> Option<T> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(event),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, skipped {} events", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

impl<T> fmt::Debug for EventSubscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSubscriber")
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}

/// Broadcast bus. Publishing never blocks and never fails; events sent while
/// nobody listens are counted and dropped.
#[derive(Debug)]
pub struct EventBus<T> {
    sender: broadcast::Sender<T>,
    stats: Arc<EventBusStats>,
}

#[derive(Debug, Default)]
pub struct EventBusStats {
    total_events: AtomicU64,
    dropped_events: AtomicU64,
}

impl EventBusStats {
    pub fn total_events(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }

    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }
}

impl<T> Clone for EventBus<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T: Clone + fmt::Debug + Send + 'static> EventBus<T> {
    /// Create a new event bus with specified buffer capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);

        Self {
            sender,
            stats: Arc::new(EventBusStats::default()),
        }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: T) {
        trace!("Publishing event: {:?}", event);
        self.stats.total_events.fetch_add(1, Ordering::Relaxed);

        if self.sender.send(event).is_err() {
            // No subscribers is normal
            self.stats.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Subscribe to all events
    pub fn subscribe(&self) -> EventSubscriber<T> {
        EventSubscriber::new(self.sender.subscribe(), None)
    }

    /// Subscribe to events accepted by `filter`
    pub fn subscribe_filtered(
        &self,
        filter: impl Fn(&T) -> bool + Send + Sync + 'static,
    ) -> EventSubscriber<T> {
        EventSubscriber::new(self.sender.subscribe(), Some(Arc::new(filter)))
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn stats(&self) -> &EventBusStats {
        &self.stats
    }
}
