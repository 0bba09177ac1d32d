//! Broadcast hub
//!
//! Fans accepted location updates out to every attached subscriber and
//! replays the registry to each new subscriber.
//!
//! # Lock discipline
//!
//! A single mutex guards the subscriber set. `attach`, `detach`, `publish`
//! and `commit` all take it, so a subscriber's replay snapshot and its
//! insertion into the fan-out set happen in one step relative to any publish.
//! An update racing an attach therefore reaches the new subscriber through the
//! replay, the live path, or both, but never neither.
//!
//! Nothing awaits while the mutex is held. Each subscriber owns a bounded
//! queue and fan-out is a non-blocking enqueue; the per-connection task does
//! the slow network write.
//!
//! # Backpressure
//!
//! When a subscriber's queue is full the new event is dropped for that
//! subscriber only and counted. When its queue is closed the subscriber is
//! detached.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::config::HubConfig;
use crate::error::{ErrorKind, HubError, ValidationError};
use crate::location::{Location, UpdateEvent};
use crate::registry::LocationRegistry;

pub type SubscriberId = Uuid;

struct Subscriber {
    tx: mpsc::Sender<Arc<UpdateEvent>>,
    dropped: u64,
}

/// Point-in-time hub counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HubStats {
    /// Currently attached subscribers
    pub subscribers: usize,
    /// Events fanned out since startup
    pub published: u64,
    /// Per-subscriber deliveries dropped because a queue was full
    pub dropped: u64,
}

pub struct BroadcastHub {
    registry: Arc<LocationRegistry>,
    config: HubConfig,
    subscribers: Mutex<HashMap<SubscriberId, Subscriber>>,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl BroadcastHub {
    pub fn new(registry: Arc<LocationRegistry>, config: HubConfig) -> Self {
        Self {
            registry,
            config,
            subscribers: Mutex::new(HashMap::new()),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<LocationRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    /// Register a new subscriber
    ///
    /// The returned handle's queue already holds one event per known device.
    /// Live events published after this call follow in publish order.
    pub fn attach(self: &Arc<Self>) -> Result<SubscriberHandle, HubError> {
        let mut subscribers = self.subscribers.lock();

        let limit = self.config.max_subscribers;
        if limit > 0 && subscribers.len() >= limit {
            tracing::warn!(limit, "Subscriber limit reached, refusing attach");
            return Err(HubError::SubscriberLimit { limit });
        }

        let snapshot = self.registry.snapshot();
        let replayed = snapshot.len();

        // Room for the whole replay plus the live buffer
        let capacity = self
            .config
            .subscriber_capacity
            .clamp(1, HubConfig::MAX_SUBSCRIBER_CAPACITY)
            .saturating_add(replayed)
            .min(Semaphore::MAX_PERMITS);
        let (tx, rx) = mpsc::channel(capacity);

        for event in snapshot.into_events() {
            if tx.try_send(Arc::new(event)).is_err() {
                return Err(HubError::ReplayFailed);
            }
        }

        let id = Uuid::new_v4();
        subscribers.insert(id, Subscriber { tx, dropped: 0 });
        let count = subscribers.len();
        drop(subscribers);

        tracing::info!(
            subscriber = %id,
            replayed = replayed,
            subscribers = count,
            "Subscriber attached"
        );

        Ok(SubscriberHandle {
            id,
            rx,
            replayed,
            hub: Arc::clone(self),
        })
    }

    /// Remove a subscriber
    ///
    /// Returns whether it was still attached. Detaching twice is a no-op.
    pub fn detach(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.lock().remove(&id);

        match removed {
            Some(subscriber) => {
                tracing::info!(
                    subscriber = %id,
                    dropped = subscriber.dropped,
                    "Subscriber detached"
                );
                true
            }
            None => false,
        }
    }

    /// Deliver an event to every attached subscriber
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn publish(&self, event: UpdateEvent) -> usize {
        let mut subscribers = self.subscribers.lock();
        self.fan_out(&mut subscribers, Arc::new(event))
    }

    /// Write to the registry and publish the accepted update atomically
    ///
    /// Concurrent commits for the same device reach subscribers in the same
    /// order they were applied to the registry.
    pub fn commit(
        &self,
        device_id: impl Into<String>,
        location: Location,
    ) -> Result<(UpdateEvent, usize), ValidationError> {
        let mut subscribers = self.subscribers.lock();
        let event = self.registry.set(device_id, location)?;
        let delivered = self.fan_out(&mut subscribers, Arc::new(event.clone()));
        Ok((event, delivered))
    }

    fn fan_out(
        &self,
        subscribers: &mut HashMap<SubscriberId, Subscriber>,
        event: Arc<UpdateEvent>,
    ) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        subscribers.retain(|id, subscriber| {
            match subscriber.tx.try_send(Arc::clone(&event)) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(TrySendError::Full(_)) => {
                    subscriber.dropped += 1;
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        subscriber = %id,
                        device_id = %event.device_id,
                        dropped = subscriber.dropped,
                        "Subscriber queue full, dropping update"
                    );
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(
                        subscriber = %id,
                        kind = ErrorKind::DeliveryFailure.as_str(),
                        "Subscriber channel closed, detaching"
                    );
                    false
                }
            }
        });

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn stats(&self) -> HubStats {
        HubStats {
            subscribers: self.subscriber_count(),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for BroadcastHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastHub")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// A live subscription
///
/// Dropping the handle detaches it from the hub.
pub struct SubscriberHandle {
    id: SubscriberId,
    rx: mpsc::Receiver<Arc<UpdateEvent>>,
    replayed: usize,
    hub: Arc<BroadcastHub>,
}

impl SubscriberHandle {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Number of snapshot events queued at attach time
    pub fn replayed(&self) -> usize {
        self.replayed
    }

    /// Wait for the next event; `None` once the hub has detached this subscriber
    pub async fn recv(&mut self) -> Option<Arc<UpdateEvent>> {
        self.rx.recv().await
    }

    /// Next queued event, if any, without waiting
    pub fn try_recv(&mut self) -> Option<Arc<UpdateEvent>> {
        self.rx.try_recv().ok()
    }

    pub fn detach(&self) -> bool {
        self.hub.detach(self.id)
    }
}

impl Drop for SubscriberHandle {
    fn drop(&mut self) {
        self.hub.detach(self.id);
    }
}

impl fmt::Debug for SubscriberHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberHandle")
            .field("id", &self.id)
            .field("replayed", &self.replayed)
            .finish()
    }
}
