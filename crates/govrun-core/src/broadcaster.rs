//! Domain-event fan-out to subscribers.
//!
//! An `RwLock`-guarded registration map plus `tracing::warn!` on a
//! dropped/full subscriber. Differs from a plain `tokio::sync::broadcast`
//! channel in one deliberate way: a single slow subscriber is dropped
//! rather than allowed to stall every other subscriber.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};

use crate::events::RunEvent;
use crate::ports::EventPublisher;

/// Identifies one registered subscriber.
pub type SubscriberId = u64;

/// The wire envelope a subscriber actually receives.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: serde_json::Value,
}

fn envelope_for(event: &RunEvent) -> Envelope {
    let mut payload = serde_json::to_value(&event.kind).unwrap_or(serde_json::Value::Null);
    if let serde_json::Value::Object(ref mut map) = payload {
        map.remove("type");
        map.insert(
            "timestamp".to_string(),
            serde_json::Value::String(event.at.to_rfc3339()),
        );
        map.insert(
            "run_id".to_string(),
            serde_json::Value::String(event.run_id.clone()),
        );
    } else {
        payload = serde_json::json!({
            "timestamp": event.at.to_rfc3339(),
            "run_id": event.run_id,
        });
    }
    Envelope {
        kind: event.kind.wire_type().to_string(),
        payload,
    }
}

/// Bounded-buffer, best-effort event fan-out.
///
/// Each subscriber gets its own bounded `mpsc` channel; a full subscriber
/// channel marks that subscriber for removal rather than blocking the
/// broadcast. The per-subscriber map is behind a `tokio::sync::RwLock`:
/// broadcasting takes the read lock, register/unregister and the deferred
/// slow-subscriber cleanup take the write lock.
pub struct Broadcaster {
    subscribers: RwLock<HashMap<SubscriberId, mpsc::Sender<Envelope>>>,
    next_id: AtomicU64,
    buffer: usize,
    dropped: AtomicU64,
}

impl Broadcaster {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer,
            dropped: AtomicU64::new(0),
        }
    }

    /// Register a new subscriber, returning its id and the receiving end.
    pub async fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.subscribers.write().await.insert(id, tx);
        (id, rx)
    }

    pub async fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().await.remove(&id);
    }

    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    async fn broadcast_one(&self, envelope: &Envelope) {
        let mut stale = Vec::new();
        {
            let subs = self.subscribers.read().await;
            for (id, tx) in subs.iter() {
                if tx.try_send(envelope.clone()).is_err() {
                    stale.push(*id);
                }
            }
        }
        if !stale.is_empty() {
            self.dropped.fetch_add(stale.len() as u64, Ordering::Relaxed);
            let mut subs = self.subscribers.write().await;
            for id in stale {
                if subs.remove(&id).is_some() {
                    tracing::warn!(subscriber_id = id, "dropping slow event subscriber");
                }
            }
        }
    }
}

#[async_trait]
impl EventPublisher for Broadcaster {
    async fn publish(&self, events: Vec<RunEvent>) {
        for event in &events {
            let envelope = envelope_for(event);
            tracing::info!(
                run_id = %event.run_id,
                event_type = %envelope.kind,
                at = %Utc::now(),
                "domain event published"
            );
            self.broadcast_one(&envelope).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::DomainEventKind;

    fn event(kind: DomainEventKind) -> RunEvent {
        RunEvent {
            at: Utc::now(),
            run_id: "run-abc".to_string(),
            kind,
        }
    }

    #[tokio::test]
    async fn subscriber_receives_published_events() {
        let broadcaster = Broadcaster::new(8);
        let (_id, mut rx) = broadcaster.subscribe().await;
        broadcaster.publish(vec![event(DomainEventKind::RunPublished)]).await;
        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.kind, "release.published");
    }

    #[tokio::test]
    async fn full_subscriber_buffer_is_dropped_without_affecting_others() {
        let broadcaster = Broadcaster::new(1);
        let (_slow_id, _slow_rx_never_read) = broadcaster.subscribe().await;
        let (_fast_id, mut fast_rx) = broadcaster.subscribe().await;

        // Fill the slow subscriber's single-slot buffer, then overflow it.
        broadcaster.publish(vec![event(DomainEventKind::RunPublished)]).await;
        broadcaster.publish(vec![event(DomainEventKind::RunCancelled)]).await;

        assert!(broadcaster.dropped_count() >= 1);
        // The fast subscriber still got at least the first event before being
        // starved by its own single-slot buffer; draining confirms it wasn't
        // torn down by the slow one's removal.
        assert!(fast_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn unsubscribe_removes_subscriber() {
        let broadcaster = Broadcaster::new(8);
        let (id, mut rx) = broadcaster.subscribe().await;
        broadcaster.unsubscribe(id).await;
        broadcaster.publish(vec![event(DomainEventKind::RunPublished)]).await;
        assert!(rx.try_recv().is_err());
    }
}
