//! Process-local fan-out of push events.
//!
//! The Smart-HTTP backend is the only publisher; REST change-stream
//! subscribers are the readers. Each subscription gets its own queue that
//! starts with a snapshot of the repository's branches, then carries push
//! events for that producer interleaved with periodic keep-alives.
//!
//! Delivery is best-effort: subscribers that disconnect lose undelivered
//! events, and there is no cross-process transport.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::storage::{ProducerName, ZERO_REVISION};

/// queue depth for the shared publisher channel
const BUS_CAPACITY: usize = 256;

/// keep-alive cadence on subscriber streams
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// which ref namespace a push touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefKind {
    Head,
    Tag,
}

/// one ref update extracted from a receive-pack report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefChange {
    #[serde(rename = "type")]
    pub kind: RefKind,
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub before: String,
    pub after: String,
}

/// a completed push against one repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushEvent {
    pub repo: String,
    pub changes: Vec<RefChange>,
    pub timestamp: DateTime<Utc>,
}

impl PushEvent {
    pub fn new(repo: impl Into<String>, changes: Vec<RefChange>) -> Self {
        Self {
            repo: repo.into(),
            changes,
            timestamp: Utc::now(),
        }
    }
}

/// what a change-stream subscriber actually receives
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// branch snapshot sent once at subscription start
    Initial { branches: BTreeMap<String, String> },
    /// a push against the subscribed producer
    Push {
        repo: String,
        changes: Vec<RefChange>,
        timestamp: DateTime<Utc>,
    },
    /// periodic liveness marker
    Keepalive,
}

/// In-process publish/subscribe of push events.
///
/// Clone freely; all clones share one channel.
#[derive(Debug, Clone)]
pub struct PushBus {
    tx: broadcast::Sender<PushEvent>,
}

impl Default for PushBus {
    fn default() -> Self {
        Self::new()
    }
}

impl PushBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish a push event to every live subscriber.
    pub fn publish(&self, event: PushEvent) {
        debug!(repo = %event.repo, changes = event.changes.len(), "publishing push event");
        // no receivers is fine; events are not durable
        let _ = self.tx.send(event);
    }

    /// Open a subscriber queue for one producer.
    ///
    /// The queue is unbounded and immediately carries the branch snapshot
    /// (with `master` defaulted to the zero revision when absent), then
    /// matching push events and keep-alives. Dropping the receiver ends
    /// the subscription and cancels its keep-alive timer.
    pub fn subscribe(
        &self,
        producer: &ProducerName,
        mut branches: BTreeMap<String, String>,
    ) -> mpsc::UnboundedReceiver<StreamEvent> {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let mut bus_rx = self.tx.subscribe();
        let producer = producer.clone();

        tokio::spawn(async move {
            branches
                .entry("master".to_string())
                .or_insert_with(|| ZERO_REVISION.to_string());
            if out_tx.send(StreamEvent::Initial { branches }).is_err() {
                return;
            }

            let start = tokio::time::Instant::now() + KEEPALIVE_INTERVAL;
            let mut keepalive = tokio::time::interval_at(start, KEEPALIVE_INTERVAL);

            loop {
                tokio::select! {
                    event = bus_rx.recv() => match event {
                        Ok(event) if event.repo == producer.as_str() => {
                            let sent = out_tx.send(StreamEvent::Push {
                                repo: event.repo,
                                changes: event.changes,
                                timestamp: event.timestamp,
                            });
                            if sent.is_err() {
                                return;
                            }
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            debug!(producer = %producer, skipped, "subscriber lagged, events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => return,
                    },
                    _ = keepalive.tick() => {
                        if out_tx.send(StreamEvent::Keepalive).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        out_rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn producer(name: &str) -> ProducerName {
        ProducerName::new(name).unwrap()
    }

    fn change(ref_name: &str, before: &str, after: &str) -> RefChange {
        RefChange {
            kind: RefKind::Head,
            ref_name: ref_name.to_string(),
            before: before.to_string(),
            after: after.to_string(),
        }
    }

    #[tokio::test]
    async fn test_initial_snapshot_first() {
        let bus = PushBus::new();
        let mut branches = BTreeMap::new();
        branches.insert("env/dev".to_string(), "abc123".to_string());

        let mut rx = bus.subscribe(&producer("acme"), branches);
        match rx.recv().await.unwrap() {
            StreamEvent::Initial { branches } => {
                assert_eq!(branches.get("env/dev").unwrap(), "abc123");
                // absent master is populated with the sentinel
                assert_eq!(branches.get("master").unwrap(), ZERO_REVISION);
            }
            other => panic!("expected initial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_initial_keeps_existing_master() {
        let bus = PushBus::new();
        let mut branches = BTreeMap::new();
        branches.insert("master".to_string(), "fff".to_string());

        let mut rx = bus.subscribe(&producer("acme"), branches);
        match rx.recv().await.unwrap() {
            StreamEvent::Initial { branches } => {
                assert_eq!(branches.get("master").unwrap(), "fff");
            }
            other => panic!("expected initial, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_matching_events_delivered_in_order() {
        let bus = PushBus::new();
        let mut rx = bus.subscribe(&producer("acme"), BTreeMap::new());
        let _ = rx.recv().await.unwrap(); // initial

        bus.publish(PushEvent::new("acme", vec![change("dev", "a", "b")]));
        bus.publish(PushEvent::new("other", vec![change("dev", "x", "y")]));
        bus.publish(PushEvent::new("acme", vec![change("dev", "b", "c")]));

        match rx.recv().await.unwrap() {
            StreamEvent::Push { repo, changes, .. } => {
                assert_eq!(repo, "acme");
                assert_eq!(changes[0].after, "b");
            }
            other => panic!("expected push, got {other:?}"),
        }
        // the event for "other" was filtered out
        match rx.recv().await.unwrap() {
            StreamEvent::Push { changes, .. } => assert_eq!(changes[0].after, "c"),
            other => panic!("expected push, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalives_tick() {
        let bus = PushBus::new();
        let mut rx = bus.subscribe(&producer("acme"), BTreeMap::new());
        let _ = rx.recv().await.unwrap(); // initial

        tokio::time::advance(KEEPALIVE_INTERVAL).await;
        match rx.recv().await.unwrap() {
            StreamEvent::Keepalive => {}
            other => panic!("expected keepalive, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_publish_with_no_subscribers_is_fine() {
        let bus = PushBus::new();
        bus.publish(PushEvent::new("acme", vec![]));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_is_purged() {
        let bus = PushBus::new();
        let rx = bus.subscribe(&producer("acme"), BTreeMap::new());
        drop(rx);

        // delivery to the dropped subscriber must not wedge the publisher
        bus.publish(PushEvent::new("acme", vec![change("dev", "a", "b")]));
        tokio::task::yield_now().await;
    }

    #[test]
    fn test_stream_event_wire_shape() {
        let event = StreamEvent::Push {
            repo: "acme".to_string(),
            changes: vec![change("dev", "a", "b")],
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "push");
        assert_eq!(json["changes"][0]["type"], "head");
        assert_eq!(json["changes"][0]["ref"], "dev");

        let keepalive = serde_json::to_value(StreamEvent::Keepalive).unwrap();
        assert_eq!(keepalive["type"], "keepalive");
    }
}
