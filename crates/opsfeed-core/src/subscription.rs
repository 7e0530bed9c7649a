// ── Topic subscription registry ──
//
// Tracks which logical topics are wanted over the shared connection and
// why. Interest is reference-counted per consumer, so two pages watching
// the same topic don't unsubscribe each other.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::connection::{ConnectionManager, ConnectionState};

/// Why a topic is wanted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interest {
    /// Explicitly subscribed through [`ConnectionManager::subscribe`].
    pub pinned: bool,
    /// Number of live consumer handles attached to the topic.
    pub consumers: usize,
}

impl Interest {
    fn is_wanted(self) -> bool {
        self.pinned || self.consumers > 0
    }
}

/// The set of topics the connection should be subscribed to.
///
/// Topics keep their first-subscribed order, which is the order they are
/// re-issued in after a reconnect. Every mutator returns `true` exactly
/// when the topic crossed the wanted/unwanted boundary, i.e. when the
/// caller owes the server a subscribe or unsubscribe frame.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    topics: IndexMap<String, Interest>,
}

impl TopicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a topic as explicitly wanted. Idempotent.
    pub fn pin(&mut self, topic: &str) -> bool {
        let entry = self.topics.entry(topic.to_owned()).or_default();
        let was_wanted = entry.is_wanted();
        entry.pinned = true;
        !was_wanted
    }

    /// Add one consumer's interest in a topic.
    pub fn attach(&mut self, topic: &str) -> bool {
        let entry = self.topics.entry(topic.to_owned()).or_default();
        let was_wanted = entry.is_wanted();
        entry.consumers += 1;
        !was_wanted
    }

    /// Drop one consumer's interest. Returns `true` when that was the
    /// last interest in the topic and it has been removed.
    pub fn detach(&mut self, topic: &str) -> bool {
        let Some(entry) = self.topics.get_mut(topic) else {
            return false;
        };
        entry.consumers = entry.consumers.saturating_sub(1);
        if entry.is_wanted() {
            return false;
        }
        self.topics.shift_remove(topic);
        true
    }

    /// Drop every interest in a topic. Returns `true` if it was present.
    pub fn remove(&mut self, topic: &str) -> bool {
        self.topics.shift_remove(topic).is_some()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.contains_key(topic)
    }

    pub fn interest(&self, topic: &str) -> Option<Interest> {
        self.topics.get(topic).copied()
    }

    /// Wanted topics in first-subscribed order.
    pub fn topics(&self) -> Vec<String> {
        self.topics.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

// ── LiveFeed ─────────────────────────────────────────────────────────

/// A consumer's view of the shared connection.
///
/// Returned by [`ConnectionManager::watch`]. Holds the consumer's interest
/// in its topic for as long as it lives; dropping it detaches. Exposes the
/// connection status and the most recent payload, plus change
/// notification for both.
pub struct LiveFeed {
    manager: ConnectionManager,
    topic: Option<String>,
    state: watch::Receiver<ConnectionState>,
    latest: watch::Receiver<Option<Arc<Value>>>,
}

impl LiveFeed {
    pub(crate) fn new(manager: ConnectionManager, topic: Option<String>) -> Self {
        let state = manager.state_changes();
        let latest = manager.latest_changes();
        Self {
            manager,
            topic,
            state,
            latest,
        }
    }

    /// Topic this feed holds interest in, if any.
    pub fn topic(&self) -> Option<&str> {
        self.topic.as_deref()
    }

    /// Current connection status.
    pub fn status(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Most recent decoded payload, if one has arrived.
    pub fn latest(&self) -> Option<Arc<Value>> {
        self.latest.borrow().clone()
    }

    /// Wait for the next payload.
    ///
    /// Intermediate payloads may be coalesced if the caller is slow; use
    /// [`messages`](Self::messages) to see every frame. Returns `None` once
    /// the connection manager has been shut down.
    pub async fn changed(&mut self) -> Option<Arc<Value>> {
        let cancel = self.manager.cancellation();
        tokio::select! {
            biased;
            () = cancel.cancelled() => None,
            result = self.latest.changed() => {
                result.ok()?;
                self.latest.borrow_and_update().clone()
            }
        }
    }

    /// Wait for the connection status to change, returning the new status.
    pub async fn status_changed(&mut self) -> Option<ConnectionState> {
        self.state.changed().await.ok()?;
        Some(*self.state.borrow_and_update())
    }

    /// Receiver that sees every decoded payload in arrival order.
    pub fn messages(&self) -> broadcast::Receiver<Arc<Value>> {
        self.manager.messages()
    }
}

impl std::fmt::Debug for LiveFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveFeed")
            .field("topic", &self.topic)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        if let Some(topic) = self.topic.take() {
            self.manager.detach(&topic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn pin_is_idempotent() {
        let mut reg = TopicRegistry::new();
        assert!(reg.pin("process"));
        assert!(!reg.pin("process"));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn last_consumer_detach_removes_topic() {
        let mut reg = TopicRegistry::new();
        assert!(reg.attach("quality"));
        assert!(!reg.attach("quality"));

        assert!(!reg.detach("quality"), "one consumer still attached");
        assert!(reg.contains("quality"));

        assert!(reg.detach("quality"));
        assert!(!reg.contains("quality"));
    }

    #[test]
    fn pinned_topic_survives_consumer_detach() {
        let mut reg = TopicRegistry::new();
        reg.pin("sales");
        assert!(!reg.attach("sales"), "already wanted");
        assert!(!reg.detach("sales"));
        assert_eq!(
            reg.interest("sales"),
            Some(Interest {
                pinned: true,
                consumers: 0
            })
        );
    }

    #[test]
    fn remove_drops_all_interest() {
        let mut reg = TopicRegistry::new();
        reg.attach("maintenance");
        reg.attach("maintenance");
        reg.pin("maintenance");

        assert!(reg.remove("maintenance"));
        assert!(!reg.remove("maintenance"));
        assert!(!reg.detach("maintenance"), "detach after remove is a no-op");
        assert!(reg.is_empty());
    }

    #[test]
    fn topics_keep_first_subscribed_order() {
        let mut reg = TopicRegistry::new();
        reg.pin("process");
        reg.attach("quality");
        reg.pin("sales");
        reg.remove("quality");
        reg.attach("maintenance");

        assert_eq!(reg.topics(), vec!["process", "sales", "maintenance"]);
    }
}
