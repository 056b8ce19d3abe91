use dashmap::DashMap;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::dto::events::{DashboardEvent, MatchEvent};

/// Bounded per-subscriber buffer. A subscriber that falls further behind
/// starts losing its oldest unread events and is told to resync.
pub const SUBSCRIBER_BUFFER: usize = 64;

/// Broadcast hub for one topic. Publishing never blocks: slow subscribers
/// overflow their own buffer and surface as a lag on their receiver.
pub struct Topic<E> {
    sender: broadcast::Sender<E>,
}

impl<E: Clone> Topic<E> {
    fn new() -> Self {
        let (sender, _receiver) = broadcast::channel(SUBSCRIBER_BUFFER);
        Self { sender }
    }

    /// Register a new subscriber that will receive subsequent events.
    pub fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }

    /// Send an event to all current subscribers, ignoring delivery errors.
    pub fn publish(&self, event: E) {
        let _ = self.sender.send(event);
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<E> Clone for Topic<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Topic registry for spectator streams: one dashboard topic plus one topic
/// per match, created on demand and discarded on reset.
pub struct EventHub {
    dashboard: Topic<DashboardEvent>,
    matches: DashMap<Uuid, Topic<MatchEvent>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self {
            dashboard: Topic::new(),
            matches: DashMap::new(),
        }
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// The dashboard topic shared by every overview subscriber.
    pub fn dashboard(&self) -> &Topic<DashboardEvent> {
        &self.dashboard
    }

    /// Topic for one match, created lazily on first use.
    pub fn match_topic(&self, match_id: Uuid) -> Topic<MatchEvent> {
        self.matches
            .entry(match_id)
            .or_insert_with(Topic::new)
            .clone()
    }

    /// Publish to a match topic without keeping a handle around.
    pub fn publish_match(&self, match_id: Uuid, event: MatchEvent) {
        self.match_topic(match_id).publish(event);
    }

    /// Spectators currently attached to a match topic.
    pub fn match_spectators(&self, match_id: Uuid) -> usize {
        self.matches
            .get(&match_id)
            .map(|topic| topic.subscriber_count())
            .unwrap_or(0)
    }

    /// Drop every per-match topic, disconnecting their subscribers.
    pub fn clear_match_topics(&self) {
        self.matches.clear();
    }
}
