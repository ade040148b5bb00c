//! Broadcast bus for facts about applied commands.
//!
//! # Guarantees
//!
//! - **At-most-once delivery**: Slow receivers may miss events
//! - **In-memory only**: Events are not persisted
//! - **No replay**: Lagged receivers get `RecvError::Lagged`
//! - **Facts only**: Emitted after a command has been applied; failed
//!   commands emit nothing
//!
//! Events carry identifiers and scalar values, never references into engine
//! state. Subscribers that need the full entity ask the engine for a snapshot.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::correlation::CorrelationId;

/// Default channel capacity for the event bus.
const DEFAULT_CAPACITY: usize = 10000;

/// A fact produced by a successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    UserRegistered {
        username: String,
    },
    SubredditCreated {
        name: String,
        creator: String,
    },
    SubredditJoined {
        subreddit_name: String,
        username: String,
    },
    SubredditLeft {
        subreddit_name: String,
        username: String,
    },
    PostCreated {
        post_id: String,
        subreddit_name: String,
        author: String,
    },
    CommentCreated {
        post_id: String,
        comment_id: String,
        parent_id: String,
        author: String,
    },
    Voted {
        post_id: String,
        voter: String,
        is_upvote: bool,
        /// The post author's karma after the vote.
        author_karma: i64,
    },
    MessageSent {
        from: String,
        to: String,
    },
    PostShared {
        from: String,
        to: String,
        post_id: String,
    },
    PostBookmarked {
        post_id: String,
        username: String,
    },
    PostUnbookmarked {
        post_id: String,
        username: String,
    },
}

/// Envelope wrapping an event with the correlation id of its command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventEnvelope {
    pub cid: CorrelationId,
    pub event: EngineEvent,
}

/// Broadcast bus for [`EngineEvent`]s.
///
/// # Example
///
/// ```ignore
/// let mut receiver = handle.subscribe();
/// handle.register_user("alice").await?;
///
/// let envelope = receiver.recv().await?;
/// assert!(matches!(envelope.event, EngineEvent::UserRegistered { .. }));
/// ```
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
}

impl EventBus {
    /// Create a new event bus with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a new event bus with the specified capacity.
    ///
    /// The capacity determines how many events can be buffered before
    /// slow receivers start lagging.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event with a random correlation ID.
    ///
    /// Returns the number of receivers that received the event.
    pub fn emit(&self, event: EngineEvent) -> usize {
        self.emit_with_correlation(event, CorrelationId::new())
    }

    /// Emit an event with a specific correlation ID.
    ///
    /// Returns the number of receivers that received the event.
    pub fn emit_with_correlation(&self, event: EngineEvent, cid: CorrelationId) -> usize {
        self.sender.send(EventEnvelope { cid, event }).unwrap_or(0)
    }

    /// Subscribe to events on this bus.
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(name: &str) -> EngineEvent {
        EngineEvent::UserRegistered {
            username: name.into(),
        }
    }

    #[tokio::test]
    async fn test_emit_and_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(registered("alice"));

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.event, registered("alice"));
    }

    #[tokio::test]
    async fn test_emit_with_correlation() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        let cid = CorrelationId::new();
        bus.emit_with_correlation(registered("bob"), cid);

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.cid, cid);
    }

    #[tokio::test]
    async fn test_emit_returns_receiver_count() {
        let bus = EventBus::new();
        assert_eq!(bus.emit(registered("a")), 0);

        let _r1 = bus.subscribe();
        assert_eq!(bus.emit(registered("b")), 1);

        let _r2 = bus.subscribe();
        assert_eq!(bus.emit(registered("c")), 2);
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_events() {
        let bus = EventBus::new();
        bus.emit(registered("early"));

        let mut receiver = bus.subscribe();
        bus.emit(registered("late"));

        let envelope = receiver.recv().await.unwrap();
        assert_eq!(envelope.event, registered("late"));
    }

    #[test]
    fn test_event_json_shape() {
        let json = serde_json::to_value(EngineEvent::Voted {
            post_id: "p1".into(),
            voter: "bob".into(),
            is_upvote: false,
            author_karma: 0,
        })
        .unwrap();
        assert_eq!(json["type"], "voted");
        assert_eq!(json["is_upvote"], false);
    }

    #[test]
    fn test_debug_impl() {
        let bus = EventBus::new();
        let _r1 = bus.subscribe();
        let debug_str = format!("{:?}", bus);
        assert!(debug_str.contains("EventBus"));
        assert!(debug_str.contains("subscriber_count"));
    }
}
