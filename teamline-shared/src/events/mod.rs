/// Domain events
///
/// Mutations that feed the activity pipeline publish an explicit event
/// after their database write has committed — there are no persistence
/// lifecycle callbacks. The bus is an unbounded in-process channel; the
/// [`pipeline::ActivityPipeline`] consumes it on a background task.
///
/// Publishing after the write returns gives at-commit semantics: a
/// write that fails or rolls back never publishes, and a published
/// event can no longer be undone by its trigger.
///
/// # Example
///
/// ```
/// use teamline_shared::events::{DomainEvent, EventBus};
/// use uuid::Uuid;
///
/// let (bus, mut rx) = EventBus::new();
/// bus.publish(DomainEvent::TaskUpdated { task_id: Uuid::new_v4() });
/// assert!(rx.try_recv().is_ok());
/// ```

pub mod pipeline;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

pub use pipeline::{ActivityPipeline, PipelineError};

/// An event published by a committed mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A comment was added to a task
    CommentAdded { comment_id: Uuid },

    /// A task's fields were updated
    TaskUpdated { task_id: Uuid },
}

impl DomainEvent {
    /// Id of the entity the event refers to
    pub fn entity_id(&self) -> Uuid {
        match self {
            DomainEvent::CommentAdded { comment_id } => *comment_id,
            DomainEvent::TaskUpdated { task_id } => *task_id,
        }
    }
}

/// Cheap-to-clone publishing handle
///
/// Handlers hold a clone via application state and publish exactly once
/// per successful triggering write.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: mpsc::UnboundedSender<DomainEvent>,
}

impl EventBus {
    /// Creates the bus and the receiver the pipeline will consume
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Publishes an event; never blocks the calling request
    ///
    /// If the pipeline has shut down the event is dropped with a log
    /// line — a notification is best-effort, the triggering write has
    /// already committed.
    pub fn publish(&self, event: DomainEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(event = ?e.0, "Event bus closed, dropping domain event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_delivers_to_receiver() {
        let (bus, mut rx) = EventBus::new();
        let comment_id = Uuid::new_v4();

        bus.publish(DomainEvent::CommentAdded { comment_id });

        assert_eq!(rx.try_recv().unwrap(), DomainEvent::CommentAdded { comment_id });
    }

    #[test]
    fn test_publish_after_receiver_dropped_does_not_panic() {
        let (bus, rx) = EventBus::new();
        drop(rx);
        bus.publish(DomainEvent::TaskUpdated { task_id: Uuid::new_v4() });
    }

    #[test]
    fn test_entity_id() {
        let id = Uuid::new_v4();
        assert_eq!(DomainEvent::CommentAdded { comment_id: id }.entity_id(), id);
        assert_eq!(DomainEvent::TaskUpdated { task_id: id }.entity_id(), id);
    }

    #[test]
    fn test_event_serde_tagging() {
        let event = DomainEvent::CommentAdded { comment_id: Uuid::new_v4() };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"kind\":\"comment_added\""));
        let parsed: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, event);
    }
}
