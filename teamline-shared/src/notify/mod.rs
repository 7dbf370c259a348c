/// Notification publishing
///
/// The activity pipeline fans an activity out to the project's members:
/// one message per recipient on their private channel plus one on the
/// shared broadcast channel. Delivery is fire-and-forget — there is no
/// acknowledgement, no retry, and no persisted delivery state beyond
/// the activity row itself.
///
/// The transport is Redis PUBLISH; [`RedisNotifier`] is the production
/// implementation behind the [`Notifier`] trait.

pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::activity::Activity;

pub use self::redis::{RedisNotifier, RedisNotifierConfig};

/// Broadcast channel every connected client may subscribe to
pub const BROADCAST_CHANNEL: &str = "notifications:all";

/// Private channel name for a user
pub fn user_channel(username: &str) -> String {
    format!("notifications:user:{}", username)
}

/// Notification delivery errors
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Transport-level failure
    #[error("Notification transport error: {0}")]
    Transport(String),

    /// Activity could not be serialized
    #[error("Notification serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Push transport for activity notifications
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Delivers an activity to one user's private channel
    async fn notify_user(&self, username: &str, activity: &Activity) -> Result<(), NotifyError>;

    /// Delivers an activity to the shared broadcast channel
    async fn broadcast(&self, activity: &Activity) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_channel_naming() {
        assert_eq!(user_channel("alice"), "notifications:user:alice");
        assert_eq!(BROADCAST_CHANNEL, "notifications:all");
    }
}
