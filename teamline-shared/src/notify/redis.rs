/// Redis-backed notification publisher
///
/// Publishes serialized activities with PUBLISH. The connection manager
/// reconnects on failure; a publish that still fails surfaces as a
/// [`NotifyError`], which the pipeline logs and otherwise ignores.
///
/// # Example
///
/// ```no_run
/// use teamline_shared::notify::{Notifier, RedisNotifier, RedisNotifierConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = RedisNotifierConfig::from_env()?;
/// let notifier = RedisNotifier::connect(config).await?;
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::env;
use thiserror::Error;

use super::{user_channel, Notifier, NotifyError, BROADCAST_CHANNEL};
use crate::models::activity::Activity;

/// Redis connection configuration
#[derive(Debug, Clone)]
pub struct RedisNotifierConfig {
    /// Redis connection URL (`redis://[user:pass@]host:port[/db]`)
    pub url: String,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum RedisConfigError {
    #[error("REDIS_URL environment variable is required")]
    MissingUrl,
}

impl RedisNotifierConfig {
    /// Loads the Redis URL from the environment
    pub fn from_env() -> Result<Self, RedisConfigError> {
        dotenvy::dotenv().ok();

        let url = env::var("REDIS_URL").map_err(|_| RedisConfigError::MissingUrl)?;
        Ok(Self { url })
    }
}

/// Redis PUBLISH-based notifier
#[derive(Clone)]
pub struct RedisNotifier {
    connection: ConnectionManager,
}

impl RedisNotifier {
    /// Connects to Redis and verifies the connection with PING
    pub async fn connect(config: RedisNotifierConfig) -> Result<Self, redis::RedisError> {
        tracing::info!("Connecting notification publisher to Redis");

        let client = redis::Client::open(config.url.as_str())?;
        let mut connection = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut connection).await?;
        if pong != "PONG" {
            tracing::warn!(reply = %pong, "Unexpected PING reply from Redis");
        }

        Ok(Self { connection })
    }

    async fn publish(&self, channel: &str, activity: &Activity) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(activity)?;

        let mut connection = self.connection.clone();
        let receivers: i64 = connection
            .publish(channel, payload)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        tracing::debug!(channel = %channel, receivers, "Published notification");
        Ok(())
    }
}

#[async_trait]
impl Notifier for RedisNotifier {
    async fn notify_user(&self, username: &str, activity: &Activity) -> Result<(), NotifyError> {
        self.publish(&user_channel(username), activity).await
    }

    async fn broadcast(&self, activity: &Activity) -> Result<(), NotifyError> {
        self.publish(BROADCAST_CHANNEL, activity).await
    }
}
