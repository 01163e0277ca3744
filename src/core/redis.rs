//! Shared Redis connection used for request rate limiting and the
//! `/healthz` component report.

use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError};
use tokio::sync::RwLock;

/// Cloneable handle over an optional connection manager. The handle is
/// created eagerly but only holds a live connection after `connect`.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    conn: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

const FIXED_WINDOW_SCRIPT: &str = r#"
    local n = redis.call("INCR", KEYS[1])
    if n == 1 then
        redis.call("EXPIRE", KEYS[1], ARGV[1])
    end
    return n
"#;

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, conn: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.clone())?;
        let manager = ConnectionManager::new(client).await?;
        self.conn.write().await.replace(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        self.conn.write().await.take();
    }

    async fn connection(&self) -> Option<ConnectionManager> {
        self.conn.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut conn) = self.connection().await else {
            return RedisHealth::Disconnected;
        };
        match cmd("PING").query_async::<_, String>(&mut conn).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// Fixed-window rate limiter keyed by `key`. Fails open: when no
    /// connection is held the caller is allowed through, so an
    /// unavailable cache never blocks logins or submissions.
    pub(crate) async fn rate_limit(
        &self,
        key: &str,
        limit: u64,
        window_seconds: u64,
    ) -> Result<bool, RedisError> {
        let Some(mut conn) = self.connection().await else {
            return Ok(true);
        };

        let count: i64 = redis::Script::new(FIXED_WINDOW_SCRIPT)
            .key(key)
            .arg(window_seconds as i64)
            .invoke_async(&mut conn)
            .await?;

        Ok(count <= limit as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::{RedisHandle, RedisHealth};

    #[tokio::test]
    async fn disconnected_handle_fails_open() {
        let redis = RedisHandle::new("redis://localhost:1/0".to_string());
        assert!(redis.rate_limit("rl:test", 1, 5).await.unwrap());
        assert!(matches!(redis.health().await, RedisHealth::Disconnected));
    }
}
