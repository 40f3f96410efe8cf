//! Fixed-window rate limiting over a shared atomic counter store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tracing::debug;

use crate::error::{MailError, MailResult};

/// Atomic counter store boundary: increment, expiry, and a health ping.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment a key and return the new count.
    async fn increment(&self, key: &str) -> MailResult<u64>;

    /// Set a key's time-to-live in seconds.
    async fn expire(&self, key: &str, ttl_seconds: u64) -> MailResult<()>;

    /// Health probe.
    async fn ping(&self) -> bool;
}

/// Counter store backed by Redis.
pub struct RedisCounterStore {
    redis: ConnectionManager,
}

impl RedisCounterStore {
    pub fn new(redis: ConnectionManager) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str) -> MailResult<u64> {
        let mut conn = self.redis.clone();
        let count: u64 = redis::cmd("INCR")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| MailError::Database(format!("counter increment failed: {e}")))?;
        Ok(count)
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> MailResult<()> {
        let mut conn = self.redis.clone();
        let _: i64 = redis::cmd("EXPIRE")
            .arg(key)
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| MailError::Database(format!("counter expire failed: {e}")))?;
        Ok(())
    }

    async fn ping(&self) -> bool {
        let mut conn = self.redis.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }
}

/// Fixed-window limiter keyed per tenant and per (tenant, provider).
///
/// The increment happens before the limit check, so a rejected call still
/// consumes a slot in the window. That is intentional: it keeps the check to
/// a single round-trip and biases toward protecting downstream capacity.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    window_seconds: u64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, window_seconds: u64) -> Self {
        Self {
            store,
            window_seconds,
        }
    }

    pub fn store(&self) -> &Arc<dyn CounterStore> {
        &self.store
    }

    async fn consume(&self, key: &str, limit: u64) -> MailResult<()> {
        let count = self.store.increment(key).await?;
        if count == 1 {
            // First hit opens the window.
            self.store.expire(key, self.window_seconds).await?;
        }
        if count > limit {
            debug!(key, count, limit, "Rate limit exceeded");
            return Err(MailError::RateLimited(format!(
                "rate limit exceeded for {key}"
            )));
        }
        Ok(())
    }

    pub async fn check_tenant(&self, tenant_id: &str, limit: u64) -> MailResult<()> {
        self.consume(&format!("rate:tenant:{tenant_id}"), limit).await
    }

    pub async fn check_provider(
        &self,
        tenant_id: &str,
        provider: &str,
        limit: u64,
    ) -> MailResult<()> {
        self.consume(&format!("rate:provider:{tenant_id}:{provider}"), limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_under_limit_passes() {
        let mut store = MockCounterStore::new();
        store
            .expect_increment()
            .with(eq("rate:tenant:t1"))
            .returning(|_| Ok(2));
        store.expect_expire().never();

        let limiter = RateLimiter::new(Arc::new(store), 60);
        assert!(limiter.check_tenant("t1", 5).await.is_ok());
    }

    #[tokio::test]
    async fn test_first_increment_opens_the_window() {
        let mut store = MockCounterStore::new();
        store.expect_increment().returning(|_| Ok(1));
        store
            .expect_expire()
            .with(eq("rate:tenant:t1"), eq(60))
            .times(1)
            .returning(|_, _| Ok(()));

        let limiter = RateLimiter::new(Arc::new(store), 60);
        assert!(limiter.check_tenant("t1", 5).await.is_ok());
    }

    #[tokio::test]
    async fn test_over_limit_is_rejected() {
        let mut store = MockCounterStore::new();
        store.expect_increment().returning(|_| Ok(6));

        let limiter = RateLimiter::new(Arc::new(store), 60);
        let err = limiter.check_tenant("t1", 5).await.unwrap_err();
        assert!(matches!(err, MailError::RateLimited(_)));
    }

    #[tokio::test]
    async fn test_rejected_call_still_consumes_a_slot() {
        // The increment is unconditional; a rejected caller still advanced
        // the counter. Verified by expecting exactly one increment per call.
        let mut store = MockCounterStore::new();
        store.expect_increment().times(2).returning(|_| Ok(100));

        let limiter = RateLimiter::new(Arc::new(store), 60);
        assert!(limiter.check_tenant("t1", 5).await.is_err());
        assert!(limiter.check_tenant("t1", 5).await.is_err());
    }

    #[tokio::test]
    async fn test_provider_key_shape() {
        let mut store = MockCounterStore::new();
        store
            .expect_increment()
            .with(eq("rate:provider:t1:smtp"))
            .returning(|_| Ok(2));

        let limiter = RateLimiter::new(Arc::new(store), 60);
        assert!(limiter.check_provider("t1", "smtp", 5).await.is_ok());
    }
}
