//! Rate-limiting hook for the authentication pipeline.
//!
//! Throttling policy is out of scope; the OAuth handler binds the consumer
//! key onto the request as its throttle key, and hosts that want limiting
//! implement this trait and consult it with that key after authentication.

use async_trait::async_trait;

use super::types::StoreError;

/// Trait for rate limiting by a given key (the consumer key for OAuth
/// requests, or any key the host chooses for other schemes).
#[async_trait]
pub trait RateLimiter: Send + Sync + 'static {
    /// Attempts to consume one unit for the key. Returns `Ok(true)` if the
    /// request may proceed, `Ok(false)` if it is rate-limited.
    async fn consume(&self, key: &str) -> Result<bool, StoreError>;
}
