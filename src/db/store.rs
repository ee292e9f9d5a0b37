use crate::error::AppResult;

/// Keyed JSON-string store with per-key expiry.
///
/// Implementations only need atomic get/set/expire per key; nothing in the
/// service relies on cross-key transactions.
#[async_trait::async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> AppResult<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()>;

    /// Resets the TTL of an existing key; missing keys are ignored
    async fn expire(&self, key: &str, ttl_seconds: u64) -> AppResult<()>;

    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Store name for logging
    fn name(&self) -> &'static str;
}
