use super::{Cache, CacheKey};
use crate::error::AppResult;
use crate::models::SessionState;

/// Sessions expire after 30 minutes without access
pub const SESSION_TTL_SECONDS: u64 = 1800;

/// Session persistence over the shared cache
///
/// Writes are awaited so a follow-up request on another replica sees them.
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache,
    ttl: u64,
}

impl SessionStore {
    pub fn new(cache: Cache) -> Self {
        Self {
            cache,
            ttl: SESSION_TTL_SECONDS,
        }
    }

    pub fn with_ttl(cache: Cache, ttl: u64) -> Self {
        Self { cache, ttl }
    }

    pub async fn save(&self, session: &SessionState) {
        let key = CacheKey::Session(session.session_id.clone());
        self.cache.set(&key, session, self.ttl).await;
    }

    /// Loads a session and slides its expiry forward
    pub async fn load(&self, session_id: &str) -> AppResult<Option<SessionState>> {
        let key = CacheKey::Session(session_id.to_string());
        let session: Option<SessionState> = self.cache.get_from_cache(&key).await?;
        if session.is_some() {
            self.cache.extend(&key, self.ttl).await;
        }
        Ok(session)
    }

    pub async fn remove(&self, session_id: &str) {
        self.cache
            .delete(&CacheKey::Session(session_id.to_string()))
            .await;
    }
}
