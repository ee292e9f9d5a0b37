use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use super::KeyValueStore;
use crate::error::AppResult;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process store used as the degraded-mode tier and in tests.
///
/// Expiry is checked on read. Entries that are never read again are only
/// reclaimed by `purge_expired`, which the sweeper runs periodically.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: &str, ttl_seconds: u64) {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Instant::now() + Duration::from_secs(ttl_seconds),
            },
        );
    }

    pub fn lookup(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = {
            let entry = self.entries.get(key)?;
            if entry.is_expired(now) {
                None
            } else {
                Some(entry.value.clone())
            }
        };

        if value.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        value
    }

    pub fn touch(&self, key: &str, ttl_seconds: u64) {
        let now = Instant::now();
        if let Some(mut entry) = self.entries.get_mut(key) {
            if !entry.is_expired(now) {
                entry.expires_at = now + Duration::from_secs(ttl_seconds);
            }
        }
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drops every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries, Instant::now())
    }

    /// Spawns a task that purges expired entries every `interval`.
    ///
    /// The task exits once every handle to the store has been dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let weak_entries = Arc::downgrade(&self.entries);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(entries) = weak_entries.upgrade() else {
                    break;
                };
                let purged = purge(&entries, Instant::now());
                if purged > 0 {
                    tracing::debug!(purged = purged, remaining = entries.len(), "Local cache sweep");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn purge(entries: &DashMap<String, Entry>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before.saturating_sub(entries.len())
}

#[async_trait::async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> AppResult<()> {
        self.insert(key, value, ttl_seconds);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> AppResult<()> {
        self.touch(key, ttl_seconds);
        Ok(())
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        self.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
