use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::{KeyValueStore, MemoryStore};
use crate::error::AppResult;
use crate::models::TmdbId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Pattern-cache key, already namespaced by the normalizer
    Pattern(String),
    Session(String),
    MovieDetails(TmdbId),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Pattern(key) => write!(f, "{}", key),
            CacheKey::Session(id) => write!(f, "session:{}", id),
            CacheKey::MovieDetails(id) => write!(f, "tmdb:movie:{}", id),
        }
    }
}

/// How often the local tier drops expired entries
const LOCAL_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Which tier answers a read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadPolicy {
    /// Primary answers; the local tier is consulted when the primary misses,
    /// errors or is not configured
    #[default]
    PrimaryFirst,
    /// Never touch the primary on read
    LocalOnly,
}

/// Message for asynchronous primary-tier writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Two-tier JSON cache: an optional primary store (Redis) in front of an
/// in-process degraded-mode store.
///
/// Every write lands in both tiers. Store failures never propagate: reads
/// degrade to a miss and writes are logged and dropped. The local tier is
/// swept on a timer, since with a healthy primary its entries are rarely
/// read back.
#[derive(Clone)]
pub struct Cache {
    primary: Option<Arc<dyn KeyValueStore>>,
    local: MemoryStore,
    policy: ReadPolicy,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Initiates a graceful shutdown of the cache writer
    ///
    /// Sends a shutdown signal to the writer task, which flushes all pending
    /// writes to the primary store before exiting.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache with a background task for primary-tier writes
    pub async fn new(
        primary: Option<Arc<dyn KeyValueStore>>,
        policy: ReadPolicy,
    ) -> (Self, CacheWriterHandle) {
        Self::with_sweep_interval(primary, policy, LOCAL_SWEEP_INTERVAL).await
    }

    pub async fn with_sweep_interval(
        primary: Option<Arc<dyn KeyValueStore>>,
        policy: ReadPolicy,
        sweep_interval: Duration,
    ) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let writer_primary = primary.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(writer_primary, write_rx, shutdown_rx).await;
        });

        let local = MemoryStore::new();
        local.spawn_sweeper(sweep_interval);

        let cache = Self {
            primary,
            local,
            policy,
            write_tx,
        };

        (cache, CacheWriterHandle { shutdown_tx })
    }

    /// Cache with no primary tier
    pub async fn in_memory() -> (Self, CacheWriterHandle) {
        Self::new(None, ReadPolicy::LocalOnly).await
    }

    /// Background task that processes primary-tier write messages
    ///
    /// On shutdown signal, flushes all remaining messages before exiting.
    async fn cache_writer_task(
        primary: Option<Arc<dyn KeyValueStore>>,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    Self::write_to_primary(primary.as_deref(), msg).await;
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    let mut flushed = 0usize;
                    while let Some(msg) = write_rx.recv().await {
                        Self::write_to_primary(primary.as_deref(), msg).await;
                        flushed += 1;
                    }
                    tracing::info!(flushed = flushed, "Cache writer task stopped");
                    break;
                }
                else => break,
            }
        }
    }

    async fn write_to_primary(primary: Option<&dyn KeyValueStore>, msg: CacheWriteMessage) {
        let Some(store) = primary else {
            return;
        };
        if let Err(e) = store.set(&msg.key, &msg.value, msg.ttl).await {
            tracing::warn!(error = %e, key = %msg.key, store = store.name(), "Cache write failed");
        }
    }

    /// Retrieves a value from the cache by key
    ///
    /// Missing keys, store failures and undecodable payloads all read as
    /// `None`. The `AppResult` return keeps call sites uniform with the
    /// `cached!` macro.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let key = key.to_string();

        let raw = match self.read(&key).await {
            Some(raw) => raw,
            None => return Ok(None),
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache deserialization error, treating as miss");
                Ok(None)
            }
        }
    }

    async fn read(&self, key: &str) -> Option<String> {
        if self.policy == ReadPolicy::PrimaryFirst {
            if let Some(store) = &self.primary {
                match store.get(key).await {
                    Ok(Some(raw)) => return Some(raw),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, key = %key, store = store.name(), "Cache read failed, using local tier");
                    }
                }
            }
        }
        self.local.lookup(key)
    }

    /// Stores a value in both tiers, waiting for the primary write
    pub async fn set<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let Some(json) = Self::encode(value) else {
            return;
        };
        let key = key.to_string();

        self.local.insert(&key, &json, ttl);
        Self::write_to_primary(
            self.primary.as_deref(),
            CacheWriteMessage {
                key,
                value: json,
                ttl,
            },
        )
        .await;
    }

    /// Stores a value without waiting for the primary write
    ///
    /// The local tier is updated immediately; the primary write is handed to
    /// the background writer.
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let Some(json) = Self::encode(value) else {
            return;
        };
        let key = key.to_string();

        self.local.insert(&key, &json, ttl);
        if self.primary.is_none() {
            return;
        }

        let msg = CacheWriteMessage {
            key,
            value: json,
            ttl,
        };
        if let Err(e) = self.write_tx.send(msg) {
            tracing::error!(error = %e, "Failed to send cache write message");
        }
    }

    /// Resets the TTL of a key in both tiers
    pub async fn extend(&self, key: &CacheKey, ttl: u64) {
        let key = key.to_string();
        self.local.touch(&key, ttl);
        if let Some(store) = &self.primary {
            if let Err(e) = store.expire(&key, ttl).await {
                tracing::warn!(error = %e, key = %key, store = store.name(), "Cache extend failed");
            }
        }
    }

    pub async fn delete(&self, key: &CacheKey) {
        let key = key.to_string();
        self.local.remove(&key);
        if let Some(store) = &self.primary {
            if let Err(e) = store.delete(&key).await {
                tracing::warn!(error = %e, key = %key, store = store.name(), "Cache delete failed");
            }
        }
    }

    fn encode<T: serde::Serialize>(value: &T) -> Option<String> {
        match serde_json::to_string(value) {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                None
            }
        }
    }
}
