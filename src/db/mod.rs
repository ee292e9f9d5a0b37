pub mod cache;
pub mod memory;
pub mod redis;
pub mod sessions;
pub mod store;

mod macros;

pub use self::cache::{Cache, CacheKey, CacheWriterHandle, ReadPolicy};
pub use self::memory::MemoryStore;
pub use self::redis::{create_redis_client, RedisStore};
pub use self::sessions::SessionStore;
pub use self::store::KeyValueStore;
