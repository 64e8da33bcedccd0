use redis::AsyncCommands;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Thin wrapper over a single-connection Redis client, used by the cache
/// invalidator after a successful sweep. Harbor calls this pool size 1
/// because the invalidation run is short and singleton (spec §4.6).
pub struct CacheClient {
    client: redis::Client,
}

impl CacheClient {
    pub fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Deletes every key matching `pattern` (a Redis glob, e.g. `blobs::*`).
    /// Uses `SCAN` rather than `KEYS` so a large keyspace doesn't block the
    /// registry's own cache for the duration of the invalidation.
    pub async fn del_keys(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let mut deleted = 0u64;
        let mut cursor: u64 = 0;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                debug!(pattern, count = keys.len(), "deleting cache keys batch");
                let removed: u64 = conn.del(&keys).await?;
                deleted += removed;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        info!(pattern, deleted, "cache keys invalidated");
        Ok(deleted)
    }
}
