use crate::error::GcError;
use shared::cache::CacheClient;
use tracing::info;

const BLOB_KEY_PATTERN: &str = "blobs::*";
const REPOSITORY_KEY_PATTERN: &str = "repository::*";

/// Invalidates the registry front door's cache after a successful,
/// non-dry-run sweep. Any failure here is fatal: a stale cache entry for a
/// blob or repository that sweep just deleted would otherwise serve a
/// pull that should 404.
pub async fn invalidate(redis_url: &str) -> Result<(), GcError> {
    let client = CacheClient::new(redis_url)?;

    let blobs_deleted = client.del_keys(BLOB_KEY_PATTERN).await?;
    let repos_deleted = client.del_keys(REPOSITORY_KEY_PATTERN).await?;

    info!(blobs_deleted, repos_deleted, "cache invalidated after sweep");
    Ok(())
}
