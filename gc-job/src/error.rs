use shared::cache::CacheError;
use shared::db::error::DatabaseError;
use thiserror::Error;

/// Top-level error surface for a GC run. Matches the taxonomy in spec §7:
/// only init failures, discovery failures, fatal sweep errors, and
/// cache-invalidation errors ever reach this type. Per-blob and
/// per-artifact failures are logged and swallowed inside the collector.
#[derive(Debug, Error)]
pub enum GcError {
    #[error("GC init failed: {0}")]
    Init(String),
    #[error("GC discovery failed: {0}")]
    Discovery(#[from] DatabaseError),
    #[error("GC sweep failed: {0}")]
    Sweep(String),
    #[error("GC cache invalidation failed: {0}")]
    CacheInvalidate(#[from] CacheError),
}
