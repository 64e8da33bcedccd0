use crate::error::GcError;
use shared::db::repositories::BlobRepository;
use shared::models::{Blob, BlobStatus};
use std::collections::HashSet;
use tracing::warn;

#[derive(Debug, Default)]
pub struct MarkResult {
    pub delete_set: Vec<Blob>,
    pub blob_count: u64,
    pub manifest_count: u64,
    pub estimated_free_bytes: i64,
}

/// Attempts to move every discovered candidate from `none` to `delete`.
/// A candidate that's already moved off `none` (a concurrent push resurrected
/// it, or a previous run already claimed it) is dropped silently — mark never
/// treats that as an error, only as "not mine to collect this run".
pub async fn mark(blob_repo: &BlobRepository, candidates: Vec<Blob>, dry_run: bool) -> Result<MarkResult, GcError> {
    let mut result = MarkResult::default();
    // The same blob can surface from more than one discovery source in a
    // single run (e.g. orphaned via two different projects' association
    // cleanup). The conditional status update naturally collapses a
    // non-dry-run duplicate via `affected == 0`, but dry-run never calls it,
    // so a duplicate must be filtered here instead of double-counted.
    let mut seen = HashSet::new();

    for blob in candidates {
        if !seen.insert(blob.id) {
            continue;
        }

        if !dry_run {
            let affected = blob_repo.update_status(blob.id, BlobStatus::None, BlobStatus::Delete).await?;
            if affected == 0 {
                warn!(blob_id = blob.id, digest = %blob.digest, "blob no longer in 'none' state, skipping");
                continue;
            }
        }

        if blob.is_manifest() {
            result.manifest_count += 1;
        } else {
            result.blob_count += 1;
        }
        if !blob.is_foreign_layer() {
            result.estimated_free_bytes += blob.size;
        }

        result.delete_set.push(blob);
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::BlobContentKind;
    use time::OffsetDateTime;

    fn blob(id: i64, kind: BlobContentKind, size: i64) -> Blob {
        Blob {
            id,
            digest: format!("sha256:{id}"),
            media_type: "application/octet-stream".into(),
            size,
            content_kind: kind,
            status: BlobStatus::None,
            update_time: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn foreign_layers_are_excluded_from_the_free_byte_estimate() {
        let manifest = blob(1, BlobContentKind::Manifest, 100);
        let foreign = blob(2, BlobContentKind::ForeignLayer, 500);
        let regular = blob(3, BlobContentKind::RegularLayer, 50);

        let mut estimate = 0i64;
        for b in [&manifest, &foreign, &regular] {
            if !b.is_foreign_layer() {
                estimate += b.size;
            }
        }
        assert_eq!(estimate, 150);
    }

    /// A blob surfaced by two discovery sources in the same run (orphaned via
    /// two different projects' association cleanup, say) must be counted and
    /// claimed only once — dry-run never calls the conditional update that
    /// would otherwise collapse the duplicate on its own.
    #[tokio::test]
    async fn a_candidate_duplicated_across_discovery_sources_is_counted_once_in_dry_run() {
        let env = shared::test_environment::TestEnvironment::new().await.unwrap();
        let repo = BlobRepository::new(env.db_pool.pool());

        let id = repo.ensure("sha256:dup", "application/octet-stream", 10).await.unwrap();
        let candidate = blob(id, BlobContentKind::RegularLayer, 10);

        let result = mark(&repo, vec![candidate.clone(), candidate], true).await.unwrap();

        assert_eq!(result.blob_count, 1);
        assert_eq!(result.estimated_free_bytes, 10);
        assert_eq!(result.delete_set.len(), 1);
    }

    /// A blob that raced out of `none` between discovery and mark (a
    /// concurrent push resurrected it) is dropped from the delete set, not
    /// reported as an error.
    #[tokio::test]
    async fn drops_a_candidate_that_raced_out_of_none_before_mark_claimed_it() {
        let env = shared::test_environment::TestEnvironment::new().await.unwrap();
        let repo = BlobRepository::new(env.db_pool.pool());

        let id = repo.ensure("sha256:raced", "application/octet-stream", 10).await.unwrap();
        // Simulate the race: something else already moved this blob to `deleting`.
        repo.update_status(id, BlobStatus::None, BlobStatus::Deleting).await.unwrap();

        let candidate = blob(id, BlobContentKind::RegularLayer, 10);
        let result = mark(&repo, vec![candidate], false).await.unwrap();

        assert_eq!(result.blob_count, 0);
        assert!(result.delete_set.is_empty());
    }
}
