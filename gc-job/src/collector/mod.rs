mod cache_invalidate;
mod discovery;
mod mark;
mod sweep;

pub use discovery::TrashIndex;

use crate::config::GcConfig;
use crate::error::GcError;
use crate::params::GcJobParams;
use shared::db::repositories::{ArtifactRepository, ArtifactTrashRepository, BlobRepository, ProjectRepository};
use shared::db::DatabasePool;
use shared::registry::{RegistryControlClient, RegistryV2Client};
use shared::retry::RetryPolicy;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, instrument};

/// Outcome of a single GC run, returned to whatever scheduler invoked the
/// binary and logged at `info` by `main`.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct GcSummary {
    pub dry_run: bool,
    pub marked_blobs: u64,
    pub marked_manifests: u64,
    pub swept_blobs: u64,
    pub swept_manifests: u64,
    pub freed_bytes: i64,
}

/// Orchestrates a single mark-and-sweep pass: discovery, mark, sweep, cache
/// invalidation. One `Collector` is constructed per run; it holds no state
/// across runs.
pub struct Collector {
    pub(crate) blob_repo: BlobRepository,
    pub(crate) artifact_repo: ArtifactRepository,
    pub(crate) artifact_trash_repo: ArtifactTrashRepository,
    pub(crate) project_repo: ProjectRepository,
    pub(crate) registry_control: RegistryControlClient,
    pub(crate) registry_v2: RegistryV2Client,
    pub(crate) retry: RetryPolicy,
    pub(crate) sweep_concurrency: usize,
    pub(crate) params: GcJobParams,
}

impl Collector {
    /// Harbor's job metadata for this job kind: it never runs concurrently
    /// with itself, a single failure is terminal for the run (no built-in
    /// job-framework retry — GC has its own, narrower retry policy for
    /// registry calls), and the scheduler must not silently re-enqueue it.
    pub const MAX_FAILS: u32 = 1;
    pub const MAX_CONCURRENCY: u32 = 1;
    pub const SHOULD_RETRY: bool = false;

    pub fn new(config: &GcConfig, params: GcJobParams, db_pool: &DatabasePool) -> Self {
        Self {
            blob_repo: BlobRepository::new(db_pool.pool()),
            artifact_repo: ArtifactRepository::new(db_pool.pool()),
            artifact_trash_repo: ArtifactTrashRepository::new(db_pool.pool()),
            project_repo: ProjectRepository::new(db_pool.pool()),
            registry_control: RegistryControlClient::with_health_check_timeout(
                &config.registry_control_url,
                config.health_check_timeout,
            ),
            registry_v2: RegistryV2Client::new(&config.registry_v2_url),
            retry: RetryPolicy::default(),
            sweep_concurrency: config.sweep_concurrency,
            params,
        }
    }

    /// Runs one full mark-and-sweep pass. `stop_signal` is checked once
    /// before mark begins, mirroring the Go job framework's `opCmd.IsStop()`
    /// check in `init()` — a job already mid-sweep is not interrupted.
    #[instrument(skip_all, fields(dry_run = self.params.dry_run))]
    pub async fn run(&self, stop_signal: &AtomicBool) -> Result<GcSummary, GcError> {
        self.init(stop_signal).await?;

        if stop_signal.load(Ordering::Relaxed) {
            info!("stop requested before mark began, exiting cleanly");
            return Ok(GcSummary {
                dry_run: self.params.dry_run,
                ..Default::default()
            });
        }

        let trash_index = discovery::deleted_artifact_trash(self).await?;

        // Association cleanup must run before the useless-blob scan: in a
        // real (non-dry) run it deletes the `project_blob` rows that
        // `useless_blobs` checks for; in dry-run it instead returns the
        // orphan blobs directly, since nothing was actually deleted.
        let mut candidates = discovery::cleanup_untagged_associations(self).await;
        candidates.extend(discovery::useless_blobs(self, &trash_index).await?);

        let marked = mark::mark(&self.blob_repo, candidates, self.params.dry_run).await?;
        info!(
            blobs = marked.blob_count,
            manifests = marked.manifest_count,
            estimated_free_mb = marked.estimated_free_bytes / 1024 / 1024,
            "mark phase complete"
        );

        if marked.delete_set.is_empty() {
            info!("no need to execute GC");
            return Ok(GcSummary {
                dry_run: self.params.dry_run,
                ..Default::default()
            });
        }

        let mut summary = GcSummary {
            dry_run: self.params.dry_run,
            marked_blobs: marked.blob_count,
            marked_manifests: marked.manifest_count,
            ..Default::default()
        };

        if self.params.dry_run {
            return Ok(summary);
        }

        let swept = sweep::sweep(self, marked.delete_set, &trash_index).await?;
        summary.swept_blobs = swept.blob_count;
        summary.swept_manifests = swept.manifest_count;
        summary.freed_bytes = swept.freed_bytes;

        cache_invalidate::invalidate(&self.params.redis_url_reg).await?;

        Ok(summary)
    }

    async fn init(&self, stop_signal: &AtomicBool) -> Result<(), GcError> {
        if stop_signal.load(Ordering::Relaxed) {
            return Ok(());
        }
        self.registry_control
            .health()
            .await
            .map_err(|e| GcError::Init(format!("registry control health check failed: {e}")))?;
        Ok(())
    }
}
