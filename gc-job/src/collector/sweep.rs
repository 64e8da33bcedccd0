use super::{Collector, TrashIndex};
use crate::error::GcError;
use futures::future::join_all;
use shared::models::{ArtifactTrash, Blob, BlobStatus};
use shared::registry::ignore_not_found;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::warn;

pub struct SweepResult {
    pub blob_count: u64,
    pub manifest_count: u64,
    pub freed_bytes: i64,
}

/// First-fatal-error-wins slot shared across every sweep worker. Per-blob
/// failures never touch this; only a DB outage (a failed claim, a failed
/// trash-row delete, a failed blob-row delete) sets it, and every worker
/// checks it before starting new work so the run winds down rather than
/// piling up further errors against a store that's already unreachable.
struct FatalSlot(Mutex<Option<String>>);

impl FatalSlot {
    fn new() -> Self {
        Self(Mutex::new(None))
    }

    fn set(&self, message: impl Into<String>) {
        let mut guard = self.0.lock().unwrap();
        if guard.is_none() {
            *guard = Some(message.into());
        }
    }

    fn is_set(&self) -> bool {
        self.0.lock().unwrap().is_some()
    }

    fn into_message(self) -> Option<String> {
        self.0.into_inner().unwrap()
    }
}

enum ManifestOutcome {
    Done,
    Skip,
}

/// Deletes every blob in `delete_set`, bounded to `collector.sweep_concurrency`
/// concurrent workers at a time. Each batch is joined before the next one
/// starts — this is not a continuously-fed pipeline, matching the Go
/// source's goroutine-batch-of-5 shape.
pub async fn sweep(collector: &Collector, delete_set: Vec<Blob>, trash_index: &TrashIndex) -> Result<SweepResult, GcError> {
    let fatal = FatalSlot::new();
    let blob_count = AtomicU64::new(0);
    let manifest_count = AtomicU64::new(0);
    let freed_bytes = AtomicI64::new(0);

    for chunk in delete_set.chunks(collector.sweep_concurrency.max(1)) {
        if fatal.is_set() {
            break;
        }
        let tasks = chunk
            .iter()
            .map(|blob| sweep_one(collector, blob, trash_index, &fatal, &blob_count, &manifest_count, &freed_bytes));
        join_all(tasks).await;
    }

    if let Some(message) = fatal.into_message() {
        return Err(GcError::Sweep(message));
    }

    Ok(SweepResult {
        blob_count: blob_count.load(Ordering::Relaxed),
        manifest_count: manifest_count.load(Ordering::Relaxed),
        freed_bytes: freed_bytes.load(Ordering::Relaxed),
    })
}

#[allow(clippy::too_many_arguments)]
async fn sweep_one(
    collector: &Collector,
    blob: &Blob,
    trash_index: &TrashIndex,
    fatal: &FatalSlot,
    blob_count: &AtomicU64,
    manifest_count: &AtomicU64,
    freed_bytes: &AtomicI64,
) {
    if fatal.is_set() {
        return;
    }

    let claimed = match collector.blob_repo.update_status(blob.id, BlobStatus::Delete, BlobStatus::Deleting).await {
        Ok(rows) => rows,
        Err(err) => {
            fatal.set(format!("failed to claim blob {}: {err}", blob.id));
            return;
        }
    };
    if claimed == 0 {
        warn!(blob_id = blob.id, digest = %blob.digest, "blob left 'delete' state before sweep claimed it, skipping");
        return;
    }

    // skipped is local to this blob's own task: whether a sibling blob's
    // manifest disassembly was skipped has no bearing on this one.
    let mut skipped = false;

    if blob.is_manifest() {
        if let Some(rows) = trash_index.get(&blob.digest) {
            skipped = disassemble_manifest(collector, blob, rows, fatal).await;
        }
    }

    if skipped || fatal.is_set() {
        return;
    }

    if !blob.is_foreign_layer() {
        let result = collector.retry.retry(|| collector.registry_control.delete_blob(&blob.digest)).await;
        if let Err(err) = ignore_not_found(result) {
            if let Err(mark_err) = mark_delete_failed(collector, blob.id).await {
                fatal.set(format!(
                    "blob {} failed to delete from storage ({err}) and could not be marked delete_failed: {mark_err}",
                    blob.id
                ));
            }
            return;
        }
    }

    match collector.blob_repo.delete(blob.id).await {
        Ok(()) => {}
        Err(err) if err.is_not_found() => {}
        Err(err) => {
            if let Err(mark_err) = mark_delete_failed(collector, blob.id).await {
                fatal.set(format!(
                    "blob {} failed to delete its row ({err}) and could not be marked delete_failed: {mark_err}",
                    blob.id
                ));
            } else {
                fatal.set(format!("failed to delete blob row {}: {err}", blob.id));
            }
            return;
        }
    }

    if blob.is_manifest() {
        manifest_count.fetch_add(1, Ordering::Relaxed);
    } else {
        blob_count.fetch_add(1, Ordering::Relaxed);
    }
    if !blob.is_foreign_layer() {
        freed_bytes.fetch_add(blob.size, Ordering::Relaxed);
    }
}

/// Removes the manifest's tags and revisions from every repository it was
/// trashed from. Returns `true` if any repository had to be skipped (in
/// which case the manifest blob itself must not be deleted this run — its
/// trash rows are still there for next time).
async fn disassemble_manifest(collector: &Collector, blob: &Blob, rows: &[ArtifactTrash], fatal: &FatalSlot) -> bool {
    let mut skipped = false;

    for chunk in rows.chunks(collector.sweep_concurrency.max(1)) {
        if fatal.is_set() {
            return true;
        }

        let outcomes = join_all(chunk.iter().map(|row| disassemble_one(collector, blob, row, fatal))).await;
        if outcomes.iter().any(|o| matches!(o, ManifestOutcome::Skip)) {
            skipped = true;
        }
    }

    skipped || fatal.is_set()
}

async fn disassemble_one(collector: &Collector, blob: &Blob, row: &ArtifactTrash, fatal: &FatalSlot) -> ManifestOutcome {
    if fatal.is_set() {
        return ManifestOutcome::Skip;
    }

    let v2_result = collector.registry_v2.delete_manifest(&row.repository_name, &row.digest).await;
    if let Err(err) = ignore_not_found(v2_result) {
        warn!(repository = %row.repository_name, digest = %row.digest, error = %err, "failed to remove manifest tags, will retry next run");
        if let Err(mark_err) = mark_delete_failed(collector, blob.id).await {
            fatal.set(format!("blob {} could not be marked delete_failed after v2 delete error: {mark_err}", blob.id));
        }
        return ManifestOutcome::Skip;
    }

    let control_result = collector
        .retry
        .retry(|| collector.registry_control.delete_manifest(&row.repository_name, &row.digest))
        .await;
    if let Err(err) = ignore_not_found(control_result) {
        warn!(repository = %row.repository_name, digest = %row.digest, error = %err, "failed to remove manifest revisions from storage, will retry next run");
        if let Err(mark_err) = mark_delete_failed(collector, blob.id).await {
            fatal.set(format!("blob {} could not be marked delete_failed after storage delete error: {mark_err}", blob.id));
        }
        return ManifestOutcome::Skip;
    }

    if row.id != 0 {
        match collector.artifact_trash_repo.delete(row.id).await {
            Ok(()) => {}
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                fatal.set(format!("failed to delete artifact_trash row {}: {err}", row.id));
                return ManifestOutcome::Skip;
            }
        }
    }

    ManifestOutcome::Done
}

async fn mark_delete_failed(collector: &Collector, blob_id: i64) -> Result<(), shared::db::error::DatabaseError> {
    collector.blob_repo.update_status(blob_id, BlobStatus::Deleting, BlobStatus::DeleteFailed).await?;
    Ok(())
}
