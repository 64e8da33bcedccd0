use super::Collector;
use crate::error::GcError;
use futures::StreamExt;
use shared::db::repositories::BlobListQuery;
use shared::models::{ArtifactTrash, Blob};
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};
use tracing::warn;

/// Trash rows grouped by manifest digest, so sweep can find every
/// (repository, digest) pair a manifest needs disassembled from in one
/// lookup.
pub type TrashIndex = HashMap<String, Vec<ArtifactTrash>>;

const PROJECT_PAGE_SIZE: i64 = 1000;
const BLOB_PAGE_SIZE: i64 = 1000;

/// Source 1 + 2 of candidate discovery: artifacts already in the trash
/// table from a previous run, plus untagged artifacts harvested now. Real
/// runs move untagged artifacts into `artifact_trash` immediately; dry runs
/// leave the database untouched and synthesize the rows in memory instead.
pub async fn deleted_artifact_trash(collector: &Collector) -> Result<TrashIndex, GcError> {
    let untagged = if collector.params.delete_untagged {
        collector.artifact_repo.list_untagged().await?
    } else {
        Vec::new()
    };

    if !collector.params.dry_run {
        for artifact in &untagged {
            if let Err(err) = collector.artifact_repo.delete(artifact.id).await {
                if err.is_not_found() {
                    continue;
                }
                warn!(artifact_id = artifact.id, error = %err, "failed to trash untagged artifact, skipping");
            }
        }
    }

    // Dry-run returns *only* the synthesized rows below: there's nothing
    // really in `artifact_trash` to report yet, since the untagged-artifact
    // delete above never happened.
    let mut rows = if collector.params.dry_run {
        Vec::new()
    } else {
        collector.artifact_trash_repo.filter(0).await?
    };

    if collector.params.dry_run {
        let now = OffsetDateTime::now_utc();
        rows.extend(untagged.into_iter().map(|a| ArtifactTrash {
            id: 0,
            repository_name: a.repository_name,
            digest: a.digest,
            manifest_media_type: a.manifest_media_type,
            media_type: a.media_type,
            creation_time: now,
        }));
    }

    let mut index: TrashIndex = HashMap::new();
    for row in rows {
        index.entry(row.digest.clone()).or_default().push(row);
    }
    Ok(index)
}

/// Source 3: blobs with zero project associations, idle past the safety
/// window, plus (dry-run only) the blobs referenced by the manifests just
/// harvested above, since a real run would have already severed those
/// references via the artifact delete's cascade.
pub async fn useless_blobs(collector: &Collector, trash_index: &TrashIndex) -> Result<Vec<Blob>, GcError> {
    let mut blobs = collector.blob_repo.useless_blobs(collector.params.time_window).await?;

    if collector.params.dry_run {
        for digest in trash_index.keys() {
            let referenced = collector.blob_repo.get_by_artifact_digest(digest).await?;
            blobs.extend(referenced);
        }
    }

    Ok(blobs)
}

/// Source 4: per-project sweep over `project_blob`, dropping associations
/// that no longer have a matching `artifact_reference` row. A project that
/// errors out is logged and skipped — the rest of the run proceeds, and the
/// project's association backlog is picked up again next run (spec's
/// continue-on-error decision for this phase).
pub async fn cleanup_untagged_associations(collector: &Collector) -> Vec<Blob> {
    let mut orphans = Vec::new();
    let cutoff = OffsetDateTime::now_utc() - Duration::hours(collector.params.time_window);

    let mut projects = Box::pin(collector.project_repo.list_all(PROJECT_PAGE_SIZE));
    while let Some(project) = projects.next().await {
        let project = match project {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, "failed to list a project page, stopping association cleanup scan");
                break;
            }
        };

        let mut id_after = 0i64;
        loop {
            let query = BlobListQuery {
                project_id: project.id,
                updated_before: cutoff,
                id_after,
                page_size: BLOB_PAGE_SIZE,
            };

            let page = match collector.blob_repo.list_for_project(&query).await {
                Ok(page) => page,
                Err(err) => {
                    warn!(project_id = project.id, error = %err, "failed to page blobs for project, skipping project");
                    break;
                }
            };

            if page.is_empty() {
                break;
            }
            id_after = page.last().map(|b| b.id).unwrap_or(id_after);
            let short_page = page.len() < BLOB_PAGE_SIZE as usize;

            if collector.params.dry_run {
                match collector
                    .blob_repo
                    .find_blobs_unassociated_with_project(project.id, &page)
                    .await
                {
                    Ok(found) => orphans.extend(found),
                    Err(err) => {
                        warn!(project_id = project.id, error = %err, "failed to check orphan associations, skipping project");
                        break;
                    }
                }
            } else if let Err(err) = collector
                .blob_repo
                .cleanup_associations_for_project(project.id, &page)
                .await
            {
                warn!(project_id = project.id, error = %err, "failed to clean up associations, skipping project");
                break;
            }

            if short_page {
                break;
            }
        }
    }

    orphans
}
