use crate::db::error::DatabaseError;
use crate::models::{Blob, BlobStatus};
use sqlx::PgPool;
use time::OffsetDateTime;

/// Query parameters for [`BlobRepository::list`], modeled on the Go
/// `q.Query`/`q.Range` used to page through a project's blobs.
#[derive(Debug, Clone)]
pub struct BlobListQuery {
    pub project_id: i64,
    /// Only blobs last updated strictly before this instant.
    pub updated_before: OffsetDateTime,
    /// Seek-pagination cursor: only ids strictly greater than this one.
    pub id_after: i64,
    pub page_size: i64,
}

pub struct BlobRepository {
    pool: PgPool,
}

impl BlobRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Conditionally transitions a blob's status, the single mechanism that
    /// keeps GC from racing a concurrent push/pull: the `WHERE status = $3`
    /// clause makes this a no-op (0 rows affected) if anything else already
    /// moved the blob off the expected state.
    pub async fn update_status(
        &self,
        id: i64,
        from: BlobStatus,
        to: BlobStatus,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            r#"
            UPDATE blob
            SET status = $1, update_time = now()
            WHERE id = $2 AND status = $3
            "#,
        )
        .bind(to)
        .bind(id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Pages through the blobs associated with a project, ordered by id,
    /// seek-paginated via `query.id_after`. Used by the untagged-association
    /// cleanup sweep (spec §4.3).
    pub async fn list_for_project(
        &self,
        query: &BlobListQuery,
    ) -> Result<Vec<Blob>, DatabaseError> {
        let blobs = sqlx::query_as::<_, Blob>(
            r#"
            SELECT b.id, b.digest, b.media_type, b.size, b.content_kind, b.status, b.update_time
            FROM blob b
            JOIN project_blob pb ON pb.blob_id = b.id
            WHERE pb.project_id = $1
              AND b.update_time < $2
              AND b.id > $3
            ORDER BY b.id ASC
            LIMIT $4
            "#,
        )
        .bind(query.project_id)
        .bind(query.updated_before)
        .bind(query.id_after)
        .bind(query.page_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(blobs)
    }

    /// Blobs with zero remaining references, last touched outside the
    /// safety window. The window defends against a push that inserted a
    /// blob but hasn't yet inserted its reference row.
    pub async fn useless_blobs(&self, time_window_hours: i64) -> Result<Vec<Blob>, DatabaseError> {
        let blobs = sqlx::query_as::<_, Blob>(
            r#"
            SELECT b.id, b.digest, b.media_type, b.size, b.content_kind, b.status, b.update_time
            FROM blob b
            WHERE b.status = 'none'
              AND b.update_time < now() - make_interval(hours => $1)
              AND NOT EXISTS (
                  SELECT 1 FROM project_blob pb WHERE pb.blob_id = b.id
              )
            ORDER BY b.id ASC
            "#,
        )
        .bind(time_window_hours as f64)
        .fetch_all(&self.pool)
        .await?;

        Ok(blobs)
    }

    /// Among `candidates`, returns the ones no longer reachable from any
    /// artifact of `project_id`. Read-only variant used by dry-run; the
    /// mutating counterpart is [`Self::cleanup_associations_for_project`].
    pub async fn find_blobs_unassociated_with_project(
        &self,
        project_id: i64,
        candidates: &[Blob],
    ) -> Result<Vec<Blob>, DatabaseError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = candidates.iter().map(|b| b.id).collect();

        let blobs = sqlx::query_as::<_, Blob>(
            r#"
            SELECT b.id, b.digest, b.media_type, b.size, b.content_kind, b.status, b.update_time
            FROM blob b
            WHERE b.id = ANY($1)
              AND NOT EXISTS (
                  SELECT 1
                  FROM artifact_reference ar
                  JOIN artifact a ON a.id = ar.artifact_id
                  WHERE ar.blob_id = b.id AND a.project_id = $2
              )
            "#,
        )
        .bind(&ids)
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(blobs)
    }

    /// Removes the `project_blob` association rows for `candidates` that are
    /// no longer reachable from any artifact within `project_id`. Must run
    /// before [`Self::useless_blobs`], which joins through this table.
    pub async fn cleanup_associations_for_project(
        &self,
        project_id: i64,
        candidates: &[Blob],
    ) -> Result<u64, DatabaseError> {
        if candidates.is_empty() {
            return Ok(0);
        }
        let ids: Vec<i64> = candidates.iter().map(|b| b.id).collect();

        let result = sqlx::query(
            r#"
            DELETE FROM project_blob pb
            WHERE pb.project_id = $2
              AND pb.blob_id = ANY($1)
              AND NOT EXISTS (
                  SELECT 1
                  FROM artifact_reference ar
                  JOIN artifact a ON a.id = ar.artifact_id
                  WHERE ar.blob_id = pb.blob_id AND a.project_id = pb.project_id
              )
            "#,
        )
        .bind(&ids)
        .bind(project_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Blobs referenced by the manifest identified by `digest` — consulted
    /// only in dry-run mode, since the real run never deletes the untagged
    /// artifact's manifest row up front.
    pub async fn get_by_artifact_digest(&self, digest: &str) -> Result<Vec<Blob>, DatabaseError> {
        let blobs = sqlx::query_as::<_, Blob>(
            r#"
            SELECT DISTINCT b.id, b.digest, b.media_type, b.size, b.content_kind, b.status, b.update_time
            FROM blob b
            JOIN artifact_reference ar ON ar.blob_id = b.id
            JOIN artifact a ON a.id = ar.artifact_id
            WHERE a.digest = $1
            "#,
        )
        .bind(digest)
        .fetch_all(&self.pool)
        .await?;

        Ok(blobs)
    }

    pub async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM blob WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("blob id {id}")));
        }
        Ok(())
    }

    pub async fn ensure(
        &self,
        digest: &str,
        media_type: &str,
        size: i64,
    ) -> Result<i64, DatabaseError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO blob (digest, media_type, size, content_kind, status)
            VALUES ($1, $2, $3, 'regular_layer', 'none')
            ON CONFLICT (digest) DO UPDATE SET digest = EXCLUDED.digest
            RETURNING id
            "#,
        )
        .bind(digest)
        .bind(media_type)
        .bind(size)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    pub async fn associate_with_project(
        &self,
        blob_id: i64,
        project_id: i64,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            r#"
            INSERT INTO project_blob (project_id, blob_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(project_id)
        .bind(blob_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
