use crate::db::error::DatabaseError;
use crate::models::ArtifactTrash;
use sqlx::PgPool;

pub struct ArtifactTrashRepository {
    pool: PgPool,
}

impl ArtifactTrashRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Returns trash rows older than `time_window_hours`. GC calls this with
    /// a window of zero: a manifest candidate must have *all* of its
    /// references gone before it's eligible, so there is no race to defend
    /// against here the way there is for [`crate::db::repositories::BlobRepository::useless_blobs`].
    pub async fn filter(&self, time_window_hours: i64) -> Result<Vec<ArtifactTrash>, DatabaseError> {
        let rows = sqlx::query_as::<_, ArtifactTrash>(
            r#"
            SELECT id, repository_name, digest, manifest_media_type, media_type, creation_time
            FROM artifact_trash
            WHERE creation_time < now() - make_interval(hours => $1)
            ORDER BY id ASC
            "#,
        )
        .bind(time_window_hours as f64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Idempotent: a missing row is treated as success by the caller via
    /// [`DatabaseError::is_not_found`], not surfaced as an error here.
    pub async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        let result = sqlx::query("DELETE FROM artifact_trash WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("artifact_trash id {id}")));
        }
        Ok(())
    }
}
