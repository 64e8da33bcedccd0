use crate::db::error::DatabaseError;
use crate::models::Artifact;
use sqlx::PgPool;

/// Stands in for Harbor's artifact controller: `list_untagged`/`delete` are
/// the only two operations GC's candidate discovery needs (spec §6).
pub struct ArtifactRepository {
    pool: PgPool,
}

impl ArtifactRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Artifacts with an empty tag set.
    pub async fn list_untagged(&self) -> Result<Vec<Artifact>, DatabaseError> {
        let artifacts = sqlx::query_as::<_, Artifact>(
            r#"
            SELECT a.id, a.project_id, a.repository_name, a.digest,
                   a.manifest_media_type, a.media_type,
                   COALESCE(
                       array_agg(t.name) FILTER (WHERE t.name IS NOT NULL),
                       ARRAY[]::text[]
                   ) AS tags
            FROM artifact a
            LEFT JOIN tag t ON t.artifact_id = a.id
            GROUP BY a.id
            HAVING COUNT(t.id) = 0
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(artifacts)
    }

    /// Deletes the artifact and moves it into `artifact_trash`, in a single
    /// transaction so a crash can never lose the (repository, digest) pair
    /// that sweep needs later to issue the v2 manifest DELETE.
    pub async fn delete(&self, id: i64) -> Result<(), DatabaseError> {
        let mut tx = self.pool.begin().await?;

        let artifact = sqlx::query_as::<_, Artifact>(
            r#"
            SELECT id, project_id, repository_name, digest, manifest_media_type, media_type,
                   ARRAY[]::text[] AS tags
            FROM artifact
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DatabaseError::NotFound(format!("artifact id {id}")))?;

        sqlx::query(
            r#"
            INSERT INTO artifact_trash (repository_name, digest, manifest_media_type, media_type, creation_time)
            VALUES ($1, $2, $3, $4, now())
            "#,
        )
        .bind(&artifact.repository_name)
        .bind(&artifact.digest)
        .bind(&artifact.manifest_media_type)
        .bind(&artifact.media_type)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM artifact WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
