use crate::db::error::DatabaseError;
use crate::models::Project;
use futures::Stream;
use sqlx::PgPool;

pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    pub fn new(pool: &PgPool) -> Self {
        Self { pool: pool.clone() }
    }

    /// Streams every project, paged `page_size` at a time, mirroring the Go
    /// `project.ListAll` channel: callers consume until the stream ends.
    pub fn list_all(&self, page_size: i64) -> impl Stream<Item = Result<Project, DatabaseError>> + '_ {
        async_stream::try_stream! {
            let mut last_id = 0i64;
            loop {
                let page = sqlx::query_as::<_, Project>(
                    r#"
                    SELECT id, name
                    FROM project
                    WHERE id > $1
                    ORDER BY id ASC
                    LIMIT $2
                    "#,
                )
                .bind(last_id)
                .bind(page_size)
                .fetch_all(&self.pool)
                .await?;

                if page.is_empty() {
                    break;
                }

                last_id = page.last().map(|p| p.id).unwrap_or(last_id);
                let short_page = page.len() < page_size as usize;

                for project in page {
                    yield project;
                }

                if short_page {
                    break;
                }
            }
        }
    }
}
