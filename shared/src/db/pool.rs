use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Thin wrapper around a `sqlx::PgPool`, matching the indexer/connector-manager
/// convention of passing a `DatabasePool` through `AppState` rather than a
/// bare pool.
#[derive(Clone)]
pub struct DatabasePool {
    pool: PgPool,
}

impl DatabasePool {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
