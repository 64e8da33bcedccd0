use anyhow::Result;
use registry_gc::{GcConfig, GcJobParams};
use shared::test_environment::TestEnvironment;
use sqlx::PgPool;
use std::time::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::redis::Redis;

pub struct TestContext {
    pub env: TestEnvironment,
    pub control_mock: wiremock::MockServer,
    pub v2_mock: wiremock::MockServer,
    redis_container: ContainerAsync<Redis>,
    redis_url: String,
}

impl TestContext {
    pub async fn new() -> Result<Self> {
        let env = TestEnvironment::new().await?;
        let control_mock = wiremock::MockServer::start().await;
        let v2_mock = wiremock::MockServer::start().await;

        let redis_container = Redis::default().start().await?;
        let redis_port = redis_container.get_host_port_ipv4(6379).await?;
        let redis_url = format!("redis://127.0.0.1:{redis_port}");

        Ok(Self {
            env,
            control_mock,
            v2_mock,
            redis_container,
            redis_url,
        })
    }

    pub fn pool(&self) -> &PgPool {
        self.env.db_pool.pool()
    }

    pub fn config(&self) -> GcConfig {
        GcConfig {
            database_url: String::new(),
            registry_control_url: self.control_mock.uri(),
            registry_v2_url: self.v2_mock.uri(),
            sweep_concurrency: 5,
            health_check_timeout: Duration::from_secs(5),
        }
    }

    pub fn redis_url(&self) -> &str {
        &self.redis_url
    }
}

pub fn params(redis_url: &str, overrides: impl FnOnce(&mut GcJobParams)) -> GcJobParams {
    let mut p = GcJobParams {
        redis_url_reg: redis_url.to_string(),
        delete_untagged: true,
        time_window: 0,
        dry_run: false,
    };
    overrides(&mut p);
    p
}

pub async fn insert_project(pool: &PgPool, name: &str) -> i64 {
    sqlx::query_scalar("INSERT INTO project (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn insert_blob(pool: &PgPool, digest: &str, content_kind: &str, size: i64) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO blob (digest, media_type, size, content_kind, status) \
         VALUES ($1, 'application/octet-stream', $2, $3, 'none') RETURNING id",
    )
    .bind(digest)
    .bind(size)
    .bind(content_kind)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn insert_artifact(
    pool: &PgPool,
    project_id: i64,
    repository_name: &str,
    digest: &str,
) -> i64 {
    sqlx::query_scalar(
        "INSERT INTO artifact (project_id, repository_name, digest, manifest_media_type, media_type) \
         VALUES ($1, $2, $3, 'application/vnd.oci.image.manifest.v1+json', 'application/vnd.oci.image.manifest.v1+json') \
         RETURNING id",
    )
    .bind(project_id)
    .bind(repository_name)
    .bind(digest)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn blob_status(pool: &PgPool, id: i64) -> Option<String> {
    sqlx::query_scalar("SELECT status FROM blob WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .unwrap()
}
