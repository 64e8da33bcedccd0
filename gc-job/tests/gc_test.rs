mod common;

use common::{blob_status, insert_artifact, insert_blob, insert_project, params, TestContext};
use registry_gc::Collector;
use std::sync::atomic::AtomicBool;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, ResponseTemplate};

async fn mount_healthy_registry(ctx: &TestContext) {
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ctx.control_mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/api/registry/.*/manifests/.*$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ctx.control_mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/api/blobs/.*$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ctx.control_mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/v2/.*/manifests/.*$"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ctx.v2_mock)
        .await;
}

/// S1: a fully unreferenced untagged artifact is swept end to end — its
/// manifest is disassembled from the registry, its trash row cleared, its
/// blob and manifest rows deleted, and the front-door cache invalidated.
#[tokio::test]
async fn sweeps_an_untagged_artifact_and_its_unreferenced_blob() {
    let ctx = TestContext::new().await.unwrap();
    mount_healthy_registry(&ctx).await;
    let pool = ctx.pool();

    let project_id = insert_project(pool, "library").await;
    let manifest_digest = "sha256:manifestdigest000000000000000000000000000000000000000000000";
    let layer_digest = "sha256:layerdigest0000000000000000000000000000000000000000000000000";

    let manifest_blob_id = insert_blob(pool, manifest_digest, "manifest", 200).await;
    let layer_blob_id = insert_blob(pool, layer_digest, "regular_layer", 1000).await;
    insert_artifact(pool, project_id, "library/app", manifest_digest).await;

    // S6: cache invalidation must follow a successful sweep.
    let redis_client = redis::Client::open(ctx.redis_url()).unwrap();
    let mut redis_conn = redis_client.get_multiplexed_async_connection().await.unwrap();
    let _: () = redis::cmd("SET")
        .arg(format!("blobs::{layer_digest}"))
        .arg("stale")
        .query_async(&mut redis_conn)
        .await
        .unwrap();

    let collector = Collector::new(&ctx.config(), params(ctx.redis_url(), |_| {}), &ctx.env.db_pool);
    let stop = AtomicBool::new(false);
    let summary = collector.run(&stop).await.unwrap();

    assert_eq!(summary.marked_manifests, 1);
    assert_eq!(summary.marked_blobs, 1);
    assert_eq!(summary.swept_manifests, 1);
    assert_eq!(summary.swept_blobs, 1);
    assert_eq!(summary.freed_bytes, 1200);

    assert!(blob_status(pool, manifest_blob_id).await.is_none());
    assert!(blob_status(pool, layer_blob_id).await.is_none());

    let exists: bool = redis::cmd("EXISTS")
        .arg(format!("blobs::{layer_digest}"))
        .query_async(&mut redis_conn)
        .await
        .unwrap();
    assert!(!exists, "stale cache key should have been invalidated after sweep");
}

/// S2: dry-run reports the same candidate set mark would otherwise act on,
/// but never mutates the database or calls the registry's delete endpoints.
#[tokio::test]
async fn dry_run_reports_candidates_without_mutating_anything() {
    let ctx = TestContext::new().await.unwrap();
    // No mocks mounted beyond what wiremock auto-404s: a dry run must never
    // call the registry at all beyond the init health check.
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ctx.control_mock)
        .await;
    let pool = ctx.pool();

    let project_id = insert_project(pool, "library").await;
    let manifest_digest = "sha256:dryrunmanifest00000000000000000000000000000000000000000000000";
    let manifest_blob_id = insert_blob(pool, manifest_digest, "manifest", 200).await;
    insert_artifact(pool, project_id, "library/app", manifest_digest).await;

    let collector = Collector::new(
        &ctx.config(),
        params(ctx.redis_url(), |p| p.dry_run = true),
        &ctx.env.db_pool,
    );
    let stop = AtomicBool::new(false);
    let summary = collector.run(&stop).await.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.marked_manifests, 1);
    assert_eq!(summary.swept_manifests, 0);

    assert_eq!(blob_status(pool, manifest_blob_id).await.as_deref(), Some("none"));
}

/// S4: the registry reporting 404 for a manifest or blob already gone is
/// treated as successful reclamation, not a failure.
#[tokio::test]
async fn not_found_from_the_registry_is_treated_as_success() {
    let ctx = TestContext::new().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ctx.control_mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/api/blobs/.*$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&ctx.control_mock)
        .await;

    let pool = ctx.pool();
    let digest = "sha256:alreadygoneblob00000000000000000000000000000000000000000000000";
    let blob_id = insert_blob(pool, digest, "regular_layer", 10).await;

    let collector = Collector::new(&ctx.config(), params(ctx.redis_url(), |_| {}), &ctx.env.db_pool);
    let stop = AtomicBool::new(false);
    let summary = collector.run(&stop).await.unwrap();

    assert_eq!(summary.swept_blobs, 1);
    assert!(blob_status(pool, blob_id).await.is_none());
}

/// S5: a persistent registry failure marks the blob `delete_failed` and the
/// run still completes successfully — a single blob's failure is never
/// fatal to the overall sweep.
#[tokio::test]
async fn a_persistently_failing_blob_delete_is_marked_delete_failed_without_aborting_the_run() {
    let ctx = TestContext::new().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ctx.control_mock)
        .await;
    Mock::given(method("DELETE"))
        .and(path_regex(r"^/api/blobs/.*$"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&ctx.control_mock)
        .await;

    let pool = ctx.pool();
    let digest = "sha256:stuckblob0000000000000000000000000000000000000000000000000000";
    let blob_id = insert_blob(pool, digest, "regular_layer", 10).await;

    let collector = Collector::new(&ctx.config(), params(ctx.redis_url(), |_| {}), &ctx.env.db_pool);
    let stop = AtomicBool::new(false);
    let summary = collector.run(&stop).await.unwrap();

    assert_eq!(summary.swept_blobs, 0);
    assert_eq!(blob_status(pool, blob_id).await.as_deref(), Some("delete_failed"));
}
