use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use serverpacker::core::config::{Config, MirrorRule};
use serverpacker::core::downloader::{DownloadJob, Downloader};
use serverpacker::core::error::PackError;
use serverpacker::core::http::build_http_client;

const PAYLOAD: &[u8] = b"jar-bytes";

async fn spawn_app(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test server");
    });
    format!("http://{}", addr)
}

fn counting_route(hits: &Arc<AtomicUsize>, response: Result<&'static [u8], StatusCode>) -> axum::routing::MethodRouter {
    let hits = Arc::clone(hits);
    get(move || {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
            match response {
                Ok(body) => Ok(body.to_vec()),
                Err(status) => Err(status),
            }
        }
    })
}

/// Fast-retry configuration pointed at a test server; the mirror rule maps
/// `{base}/mirror/files/` onto `{base}/origin/files/`.
fn test_config(instance: PathBuf, base: &str, use_mirror: bool) -> Config {
    let mut config = Config::new(instance, use_mirror);
    config.download_retries = 3;
    config.backoff_base = Duration::from_millis(5);
    config.mirror_rules = vec![MirrorRule::new(
        format!("{base}/mirror/files/"),
        format!("{base}/origin/files/"),
    )];
    config
}

fn downloader(config: Config) -> Downloader {
    let client = build_http_client(&config).expect("client");
    Downloader::new(client, Arc::new(config))
}

#[tokio::test]
async fn batch_downloads_land_on_disk() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/mods/{name}", counting_route(&hits, Ok(PAYLOAD)));
    let base = spawn_app(app).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let dl = downloader(test_config(dir.path().to_path_buf(), &base, false));

    let jobs = vec![
        DownloadJob::new(format!("{base}/mods/a.jar"), dir.path().join("mods/a.jar")),
        DownloadJob::new(format!("{base}/mods/b.jar"), dir.path().join("mods/b.jar"))
            .with_size(PAYLOAD.len() as u64),
    ];
    let outcomes = dl.download_batch(jobs, "mods").await;

    assert_eq!(outcomes.len(), 2);
    for outcome in &outcomes {
        assert!(outcome.succeeded);
        assert_eq!(outcome.attempts_used, 1);
        assert_eq!(outcome.bytes_transferred, PAYLOAD.len() as u64);
        assert_eq!(std::fs::read(&outcome.job.dest).expect("dest"), PAYLOAD);
    }
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn existing_destinations_skip_the_network() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/mods/{name}", counting_route(&hits, Ok(PAYLOAD)));
    let base = spawn_app(app).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("a.jar");
    std::fs::write(&dest, b"already here").expect("seed");

    let dl = downloader(test_config(dir.path().to_path_buf(), &base, false));
    let outcomes = dl
        .download_batch(vec![DownloadJob::new(format!("{base}/mods/a.jar"), &dest)], "mods")
        .await;

    assert!(outcomes[0].was_skipped());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read(&dest).expect("dest"), b"already here");
}

#[tokio::test]
async fn permanent_failures_use_the_exact_retry_budget() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route(
        "/mods/{name}",
        counting_route(&hits, Err(StatusCode::NOT_FOUND)),
    );
    let base = spawn_app(app).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("gone.jar");
    let dl = downloader(test_config(dir.path().to_path_buf(), &base, false));

    let outcomes = dl
        .download_batch(vec![DownloadJob::new(format!("{base}/mods/gone.jar"), &dest)], "mods")
        .await;

    let outcome = &outcomes[0];
    assert!(!outcome.succeeded);
    assert_eq!(outcome.attempts_used, 3);
    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert!(matches!(
        outcome.last_error,
        Some(PackError::DownloadFailed { status: 404, .. })
    ));
    assert!(!dest.exists());
    assert!(!dir.path().join("gone.jar.part").exists());
}

#[tokio::test]
async fn mirror_failure_falls_back_to_origin_within_the_budget() {
    let mirror_hits = Arc::new(AtomicUsize::new(0));
    let origin_hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/mirror/files/{name}",
            counting_route(&mirror_hits, Err(StatusCode::NOT_FOUND)),
        )
        .route("/origin/files/{name}", counting_route(&origin_hits, Ok(PAYLOAD)));
    let base = spawn_app(app).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("a.jar");
    let dl = downloader(test_config(dir.path().to_path_buf(), &base, true));

    let outcomes = dl
        .download_batch(
            vec![DownloadJob::new(format!("{base}/mirror/files/a.jar"), &dest)],
            "mods",
        )
        .await;

    let outcome = &outcomes[0];
    assert!(outcome.succeeded);
    assert_eq!(outcome.attempts_used, 2);
    assert_eq!(outcome.final_url, format!("{base}/origin/files/a.jar"));
    assert_eq!(mirror_hits.load(Ordering::SeqCst), 1);
    assert_eq!(origin_hits.load(Ordering::SeqCst), 1);
    assert_eq!(std::fs::read(&dest).expect("dest"), PAYLOAD);
}

#[tokio::test]
async fn origin_failure_after_fallback_shares_the_budget() {
    let mirror_hits = Arc::new(AtomicUsize::new(0));
    let origin_hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            "/mirror/files/{name}",
            counting_route(&mirror_hits, Err(StatusCode::NOT_FOUND)),
        )
        .route(
            "/origin/files/{name}",
            counting_route(&origin_hits, Err(StatusCode::INTERNAL_SERVER_ERROR)),
        );
    let base = spawn_app(app).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let dl = downloader(test_config(dir.path().to_path_buf(), &base, true));

    let outcomes = dl
        .download_batch(
            vec![DownloadJob::new(
                format!("{base}/mirror/files/a.jar"),
                dir.path().join("a.jar"),
            )],
            "mods",
        )
        .await;

    // One mirror attempt plus origin retries, never a doubled budget.
    let outcome = &outcomes[0];
    assert!(!outcome.succeeded);
    assert_eq!(outcome.attempts_used, 3);
    assert_eq!(mirror_hits.load(Ordering::SeqCst), 1);
    assert_eq!(origin_hits.load(Ordering::SeqCst), 2);
    assert!(matches!(
        outcome.last_error,
        Some(PackError::DownloadFailed { status: 500, .. })
    ));
}

#[tokio::test]
async fn transport_failures_never_trigger_the_mirror_rewrite() {
    let origin_hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new().route("/origin/files/{name}", counting_route(&origin_hits, Ok(PAYLOAD)));
    let live_base = spawn_app(app).await;

    // Grab a port nothing listens on.
    let dead_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        drop(listener);
        port
    };
    let dead_base = format!("http://127.0.0.1:{dead_port}");

    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = test_config(dir.path().to_path_buf(), &live_base, true);
    config.mirror_rules = vec![MirrorRule::new(
        format!("{dead_base}/files/"),
        format!("{live_base}/origin/files/"),
    )];

    let url = format!("{dead_base}/files/a.jar");
    let outcomes = downloader(config)
        .download_batch(vec![DownloadJob::new(&url, dir.path().join("a.jar"))], "mods")
        .await;

    let outcome = &outcomes[0];
    assert!(!outcome.succeeded);
    assert_eq!(outcome.attempts_used, 3);
    assert_eq!(outcome.final_url, url);
    assert_eq!(origin_hits.load(Ordering::SeqCst), 0);
    assert!(matches!(outcome.last_error, Some(PackError::Http(_))));
}

#[tokio::test]
async fn sha1_verification_rejects_corrupt_bodies() {
    let app = Router::new().route(
        "/mods/{name}",
        get(|| async { PAYLOAD.to_vec() }),
    );
    let base = spawn_app(app).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let dl = downloader(test_config(dir.path().to_path_buf(), &base, false));

    // hex SHA-1 of "jar-bytes"
    let good = "04e2ebe8b7b182c63c2834f4984aae2901150df1";
    let jobs = vec![
        DownloadJob::new(format!("{base}/mods/good.jar"), dir.path().join("good.jar"))
            .with_sha1(good),
        DownloadJob::new(format!("{base}/mods/bad.jar"), dir.path().join("bad.jar"))
            .with_sha1("0000000000000000000000000000000000000000"),
    ];
    let outcomes = dl.download_batch(jobs, "mods").await;

    assert!(outcomes[0].succeeded);
    assert!(dir.path().join("good.jar").exists());

    assert!(!outcomes[1].succeeded);
    assert!(matches!(
        outcomes[1].last_error,
        Some(PackError::Sha1Mismatch { .. })
    ));
    assert!(!dir.path().join("bad.jar").exists());
    assert!(!dir.path().join("bad.jar.part").exists());
}

#[tokio::test]
async fn fetch_one_raises_and_never_retries() {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/ok/{name}", counting_route(&hits, Ok(PAYLOAD)))
        .route(
            "/missing/{name}",
            get(|| async { StatusCode::NOT_FOUND }),
        );
    let base = spawn_app(app).await;

    let dir = tempfile::tempdir().expect("tempdir");
    let dl = downloader(test_config(dir.path().to_path_buf(), &base, false));

    let err = dl
        .fetch_one(&format!("{base}/missing/installer.jar"), &dir.path().join("installer.jar"))
        .await
        .expect_err("must propagate");
    assert!(matches!(err, PackError::DownloadFailed { status: 404, .. }));
    assert!(!dir.path().join("installer.jar").exists());

    let dest = dir.path().join("fetched.jar");
    dl.fetch_one(&format!("{base}/ok/fetched.jar"), &dest)
        .await
        .expect("fetch");
    assert_eq!(std::fs::read(&dest).expect("dest"), PAYLOAD);

    // A second call is satisfied by the existing file.
    dl.fetch_one(&format!("{base}/ok/fetched.jar"), &dest)
        .await
        .expect("fetch again");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
