use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderValue, Request};
use axum::response::Response;
use beam_axum::{beam, BeamApp, MultipartConfig};
use beam_blob::MemoryBlobStore;
use beam_core::{BeamConfig, BeamEngine, ManualClock, MemoryRecordStore, RecordStore};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "XbeamX";

struct TestApp {
    app: BeamApp,
    records: MemoryRecordStore,
    blobs: MemoryBlobStore,
    clock: ManualClock,
    _spool: tempfile::TempDir,
}

fn test_app() -> TestApp {
    let records = MemoryRecordStore::new();
    let blobs = MemoryBlobStore::new();
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap());
    let spool = tempfile::tempdir().unwrap();

    let engine = BeamEngine::new(
        Arc::new(records.clone()),
        Arc::new(blobs.clone()),
        BeamConfig::default(),
    )
    .with_clock(Arc::new(clock.clone()));
    let app = beam(engine, MultipartConfig::new().spool_dir(spool.path()));

    TestApp {
        app,
        records,
        blobs,
        clock,
        _spool: spool,
    }
}

fn upload_request(file: Option<(&str, &str)>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut body = String::new();
    if let Some((filename, contents)) = file {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"document\"; filename=\"{filename}\"\r\nContent-Type: text/plain\r\n\r\n{contents}\r\n"
        ));
    }
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: &BeamApp, req: Request<Body>) -> Response {
    app.router().oneshot(req).await.unwrap()
}

async fn json_body(res: Response) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(res: Response) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn upload_code(app: &BeamApp, fields: &[(&str, &str)]) -> String {
    let res = send(app, upload_request(Some(("foo.txt", "hello")), fields)).await;
    assert_eq!(res.status().as_u16(), 200);
    json_body(res).await["code"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn upload_meta_and_download_round_trip() {
    let t = test_app();

    let res = send(
        &t.app,
        upload_request(Some(("foo.txt", "hello")), &[("expire_in", "10m"), ("burn_after", "false")]),
    )
    .await;
    assert_eq!(res.status().as_u16(), 200);
    let body = json_body(res).await;
    let code = body["code"].as_str().unwrap().to_string();
    assert_eq!(code.len(), 4);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(body["expires"], "10m0s");

    let res = send(&t.app, get(&format!("/api/meta/{code}"))).await;
    assert_eq!(res.status().as_u16(), 200);
    let meta = json_body(res).await;
    assert_eq!(meta["name"], "foo.txt");
    assert_eq!(meta["size"], 5);
    assert_eq!(meta["type"], "text/plain");
    assert_eq!(meta["burn_after"], false);
    assert!(meta["uploaded_at"].as_str().unwrap().starts_with("2024-06-01T08:00:00"));

    let res = send(&t.app, get(&format!("/api/download/{code}"))).await;
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(
        res.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"foo.txt\""
    );
    assert_eq!(res.headers().get("content-length").unwrap(), "5");
    assert_eq!(res.headers().get("content-type").unwrap(), "text/plain");
    assert_eq!(text_body(res).await, "hello");
}

#[tokio::test]
async fn default_expiry_is_one_hour() {
    let t = test_app();

    let res = send(&t.app, upload_request(Some(("foo.txt", "hello")), &[("expire_in", "7d")])).await;
    assert_eq!(json_body(res).await["expires"], "1h0m0s");

    let res = send(&t.app, upload_request(Some(("foo.txt", "hello")), &[("expire_in", "24h")])).await;
    assert_eq!(json_body(res).await["expires"], "24h0m0s");
}

#[tokio::test]
async fn upload_without_file_is_bad_request() {
    let t = test_app();

    let res = send(&t.app, upload_request(None, &[("burn_after", "true")])).await;

    assert_eq!(res.status().as_u16(), 400);
    let body = json_body(res).await;
    assert_eq!(body["name"], "BadRequest");
    assert_eq!(body["className"], "bad-request");
    assert_eq!(body["code"], 400);
    assert_eq!(body["error"], "No file received");
    assert!(t.blobs.is_empty());
    assert_eq!(t.records.len().await.unwrap(), 0);
}

#[tokio::test]
async fn record_store_failure_is_a_server_error_without_orphans() {
    let t = test_app();
    t.records.fail_inserts(true);

    let res = send(&t.app, upload_request(Some(("foo.txt", "hello")), &[])).await;

    assert_eq!(res.status().as_u16(), 500);
    let body = json_body(res).await;
    assert_eq!(body["name"], "GeneralError");
    assert_eq!(body["error"], "Database error");
    assert!(t.blobs.is_empty());
}

#[tokio::test]
async fn unknown_code_is_not_found() {
    let t = test_app();

    let res = send(&t.app, get("/api/meta/0000")).await;
    assert_eq!(res.status().as_u16(), 404);
    let body = json_body(res).await;
    assert_eq!(body["className"], "not-found");
    assert_eq!(body["error"], "Invalid or expired code");

    let res = send(&t.app, get("/api/download/0000")).await;
    assert_eq!(res.status().as_u16(), 404);
}

#[tokio::test]
async fn expired_and_swept_codes_are_not_found() {
    let t = test_app();
    let code = upload_code(&t.app, &[("expire_in", "10m")]).await;

    t.clock.advance(chrono::Duration::minutes(11));
    let report = t.app.state.engine.sweeper().sweep_once().await.unwrap();
    assert_eq!(report.purged, 1);

    assert_eq!(send(&t.app, get(&format!("/api/meta/{code}"))).await.status().as_u16(), 404);
    assert_eq!(send(&t.app, get(&format!("/api/download/{code}"))).await.status().as_u16(), 404);
}

#[tokio::test]
async fn blob_removed_out_of_band_heals_on_download() {
    let t = test_app();
    let code = upload_code(&t.app, &[]).await;
    let key = t.blobs.keys().remove(0);
    t.blobs.remove_out_of_band(&key);

    let res = send(&t.app, get(&format!("/api/download/{code}"))).await;

    assert_eq!(res.status().as_u16(), 404);
    assert_eq!(t.records.len().await.unwrap(), 0);
}

#[tokio::test(start_paused = true)]
async fn burn_after_read_file_vanishes_after_grace_window() {
    let t = test_app();
    let code = upload_code(&t.app, &[("burn_after", "true")]).await;

    let meta = json_body(send(&t.app, get(&format!("/api/meta/{code}"))).await).await;
    assert_eq!(meta["burn_after"], true);

    let res = send(&t.app, get(&format!("/api/download/{code}"))).await;
    assert_eq!(text_body(res).await, "hello");

    tokio::time::sleep(Duration::from_secs(5)).await;
    let res = send(&t.app, get(&format!("/api/meta/{code}"))).await;
    assert_eq!(res.status().as_u16(), 200);

    tokio::time::sleep(Duration::from_secs(6)).await;
    let res = send(&t.app, get(&format!("/api/download/{code}"))).await;
    assert_eq!(res.status().as_u16(), 404);
    assert!(t.blobs.is_empty());
}

#[tokio::test(start_paused = true)]
async fn simultaneous_burn_downloads_both_succeed() {
    let t = test_app();
    let code = upload_code(&t.app, &[("burn_after", "true")]).await;

    let (a, b) = tokio::join!(
        send(&t.app, get(&format!("/api/download/{code}"))),
        send(&t.app, get(&format!("/api/download/{code}"))),
    );
    let (a, b) = tokio::join!(text_body(a), text_body(b));
    assert_eq!(a, "hello");
    assert_eq!(b, "hello");
    assert_eq!(t.app.state.engine.burns().pending().len(), 1);

    tokio::time::sleep(Duration::from_secs(11)).await;
    assert_eq!(t.records.len().await.unwrap(), 0);
    assert!(t.blobs.is_empty());
}

#[tokio::test]
async fn request_id_is_set_and_preserved() {
    let t = test_app();

    let res = send(&t.app, get("/health")).await;
    assert!(res.headers().get("x-request-id").is_some());
    assert_eq!(text_body(res).await, "ok");

    let provided = HeaderValue::from_static("req-test-123");
    let res = send(
        &t.app,
        Request::builder()
            .uri("/health")
            .header("x-request-id", provided.clone())
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(res.headers().get("x-request-id").unwrap(), &provided);
}

#[tokio::test]
async fn unmatched_paths_fall_back_to_static_assets() {
    let t = test_app();
    let public = tempfile::tempdir().unwrap();
    std::fs::write(public.path().join("index.html"), "<h1>beam</h1>").unwrap();
    let app = t.app.with_static_dir(public.path());

    let res = send(&app, get("/index.html")).await;
    assert_eq!(res.status().as_u16(), 200);
    assert_eq!(text_body(res).await, "<h1>beam</h1>");
}

#[tokio::test]
async fn cors_is_permissive() {
    let t = test_app();

    let res = send(
        &t.app,
        Request::builder()
            .uri("/health")
            .header("origin", "https://example.com")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(res.headers().get("access-control-allow-origin").unwrap(), "*");
}
