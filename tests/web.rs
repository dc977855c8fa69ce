// Upload surface over a real socket, synthetic-only dispatcher

use std::sync::Arc;

use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use serde_json::Value;
use tempfile::TempDir;

use field_patrol::config::AppConfig;
use field_patrol::detector::{Dispatcher, SyntheticGenerator};
use field_patrol::server::{router, AppState};

struct TestServer {
    base_url: String,
    config: AppConfig,
    _dir: TempDir,
}

async fn start(max_upload_bytes: usize) -> TestServer {
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig::default()
        .with_base_dir(dir.path())
        .with_max_upload_bytes(max_upload_bytes)
        .without_synthetic_latency();
    config.init_directories().unwrap();
    start_with(config, dir).await
}

async fn start_with(config: AppConfig, dir: TempDir) -> TestServer {

    let dispatcher = Dispatcher::synthetic_only(SyntheticGenerator::with_seed(7).without_latency());
    let state = Arc::new(AppState::new(config.clone(), dispatcher));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{}", addr),
        config,
        _dir: dir,
    }
}

fn image_part(name: &str, len: usize) -> Part {
    let mut data = vec![0xff, 0xd8, 0xff];
    data.resize(len.max(3), 0x42);
    Part::bytes(data).file_name(name.to_string())
}

async fn upload(server: &TestServer, form: Form) -> (StatusCode, Value) {
    let response = reqwest::Client::new()
        .post(format!("{}/api/detect", server.base_url))
        .multipart(form)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.json().await.unwrap())
}

#[tokio::test]
async fn test_detect_returns_synthetic_result_and_persists_it() {
    let server = start(16 * 1024 * 1024).await;
    let form = Form::new()
        .part("file", image_part("Wheat Leaf.JPG", 2048))
        .text("crop_type", "wheat");

    let (status, body) = upload(&server, form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");

    let data = &body["data"];
    assert_eq!(data["mode"], "synthetic");
    assert_eq!(data["crop_type"], "wheat");
    assert_eq!(data["image_name"], "Wheat_Leaf.jpg");
    assert!(data["result"].as_str().unwrap().contains("模拟数据"));
    assert!(data["details"]["confidence"].as_f64().unwrap() >= 0.6);
    assert!(data["timestamp"].as_str().is_some());
    assert!(data.get("remote_error").is_none());

    // upload stored under a unique prefix
    let stored: Vec<_> = std::fs::read_dir(&server.config.upload_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].ends_with("_Wheat_Leaf.jpg"));

    let result_file = data["result_file"].as_str().unwrap();
    assert!(result_file.starts_with("result_") && result_file.ends_with(".json"));

    let saved = reqwest::get(format!("{}/results/{}", server.base_url, result_file))
        .await
        .unwrap();
    assert_eq!(saved.status(), StatusCode::OK);
    let saved: Value = saved.json().await.unwrap();
    assert_eq!(saved["status"], "success");
    assert_eq!(saved["mode"], "synthetic");
    assert_eq!(saved["result"], data["result"]);

    let upload = reqwest::get(format!("{}/uploads/{}", server.base_url, stored[0]))
        .await
        .unwrap();
    assert_eq!(upload.status(), StatusCode::OK);
    assert_eq!(upload.headers()["content-type"], "image/jpeg");
    assert_eq!(upload.bytes().await.unwrap().len(), 2048);
}

#[tokio::test]
async fn test_unsaved_result_still_answers() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default()
        .with_base_dir(dir.path())
        .without_synthetic_latency();
    config.init_directories().unwrap();
    // a plain file where the results directory should be
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, b"").unwrap();
    config.results_dir = blocked;
    let server = start_with(config, dir).await;

    let form = Form::new().part("file", image_part("leaf.jpg", 64));
    let (status, body) = upload(&server, form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert!(body["data"]["result_file"].is_null());
    assert!(body["data"]["result"].as_str().is_some());
}

#[tokio::test]
async fn test_default_crop_is_rice() {
    let server = start(16 * 1024 * 1024).await;
    let form = Form::new().part("file", image_part("leaf.png", 64));

    let (status, body) = upload(&server, form).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["crop_type"], "rice");
}

#[tokio::test]
async fn test_missing_file_is_rejected() {
    let server = start(16 * 1024 * 1024).await;
    let form = Form::new().text("crop_type", "rice");

    let (status, body) = upload(&server, form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert_eq!(body["message"], "no image uploaded");
}

#[tokio::test]
async fn test_empty_filename_is_rejected() {
    let server = start(16 * 1024 * 1024).await;
    let form = Form::new().part("file", image_part("", 64));

    let (status, body) = upload(&server, form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn test_disallowed_extension_is_rejected() {
    let server = start(16 * 1024 * 1024).await;
    let form = Form::new().part("file", image_part("notes.txt", 64));

    let (status, body) = upload(&server, form).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("unsupported file type"));
    assert_eq!(std::fs::read_dir(&server.config.upload_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let server = start(1024).await;
    let form = Form::new().part("file", image_part("big.jpg", 4096));

    let (status, body) = upload(&server, form).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["status"], "error");
    assert_eq!(std::fs::read_dir(&server.config.upload_dir).unwrap().count(), 0);
}

#[tokio::test]
async fn test_stats_count_uploads() {
    let server = start(16 * 1024 * 1024).await;
    for crop in ["rice", "maize"] {
        let form = Form::new()
            .part("file", image_part("leaf.jpg", 64))
            .text("crop_type", crop);
        let (status, _) = upload(&server, form).await;
        assert_eq!(status, StatusCode::OK);
    }

    let body: Value = reqwest::get(format!("{}/api/stats", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["total_calls"], 2);
    assert_eq!(body["data"]["synthetic_calls"], 2);
    assert_eq!(body["data"]["remote_calls"], 0);
    assert_eq!(body["data"]["remote_available"], false);
}

#[tokio::test]
async fn test_health() {
    let server = start(1024).await;
    let body: Value = reqwest::get(format!("{}/health", server.base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["remote_available"], false);
}

#[tokio::test]
async fn test_file_routes_reject_traversal_and_missing() {
    let server = start(1024).await;

    let missing = reqwest::get(format!("{}/results/result_nope.json", server.base_url))
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    let traversal = reqwest::get(format!("{}/results/..%2Fsecret.json", server.base_url))
        .await
        .unwrap();
    assert_eq!(traversal.status(), StatusCode::BAD_REQUEST);
}
