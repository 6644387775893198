//! Integration tests for the HTTP surface, exercised end to end through
//! `axum::Router` via `tower::ServiceExt::oneshot` rather than a bound
//! listener.
//!
//! Run with: cargo test --test http_integration

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use lessonvault_api::http::{build_router, AppState};
use lessonvault_core::service::{AuthorizationGate, TranscodeOrchestrator};
use lessonvault_core::{Config, CredentialService, StorageLayout};
use tower::ServiceExt;

fn test_state(temp_dir: &tempfile::TempDir) -> AppState {
    let mut config = Config::default();
    config.server.development_mode = true;
    config.server.allowed_origins = vec!["https://focustagency.com".to_string()];
    config.storage.uploads_root = temp_dir.path().join("uploads").to_string_lossy().to_string();
    config.storage.originals_root = temp_dir.path().join("originals").to_string_lossy().to_string();
    config.storage.hls_root = temp_dir.path().join("hls").to_string_lossy().to_string();
    config.storage.presentations_root = temp_dir.path().join("presentation_videos").to_string_lossy().to_string();
    config.credential.secret = "integration-test-secret".to_string();

    let storage = StorageLayout::new(&config.storage);
    let credentials = CredentialService::new(&config.credential.secret);
    let gate = AuthorizationGate::new(
        credentials.clone(),
        config.credential.require_filename_for_download,
        config.server.allowed_origins.clone(),
    );
    let orchestrator = TranscodeOrchestrator::spawn(storage.clone(), config.transcode.clone(), config.callback.clone());

    AppState {
        config: Arc::new(config),
        storage: Arc::new(storage),
        credentials,
        gate,
        orchestrator,
    }
}

/// Builds a `multipart/form-data` body with the given boundary: plain
/// text fields first, then an optional `file` field carrying a filename
/// and raw content.
fn multipart_body(boundary: &str, fields: &[(&str, &str)], file_field: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n").as_bytes());
    }
    if let Some((name, filename, content)) = file_field {
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn healthz_reports_ok() {
    let temp_dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&temp_dir));

    let response = router
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn web_token_mint_round_trips_into_a_gated_route() {
    let temp_dir = tempfile::tempdir().unwrap();
    let state = test_state(&temp_dir);

    tokio::fs::create_dir_all(state.storage.v1_upload_dir("u1")).await.unwrap();
    tokio::fs::write(state.storage.v1_upload_path("u1", "lesson.mp4"), b"not a real video").await.unwrap();

    let router = build_router(state);

    let mint_response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/get-video-token/u1/lesson.mp4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(mint_response.status(), StatusCode::OK);
    let body = to_bytes(mint_response.into_body(), usize::MAX).await.unwrap();
    let minted: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let token = minted["token"].as_str().unwrap();

    let ok_response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/videos-user/u1/lesson.mp4?token={token}"))
                .header("referer", "https://focustagency.com/lesson")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(ok_response.status(), StatusCode::OK);

    let no_referrer_response = router
        .oneshot(
            Request::builder()
                .uri(format!("/videos-user/u1/lesson.mp4?token={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(no_referrer_response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn download_route_rejects_missing_credential() {
    let temp_dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&temp_dir));

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/download/u1/lesson.mp4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn missing_credential_gets_a_distinct_body_from_an_invalid_one() {
    let temp_dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&temp_dir));

    let missing = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/download/u1/lesson.mp4")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::FORBIDDEN);
    let missing_body = to_bytes(missing.into_body(), usize::MAX).await.unwrap();
    let missing_json: serde_json::Value = serde_json::from_slice(&missing_body).unwrap();

    let invalid = router
        .oneshot(
            Request::builder()
                .uri("/api/download/u1/lesson.mp4?token=not-a-real-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::FORBIDDEN);
    let invalid_body = to_bytes(invalid.into_body(), usize::MAX).await.unwrap();
    let invalid_json: serde_json::Value = serde_json::from_slice(&invalid_body).unwrap();

    assert_ne!(missing_json["error"], invalid_json["error"]);
    assert_eq!(missing_json["error"], "credential missing");
    assert_eq!(invalid_json["error"], "forbidden");
}

#[tokio::test]
async fn upload_v1_requires_user_id_form_field() {
    let temp_dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&temp_dir));

    let boundary = "test-boundary";
    let body = multipart_body(boundary, &[], Some(("file", "lesson.mp4", b"not a real video")));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload?success_url=https://cb.example.com/success&error_url=https://cb.example.com/error")
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["error"].as_str().unwrap().contains("User ID missing"));
}

#[tokio::test]
async fn upload_v1_honors_the_uploader_supplied_user_id() {
    let temp_dir = tempfile::tempdir().unwrap();
    let state = test_state(&temp_dir);
    let storage = state.storage.clone();
    let router = build_router(state);

    let boundary = "test-boundary";
    let body = multipart_body(boundary, &[("user_id", "u1")], Some(("file", "lesson.mp4", b"not a real video")));

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/upload?success_url=https://cb.example.com/success&error_url=https://cb.example.com/error")
                .header("content-type", format!("multipart/form-data; boundary={boundary}"))
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert!(storage.v1_upload_path("u1", "lesson.mp4").exists());
}

#[tokio::test]
async fn swagger_ui_is_only_mounted_in_development_mode() {
    let temp_dir = tempfile::tempdir().unwrap();
    let mut state = test_state(&temp_dir);
    Arc::get_mut(&mut state.config).unwrap().server.development_mode = false;

    let router = build_router(state);
    let response = router
        .oneshot(Request::builder().uri("/swagger-ui").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
