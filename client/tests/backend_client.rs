mod common;

use std::path::PathBuf;
use std::time::Duration;

use client::{track_submission, ApiError, BackendClient, TokioTimer};
use common::mock_backend::MockBackend;
use serde_json::json;
use shared::{NormalizationOutcome, PollConfig, Submission, TaskStatus};
use tempfile::TempDir;

fn media_file(dir: &TempDir, extension: &str) -> PathBuf {
    let path = dir
        .path()
        .join(format!("{}.{}", uuid::Uuid::new_v4(), extension));
    std::fs::write(&path, b"not really media").unwrap();
    path
}

fn client_for(mock: &MockBackend) -> BackendClient {
    BackendClient::new(&mock.base_url, Duration::from_secs(5)).unwrap()
}

#[actix_web::test]
async fn classification_answer_after_marker_is_classified() {
    let mock = MockBackend::start().await;
    let classification = concat!(
        "The bin holds vegetable peelings.\n*Answer*: ",
        r#"{"timestamp": "2025-04-13T11:02:49Z", "contains_food": true, "is_waste": true, "#,
        r#""categories": [{"food_type": "vegetable", "name": "carrot", "confidence": 0.92, "explanation": "peel"}]}"#,
        " Let me know if you need more."
    );
    mock.reply_classification(
        200,
        json!({"status": "success", "classification": classification}).to_string(),
    );

    let dir = tempfile::tempdir().unwrap();
    let image = media_file(&dir, "jpg");
    let outcome = client_for(&mock).classify_waste(&image).await.unwrap();

    let result = outcome.classification().expect("classified").clone();
    assert_eq!(result.categories.len(), 1);
    assert_eq!(result.categories[0].name, "carrot");
    assert_eq!(result.categories[0].confidence, 0.92);
    assert_eq!(
        result.image_id,
        image.file_name().unwrap().to_string_lossy()
    );

    let uploads = mock.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].path, "/api/waste-classification");
    assert!(uploads[0].body.contains(r#"name="file""#));
    assert!(uploads[0].body.contains("Content-Type: image/jpeg"));
    mock.stop().await;
}

#[actix_web::test]
async fn object_without_food_is_no_food() {
    let mock = MockBackend::start().await;
    mock.reply_classification(
        200,
        json!({
            "status": "success",
            "classification": {
                "timestamp": "2025-04-13T11:02:49Z",
                "image_id": "empty.png",
                "contains_food": false,
                "is_waste": false,
                "categories": []
            }
        })
        .to_string(),
    );

    let dir = tempfile::tempdir().unwrap();
    let outcome = client_for(&mock)
        .classify_waste(&media_file(&dir, "png"))
        .await
        .unwrap();
    assert_eq!(outcome, NormalizationOutcome::NoFood);
    mock.stop().await;
}

#[actix_web::test]
async fn uninterpretable_answer_is_unparseable() {
    let mock = MockBackend::start().await;
    mock.reply_classification(
        200,
        json!({"status": "success", "classification": "I am not sure what this is."}).to_string(),
    );

    let dir = tempfile::tempdir().unwrap();
    let outcome = client_for(&mock)
        .classify_waste(&media_file(&dir, "webp"))
        .await
        .unwrap();
    assert!(outcome.is_unparseable());
    mock.stop().await;
}

#[actix_web::test]
async fn non_json_body_goes_through_text_heuristics() {
    let mock = MockBackend::start().await;
    mock.reply_classification(200, r#"result: "contains_food": false, nothing else"#);

    let dir = tempfile::tempdir().unwrap();
    let outcome = client_for(&mock)
        .classify_waste(&media_file(&dir, "jpeg"))
        .await
        .unwrap();
    assert_eq!(outcome, NormalizationOutcome::NoFood);
    mock.stop().await;
}

#[actix_web::test]
async fn server_error_surfaces_detail() {
    let mock = MockBackend::start().await;
    mock.reply_classification(500, json!({"detail": "model not loaded"}).to_string());

    let dir = tempfile::tempdir().unwrap();
    let err = client_for(&mock)
        .classify_waste(&media_file(&dir, "jpg"))
        .await
        .unwrap_err();
    match err {
        ApiError::Http { status, detail } => {
            assert_eq!(status, 500);
            assert_eq!(detail, "model not loaded");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    mock.stop().await;
}

#[actix_web::test]
async fn unsupported_file_is_rejected_before_upload() {
    let mock = MockBackend::start().await;
    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&mock);

    let err = client.classify_waste(&media_file(&dir, "txt")).await.unwrap_err();
    assert!(matches!(err, ApiError::UnsupportedFile { .. }));
    let err = client
        .submit_stock_video(&media_file(&dir, "png"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::UnsupportedFile { .. }));

    assert!(mock.uploads().is_empty());
    mock.stop().await;
}

#[actix_web::test]
async fn stock_video_is_tracked_to_completion() {
    let mock = MockBackend::start().await;
    mock.reply_submission(
        200,
        json!({"status": "success", "message": "Video uploaded and processing started", "task_id": "task-42"}),
    );
    mock.queue_status(503, json!({"detail": "busy"}));
    mock.queue_status(200, json!({"status": "processing", "progress": 35.0}));
    mock.queue_status(200, json!({"status": "processing", "progress": 80.4}));
    mock.queue_status(
        200,
        json!({
            "status": "completed",
            "progress": 100,
            "result": {"results": {"apple": 4, "milk": 1}, "video_url": "/static/videos/task-42.mp4"}
        }),
    );

    let dir = tempfile::tempdir().unwrap();
    let client = client_for(&mock);
    let submission = client
        .submit_stock_video(&media_file(&dir, "mp4"))
        .await
        .unwrap();
    assert_eq!(submission, Submission::Pending { task_id: "task-42".into() });

    let config = PollConfig {
        interval_ms: 20,
        timeout_ms: 5_000,
    };
    let mut progress = Vec::new();
    let state = track_submission(
        client,
        TokioTimer,
        submission,
        config,
        |state| progress.push(state.progress),
        futures::future::pending(),
    )
    .await;

    assert_eq!(state.status, TaskStatus::Completed);
    assert_eq!(state.progress, 100);
    let result = state.result.unwrap();
    assert_eq!(result.results.get("apple"), Some(&4));
    assert_eq!(progress, vec![0, 35, 80, 100]);
    assert_eq!(mock.status_calls(), 4);
    assert!(mock.uploads()[0].body.contains("Content-Type: video/mp4"));
    mock.stop().await;
}

#[actix_web::test]
async fn synchronous_stock_result_needs_no_polling() {
    let mock = MockBackend::start().await;
    mock.reply_submission(
        200,
        json!({"status": "success", "results": {"eggs": 12}, "video_url": "/static/out.mp4"}),
    );

    let dir = tempfile::tempdir().unwrap();
    let submission = client_for(&mock)
        .submit_stock_video(&media_file(&dir, "mov"))
        .await
        .unwrap();
    match submission {
        Submission::Ready(result) => assert_eq!(result.results.get("eggs"), Some(&12)),
        other => panic!("unexpected submission: {other:?}"),
    }
    assert_eq!(mock.status_calls(), 0);
    mock.stop().await;
}

#[actix_web::test]
async fn rejected_submission_reports_message() {
    let mock = MockBackend::start().await;
    mock.reply_submission(200, json!({"status": "error", "message": "video too long"}));

    let dir = tempfile::tempdir().unwrap();
    let err = client_for(&mock)
        .submit_stock_video(&media_file(&dir, "webm"))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Rejected(message) if message == "video too long"));
    mock.stop().await;
}

#[actix_web::test]
async fn task_id_is_percent_encoded() {
    let mock = MockBackend::start().await;
    mock.queue_status(200, json!({"status": "queued"}));

    let response = client_for(&mock).task_status("batch 7/a").await.unwrap();
    assert_eq!(response.status, shared::RemoteStatus::Queued);
    assert_eq!(mock.status_paths(), vec!["/api/task-status/batch%207%2Fa".to_string()]);
    mock.stop().await;
}

#[actix_web::test]
async fn unknown_task_is_http_error() {
    let mock = MockBackend::start().await;

    let err = client_for(&mock).task_status("missing").await.unwrap_err();
    assert!(matches!(err, ApiError::Http { status: 404, ref detail } if detail == "Task not found"));
    mock.stop().await;
}
