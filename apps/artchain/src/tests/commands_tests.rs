use super::*;
use std::path::PathBuf;

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use client_core::DEFAULT_COMMIT_PATH;
use serde_json::json;
use tokio::net::TcpListener;

#[derive(Clone)]
struct VerifyReply {
    status: StatusCode,
    body: serde_json::Value,
}

async fn handle_verify(
    State(reply): State<VerifyReply>,
    mut multipart: Multipart,
) -> (StatusCode, Json<serde_json::Value>) {
    while let Ok(Some(field)) = multipart.next_field().await {
        let _ = field.bytes().await;
    }
    (reply.status, Json(reply.body))
}

async fn spawn_verify_api(status: StatusCode, body: serde_json::Value) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/verify", post(handle_verify))
        .with_state(VerifyReply { status, body });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn verdict(is_duplicate: bool, similarity_score: f64) -> serde_json::Value {
    json!({
        "success": true,
        "data": {
            "isDuplicate": is_duplicate,
            "similarityScore": similarity_score,
            "analysisSummary": "compared against gallery"
        }
    })
}

async fn signed_in_app(api_base_url: String) -> App {
    let settings = Settings {
        api_base_url,
        database_url: "sqlite::memory:".into(),
        commit_mode: CommitMode::Placeholder,
        commit_path: DEFAULT_COMMIT_PATH.into(),
        commit_delay_ms: 0,
        success_display_delay_ms: 0,
    };
    let app = App::connect(&settings, true).await.expect("connect");
    app.signup(
        "mira".into(),
        "mira@example.com".into(),
        "pw".into(),
        "pw".into(),
    )
    .await
    .expect("signup");
    app.login("mira@example.com".into(), "pw".into())
        .await
        .expect("login");
    app
}

fn photo_args(path: PathBuf) -> DraftArgs {
    DraftArgs {
        media_type: MediaType::Photo,
        title: "Dunes".into(),
        file: Some(path),
        content: None,
        description: None,
        date: None,
    }
}

fn write_photo(dir: &tempfile::TempDir) -> PathBuf {
    let path = dir.path().join("dunes.png");
    std::fs::write(&path, vec![3u8; 2048]).expect("write photo");
    path
}

#[tokio::test]
async fn blocked_duplicate_fails_the_upload() {
    let base_url = spawn_verify_api(StatusCode::OK, verdict(true, 0.95)).await;
    let app = signed_in_app(base_url).await;
    let dir = tempfile::tempdir().expect("tempdir");

    let err = app
        .upload(&photo_args(write_photo(&dir)))
        .await
        .expect_err("duplicate must not exit cleanly");
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::Validation(ValidationError::DuplicateBlocked { similarity_label })) => {
            assert_eq!(similarity_label, "95.0% similarity");
        }
        other => panic!("expected a blocked duplicate, got {other:?}"),
    }
}

#[tokio::test]
async fn original_content_is_saved() {
    let base_url = spawn_verify_api(StatusCode::OK, verdict(false, 0.1)).await;
    let app = signed_in_app(base_url).await;
    let dir = tempfile::tempdir().expect("tempdir");

    app.upload(&photo_args(write_photo(&dir)))
        .await
        .expect("upload");
}

#[tokio::test]
async fn oversized_upload_is_rejected_before_verification() {
    let base_url = spawn_verify_api(StatusCode::OK, verdict(false, 0.1)).await;
    let app = signed_in_app(base_url).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("huge.png");
    std::fs::File::create(&path)
        .and_then(|file| file.set_len(64 * 1024 * 1024))
        .expect("sparse file");

    let err = app
        .upload(&photo_args(path))
        .await
        .expect_err("too large");
    assert!(matches!(
        err.downcast_ref::<ValidationError>(),
        Some(ValidationError::FileTooLarge { .. })
    ));
}

#[tokio::test]
async fn rejected_token_is_reported_as_expired_session() {
    let base_url = spawn_verify_api(
        StatusCode::UNAUTHORIZED,
        json!({ "success": false, "message": "token expired" }),
    )
    .await;
    let mut app = signed_in_app(base_url).await;
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(!app.session_expired());

    let err = app
        .verify(&photo_args(write_photo(&dir)))
        .await
        .expect_err("401");
    assert!(err
        .downcast_ref::<ClientError>()
        .is_some_and(ClientError::requires_login));
    assert!(app.session_expired());
    assert!(!app.session_expired());
}
