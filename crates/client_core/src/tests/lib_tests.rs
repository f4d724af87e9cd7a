use super::*;
use std::{sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Multipart},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use shared::domain::{BlockchainStatus, MediaType};
use tokio::net::TcpListener;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some("Bearer studio-token")
}

async fn drain(mut multipart: Multipart) {
    while let Ok(Some(field)) = multipart.next_field().await {
        let _ = field.bytes().await;
    }
}

async fn spawn_studio_api() -> anyhow::Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new()
        .route(
            "/api/auth/login",
            post(|| async {
                Json(json!({
                    "success": true,
                    "data": {
                        "token": "studio-token",
                        "user": {
                            "id": "u-7",
                            "username": "mira",
                            "email": "mira@example.com",
                            "createdAt": "2024-02-01T00:00:00Z"
                        }
                    }
                }))
            }),
        )
        .route(
            "/api/verify",
            post(|headers: HeaderMap, multipart: Multipart| async move {
                drain(multipart).await;
                if !authorized(&headers) {
                    return (StatusCode::UNAUTHORIZED, Json(json!({ "success": false })));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "data": {
                            "isDuplicate": false,
                            "similarityScore": 0.12,
                            "analysisSummary": "No similar records found."
                        }
                    })),
                )
            }),
        )
        .route(
            DEFAULT_COMMIT_PATH,
            post(|multipart: Multipart| async move {
                drain(multipart).await;
                Json(json!({
                    "transactionHash": format!("0x{}", "7e".repeat(32)),
                    "recordId": "art_studio01"
                }))
            }),
        )
        .route(
            "/api/users/:id/uploads",
            get(|| async {
                Json(json!({
                    "success": true,
                    "data": [
                        {
                            "id": "art_a", "type": "photo", "title": "Dunes",
                            "uploader": "mira", "uploaderId": "u-7",
                            "createdAt": "2024-02-02T00:00:00Z",
                            "blockchainStatus": "CONFIRMED"
                        },
                        {
                            "id": "art_b", "type": "audio", "title": "Tide",
                            "uploader": "mira", "uploaderId": "u-7",
                            "createdAt": "2024-02-03T00:00:00Z",
                            "blockchainStatus": "PENDING"
                        }
                    ]
                }))
            }),
        )
        .layer(DefaultBodyLimit::disable());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

#[tokio::test]
async fn login_verify_commit_and_summarize_against_one_server() {
    let base_url = spawn_studio_api().await.expect("mock api");
    let session = Session::in_memory();
    let api = Arc::new(ApiClient::new(&base_url, Arc::clone(&session)).expect("client"));

    let auth = RemoteAuthService::new(Arc::clone(&api));
    let user = auth
        .login(&LoginForm {
            email: "mira@example.com".into(),
            password: "pw".into(),
        })
        .await
        .expect("login");
    assert!(session.is_authenticated().await);

    let mut flow = UploadWorkflow::new(user.id.clone(), Duration::ZERO);
    flow.set_media_type(MediaType::Photo);
    flow.set_title("Dunes at dusk");
    flow.select_file(MediaFile::new("dunes.png", vec![9u8; 4096]))
        .expect("photo");

    let verdict = flow.verify(&*api).await.expect("verify");
    assert!(!verdict.is_duplicate);
    assert_eq!(flow.gate(), CommitGate::Allowed);

    let committer = RemoteCommitter::new(Arc::clone(&api), DEFAULT_COMMIT_PATH);
    let mut confirmed = None;
    let attempt = flow
        .commit(&committer, |result| confirmed = Some(result.record_id.clone()))
        .await
        .expect("commit");
    assert_eq!(attempt.status().badge(), Some("CONFIRMED"));
    assert_eq!(confirmed.map(|id| id.0), Some("art_studio01".to_string()));

    let uploads = api.user_uploads(&user.id).await.expect("uploads");
    let stats = UploadStats::from_records(&uploads);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.confirmed, 1);
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.count_for(MediaType::Audio), 1);
    assert_eq!(uploads[0].blockchain_status, BlockchainStatus::Confirmed);
}

#[tokio::test]
async fn unauthenticated_verification_routes_to_login() {
    let base_url = spawn_studio_api().await.expect("mock api");
    let session = Session::in_memory();
    let api = ApiClient::new(&base_url, Arc::clone(&session)).expect("client");
    let mut events = session.subscribe();

    let mut flow = UploadWorkflow::new(shared::domain::UserId("u-7".into()), Duration::ZERO);
    flow.set_title("Dunes");
    flow.select_file(MediaFile::new("dunes.jpg", vec![1u8; 16]))
        .expect("photo");

    let err = flow.verify(&api).await.expect_err("no token");
    assert!(err.requires_login());
    assert_eq!(
        events.recv().await.expect("event"),
        SessionEvent::LoginRequired
    );
    assert!(!flow.commit_available());
}
