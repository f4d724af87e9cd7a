use super::*;
use chrono::Utc;
use shared::domain::UserId;

fn alice() -> User {
    User {
        id: UserId("u-1".into()),
        username: "alice".into(),
        email: "alice@example.com".into(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn restores_persisted_session_from_storage() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.save_session("tok-1", &alice()).await.expect("seed");

    let session = Session::restore(Arc::new(storage)).await.expect("restore");
    assert!(session.is_authenticated().await);
    assert_eq!(session.token().await.as_deref(), Some("tok-1"));
    assert_eq!(session.require_user().await.expect("user").username, "alice");
}

#[tokio::test]
async fn incomplete_stored_session_is_cleared() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .put_value(storage::TOKEN_KEY, "orphan-token")
        .await
        .expect("seed token");

    let session = Session::restore(Arc::new(storage.clone()))
        .await
        .expect("restore");
    assert!(!session.is_authenticated().await);
    assert_eq!(storage.session_token().await.expect("token"), None);
}

#[tokio::test]
async fn unreadable_user_is_treated_as_signed_out() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .put_value(storage::TOKEN_KEY, "tok-1")
        .await
        .expect("seed token");
    storage
        .put_value(storage::CURRENT_USER_KEY, "{broken")
        .await
        .expect("seed user");

    let session = Session::restore(Arc::new(storage.clone()))
        .await
        .expect("restore");
    assert!(!session.is_authenticated().await);
    assert_eq!(storage.session_token().await.expect("token"), None);
}

#[tokio::test]
async fn establish_persists_and_sign_out_clears() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let session = Session::restore(Arc::new(storage.clone()))
        .await
        .expect("restore");
    let mut events = session.subscribe();

    session.establish("tok-2", alice()).await.expect("establish");
    assert_eq!(
        storage.session_token().await.expect("token").as_deref(),
        Some("tok-2")
    );
    match events.recv().await.expect("event") {
        SessionEvent::SignedIn(user) => assert_eq!(user.username, "alice"),
        other => panic!("expected SignedIn, got {other:?}"),
    }

    session.sign_out().await.expect("sign out");
    assert!(!session.is_authenticated().await);
    assert_eq!(storage.current_user().await.expect("user"), None);
    assert_eq!(events.recv().await.expect("event"), SessionEvent::SignedOut);
    assert!(matches!(
        session.require_user().await,
        Err(ClientError::NotSignedIn)
    ));
}

#[tokio::test]
async fn expire_signals_login_required() {
    let session = Session::in_memory();
    session.establish("tok-3", alice()).await.expect("establish");
    let mut events = session.subscribe();

    session.expire().await.expect("expire");
    assert_eq!(session.token().await, None);
    assert_eq!(events.recv().await.expect("event"), SessionEvent::LoginRequired);
}
