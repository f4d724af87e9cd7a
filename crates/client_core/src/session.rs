//! The signed-in session shared by the API client and the auth services.

use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use shared::domain::User;
use storage::Storage;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct PersistedSession {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SignedIn(User),
    SignedOut,
    /// The API rejected the held token; the UI should route to login.
    LoginRequired,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self) -> AnyResult<Option<PersistedSession>>;
    async fn save(&self, session: &PersistedSession) -> AnyResult<()>;
    async fn clear(&self) -> AnyResult<()>;
}

#[async_trait]
impl SessionStore for Storage {
    async fn load(&self) -> AnyResult<Option<PersistedSession>> {
        let token = self.session_token().await?;
        let user = match self.current_user().await {
            Ok(user) => user,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "discarding unreadable stored user");
                None
            }
        };

        match (token, user) {
            (Some(token), Some(user)) => Ok(Some(PersistedSession { token, user })),
            (None, None) => Ok(None),
            _ => {
                warn!("stored session is incomplete; clearing it");
                self.clear_session().await?;
                Ok(None)
            }
        }
    }

    async fn save(&self, session: &PersistedSession) -> AnyResult<()> {
        self.save_session(&session.token, &session.user).await
    }

    async fn clear(&self) -> AnyResult<()> {
        self.clear_session().await
    }
}

/// Keeps the session in process memory only.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<Option<PersistedSession>>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self) -> AnyResult<Option<PersistedSession>> {
        Ok(self.inner.lock().await.clone())
    }

    async fn save(&self, session: &PersistedSession) -> AnyResult<()> {
        *self.inner.lock().await = Some(session.clone());
        Ok(())
    }

    async fn clear(&self) -> AnyResult<()> {
        *self.inner.lock().await = None;
        Ok(())
    }
}

pub struct Session {
    store: Arc<dyn SessionStore>,
    state: RwLock<Option<PersistedSession>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    /// Starts from whatever the store already holds.
    pub async fn restore(store: Arc<dyn SessionStore>) -> Result<Arc<Self>> {
        let restored = store.load().await.map_err(ClientError::Storage)?;
        if let Some(session) = &restored {
            info!(user_id = %session.user.id, "restored persisted session");
        }
        let (events, _) = broadcast::channel(32);
        Ok(Arc::new(Self {
            store,
            state: RwLock::new(restored),
            events,
        }))
    }

    pub fn in_memory() -> Arc<Self> {
        let (events, _) = broadcast::channel(32);
        Arc::new(Self {
            store: Arc::new(MemorySessionStore::default()),
            state: RwLock::new(None),
            events,
        })
    }

    pub async fn token(&self) -> Option<String> {
        self.state.read().await.as_ref().map(|s| s.token.clone())
    }

    pub async fn current_user(&self) -> Option<User> {
        self.state.read().await.as_ref().map(|s| s.user.clone())
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.read().await.is_some()
    }

    pub async fn require_user(&self) -> Result<User> {
        self.current_user().await.ok_or(ClientError::NotSignedIn)
    }

    pub async fn establish(&self, token: impl Into<String>, user: User) -> Result<()> {
        let session = PersistedSession {
            token: token.into(),
            user,
        };
        self.store
            .save(&session)
            .await
            .map_err(ClientError::Storage)?;
        info!(user_id = %session.user.id, username = %session.user.username, "signed in");
        let user = session.user.clone();
        *self.state.write().await = Some(session);
        let _ = self.events.send(SessionEvent::SignedIn(user));
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<()> {
        self.teardown().await?;
        info!("signed out");
        let _ = self.events.send(SessionEvent::SignedOut);
        Ok(())
    }

    /// Drops the session after the API refused its token.
    pub async fn expire(&self) -> Result<()> {
        let cleared = self.teardown().await;
        warn!("session token rejected; login required");
        let _ = self.events.send(SessionEvent::LoginRequired);
        cleared
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    async fn teardown(&self) -> Result<()> {
        *self.state.write().await = None;
        self.store.clear().await.map_err(ClientError::Storage)
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
