//! Login, signup and logout behind one interface, remote or local.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rand::RngCore;
use sha2::{Digest, Sha256};
use shared::{
    domain::{User, UserId},
    protocol::{LoginRequest, SignupRequest, SignupResponse},
};
use storage::{LocalUser, Storage};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api::ApiClient,
    error::{ClientError, Result, ValidationError},
    session::Session,
};

const LOCAL_TOKEN_PREFIX: &str = "local_";

#[derive(Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField("Email"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("Password"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.username.trim().is_empty() {
            return Err(ValidationError::MissingField("Username"));
        }
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField("Email"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("Password"));
        }
        if self.confirm_password.is_empty() {
            return Err(ValidationError::MissingField("Password confirmation"));
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn login(&self, form: &LoginForm) -> Result<User>;
    async fn signup(&self, form: &SignupForm) -> Result<SignupResponse>;
    async fn logout(&self) -> Result<()>;
}

/// Credentials checked by the ArtChain API.
pub struct RemoteAuthService {
    api: Arc<ApiClient>,
}

impl RemoteAuthService {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl AuthService for RemoteAuthService {
    async fn login(&self, form: &LoginForm) -> Result<User> {
        form.validate()?;
        let response = self
            .api
            .login(&LoginRequest {
                email: form.email.trim().to_string(),
                password: form.password.clone(),
            })
            .await?;
        self.api
            .session()
            .establish(response.token, response.user.clone())
            .await?;
        Ok(response.user)
    }

    async fn signup(&self, form: &SignupForm) -> Result<SignupResponse> {
        form.validate()?;
        let response = self
            .api
            .signup(&SignupRequest {
                username: form.username.trim().to_string(),
                email: form.email.trim().to_string(),
                password: form.password.clone(),
            })
            .await?;
        info!(email = %form.email.trim(), "account created");
        Ok(response)
    }

    async fn logout(&self) -> Result<()> {
        self.api.session().sign_out().await
    }
}

/// Offline sign-in against the user directory kept in local storage.
pub struct LocalAuthService {
    storage: Storage,
    session: Arc<Session>,
}

impl LocalAuthService {
    pub fn new(storage: Storage, session: Arc<Session>) -> Self {
        Self { storage, session }
    }
}

#[async_trait]
impl AuthService for LocalAuthService {
    async fn login(&self, form: &LoginForm) -> Result<User> {
        form.validate()?;
        let found = self
            .storage
            .find_local_user_by_email(&form.email)
            .await
            .map_err(ClientError::Storage)?;

        let Some(account) = found.filter(|account| {
            password_digest(&account.password_salt, &form.password) == account.password_digest
        }) else {
            warn!(email = %form.email.trim(), "local login rejected");
            return Err(ClientError::Auth("Invalid email or password".to_string()));
        };

        let user = account.to_user();
        let token = format!("{LOCAL_TOKEN_PREFIX}{}", random_hex(32));
        self.session.establish(token, user.clone()).await?;
        Ok(user)
    }

    async fn signup(&self, form: &SignupForm) -> Result<SignupResponse> {
        form.validate()?;
        let salt = random_hex(16);
        let account = LocalUser {
            id: UserId(Uuid::new_v4().to_string()),
            username: form.username.trim().to_string(),
            email: form.email.trim().to_string(),
            password_digest: password_digest(&salt, &form.password),
            password_salt: salt,
            created_at: Utc::now(),
        };

        let inserted = self
            .storage
            .insert_local_user(&account)
            .await
            .map_err(ClientError::Storage)?;
        if !inserted {
            return Err(ClientError::Auth("Email already exists".to_string()));
        }

        info!(user_id = %account.id, "local account created");
        Ok(SignupResponse {
            message: "Account created! You can now log in.".to_string(),
            requires_login: true,
        })
    }

    async fn logout(&self) -> Result<()> {
        self.session.sign_out().await
    }
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn password_digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
#[path = "tests/auth_tests.rs"]
mod tests;
