use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{User, UserId};

pub const TOKEN_KEY: &str = "artchain_token";
pub const CURRENT_USER_KEY: &str = "artchain_user";
pub const USER_DIRECTORY_KEY: &str = "artchain_users";

/// Local stand-in for the browser storage the web client keeps its session in.
#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Entry of the local user directory used by offline sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalUser {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_salt: String,
    pub password_digest: String,
    pub created_at: DateTime<Utc>,
}

impl LocalUser {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            username: self.username.clone(),
            email: self.email.clone(),
            created_at: self.created_at,
        }
    }
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every pooled connection to an in-memory database would see its own empty schema.
        let max_connections = if is_in_memory(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open sqlite database '{database_url}'"))?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to read '{key}'"))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn put_value(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to write '{key}'"))?;
        Ok(())
    }

    pub async fn remove_value(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM kv_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to remove '{key}'"))?;
        Ok(())
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.get_value(key).await? else {
            return Ok(None);
        };
        let value = serde_json::from_str(&raw)
            .with_context(|| format!("stored value for '{key}' is not valid json"))?;
        Ok(Some(value))
    }

    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.put_value(key, &raw).await
    }

    pub async fn session_token(&self) -> Result<Option<String>> {
        self.get_value(TOKEN_KEY).await
    }

    pub async fn current_user(&self) -> Result<Option<User>> {
        self.get_json(CURRENT_USER_KEY).await
    }

    pub async fn save_session(&self, token: &str, user: &User) -> Result<()> {
        self.put_value(TOKEN_KEY, token).await?;
        self.put_json(CURRENT_USER_KEY, user).await
    }

    pub async fn clear_session(&self) -> Result<()> {
        self.remove_value(TOKEN_KEY).await?;
        self.remove_value(CURRENT_USER_KEY).await
    }

    pub async fn list_local_users(&self) -> Result<Vec<LocalUser>> {
        Ok(self
            .get_json::<Vec<LocalUser>>(USER_DIRECTORY_KEY)
            .await?
            .unwrap_or_default())
    }

    pub async fn find_local_user_by_email(&self, email: &str) -> Result<Option<LocalUser>> {
        Ok(self
            .list_local_users()
            .await?
            .into_iter()
            .find(|user| user.email.eq_ignore_ascii_case(email.trim())))
    }

    /// Appends `user` to the directory. Returns `false` when the email is already taken.
    pub async fn insert_local_user(&self, user: &LocalUser) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        let existing: Option<String> =
            sqlx::query_scalar("SELECT value FROM kv_entries WHERE key = ?")
                .bind(USER_DIRECTORY_KEY)
                .fetch_optional(&mut *tx)
                .await?;
        let mut users: Vec<LocalUser> = match existing {
            Some(raw) => serde_json::from_str(&raw)
                .context("stored user directory is not valid json")?,
            None => Vec::new(),
        };

        if users
            .iter()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Ok(false);
        }

        users.push(user.clone());
        sqlx::query(
            "INSERT INTO kv_entries (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(USER_DIRECTORY_KEY)
        .bind(serde_json::to_string(&users)?)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_in_memory(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
