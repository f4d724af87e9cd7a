//! Client-side failures and the text shown to the user for each of them.

use shared::{domain::MediaType, error::ApiException};
use thiserror::Error;

const MIB: u64 = 1024 * 1024;

pub type Result<T> = std::result::Result<T, ClientError>;

/// Input rejected before anything is sent over the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Maximum file size for {media_type} is {}MB", .max_bytes / MIB)]
    FileTooLarge {
        media_type: MediaType,
        size_bytes: u64,
        max_bytes: u64,
    },
    #[error("{media_type} uploads accept {}; '{filename}' is not supported", .accepted.join(", "))]
    UnsupportedFileType {
        media_type: MediaType,
        filename: String,
        accepted: Vec<String>,
    },
    #[error("Journal entries carry text content, not a file")]
    FileNotAllowed,
    #[error("Title is required")]
    MissingTitle,
    #[error("Journal content is required")]
    MissingJournalContent,
    #[error("Please select a file to upload")]
    MissingFile,
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Content must be verified before it can be saved")]
    NotVerified,
    #[error("Duplicate detected ({similarity_label}); content cannot be saved")]
    DuplicateBlocked { similarity_label: String },
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("not logged in")]
    NotSignedIn,
    #[error("session expired; please log in again")]
    Unauthorized,
    #[error("{0}")]
    Auth(String),
    #[error("{}", .0.message)]
    Api(#[from] ApiException),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response from server: {0}")]
    Decode(String),
    #[error("invalid client configuration: {0}")]
    Config(String),
    #[error("local storage error: {0:#}")]
    Storage(anyhow::Error),
}

impl ClientError {
    /// True when the caller should drop to the login screen.
    pub fn requires_login(&self) -> bool {
        matches!(self, ClientError::Unauthorized | ClientError::NotSignedIn)
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ClientError::Validation(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            ClientError::Transport(err) if err.is_connect() || err.is_timeout() => {
                "Server unreachable; check the API URL/network and retry.".to_string()
            }
            other => other.to_string(),
        }
    }
}
