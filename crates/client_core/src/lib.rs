//! Client for the ArtChain upload, verification and gallery API.

pub mod api;
pub mod auth;
pub mod commit;
pub mod error;
pub mod gallery;
pub mod session;
pub mod upload;

pub use api::{ApiClient, RemoteCommitter, DEFAULT_API_BASE_URL, DEFAULT_COMMIT_PATH};
pub use auth::{AuthService, LocalAuthService, LoginForm, RemoteAuthService, SignupForm};
pub use commit::{
    transition, CommitAttempt, CommitEvent, CommitStatus, CommitStep, Committer,
    PlaceholderCommitter, DEFAULT_DISPLAY_DELAY, DEFAULT_PLACEHOLDER_DELAY,
};
pub use error::{ClientError, ValidationError};
pub use gallery::UploadStats;
pub use session::{MemorySessionStore, PersistedSession, Session, SessionEvent, SessionStore};
pub use upload::{check_file, CommitGate, MediaFile, UploadDraft, UploadWorkflow, Verifier};

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
