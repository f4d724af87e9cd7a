//! Commit (save) step: the idle/saving/success/error status of one draft.

use std::time::Duration;

use async_trait::async_trait;
use rand::{distributions::Uniform, Rng, RngCore};
use shared::{domain::RecordId, protocol::CommitResult};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{error::Result, upload::UploadDraft};

pub const DEFAULT_DISPLAY_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_PLACEHOLDER_DELAY: Duration = Duration::from_secs(2);

const RECORD_ID_PREFIX: &str = "art_";
const RECORD_ID_LEN: usize = 9;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CommitStatus {
    #[default]
    Idle,
    Saving,
    Success(CommitResult),
    Error(String),
}

impl CommitStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, CommitStatus::Idle)
    }

    /// Whether a trigger would be ignored in this state.
    pub fn is_locked(&self) -> bool {
        matches!(self, CommitStatus::Saving | CommitStatus::Success(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            CommitStatus::Idle => "Save to Blockchain",
            CommitStatus::Saving => "Saving to blockchain...",
            CommitStatus::Success(_) => "Successfully saved!",
            CommitStatus::Error(_) => "Save failed",
        }
    }

    pub fn badge(&self) -> Option<&'static str> {
        match self {
            CommitStatus::Idle => None,
            CommitStatus::Saving => Some("PENDING"),
            CommitStatus::Success(_) => Some("CONFIRMED"),
            CommitStatus::Error(_) => Some("REJECTED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitEvent {
    Trigger,
    Resolved(CommitResult),
    Rejected(String),
}

/// Next status for `event`, or `None` when the event does not apply.
pub fn transition(status: &CommitStatus, event: CommitEvent) -> Option<CommitStatus> {
    match (status, event) {
        (CommitStatus::Idle | CommitStatus::Error(_), CommitEvent::Trigger) => {
            Some(CommitStatus::Saving)
        }
        (CommitStatus::Saving, CommitEvent::Resolved(result)) => {
            Some(CommitStatus::Success(result))
        }
        (CommitStatus::Saving, CommitEvent::Rejected(message)) => {
            Some(CommitStatus::Error(message))
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitAttempt {
    /// The trigger arrived while saving or after success.
    Ignored(CommitStatus),
    Finished(CommitStatus),
}

impl CommitAttempt {
    pub fn status(&self) -> &CommitStatus {
        match self {
            CommitAttempt::Ignored(status) | CommitAttempt::Finished(status) => status,
        }
    }
}

/// Persistence side of the commit: where a verified draft is recorded.
#[async_trait]
pub trait Committer: Send + Sync {
    async fn commit(&self, draft: &UploadDraft) -> Result<CommitResult>;
}

pub struct CommitStep {
    status: watch::Sender<CommitStatus>,
    display_delay: Duration,
}

impl CommitStep {
    pub fn new(display_delay: Duration) -> Self {
        let (status, _) = watch::channel(CommitStatus::Idle);
        Self {
            status,
            display_delay,
        }
    }

    pub fn status(&self) -> CommitStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CommitStatus> {
        self.status.subscribe()
    }

    /// Runs one commit attempt. `on_success` fires after the display delay.
    pub async fn trigger<F>(
        &self,
        committer: &dyn Committer,
        draft: &UploadDraft,
        on_success: F,
    ) -> CommitAttempt
    where
        F: FnOnce(&CommitResult) + Send,
    {
        // Claiming `saving` and checking the current state happen in one step.
        let claimed = self.apply(CommitEvent::Trigger);
        if !claimed {
            return CommitAttempt::Ignored(self.status());
        }
        info!(media_type = %draft.media_type, title = %draft.title, "saving draft");

        let event = match committer.commit(draft).await {
            Ok(result) => {
                info!(
                    record_id = %result.record_id,
                    transaction_hash = %result.transaction_hash,
                    "draft saved"
                );
                CommitEvent::Resolved(result)
            }
            Err(err) => {
                warn!(error = %err, "saving draft failed");
                CommitEvent::Rejected(err.user_message())
            }
        };
        self.apply(event);

        let status = self.status();
        if let CommitStatus::Success(result) = &status {
            tokio::time::sleep(self.display_delay).await;
            on_success(result);
        }
        CommitAttempt::Finished(status)
    }

    fn apply(&self, event: CommitEvent) -> bool {
        self.status
            .send_if_modified(|status| match transition(status, event) {
                Some(next) => {
                    *status = next;
                    true
                }
                None => false,
            })
    }
}

/// Stand-in for the ledger write: waits, then invents a hash and record id.
pub struct PlaceholderCommitter {
    delay: Duration,
}

impl PlaceholderCommitter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for PlaceholderCommitter {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_DELAY)
    }
}

#[async_trait]
impl Committer for PlaceholderCommitter {
    async fn commit(&self, _draft: &UploadDraft) -> Result<CommitResult> {
        tokio::time::sleep(self.delay).await;
        Ok(placeholder_commit_result())
    }
}

pub fn placeholder_commit_result() -> CommitResult {
    let mut rng = rand::thread_rng();
    let mut hash = [0u8; 32];
    rng.fill_bytes(&mut hash);

    let alphabet = Uniform::from(0..BASE36.len());
    let suffix: String = (0..RECORD_ID_LEN)
        .map(|_| BASE36[rng.sample(alphabet)] as char)
        .collect();

    CommitResult {
        transaction_hash: format!("0x{}", hex::encode(hash)),
        record_id: RecordId(format!("{RECORD_ID_PREFIX}{suffix}")),
    }
}

#[cfg(test)]
#[path = "tests/commit_tests.rs"]
mod tests;
