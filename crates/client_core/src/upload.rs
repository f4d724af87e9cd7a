//! Upload draft, local validation, and the verify step that gates commits.

use std::{path::Path, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use shared::{
    domain::{MediaType, UserId},
    protocol::{CommitResult, VerificationResult},
};
use tracing::{info, warn};

use crate::{
    commit::{CommitAttempt, CommitStep, Committer},
    error::{Result, ValidationError},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub filename: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl MediaFile {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: None,
            bytes,
        }
    }

    pub async fn read(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("'{}' does not name a file", path.display()))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read '{}'", path.display()))?;
        Ok(Self::new(filename, bytes))
    }

    /// Reads `path` as a `media_type` selection. The extension and size come
    /// from the file name and metadata, so an unacceptable file is never loaded.
    pub async fn read_for(media_type: MediaType, path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("'{}' does not name a file", path.display()))?;
        let metadata = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("failed to inspect '{}'", path.display()))?;
        check_selection(media_type, &filename, metadata.len())?;

        let file = Self::read(path).await?;
        check_file(media_type, &file)?;
        Ok(file)
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }
}

/// Checks a file against the ceiling and extensions allowed for `media_type`.
pub fn check_file(
    media_type: MediaType,
    file: &MediaFile,
) -> std::result::Result<(), ValidationError> {
    check_selection(media_type, &file.filename, file.size_bytes())
}

fn check_selection(
    media_type: MediaType,
    filename: &str,
    size_bytes: u64,
) -> std::result::Result<(), ValidationError> {
    if !media_type.requires_file() {
        return Err(ValidationError::FileNotAllowed);
    }

    let accepted = media_type.accepted_extensions();
    let extension_ok = Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| accepted.contains(&ext.as_str()));
    if !extension_ok {
        return Err(ValidationError::UnsupportedFileType {
            media_type,
            filename: filename.to_string(),
            accepted: accepted.iter().map(|ext| format!(".{ext}")).collect(),
        });
    }

    let max_bytes = media_type.max_file_bytes();
    if size_bytes > max_bytes {
        return Err(ValidationError::FileTooLarge {
            media_type,
            size_bytes,
            max_bytes,
        });
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadDraft {
    pub media_type: MediaType,
    pub file: Option<MediaFile>,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub date: Option<String>,
    pub uploader_id: UserId,
}

impl UploadDraft {
    pub fn new(media_type: MediaType, uploader_id: UserId) -> Self {
        Self {
            media_type,
            file: None,
            title: String::new(),
            description: None,
            content: None,
            date: None,
            uploader_id,
        }
    }

    /// Enforces a title plus exactly one payload: a file, or journal text.
    pub fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }

        if self.media_type.requires_file() {
            let file = self.file.as_ref().ok_or(ValidationError::MissingFile)?;
            check_file(self.media_type, file)
        } else {
            if self.file.is_some() {
                return Err(ValidationError::FileNotAllowed);
            }
            let has_content = self
                .content
                .as_deref()
                .is_some_and(|content| !content.trim().is_empty());
            if !has_content {
                return Err(ValidationError::MissingJournalContent);
            }
            Ok(())
        }
    }
}

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, draft: &UploadDraft) -> Result<VerificationResult>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommitGate {
    Unverified,
    Allowed,
    Blocked { similarity_label: String },
}

impl CommitGate {
    pub fn from_result(result: &VerificationResult) -> Self {
        if result.blocks_commit() {
            CommitGate::Blocked {
                similarity_label: result.similarity_label(),
            }
        } else {
            CommitGate::Allowed
        }
    }
}

/// Drives one draft from editing through verification to the commit step.
pub struct UploadWorkflow {
    draft: UploadDraft,
    verification: Option<VerificationResult>,
    commit: Arc<CommitStep>,
    display_delay: Duration,
}

impl UploadWorkflow {
    pub fn new(uploader_id: UserId, display_delay: Duration) -> Self {
        Self {
            draft: UploadDraft::new(MediaType::default(), uploader_id),
            verification: None,
            commit: Arc::new(CommitStep::new(display_delay)),
            display_delay,
        }
    }

    pub fn draft(&self) -> &UploadDraft {
        &self.draft
    }

    pub fn verification(&self) -> Option<&VerificationResult> {
        self.verification.as_ref()
    }

    pub fn commit_step(&self) -> Arc<CommitStep> {
        Arc::clone(&self.commit)
    }

    pub fn gate(&self) -> CommitGate {
        self.verification
            .as_ref()
            .map_or(CommitGate::Unverified, CommitGate::from_result)
    }

    pub fn commit_available(&self) -> bool {
        self.gate() == CommitGate::Allowed
    }

    /// True when the verify action may be offered.
    pub fn is_ready_to_verify(&self) -> bool {
        self.draft.validate().is_ok()
    }

    pub fn set_media_type(&mut self, media_type: MediaType) {
        if media_type == self.draft.media_type {
            return;
        }
        self.draft.media_type = media_type;
        self.draft.file = None;
        self.invalidate();
    }

    /// Rejected selections leave the current file and its verification untouched.
    pub fn select_file(&mut self, file: MediaFile) -> Result<()> {
        if let Err(err) = check_file(self.draft.media_type, &file) {
            warn!(
                media_type = %self.draft.media_type,
                filename = %file.filename,
                size_bytes = file.size_bytes(),
                reason = %err,
                "rejected file selection"
            );
            return Err(err.into());
        }
        self.draft.file = Some(file);
        self.invalidate();
        Ok(())
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        let title = title.into();
        if title == self.draft.title {
            return;
        }
        self.draft.title = title;
        // Journal titles are part of what gets verified.
        if self.draft.media_type == MediaType::Journal {
            self.invalidate();
        }
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        let content = Some(content.into());
        if content == self.draft.content {
            return;
        }
        self.draft.content = content;
        if self.draft.media_type == MediaType::Journal {
            self.invalidate();
        }
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.draft.description = description;
    }

    pub fn set_date(&mut self, date: Option<String>) {
        self.draft.date = date;
    }

    /// Throws away the draft and starts over with a fresh commit step.
    pub fn reset(&mut self) {
        let media_type = self.draft.media_type;
        self.draft = UploadDraft::new(media_type, self.draft.uploader_id.clone());
        self.verification = None;
        self.commit = Arc::new(CommitStep::new(self.display_delay));
    }

    pub async fn verify(&mut self, verifier: &dyn Verifier) -> Result<VerificationResult> {
        self.draft.validate()?;

        let result = verifier.verify(&self.draft).await.inspect_err(|err| {
            warn!(media_type = %self.draft.media_type, error = %err, "verification failed");
        })?;

        let gate = CommitGate::from_result(&result);
        match &gate {
            CommitGate::Blocked { similarity_label } => warn!(
                media_type = %self.draft.media_type,
                similarity = %similarity_label,
                matched_record_id = ?result.matched_record_id,
                "duplicate detected; commit blocked"
            ),
            _ => info!(
                media_type = %self.draft.media_type,
                similarity = %result.similarity_label(),
                "verification passed; commit available"
            ),
        }

        self.verification = Some(result.clone());
        Ok(result)
    }

    pub async fn commit<F>(&self, committer: &dyn Committer, on_success: F) -> Result<CommitAttempt>
    where
        F: FnOnce(&CommitResult) + Send,
    {
        match self.gate() {
            CommitGate::Allowed => {}
            CommitGate::Unverified => return Err(ValidationError::NotVerified.into()),
            CommitGate::Blocked { similarity_label } => {
                return Err(ValidationError::DuplicateBlocked { similarity_label }.into())
            }
        }
        Ok(self.commit.trigger(committer, &self.draft, on_success).await)
    }

    fn invalidate(&mut self) {
        if self.verification.take().is_some() {
            info!("draft changed; previous verification discarded");
        }
        if !self.commit.status().is_idle() {
            self.commit = Arc::new(CommitStep::new(self.display_delay));
        }
    }
}

#[cfg(test)]
#[path = "tests/upload_tests.rs"]
mod tests;
