use super::*;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use shared::{
    domain::{MediaType, UserId},
    error::{ApiException, ErrorCode},
};
use tokio::sync::{oneshot, Mutex};

use crate::{error::ClientError, upload::MediaFile};

fn draft() -> UploadDraft {
    let mut draft = UploadDraft::new(MediaType::Photo, UserId("u-1".into()));
    draft.title = "Sunset".into();
    draft.file = Some(MediaFile::new("sunset.png", vec![1, 2, 3]));
    draft
}

fn sample_result() -> CommitResult {
    CommitResult {
        transaction_hash: format!("0x{}", "0f".repeat(32)),
        record_id: RecordId("art_sample001".into()),
    }
}

/// Answers from a script, one entry per call.
struct ScriptedCommitter {
    outcomes: Mutex<Vec<std::result::Result<CommitResult, String>>>,
    calls: AtomicUsize,
}

impl ScriptedCommitter {
    fn new(outcomes: Vec<std::result::Result<CommitResult, String>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Committer for ScriptedCommitter {
    async fn commit(&self, _draft: &UploadDraft) -> Result<CommitResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.outcomes.lock().await.remove(0);
        next.map_err(|message| ApiException::new(ErrorCode::Internal, message).into())
    }
}

/// Holds every commit open until released.
struct GatedCommitter {
    release: Mutex<Option<oneshot::Receiver<()>>>,
    calls: AtomicUsize,
}

#[async_trait]
impl Committer for GatedCommitter {
    async fn commit(&self, _draft: &UploadDraft) -> Result<CommitResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let release = self.release.lock().await.take();
        if let Some(release) = release {
            let _ = release.await;
        }
        Ok(sample_result())
    }
}

#[test]
fn transition_table() {
    let result = sample_result();
    assert_eq!(
        transition(&CommitStatus::Idle, CommitEvent::Trigger),
        Some(CommitStatus::Saving)
    );
    assert_eq!(transition(&CommitStatus::Saving, CommitEvent::Trigger), None);
    assert_eq!(
        transition(&CommitStatus::Saving, CommitEvent::Resolved(result.clone())),
        Some(CommitStatus::Success(result.clone()))
    );
    assert_eq!(
        transition(&CommitStatus::Saving, CommitEvent::Rejected("boom".into())),
        Some(CommitStatus::Error("boom".into()))
    );
    assert_eq!(
        transition(&CommitStatus::Success(result.clone()), CommitEvent::Trigger),
        None
    );
    assert_eq!(
        transition(&CommitStatus::Error("boom".into()), CommitEvent::Trigger),
        Some(CommitStatus::Saving)
    );
    assert_eq!(
        transition(&CommitStatus::Idle, CommitEvent::Resolved(result)),
        None
    );
}

#[test]
fn badges_follow_status() {
    assert_eq!(CommitStatus::Idle.badge(), None);
    assert_eq!(CommitStatus::Saving.badge(), Some("PENDING"));
    assert_eq!(CommitStatus::Success(sample_result()).badge(), Some("CONFIRMED"));
    assert_eq!(CommitStatus::Error("x".into()).badge(), Some("REJECTED"));
    assert!(CommitStatus::Saving.is_locked());
    assert!(!CommitStatus::Error("x".into()).is_locked());
}

#[tokio::test]
async fn success_notifies_after_display_delay_and_is_terminal() {
    let step = CommitStep::new(Duration::from_millis(20));
    let committer = ScriptedCommitter::new(vec![Ok(sample_result())]);
    let notified = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&notified);
    let attempt = step
        .trigger(&committer, &draft(), move |result| {
            assert_eq!(result.record_id.as_str(), "art_sample001");
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .await;
    assert_eq!(
        attempt,
        CommitAttempt::Finished(CommitStatus::Success(sample_result()))
    );
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    let again = step.trigger(&committer, &draft(), |_| {}).await;
    assert!(matches!(again, CommitAttempt::Ignored(CommitStatus::Success(_))));
    assert_eq!(committer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failure_records_message_and_allows_manual_retry() {
    let step = CommitStep::new(Duration::ZERO);
    let committer = ScriptedCommitter::new(vec![
        Err("ledger unavailable".into()),
        Ok(sample_result()),
    ]);

    let first = step.trigger(&committer, &draft(), |_| {}).await;
    assert_eq!(
        first.status(),
        &CommitStatus::Error("ledger unavailable".into())
    );

    let second = step.trigger(&committer, &draft(), |_| {}).await;
    assert_eq!(second.status(), &CommitStatus::Success(sample_result()));
    assert_eq!(committer.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn trigger_while_saving_is_ignored() {
    let step = Arc::new(CommitStep::new(Duration::ZERO));
    let (release_tx, release_rx) = oneshot::channel();
    let committer = Arc::new(GatedCommitter {
        release: Mutex::new(Some(release_rx)),
        calls: AtomicUsize::new(0),
    });
    let mut status_rx = step.subscribe();

    let in_flight = {
        let step = Arc::clone(&step);
        let committer = Arc::clone(&committer);
        tokio::spawn(async move { step.trigger(committer.as_ref(), &draft(), |_| {}).await })
    };

    status_rx
        .wait_for(|status| *status == CommitStatus::Saving)
        .await
        .expect("saving observed");

    let duplicate = step.trigger(committer.as_ref(), &draft(), |_| {}).await;
    assert_eq!(duplicate, CommitAttempt::Ignored(CommitStatus::Saving));

    release_tx.send(()).expect("release");
    let finished = in_flight.await.expect("join");
    assert_eq!(finished.status(), &CommitStatus::Success(sample_result()));
    assert_eq!(committer.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn placeholder_committer_invents_hash_and_record_id() {
    let committer = PlaceholderCommitter::new(Duration::from_millis(5));
    let result = committer.commit(&draft()).await.expect("placeholder commit");

    let hash = result
        .transaction_hash
        .strip_prefix("0x")
        .expect("0x prefix");
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let suffix = result.record_id.as_str().strip_prefix("art_").expect("art_ prefix");
    assert_eq!(suffix.len(), 9);
    assert!(suffix
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
}

#[test]
fn placeholder_results_differ() {
    assert_ne!(placeholder_commit_result(), placeholder_commit_result());
}

#[test]
fn rejection_message_comes_from_user_message() {
    let err: ClientError = ApiException::new(ErrorCode::Internal, "ledger unavailable").into();
    assert_eq!(err.user_message(), "ledger unavailable");
}
