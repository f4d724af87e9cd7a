//! One handler per subcommand, sharing the wired-up client stack.

use std::sync::Arc;

use anyhow::{Context, Result};
use client_core::{
    ApiClient, AuthService, ClientError, CommitGate, CommitStatus, Committer, LocalAuthService,
    LoginForm, MediaFile, PlaceholderCommitter, RemoteAuthService, RemoteCommitter, Session,
    SessionEvent, SignupForm, UploadStats, UploadWorkflow, ValidationError,
};
use shared::{
    domain::{MediaRecord, MediaType},
    protocol::{GalleryFilters, VerificationResult},
};
use storage::Storage;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info};

use crate::{
    config::{CommitMode, Settings},
    DraftArgs, GalleryArgs,
};

pub struct App {
    session: Arc<Session>,
    api: Arc<ApiClient>,
    auth: Box<dyn AuthService>,
    committer: Box<dyn Committer>,
    settings: Settings,
    session_events: broadcast::Receiver<SessionEvent>,
}

impl App {
    pub async fn connect(settings: &Settings, local_auth: bool) -> Result<Self> {
        let storage = Storage::new(&settings.database_url)
            .await
            .with_context(|| format!("failed to open {}", settings.database_url))?;
        storage.health_check().await?;
        let session = Session::restore(Arc::new(storage.clone())).await?;
        let session_events = session.subscribe();
        let api = Arc::new(ApiClient::new(&settings.api_base_url, Arc::clone(&session))?);

        let auth: Box<dyn AuthService> = if local_auth {
            Box::new(LocalAuthService::new(storage, Arc::clone(&session)))
        } else {
            Box::new(RemoteAuthService::new(Arc::clone(&api)))
        };
        let committer: Box<dyn Committer> = match settings.commit_mode {
            CommitMode::Placeholder => Box::new(PlaceholderCommitter::new(settings.commit_delay())),
            CommitMode::Remote => Box::new(RemoteCommitter::new(
                Arc::clone(&api),
                settings.commit_path.clone(),
            )),
        };
        info!(
            api_base_url = %api.base_url(),
            commit_mode = ?settings.commit_mode,
            local_auth,
            "client ready"
        );

        Ok(Self {
            session,
            api,
            auth,
            committer,
            settings: settings.clone(),
            session_events,
        })
    }

    /// Drains session events and reports whether the API ended the session.
    pub fn session_expired(&mut self) -> bool {
        let mut expired = false;
        loop {
            match self.session_events.try_recv() {
                Ok(SessionEvent::LoginRequired) => expired = true,
                Ok(event) => debug!(?event, "session event"),
                Err(TryRecvError::Lagged(skipped)) => debug!(skipped, "session events lagged"),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return expired,
            }
        }
    }

    pub async fn signup(
        &self,
        username: String,
        email: String,
        password: String,
        confirm_password: String,
    ) -> Result<()> {
        let response = self
            .auth
            .signup(&SignupForm {
                username,
                email,
                password,
                confirm_password,
            })
            .await?;
        println!("{}", response.message);
        if response.requires_login {
            println!("Log in with `artchain login` to continue.");
        }
        Ok(())
    }

    pub async fn login(&self, email: String, password: String) -> Result<()> {
        if self.session.is_authenticated().await {
            info!("already signed in; the new login replaces the stored session");
        }
        let user = self.auth.login(&LoginForm { email, password }).await?;
        println!("Logged in as {} <{}>", user.username, user.email);
        Ok(())
    }

    pub async fn logout(&self) -> Result<()> {
        self.auth.logout().await?;
        println!("Logged out.");
        Ok(())
    }

    pub async fn whoami(&self) -> Result<()> {
        let user = self.session.require_user().await?;
        println!("{} <{}> id={}", user.username, user.email, user.id);
        Ok(())
    }

    pub async fn verify(&self, args: &DraftArgs) -> Result<()> {
        let mut flow = self.prepare(args).await?;
        let result = flow.verify(&*self.api).await?;
        print_verdict(&result, &flow.gate());
        Ok(())
    }

    pub async fn upload(&self, args: &DraftArgs) -> Result<()> {
        let mut flow = self.prepare(args).await?;
        let result = flow.verify(&*self.api).await?;
        let gate = flow.gate();
        print_verdict(&result, &gate);
        if let CommitGate::Blocked { similarity_label } = gate {
            let blocked = ValidationError::DuplicateBlocked { similarity_label };
            return Err(ClientError::from(blocked).into());
        }

        let mut status_rx = flow.commit_step().subscribe();
        let progress = tokio::spawn(async move {
            while status_rx.changed().await.is_ok() {
                let status = status_rx.borrow_and_update().clone();
                if let Some(badge) = status.badge() {
                    println!("[{badge}] {}", status.label());
                }
                if matches!(status, CommitStatus::Success(_) | CommitStatus::Error(_)) {
                    break;
                }
            }
        });

        let attempt = flow
            .commit(self.committer.as_ref(), |result| {
                println!("Saved. Transaction {}", result.transaction_hash);
                println!("Record id {}", result.record_id);
            })
            .await?;
        // Closing the step ends the progress task once it has seen the last status.
        drop(flow);
        let _ = progress.await;

        match attempt.status() {
            CommitStatus::Error(message) => anyhow::bail!("Save failed: {message}"),
            _ => Ok(()),
        }
    }

    pub async fn gallery(&self, args: &GalleryArgs) -> Result<()> {
        let filters = GalleryFilters {
            media_type: args.media_type,
            date_from: args.date_from.clone(),
            date_to: args.date_to.clone(),
            uploader: args.uploader.clone(),
            search: args.search.clone(),
        };
        let page = self.api.gallery(args.page, args.limit, &filters).await?;
        for record in &page.items {
            print_record(record);
        }
        println!(
            "Page {} of {} ({} records)",
            page.page,
            page.total_pages(),
            page.total
        );
        Ok(())
    }

    pub async fn uploads(&self) -> Result<()> {
        let user = self.session.require_user().await?;
        let records = self.api.user_uploads(&user.id).await?;
        if records.is_empty() {
            println!("No uploads yet.");
        }
        for record in &records {
            print_record(record);
        }
        Ok(())
    }

    pub async fn stats(&self) -> Result<()> {
        let user = self.session.require_user().await?;
        let records = self.api.user_uploads(&user.id).await?;
        let stats = UploadStats::from_records(&records);
        println!("Total uploads: {}", stats.total);
        println!("Confirmed:     {}", stats.confirmed);
        println!("Pending:       {}", stats.pending);
        println!("Rejected:      {}", stats.rejected);
        for media_type in MediaType::ALL {
            println!("  {:<8} {}", media_type.as_str(), stats.count_for(media_type));
        }
        Ok(())
    }

    async fn prepare(&self, args: &DraftArgs) -> Result<UploadWorkflow> {
        let user = self.session.require_user().await?;
        let mut flow = UploadWorkflow::new(user.id, self.settings.success_display_delay());
        flow.set_media_type(args.media_type);
        flow.set_title(args.title.clone());
        if let Some(content) = &args.content {
            flow.set_content(content.clone());
        }
        flow.set_description(args.description.clone());
        flow.set_date(args.date.clone());
        if let Some(path) = &args.file {
            let file = MediaFile::read_for(args.media_type, path).await?;
            flow.select_file(file)?;
        }
        Ok(flow)
    }
}

fn print_verdict(result: &VerificationResult, gate: &CommitGate) {
    println!("Similarity: {}", result.similarity_label());
    if !result.analysis_summary.is_empty() {
        println!("{}", result.analysis_summary);
    }
    match gate {
        CommitGate::Blocked { similarity_label } => {
            println!("Duplicate detected ({similarity_label}); content cannot be saved.");
            if let Some(matched) = &result.matched_record_id {
                println!("Matches record {matched}");
            }
        }
        _ => println!("Content is original. Ready to save."),
    }
}

fn print_record(record: &MediaRecord) {
    println!(
        "{:<14} {:<8} {:<10} {} by {}",
        record.id.as_str(),
        record.media_type.as_str(),
        record.blockchain_status.as_str(),
        record.title,
        record.uploader
    );
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
