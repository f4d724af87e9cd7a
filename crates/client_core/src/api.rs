//! HTTP client for the ArtChain API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{MediaRecord, UserId},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{
        ApiEnvelope, CommitResult, GalleryFilters, GalleryPage, LoginRequest, LoginResponse,
        SignupRequest, SignupResponse, VerificationResult,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    commit::Committer,
    error::{ClientError, Result},
    session::Session,
    upload::{MediaFile, UploadDraft, Verifier},
};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_COMMIT_PATH: &str = "/api/blockchain/save";

pub struct ApiClient {
    http: Client,
    base_url: String,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(base_url: &str, session: Arc<Session>) -> Result<Self> {
        let parsed = Url::parse(base_url.trim())
            .map_err(|e| ClientError::Config(format!("invalid API base url '{base_url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::Config(format!(
                "API base url must use http or https, got '{}'",
                parsed.scheme()
            )));
        }
        Ok(Self {
            http: Client::new(),
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn signup(&self, request: &SignupRequest) -> Result<SignupResponse> {
        let response = self
            .send_public(self.http.post(self.endpoint("/api/auth/signup")).json(request))
            .await?;
        decode_envelope(response, "Signup failed").await
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        let response = self
            .send_public(self.http.post(self.endpoint("/api/auth/login")).json(request))
            .await?;
        decode_envelope(response, "Login failed").await
    }

    pub async fn verify_draft(&self, draft: &UploadDraft) -> Result<VerificationResult> {
        let form = verification_form(draft, Utc::now())?;
        let response = self
            .send_authenticated(
                "verify",
                self.http.post(self.endpoint("/api/verify")).multipart(form),
            )
            .await?;
        decode_envelope(response, "Verification failed").await
    }

    pub async fn commit_draft(&self, path: &str, draft: &UploadDraft) -> Result<CommitResult> {
        let form = commit_form(draft)?;
        let response = self
            .send_authenticated("commit", self.http.post(self.endpoint(path)).multipart(form))
            .await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(error_from_body(status, &body, "Blockchain save failed").into());
        }
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
    }

    pub async fn gallery(
        &self,
        page: u32,
        limit: u32,
        filters: &GalleryFilters,
    ) -> Result<GalleryPage> {
        let filters = filters.clone().normalized();
        let response = self
            .send_authenticated(
                "gallery",
                self.http
                    .get(self.endpoint("/api/gallery"))
                    .query(&[("page", page), ("limit", limit)])
                    .query(&filters),
            )
            .await?;
        decode_envelope(response, "Failed to fetch gallery").await
    }

    pub async fn user_uploads(&self, user_id: &UserId) -> Result<Vec<MediaRecord>> {
        let response = self
            .send_authenticated(
                "user_uploads",
                self.http
                    .get(self.endpoint(&format!("/api/users/{}/uploads", user_id.as_str()))),
            )
            .await?;
        decode_envelope(response, "Failed to fetch user uploads").await
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Auth endpoints answer bad credentials with 401 themselves; that must not end the session.
    async fn send_public(&self, request: RequestBuilder) -> Result<Response> {
        Ok(request.send().await?)
    }

    async fn send_authenticated(&self, operation: &str, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).await.send().await?;
        debug!(operation, status = %response.status(), "api response");
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(operation, "api rejected credentials; clearing session");
            // The caller still has to log in again even if the stored copy survives.
            if let Err(err) = self.session.expire().await {
                warn!(operation, error = %err, "failed to clear stored session");
            }
            return Err(ClientError::Unauthorized);
        }
        Ok(response)
    }
}

#[async_trait]
impl Verifier for ApiClient {
    async fn verify(&self, draft: &UploadDraft) -> Result<VerificationResult> {
        self.verify_draft(draft).await
    }
}

/// Saves drafts through the API's persistence endpoint.
pub struct RemoteCommitter {
    api: Arc<ApiClient>,
    path: String,
}

impl RemoteCommitter {
    pub fn new(api: Arc<ApiClient>, path: impl Into<String>) -> Self {
        Self {
            api,
            path: path.into(),
        }
    }
}

#[async_trait]
impl Committer for RemoteCommitter {
    async fn commit(&self, draft: &UploadDraft) -> Result<CommitResult> {
        self.api.commit_draft(&self.path, draft).await
    }
}

async fn decode_envelope<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T> {
    let status = response.status();
    let body = response.bytes().await?;
    if !status.is_success() {
        return Err(error_from_body(status, &body, fallback).into());
    }

    let envelope: ApiEnvelope<serde_json::Value> =
        serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))?;
    if !envelope.success {
        let message = envelope
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| fallback.to_string());
        return Err(ApiException::new(ErrorCode::Validation, message).into());
    }

    let data = envelope
        .data
        .ok_or_else(|| ClientError::Decode("response is missing data".to_string()))?;
    serde_json::from_value(data).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Prefers the server's own message: envelope first, then a bare `ApiError`.
fn error_from_body(status: StatusCode, body: &[u8], fallback: &str) -> ApiException {
    let message = serde_json::from_slice::<ApiEnvelope<serde_json::Value>>(body)
        .ok()
        .and_then(|envelope| envelope.message)
        .or_else(|| {
            serde_json::from_slice::<ApiError>(body)
                .ok()
                .map(|error| error.message)
        })
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| fallback.to_string());
    ApiError::from_status(status.as_u16(), message).into()
}

fn file_part(draft: &UploadDraft, file: &MediaFile) -> Result<Part> {
    let mime = file
        .mime_type
        .clone()
        .or_else(|| {
            file.extension()
                .and_then(|ext| draft.media_type.mime_for_extension(&ext))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(Part::bytes(file.bytes.clone())
        .file_name(file.filename.clone())
        .mime_str(&mime)?)
}

pub(crate) fn verification_form(draft: &UploadDraft, created_at: DateTime<Utc>) -> Result<Form> {
    let mut form = Form::new();
    match &draft.file {
        Some(file) if draft.media_type.requires_file() => {
            form = form.part("file", file_part(draft, file)?);
        }
        _ => {
            form = form
                .text("content", draft.content.clone().unwrap_or_default())
                .text("title", draft.title.clone());
        }
    }
    Ok(form
        .text("uploaderId", draft.uploader_id.0.clone())
        .text("mediaType", draft.media_type.as_str())
        .text("createdAt", created_at.to_rfc3339()))
}

pub(crate) fn commit_form(draft: &UploadDraft) -> Result<Form> {
    let mut form = Form::new();
    if let Some(file) = &draft.file {
        form = form.part("file", file_part(draft, file)?);
    }
    Ok(form
        .text("title", draft.title.clone())
        .text("description", draft.description.clone().unwrap_or_default())
        .text("content", draft.content.clone().unwrap_or_default())
        .text("date", draft.date.clone().unwrap_or_default())
        .text("mediaType", draft.media_type.as_str())
        .text("uploaderId", draft.uploader_id.0.clone()))
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
