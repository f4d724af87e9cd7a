use serde::{Deserialize, Serialize};

use crate::domain::{MediaRecord, MediaType, RecordId, User};

/// Similarity above which a flagged duplicate blocks the commit step.
pub const DUPLICATE_SIMILARITY_THRESHOLD: f64 = 0.8;

pub const DEFAULT_GALLERY_PAGE: u32 = 1;
pub const DEFAULT_GALLERY_LIMIT: u32 = 12;

/// Wrapper every `/api/*` response body uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub message: String,
    pub requires_login: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub is_duplicate: bool,
    pub similarity_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_record_id: Option<RecordId>,
    pub analysis_summary: String,
}

impl VerificationResult {
    /// A flagged duplicate only blocks when the similarity is above the threshold.
    pub fn blocks_commit(&self) -> bool {
        self.is_duplicate && self.similarity_score > DUPLICATE_SIMILARITY_THRESHOLD
    }

    pub fn similarity_percent(&self) -> f64 {
        self.similarity_score * 100.0
    }

    pub fn similarity_label(&self) -> String {
        format!("{:.1}% similarity", self.similarity_percent())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitResult {
    pub transaction_hash: String,
    pub record_id: RecordId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

impl GalleryFilters {
    /// Drops filters that hold only whitespace so they are not sent at all.
    pub fn normalized(self) -> Self {
        fn keep(value: Option<String>) -> Option<String> {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        }

        Self {
            media_type: self.media_type,
            date_from: keep(self.date_from),
            date_to: keep(self.date_to),
            uploader: keep(self.uploader),
            search: keep(self.search),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GalleryPage {
    pub items: Vec<MediaRecord>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub has_more: bool,
}

impl GalleryPage {
    pub fn total_pages(&self) -> u64 {
        if self.limit == 0 {
            return 1;
        }
        self.total.div_ceil(u64::from(self.limit)).max(1)
    }
}

#[cfg(test)]
#[path = "tests/protocol_tests.rs"]
mod tests;
