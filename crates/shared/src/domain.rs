use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(RecordId);

const MIB: u64 = 1024 * 1024;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    #[default]
    Photo,
    Video,
    Audio,
    Journal,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [
        MediaType::Photo,
        MediaType::Video,
        MediaType::Audio,
        MediaType::Journal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Photo => "photo",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Journal => "journal",
        }
    }

    /// Largest file accepted for this media type. Journals carry no file.
    pub fn max_file_bytes(self) -> u64 {
        match self {
            MediaType::Photo => 10 * MIB,
            MediaType::Video => 100 * MIB,
            MediaType::Audio => 50 * MIB,
            MediaType::Journal => 0,
        }
    }

    /// Lowercase file extensions (without the dot) the picker accepts.
    pub fn accepted_extensions(self) -> &'static [&'static str] {
        match self {
            MediaType::Photo => &["jpeg", "jpg", "png"],
            MediaType::Video => &["mp4"],
            MediaType::Audio => &["mp3", "mp4"],
            MediaType::Journal => &[],
        }
    }

    pub fn requires_file(self) -> bool {
        !matches!(self, MediaType::Journal)
    }

    pub fn mime_for_extension(self, extension: &str) -> Option<&'static str> {
        let extension = extension.to_ascii_lowercase();
        let mime = match (self, extension.as_str()) {
            (MediaType::Photo, "jpeg" | "jpg") => "image/jpeg",
            (MediaType::Photo, "png") => "image/png",
            (MediaType::Video, "mp4") => "video/mp4",
            (MediaType::Audio, "mp3") => "audio/mpeg",
            (MediaType::Audio, "mp4") => "audio/mp4",
            _ => return None,
        };
        Some(mime)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMediaType(pub String);

impl fmt::Display for UnknownMediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown media type '{}' (expected photo, video, audio or journal)",
            self.0
        )
    }
}

impl std::error::Error for UnknownMediaType {}

impl FromStr for MediaType {
    type Err = UnknownMediaType;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        MediaType::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| UnknownMediaType(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockchainStatus {
    Pending,
    Confirmed,
    Rejected,
}

impl BlockchainStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BlockchainStatus::Pending => "PENDING",
            BlockchainStatus::Confirmed => "CONFIRMED",
            BlockchainStatus::Rejected => "REJECTED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// A gallery entry as the API lists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub uploader: String,
    pub uploader_id: UserId,
    pub created_at: DateTime<Utc>,
    pub blockchain_status: BlockchainStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
