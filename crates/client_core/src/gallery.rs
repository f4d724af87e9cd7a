//! Aggregates shown on the dashboard for a user's uploads.

use std::collections::BTreeMap;

use shared::domain::{BlockchainStatus, MediaRecord, MediaType};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadStats {
    pub total: usize,
    pub confirmed: usize,
    pub pending: usize,
    pub rejected: usize,
    pub by_media_type: BTreeMap<MediaType, usize>,
}

impl UploadStats {
    pub fn from_records(records: &[MediaRecord]) -> Self {
        let mut stats = Self {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record.blockchain_status {
                BlockchainStatus::Confirmed => stats.confirmed += 1,
                BlockchainStatus::Pending => stats.pending += 1,
                BlockchainStatus::Rejected => stats.rejected += 1,
            }
            *stats.by_media_type.entry(record.media_type).or_default() += 1;
        }
        stats
    }

    pub fn count_for(&self, media_type: MediaType) -> usize {
        self.by_media_type.get(&media_type).copied().unwrap_or(0)
    }
}
