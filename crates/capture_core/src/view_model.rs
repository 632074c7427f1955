use serde::{Deserialize, Serialize};

use crate::{FileEntry, FileStatus, Phase};

/// Snapshot of the active session, used for polling and push notification.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressInfo {
    pub phase: Phase,
    pub total_files: usize,
    pub completed_files: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_file: Option<String>,
    pub file_list: Vec<FileEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub pending: usize,
    pub downloading: usize,
    pub completed: usize,
    pub failed: usize,
}

impl ProgressInfo {
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entry in &self.file_list {
            match entry.status {
                FileStatus::Pending => counts.pending += 1,
                FileStatus::Downloading => counts.downloading += 1,
                FileStatus::Completed => counts.completed += 1,
                FileStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }
}
