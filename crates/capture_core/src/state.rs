use serde::{Deserialize, Serialize};
use url::Url;

use crate::view_model::ProgressInfo;

/// Coarse stage of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Analyzing,
    Downloading,
    Saving,
    Completed,
    Error,
    Stopped,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Error | Phase::Stopped)
    }

    /// A session is running between `Analyzing` and `Saving` inclusive.
    pub fn is_active(self) -> bool {
        matches!(self, Phase::Analyzing | Phase::Downloading | Phase::Saving)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    #[default]
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl FileStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Stylesheet,
    Script,
    /// Web font referenced from CSS (`@font-face`).
    Font,
}

impl ResourceKind {
    /// Archive directory the kind is grouped under.
    pub fn directory(self) -> &'static str {
        match self {
            ResourceKind::Image => "images",
            ResourceKind::Stylesheet => "css",
            ResourceKind::Script => "js",
            ResourceKind::Font => "fonts",
        }
    }
}

/// One discovered sub-resource and its download lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub url: String,
    pub local_path: String,
    pub kind: ResourceKind,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileEntry {
    pub fn pending(url: impl Into<String>, local_path: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            url: url.into(),
            local_path: local_path.into(),
            kind,
            status: FileStatus::Pending,
            size_bytes: None,
            error: None,
        }
    }
}

/// State of the single capture session owned by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CaptureState {
    phase: Phase,
    target_url: Option<String>,
    entries: Vec<FileEntry>,
    completed_files: usize,
    current_file: Option<String>,
    stop_requested: bool,
    archive_path: Option<String>,
    error_message: Option<String>,
}

impl CaptureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn target_url(&self) -> Option<&str> {
        self.target_url.as_deref()
    }

    pub fn archive_path(&self) -> Option<&str> {
        self.archive_path.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn view(&self) -> ProgressInfo {
        ProgressInfo {
            phase: self.phase,
            total_files: self.entries.len(),
            completed_files: self.completed_files,
            current_file: self.current_file.clone(),
            file_list: self.entries.clone(),
        }
    }

    pub(crate) fn begin(&mut self, url: String) {
        *self = Self {
            phase: Phase::Analyzing,
            target_url: Some(url),
            ..Self::default()
        };
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub(crate) fn set_entries(&mut self, entries: Vec<FileEntry>) {
        // Terminal statuses are counted so a replayed list keeps the invariant.
        self.completed_files = entries.iter().filter(|e| e.status.is_terminal()).count();
        self.entries = entries;
    }

    pub(crate) fn request_stop(&mut self) {
        self.stop_requested = true;
    }

    pub(crate) fn set_archive_path(&mut self, path: String) {
        self.archive_path = Some(path);
    }

    pub(crate) fn set_error(&mut self, message: String) {
        self.error_message = Some(message);
    }

    /// Pending -> downloading. Returns false when the claim is refused.
    pub(crate) fn claim(&mut self, index: usize) -> bool {
        if self.phase != Phase::Downloading || self.stop_requested {
            return false;
        }
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        if entry.status != FileStatus::Pending {
            return false;
        }
        entry.status = FileStatus::Downloading;
        self.current_file = Some(entry.url.clone());
        true
    }

    /// Pending -> downloading without the phase checks, used only to close
    /// entries no worker reached.
    pub(crate) fn claim_for_close(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            if entry.status == FileStatus::Pending {
                entry.status = FileStatus::Downloading;
            }
        }
    }

    /// Downloading -> completed/failed. Terminal entries never change again.
    pub(crate) fn finish(&mut self, index: usize, outcome: Result<u64, String>) -> bool {
        let Some(entry) = self.entries.get_mut(index) else {
            return false;
        };
        if entry.status != FileStatus::Downloading {
            return false;
        }
        match outcome {
            Ok(size) => {
                entry.status = FileStatus::Completed;
                entry.size_bytes = Some(size);
            }
            Err(message) => {
                entry.status = FileStatus::Failed;
                entry.error = Some(message);
            }
        }
        self.completed_files += 1;
        true
    }

    /// Every entry has reached a terminal status.
    pub fn downloads_settled(&self) -> bool {
        self.entries.iter().all(|e| e.status.is_terminal())
    }
}

/// Key used to deduplicate discovered resources: the absolute URL without its
/// fragment. `Url` parsing already lowercases scheme and host and drops
/// default ports.
pub fn normalize_url_for_dedupe(raw: &str) -> Option<String> {
    let mut url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.into())
}
