use crate::FileEntry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// A capture was accepted for `url`; any previous terminal session is discarded.
    CaptureStarted { url: String },
    /// Main page fetched and parsed; the file list is fixed from here on.
    ResourcesDiscovered(Vec<FileEntry>),
    /// A worker wants to start downloading entry `index`.
    EntryClaimed { index: usize },
    /// Entry `index` downloaded successfully.
    EntryCompleted { index: usize, size_bytes: u64 },
    /// Entry `index` could not be downloaded.
    EntryFailed { index: usize, error: String },
    /// The worker pool has drained.
    DownloadsSettled,
    /// Archive written at `path`.
    ArchiveWritten { path: String },
    /// Caller asked to stop the running session.
    StopRequested,
    /// In-flight work drained after a stop request.
    StopSettled,
    /// Unrecoverable failure (main page fetch or archive packaging).
    Failed { message: String },
}
