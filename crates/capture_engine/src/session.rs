use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use capture_core::{CaptureOptions, Effect, FileEntry, Msg, OptionWarning, ProgressInfo};
use capture_logging::{capture_debug, capture_error, capture_info, capture_warn};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::archive::{package, ArchiveRequest};
use crate::coordinator::{DownloadCoordinator, DownloadJob, EntrySink};
use crate::decode::decode_html;
use crate::extract::{Extractor, HtmlResourceExtractor};
use crate::fetch::{FetchSettings, Fetcher, ReqwestFetcher, DEFAULT_USER_AGENT};
use crate::filename::LocalPathAllocator;
use crate::tracker::{ProgressObserver, ProgressTracker};
use crate::{CaptureError, FetchError, FetchOutput, ResourceClass};

/// Source of "now" for archive names and the manifest timestamp.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub const DEFAULT_CONCURRENCY: usize = 8;
pub const DEFAULT_REDIRECT_LIMIT: usize = 10;
pub const DEFAULT_MAX_RESOURCE_BYTES: u64 = 25 * 1024 * 1024;

/// Engine-wide settings that do not change between sessions.
#[derive(Clone)]
pub struct EngineConfig {
    pub output_dir: PathBuf,
    /// Download workers per session; at least one is used.
    pub concurrency: usize,
    pub redirect_limit: usize,
    pub max_resource_bytes: u64,
    pub user_agent: String,
    pub clock: Clock,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("sitebackup"),
            concurrency: DEFAULT_CONCURRENCY,
            redirect_limit: DEFAULT_REDIRECT_LIMIT,
            max_resource_bytes: DEFAULT_MAX_RESOURCE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            clock: Arc::new(Utc::now),
        }
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("output_dir", &self.output_dir)
            .field("concurrency", &self.concurrency)
            .field("redirect_limit", &self.redirect_limit)
            .field("max_resource_bytes", &self.max_resource_bytes)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

impl EngineConfig {
    /// Request settings for one session: `timeoutSeconds` bounds both the
    /// connect phase and the whole request.
    pub fn fetch_settings(&self, options: &CaptureOptions) -> FetchSettings {
        let timeout = Duration::from_secs(options.timeout_seconds);
        FetchSettings {
            connect_timeout: timeout,
            request_timeout: timeout,
            follow_redirects: options.follow_redirects,
            redirect_limit: self.redirect_limit,
            max_bytes: self.max_resource_bytes,
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Outcome of a completed session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureResult {
    pub status_code: u16,
    /// Size of the main page body as received.
    pub content_length: u64,
    pub duration_millis: u64,
    /// The rewritten page, identical to `index.html` in the archive.
    pub content: String,
    pub archive_path: String,
    pub file_list: Vec<FileEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopOutcome {
    /// The running session will end `stopped`.
    Requested,
    NothingToStop,
}

/// Capture Session Controller. Owns the progress state and the cancellation
/// token of the one session allowed to run at a time.
pub struct CaptureService {
    config: EngineConfig,
    tracker: Arc<ProgressTracker>,
    active: Mutex<Option<CancellationToken>>,
    extractor: HtmlResourceExtractor,
}

impl CaptureService {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            tracker: Arc::new(ProgressTracker::new()),
            active: Mutex::new(None),
            extractor: HtmlResourceExtractor,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_progress_observer(&self, observer: Option<Arc<dyn ProgressObserver>>) {
        self.tracker.set_observer(observer);
    }

    /// Snapshot of the current (or last) session; an idle snapshot before
    /// the first capture.
    pub fn get_capture_progress(&self) -> ProgressInfo {
        self.tracker.snapshot()
    }

    /// Ask the running session to stop. Workers stop claiming entries, the
    /// downloads in flight drain, and the session ends `stopped`.
    pub fn stop_capture(&self) -> StopOutcome {
        // Cloned so observers run by `apply` never execute under this lock.
        let active = lock(&self.active).clone();
        let Some(token) = active else {
            capture_debug!("stop requested while idle");
            return StopOutcome::NothingToStop;
        };
        let effects = self.tracker.apply(Msg::StopRequested);
        if effects.contains(&Effect::SignalStop) {
            capture_info!("stop requested");
            token.cancel();
            StopOutcome::Requested
        } else if token.is_cancelled() {
            StopOutcome::Requested
        } else {
            StopOutcome::NothingToStop
        }
    }

    /// Run one capture to a terminal phase.
    ///
    /// `options_json` is parsed leniently; see [`CaptureOptions::from_json`].
    pub async fn capture_page(
        &self,
        url: &str,
        options_json: &str,
    ) -> Result<CaptureResult, CaptureError> {
        let page_url = parse_target_url(url)?;
        let options = parse_options(options_json);

        let guard = self.begin(&page_url)?;
        capture_info!(
            "capture of {} started (images={}, styles={}, scripts={}, redirects={}, timeout={}s, max_files={})",
            page_url,
            options.include_images,
            options.include_styles,
            options.include_scripts,
            options.follow_redirects,
            options.timeout_seconds,
            options.max_files
        );

        let started = Instant::now();
        let outcome = self.run(&page_url, &options, guard.token(), started).await;
        match &outcome {
            Ok(result) => {
                let counts = self.tracker.snapshot().status_counts();
                capture_info!(
                    "capture of {} completed in {} ms: {} resources stored, {} failed",
                    page_url,
                    result.duration_millis,
                    counts.completed,
                    counts.failed
                );
            }
            Err(CaptureError::Stopped) => {
                self.tracker.apply(Msg::StopSettled);
                capture_info!("capture of {} stopped", page_url);
            }
            Err(err) => {
                self.tracker.apply(Msg::Failed {
                    message: err.to_string(),
                });
                capture_error!("capture of {} failed: {}", page_url, err);
            }
        }
        outcome
    }

    fn begin(&self, page_url: &Url) -> Result<SessionGuard<'_>, CaptureError> {
        let token = {
            let mut active = lock(&self.active);
            if active.is_some() {
                capture_warn!("capture of {} rejected: another capture is running", page_url);
                return Err(CaptureError::SessionBusy);
            }
            let token = CancellationToken::new();
            *active = Some(token.clone());
            token
        };
        let guard = SessionGuard {
            service: self,
            token,
        };
        // Observers may call back into the service; never run them under `active`.
        self.tracker.apply(Msg::CaptureStarted {
            url: page_url.to_string(),
        });
        Ok(guard)
    }

    async fn run(
        &self,
        page_url: &Url,
        options: &CaptureOptions,
        stop: &CancellationToken,
        started: Instant,
    ) -> Result<CaptureResult, CaptureError> {
        let fetcher: Arc<dyn Fetcher> =
            Arc::new(ReqwestFetcher::new(self.config.fetch_settings(options))?);

        let page = fetcher.fetch(page_url.as_str(), ResourceClass::Document).await;
        if stop.is_cancelled() {
            return Err(CaptureError::Stopped);
        }
        let page = page?;
        let final_url = Url::parse(&page.metadata.final_url).unwrap_or_else(|_| page_url.clone());
        let decoded = decode_html(&page.bytes, page.metadata.content_type.as_deref());
        if decoded.had_errors {
            capture_debug!(
                "page decoded as {} with replacement characters",
                decoded.encoding_label
            );
        }

        let extraction = self.extractor.extract(&decoded.html, &final_url, options);
        if extraction.truncated > 0 {
            capture_warn!(
                "{} resources beyond max_files={} were skipped",
                extraction.truncated,
                options.max_files
            );
        }
        let mut paths = LocalPathAllocator::new();
        let entries: Vec<FileEntry> = extraction
            .resources
            .iter()
            .map(|resource| {
                let local_path = paths.allocate(&resource.url, resource.kind);
                FileEntry::pending(resource.url.clone(), local_path, resource.kind)
            })
            .collect();
        let jobs: Vec<DownloadJob> = entries
            .iter()
            .enumerate()
            .map(|(index, entry)| DownloadJob {
                index,
                url: entry.url.clone(),
                class: entry.kind.into(),
            })
            .collect();
        capture_info!("discovered {} resources on {}", entries.len(), final_url);

        if !self.tracker.try_apply(Msg::ResourcesDiscovered(entries)) {
            return Err(CaptureError::Stopped);
        }

        let sink = Arc::new(SessionSink::new(self.tracker.clone()));
        DownloadCoordinator::new(fetcher)
            .run(jobs, self.config.concurrency, stop.clone(), sink.clone())
            .await;
        if stop.is_cancelled() {
            return Err(CaptureError::Stopped);
        }
        if !self.tracker.try_apply(Msg::DownloadsSettled) {
            return Err(CaptureError::Stopped);
        }

        let entries = self.tracker.with_state(|state| state.entries().to_vec());
        let bodies = sink.take_bodies();
        let output_dir = self.config.output_dir.clone();
        let captured_at = (self.config.clock)();
        let source_url = page_url.to_string();
        let base_url = extraction.base_url;
        let archive_final_url = final_url.clone();
        let html = decoded.html;
        let status_code = page.metadata.status_code;

        let packaged = tokio::task::spawn_blocking(move || {
            package(
                &ArchiveRequest {
                    source_url: &source_url,
                    final_url: &archive_final_url,
                    base_url: &base_url,
                    status_code,
                    html: &html,
                    entries: &entries,
                    bodies: &bodies,
                    captured_at,
                },
                &output_dir,
            )
        })
        .await
        .map_err(|err| CaptureError::Archive(format!("archive task failed: {err}")))??;

        let archive_path = packaged.path.to_string_lossy().into_owned();
        if stop.is_cancelled()
            || !self.tracker.try_apply(Msg::ArchiveWritten {
                path: archive_path.clone(),
            })
        {
            discard_archive(&packaged.path);
            return Err(CaptureError::Stopped);
        }

        Ok(CaptureResult {
            status_code,
            content_length: page.metadata.byte_len,
            duration_millis: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            content: packaged.html,
            archive_path,
            file_list: self.tracker.with_state(|state| state.entries().to_vec()),
        })
    }
}

/// Clears the active slot when a session ends, however it ends. A session
/// abandoned mid-flight (its future dropped) is closed as failed.
struct SessionGuard<'a> {
    service: &'a CaptureService,
    token: CancellationToken,
}

impl SessionGuard<'_> {
    fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        if self.service.tracker.phase().is_active() {
            self.service.tracker.apply(Msg::Failed {
                message: "capture abandoned".to_string(),
            });
        }
        self.token.cancel();
        *lock(&self.service.active) = None;
    }
}

/// Feeds worker transitions into the tracker and keeps the downloaded bodies
/// for the archiver.
struct SessionSink {
    tracker: Arc<ProgressTracker>,
    bodies: Mutex<HashMap<usize, Bytes>>,
}

impl SessionSink {
    fn new(tracker: Arc<ProgressTracker>) -> Self {
        Self {
            tracker,
            bodies: Mutex::new(HashMap::new()),
        }
    }

    fn take_bodies(&self) -> HashMap<usize, Bytes> {
        std::mem::take(&mut *lock(&self.bodies))
    }
}

impl EntrySink for SessionSink {
    fn claim(&self, index: usize) -> bool {
        self.tracker.try_apply(Msg::EntryClaimed { index })
    }

    fn completed(&self, index: usize, output: FetchOutput) {
        let size_bytes = output.metadata.byte_len;
        lock(&self.bodies).insert(index, output.bytes);
        self.tracker.apply(Msg::EntryCompleted { index, size_bytes });
    }

    fn failed(&self, index: usize, error: FetchError) {
        capture_warn!("resource #{} failed: {}", index, error);
        self.tracker.apply(Msg::EntryFailed {
            index,
            error: error.to_string(),
        });
    }
}

/// Accepts `http(s)://...` or a bare host, which gets `https://`.
pub fn parse_target_url(raw: &str) -> Result<Url, CaptureError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CaptureError::InvalidInput("url is empty".to_string()));
    }
    let lowered = trimmed.to_ascii_lowercase();
    let candidate = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else if trimmed.contains("://") {
        return Err(CaptureError::InvalidInput(format!(
            "unsupported url scheme: {trimmed}"
        )));
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate)
        .map_err(|err| CaptureError::InvalidInput(format!("invalid url {trimmed}: {err}")))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(CaptureError::InvalidInput(format!(
            "url has no host: {trimmed}"
        )));
    }
    Ok(url)
}

fn parse_options(raw: &str) -> CaptureOptions {
    let parsed = CaptureOptions::from_json(raw);
    for warning in &parsed.warnings {
        match warning {
            OptionWarning::UnknownField(_) => capture_debug!("{}", warning),
            _ => capture_warn!("{}", warning),
        }
    }
    parsed.options
}

fn discard_archive(path: &std::path::Path) {
    if let Err(err) = std::fs::remove_file(path) {
        capture_warn!("could not remove archive {}: {}", path.display(), err);
    } else {
        capture_debug!("removed archive {} of stopped capture", path.display());
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
