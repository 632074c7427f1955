//! Capture engine: fetch, discover, download, rewrite and package one page.
mod api;
mod archive;
mod coordinator;
mod decode;
mod error;
mod extract;
mod fetch;
mod filename;
mod handle;
mod persist;
mod rewrite;
mod session;
mod tracker;
mod types;
mod urls;

pub use api::{
    capture_page_json, capture_progress_json, status_code_for, stop_capture_json, ApiResponse,
    CODE_BUSY, CODE_FAILED, CODE_INVALID_INPUT, CODE_OK, CODE_STOPPED,
};
pub use archive::{archive_stem, package, ArchiveError, ArchiveRequest, PackagedArchive, INDEX_FILE, MANIFEST_FILE};
pub use coordinator::{DownloadCoordinator, DownloadJob, EntrySink};
pub use decode::{decode_html, DecodedHtml};
pub use error::{CaptureError, ErrorKind};
pub use extract::{css_reference_kind, document_base, link_kind, DiscoveredResource, Extraction, Extractor, HtmlResourceExtractor};
pub use fetch::{
    allowed_content_types, is_content_type_allowed, FetchSettings, Fetcher, ReqwestFetcher,
    DEFAULT_USER_AGENT,
};
pub use filename::LocalPathAllocator;
pub use handle::CaptureHandle;
pub use persist::{ensure_output_dir, PersistError, StagedFile};
pub use rewrite::{rewrite_html, rewrite_stylesheet, RewriteError, RewrittenHtml};
pub use session::{
    parse_target_url, CaptureResult, CaptureService, Clock, EngineConfig, StopOutcome,
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RESOURCE_BYTES, DEFAULT_REDIRECT_LIMIT,
};
pub use tracker::{ChannelProgressObserver, ProgressObserver, ProgressTracker};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput, ResourceClass};
pub use urls::{css_urls, parse_srcset, resolve_reference, rewrite_css_urls, rewrite_srcset, SrcsetCandidate};
