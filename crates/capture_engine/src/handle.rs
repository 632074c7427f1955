use std::io;
use std::sync::Arc;

use capture_core::ProgressInfo;

use crate::session::{CaptureResult, CaptureService, EngineConfig, StopOutcome};
use crate::tracker::ProgressObserver;
use crate::CaptureError;

/// Blocking facade over [`CaptureService`] for callers without an async
/// runtime. Owns a multi-threaded tokio runtime; every method may be called
/// from any thread, so one thread can block in `capture_page` while others
/// poll progress or stop the capture.
///
/// `capture_page` must not be called from inside another tokio runtime.
pub struct CaptureHandle {
    runtime: tokio::runtime::Runtime,
    service: Arc<CaptureService>,
}

impl CaptureHandle {
    pub fn new(config: EngineConfig) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("capture-worker")
            .build()?;
        Ok(Self {
            runtime,
            service: Arc::new(CaptureService::new(config)),
        })
    }

    pub fn service(&self) -> &Arc<CaptureService> {
        &self.service
    }

    /// Blocks until the session reaches a terminal phase.
    pub fn capture_page(&self, url: &str, options_json: &str) -> Result<CaptureResult, CaptureError> {
        self.runtime
            .block_on(self.service.capture_page(url, options_json))
    }

    pub fn get_capture_progress(&self) -> ProgressInfo {
        self.service.get_capture_progress()
    }

    pub fn stop_capture(&self) -> StopOutcome {
        self.service.stop_capture()
    }

    pub fn set_progress_observer(&self, observer: Option<Arc<dyn ProgressObserver>>) {
        self.service.set_progress_observer(observer);
    }
}
