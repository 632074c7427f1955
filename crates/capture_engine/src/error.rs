use serde::Serialize;
use thiserror::Error;

use crate::archive::ArchiveError;
use crate::{FailureKind, FetchError};

/// Machine-checkable failure category reported to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    InvalidInput,
    HttpError,
    UnsupportedContentType,
    NetworkError,
    ArchiveError,
    SessionBusyError,
    Stopped,
}

/// Session-level failure of a capture.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("page returned http status {status_code}")]
    Http { status_code: u16 },
    #[error("unsupported content type: {content_type}")]
    UnsupportedContentType { content_type: String },
    #[error("network request failed: {0}")]
    Network(String),
    #[error("archive could not be written: {0}")]
    Archive(String),
    #[error("a capture is already in progress")]
    SessionBusy,
    #[error("capture stopped")]
    Stopped,
}

impl CaptureError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CaptureError::InvalidInput(_) => ErrorKind::InvalidInput,
            CaptureError::Http { .. } => ErrorKind::HttpError,
            CaptureError::UnsupportedContentType { .. } => ErrorKind::UnsupportedContentType,
            CaptureError::Network(_) => ErrorKind::NetworkError,
            CaptureError::Archive(_) => ErrorKind::ArchiveError,
            CaptureError::SessionBusy => ErrorKind::SessionBusyError,
            CaptureError::Stopped => ErrorKind::Stopped,
        }
    }
}

impl From<FetchError> for CaptureError {
    fn from(err: FetchError) -> Self {
        match err.kind {
            FailureKind::InvalidUrl => CaptureError::InvalidInput(err.message),
            FailureKind::HttpStatus(status_code) => CaptureError::Http { status_code },
            FailureKind::UnsupportedContentType { content_type } => {
                CaptureError::UnsupportedContentType { content_type }
            }
            FailureKind::Timeout
            | FailureKind::RedirectLimitExceeded
            | FailureKind::TooLarge { .. }
            | FailureKind::Network => CaptureError::Network(err.to_string()),
        }
    }
}

impl From<ArchiveError> for CaptureError {
    fn from(err: ArchiveError) -> Self {
        CaptureError::Archive(err.to_string())
    }
}
