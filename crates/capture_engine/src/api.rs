//! JSON envelope facade for shells that exchange strings.
//!
//! Every call returns `{"code": u16, "msg": String, "kind"?: ErrorKind, "data"?: T}`.

use serde::Serialize;

use crate::error::ErrorKind;
use crate::handle::CaptureHandle;
use crate::session::StopOutcome;
use crate::CaptureError;

pub const CODE_OK: u16 = 200;
pub const CODE_INVALID_INPUT: u16 = 400;
pub const CODE_BUSY: u16 = 409;
pub const CODE_STOPPED: u16 = 499;
pub const CODE_FAILED: u16 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(msg: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code: CODE_OK,
            msg: msg.into(),
            kind: None,
            data,
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            format!(r#"{{"code":{CODE_FAILED},"msg":"response serialization failed: {err}"}}"#)
        })
    }
}

impl ApiResponse<()> {
    pub fn from_error(err: &CaptureError) -> Self {
        Self {
            code: status_code_for(err),
            msg: err.to_string(),
            kind: Some(err.kind()),
            data: None,
        }
    }
}

pub fn status_code_for(err: &CaptureError) -> u16 {
    match err {
        CaptureError::InvalidInput(_) => CODE_INVALID_INPUT,
        CaptureError::SessionBusy => CODE_BUSY,
        CaptureError::Stopped => CODE_STOPPED,
        CaptureError::Http { .. }
        | CaptureError::UnsupportedContentType { .. }
        | CaptureError::Network(_)
        | CaptureError::Archive(_) => CODE_FAILED,
    }
}

pub fn capture_page_json(handle: &CaptureHandle, url: &str, options_json: &str) -> String {
    match handle.capture_page(url, options_json) {
        Ok(result) => ApiResponse::ok("capture completed", Some(result)).to_json(),
        Err(err) => ApiResponse::from_error(&err).to_json(),
    }
}

pub fn capture_progress_json(handle: &CaptureHandle) -> String {
    ApiResponse::ok("success", Some(handle.get_capture_progress())).to_json()
}

pub fn stop_capture_json(handle: &CaptureHandle) -> String {
    let msg = match handle.stop_capture() {
        StopOutcome::Requested => "stop requested",
        StopOutcome::NothingToStop => "no capture in progress",
    };
    ApiResponse::<()>::ok(msg, None).to_json()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_envelope_carries_code_and_kind() {
        let value: serde_json::Value =
            serde_json::from_str(&ApiResponse::from_error(&CaptureError::SessionBusy).to_json())
                .unwrap();
        assert_eq!(
            value,
            json!({
                "code": 409,
                "msg": "a capture is already in progress",
                "kind": "sessionBusyError"
            })
        );
    }

    #[test]
    fn codes_follow_error_class() {
        assert_eq!(status_code_for(&CaptureError::InvalidInput("x".into())), 400);
        assert_eq!(status_code_for(&CaptureError::Stopped), 499);
        assert_eq!(status_code_for(&CaptureError::Http { status_code: 404 }), 500);
        assert_eq!(status_code_for(&CaptureError::Archive("disk".into())), 500);
    }
}
