use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error payload emitted by the movie API. Detail endpoints report a plain
/// `error` string; the generic exception handler uses `detail` and echoes
/// the HTTP status code into the body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl ApiError {
    pub fn message(&self) -> &str {
        self.error
            .as_deref()
            .or(self.detail.as_deref())
            .unwrap_or("unspecified api error")
    }
}

#[derive(Debug, Error)]
#[error("api rejected request ({status}): {message}")]
pub struct ApiException {
    pub status: u16,
    pub message: String,
}

impl ApiException {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}
