// Error types for the detection paths

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use super::utils::truncate_chars;

/// Longest slice of a remote error body kept in an error message
pub const ERROR_BODY_LIMIT: usize = 200;

/// Failures a remote detection attempt can end with.
///
/// None of these ever reach a caller as a raw `Err`: the remote client folds
/// them into a `DetectionResult` with `status=error`, using the `Display`
/// text as the `error` field.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DetectError {
    /// Image path does not exist
    #[error("image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    /// Image exists but could not be read/encoded
    #[error("image encoding failed")]
    ImageEncoding,

    /// Remote configured with an empty credential
    #[error("missing API credential")]
    MissingCredential,

    /// Request exceeded the configured bound
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection, TLS, DNS and friends
    #[error("request failed: {0}")]
    Transport(String),

    /// Non-200 answer from the endpoint
    #[error("remote returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// 200 answer without the expected envelope
    #[error("malformed response")]
    MalformedResponse,

    /// HTTP client could not be constructed
    #[error("client setup failed: {0}")]
    ClientSetup(String),
}

impl DetectError {
    /// Build an HTTP status error, keeping at most `ERROR_BODY_LIMIT` chars of the body
    pub fn http_status(status: u16, body: &str) -> Self {
        Self::HttpStatus {
            status,
            body: truncate_chars(body, ERROR_BODY_LIMIT),
        }
    }

    /// Classify a reqwest failure
    pub fn from_transport(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else {
            Self::Transport(err.to_string())
        }
    }

    /// Short hint for a human reading the failure
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ImageNotFound(_) | Self::ImageEncoding => {
                Some("Check that the image path is correct and readable")
            }
            Self::MissingCredential => Some("Set QWEN_API_KEY to a valid API key"),
            Self::Timeout(_) => Some(
                "The endpoint did not answer in time. Try:\n\
                 1) Check your internet connection\n\
                 2) Raise QWEN_TIMEOUT\n\
                 3) Try again later",
            ),
            Self::Transport(_) => Some(
                "Could not reach the endpoint. Possible causes:\n\
                 1) Network connectivity problems\n\
                 2) Wrong QWEN_BASE_URL or proxy settings\n\
                 3) Server certificate problems",
            ),
            Self::HttpStatus { status: 401, .. } | Self::HttpStatus { status: 403, .. } => {
                Some("The API key is invalid or expired")
            }
            Self::HttpStatus { status: 429, .. } => Some("Rate limited, wait and try again"),
            Self::HttpStatus { .. } | Self::MalformedResponse => {
                Some("The endpoint answered unexpectedly, check the model name and base URL")
            }
            Self::ClientSetup(_) => None,
        }
    }
}
