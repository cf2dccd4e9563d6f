use crate::config::ConfigError;

/// Every failure the fetch subsystem can report to its caller.
///
/// Nothing in this crate retries. Callers own retry and backoff policy and can
/// use [`FetchError::is_cancelled`] to tell "gave up" apart from "errored".
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The network client could not be built (TLS trust material, invalid config).
    #[error("Client construction failed: {0}")]
    ClientConstruction(String),

    #[error("Malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    /// Network, protocol or timeout failure while executing the request.
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Response body exceeds the limit of {limit} bytes")]
    ResponseTooLarge { limit: u64 },

    #[error("Unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },

    /// The request was cancelled, either by the caller or by the engine.
    #[error("Request cancelled")]
    Cancelled,

    #[error("Cannot parse response body: {0}")]
    Parse(#[from] serde_json::Error),
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }

    /// True for failures that happened while the request was on the wire.
    pub fn is_request_failure(&self) -> bool {
        matches!(
            self,
            FetchError::Request(_) | FetchError::ResponseTooLarge { .. } | FetchError::Status { .. }
        )
    }

    /// True when the underlying request failed because a timeout elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Request(e) if e.is_timeout())
    }

    pub(crate) fn malformed(url: impl Into<String>, reason: impl ToString) -> Self {
        FetchError::MalformedUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<ConfigError> for FetchError {
    fn from(e: ConfigError) -> Self {
        FetchError::ClientConstruction(e.to_string())
    }
}
