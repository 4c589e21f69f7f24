use reqwest::StatusCode;
use thiserror::Error;

/// All errors generated while talking to the spread feed.
///
/// The acquisition loop treats every variant alike: the fetch fails, held data is
/// left untouched and no automatic retry is scheduled.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("invalid feed url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(StatusCode),

    #[error("JSON parse failed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FeedError {
    /// Determine if the failure looks like a temporary backend condition.
    ///
    /// Used for diagnostics only.
    pub fn is_transient(&self) -> bool {
        match self {
            FeedError::Transport(error) => error.is_timeout() || error.is_connect(),
            FeedError::Status(status) => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            FeedError::InvalidUrl { .. } | FeedError::Decode(_) => false,
        }
    }
}
