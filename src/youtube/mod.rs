pub mod client;
#[cfg(test)]
pub mod fake;
pub mod types;

use thiserror::Error;

pub use client::YoutubeClient;
pub use types::{Channel, CommentThread, ListResponse, PlaylistItem, SearchResult, Video};

/// Largest page size the Data API accepts for list endpoints.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Largest page size for `commentThreads.list`.
pub const MAX_COMMENT_PAGE_SIZE: u32 = 100;

#[derive(Error, Debug)]
pub enum YoutubeError {
    #[error("YouTube API key is not set")]
    MissingApiKey,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("rate limited ({reason}): {message}")]
    RateLimited { reason: String, message: String },

    #[error("forbidden ({reason}): {message}")]
    Forbidden { reason: String, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("YouTube API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("could not decode {endpoint} response: {message}")]
    Decode {
        endpoint: &'static str,
        message: String,
    },
}

impl YoutubeError {
    /// Daily quota exhaustion does not recover until the quota resets, so it
    /// is not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            YoutubeError::RateLimited { reason, .. } => {
                !matches!(reason.as_str(), "quotaExceeded" | "dailyLimitExceeded")
            }
            YoutubeError::Api { status, .. } => *status >= 500,
            YoutubeError::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            YoutubeError::RateLimited { reason, .. } | YoutubeError::Forbidden { reason, .. } => {
                Some(reason)
            }
            _ => None,
        }
    }

    /// Short label for metrics and span attributes.
    pub fn kind(&self) -> &'static str {
        match self {
            YoutubeError::MissingApiKey => "missing_api_key",
            YoutubeError::Unauthorized(_) => "unauthorized",
            YoutubeError::RateLimited { .. } => "rate_limit",
            YoutubeError::Forbidden { .. } => "forbidden",
            YoutubeError::NotFound(_) => "not_found",
            YoutubeError::Api { .. } => "api_error",
            YoutubeError::Transport(_) => "network_error",
            YoutubeError::Decode { .. } => "decode_error",
        }
    }
}

pub mod parts {
    pub const SNIPPET: &str = "snippet";
    pub const STATISTICS: &str = "statistics";
    pub const CONTENT_DETAILS: &str = "contentDetails";
    pub const BRANDING_SETTINGS: &str = "brandingSettings";
    pub const TOPIC_DETAILS: &str = "topicDetails";
}

/// Read-only access to the YouTube Data API endpoints the tools need.
///
/// List calls with an empty id slice return an empty response without
/// touching the network.
#[async_trait::async_trait]
pub trait YoutubeApi: Send + Sync {
    async fn list_channels(
        &self,
        ids: &[String],
        parts: &[&str],
    ) -> Result<ListResponse<Channel>, YoutubeError>;

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ListResponse<PlaylistItem>, YoutubeError>;

    async fn list_videos(
        &self,
        ids: &[String],
        parts: &[&str],
    ) -> Result<ListResponse<Video>, YoutubeError>;

    async fn search_channels(
        &self,
        query: &str,
        max_results: u32,
        relevance_language: &str,
    ) -> Result<ListResponse<SearchResult>, YoutubeError>;

    async fn list_comment_threads(
        &self,
        video_id: &str,
        max_results: u32,
    ) -> Result<ListResponse<CommentThread>, YoutubeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        let rate = YoutubeError::RateLimited {
            reason: "rateLimitExceeded".into(),
            message: "slow down".into(),
        };
        assert!(rate.is_retryable());

        let quota = YoutubeError::RateLimited {
            reason: "quotaExceeded".into(),
            message: "daily quota".into(),
        };
        assert!(!quota.is_retryable());

        assert!(YoutubeError::Api { status: 503, message: "backend".into() }.is_retryable());
        assert!(!YoutubeError::Api { status: 400, message: "bad".into() }.is_retryable());
        assert!(!YoutubeError::MissingApiKey.is_retryable());
        assert!(!YoutubeError::NotFound("gone".into()).is_retryable());
    }

    #[test]
    fn test_reason_and_kind() {
        let err = YoutubeError::Forbidden {
            reason: "commentsDisabled".into(),
            message: "disabled".into(),
        };
        assert_eq!(err.reason(), Some("commentsDisabled"));
        assert_eq!(err.kind(), "forbidden");
        assert_eq!(YoutubeError::MissingApiKey.reason(), None);
        assert_eq!(YoutubeError::MissingApiKey.kind(), "missing_api_key");
    }
}
