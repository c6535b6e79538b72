use std::time::{Duration, Instant};

use opentelemetry::KeyValue;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::Instrument;

use super::types::{Channel, CommentThread, ListResponse, PlaylistItem, SearchResult, Video};
use super::{MAX_COMMENT_PAGE_SIZE, MAX_PAGE_SIZE, YoutubeApi, YoutubeError};
use crate::backoff;
use crate::config::Config;
use crate::telemetry::metrics::{
    YOUTUBE_API_DURATION, YOUTUBE_API_REQUESTS, YOUTUBE_API_RETRY_COUNT, YOUTUBE_QUOTA_UNITS,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// `reqwest` implementation of [`YoutubeApi`].
///
/// The API key travels in the `x-goog-api-key` header so it never shows up in
/// URLs, logs or transport error messages.
pub struct YoutubeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    max_retries: u32,
    retry_base_delay: Duration,
}

impl YoutubeClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.youtube_timeout_secs))
            .user_agent(concat!("youtube-analytics-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.youtube_api_base_url.clone(),
            api_key: config.youtube_api_key.clone(),
            max_retries: config.youtube_max_retries.max(1),
            retry_base_delay: Duration::from_secs(1),
        })
    }

    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, String)],
    ) -> Result<T, YoutubeError> {
        let mut last_err = None;

        for attempt in 0..self.max_retries {
            match self.get_once(endpoint, params).await {
                Ok(resp) => return Ok(resp),
                Err(err) if err.is_retryable() && attempt + 1 < self.max_retries => {
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        endpoint,
                        error = %err,
                        "YouTube API call failed, retrying"
                    );
                    YOUTUBE_API_RETRY_COUNT.add(1, &[KeyValue::new("youtube.endpoint", endpoint)]);

                    tokio::time::sleep(backoff::delay(self.retry_base_delay, attempt)).await;

                    last_err = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_err.unwrap_or(YoutubeError::Api {
            status: 0,
            message: "all retries exhausted".to_string(),
        }))
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: &[(&str, String)],
    ) -> Result<T, YoutubeError> {
        let api_key = self.api_key.as_deref().ok_or(YoutubeError::MissingApiKey)?;

        let span = tracing::info_span!(
            "youtube.api",
            otel.name = %format!("youtube.api {endpoint}"),
            youtube.endpoint = endpoint,
            youtube.quota_units = quota_cost(endpoint),
            http.response.status_code = tracing::field::Empty,
            otel.status_code = tracing::field::Empty,
            error.type = tracing::field::Empty,
        );

        let start = Instant::now();
        let result = self
            .send(endpoint, api_key, params)
            .instrument(span.clone())
            .await;
        let duration = start.elapsed().as_secs_f64();

        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => {
                span.record("otel.status_code", "ERROR");
                span.record("error.type", err.kind());
                err.kind()
            }
        };

        let attrs = [
            KeyValue::new("youtube.endpoint", endpoint),
            KeyValue::new("outcome", outcome),
        ];
        YOUTUBE_API_REQUESTS.add(1, &attrs);
        YOUTUBE_API_DURATION.record(duration, &attrs);
        YOUTUBE_QUOTA_UNITS.add(quota_cost(endpoint), &[KeyValue::new("youtube.endpoint", endpoint)]);

        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        api_key: &str,
        params: &[(&str, String)],
    ) -> Result<T, YoutubeError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            API_KEY_HEADER,
            HeaderValue::from_str(api_key)
                .map_err(|_| YoutubeError::Unauthorized("API key is not a valid header value".into()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let response = self
            .http
            .get(format!("{}/{}", self.base_url, endpoint))
            .headers(headers)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        tracing::Span::current().record("http.response.status_code", status.as_u16() as i64);
        let body = response.text().await?;

        if !status.is_success() {
            return Err(classify_response(status.as_u16(), &body));
        }

        serde_json::from_str(&body).map_err(|e| YoutubeError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl YoutubeApi for YoutubeClient {
    async fn list_channels(
        &self,
        ids: &[String],
        parts: &[&str],
    ) -> Result<ListResponse<Channel>, YoutubeError> {
        if ids.is_empty() {
            return Ok(ListResponse::default());
        }
        self.get(
            "channels",
            &[
                ("part", parts.join(",")),
                ("id", ids.join(",")),
                ("maxResults", MAX_PAGE_SIZE.to_string()),
            ],
        )
        .await
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ListResponse<PlaylistItem>, YoutubeError> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", max_results.clamp(1, MAX_PAGE_SIZE).to_string()),
        ];
        if let Some(token) = page_token {
            params.push(("pageToken", token.to_string()));
        }
        self.get("playlistItems", &params).await
    }

    async fn list_videos(
        &self,
        ids: &[String],
        parts: &[&str],
    ) -> Result<ListResponse<Video>, YoutubeError> {
        if ids.is_empty() {
            return Ok(ListResponse::default());
        }
        self.get(
            "videos",
            &[("part", parts.join(",")), ("id", ids.join(","))],
        )
        .await
    }

    async fn search_channels(
        &self,
        query: &str,
        max_results: u32,
        relevance_language: &str,
    ) -> Result<ListResponse<SearchResult>, YoutubeError> {
        self.get(
            "search",
            &[
                ("part", "snippet".to_string()),
                ("q", query.to_string()),
                ("type", "channel".to_string()),
                ("maxResults", max_results.clamp(1, MAX_PAGE_SIZE).to_string()),
                ("relevanceLanguage", relevance_language.to_string()),
            ],
        )
        .await
    }

    async fn list_comment_threads(
        &self,
        video_id: &str,
        max_results: u32,
    ) -> Result<ListResponse<CommentThread>, YoutubeError> {
        self.get(
            "commentThreads",
            &[
                ("part", "snippet".to_string()),
                ("videoId", video_id.to_string()),
                ("order", "relevance".to_string()),
                ("textFormat", "plainText".to_string()),
                (
                    "maxResults",
                    max_results.clamp(1, MAX_COMMENT_PAGE_SIZE).to_string(),
                ),
            ],
        )
        .await
    }
}

/// Quota units charged per call, per the Data API cost table.
fn quota_cost(endpoint: &str) -> u64 {
    match endpoint {
        "search" => 100,
        _ => 1,
    }
}

#[derive(Deserialize)]
struct GoogleErrorBody {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<GoogleErrorDetail>,
}

#[derive(Deserialize)]
struct GoogleErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Maps a non-2xx Data API response to a [`YoutubeError`] using the status
/// code and the first `errors[].reason` of the Google error envelope.
pub(crate) fn classify_response(status: u16, body: &str) -> YoutubeError {
    let (message, reason) = match serde_json::from_str::<GoogleErrorBody>(body) {
        Ok(parsed) => {
            let reason = parsed
                .error
                .errors
                .first()
                .map(|d| d.reason.clone())
                .unwrap_or_default();
            (parsed.error.message, reason)
        }
        Err(_) => (body.chars().take(300).collect(), String::new()),
    };

    match (status, reason.as_str()) {
        (429, _) => YoutubeError::RateLimited {
            reason: if reason.is_empty() {
                "rateLimitExceeded".to_string()
            } else {
                reason
            },
            message,
        },
        (403, "quotaExceeded" | "dailyLimitExceeded" | "rateLimitExceeded" | "userRateLimitExceeded") => {
            YoutubeError::RateLimited { reason, message }
        }
        (403, "commentsDisabled") => YoutubeError::Forbidden { reason, message },
        (400, "badRequest") if message.contains("API key") => YoutubeError::Unauthorized(message),
        (400, "keyInvalid" | "keyExpired") | (401, _) | (403, _) => {
            YoutubeError::Unauthorized(message)
        }
        (404, _) => YoutubeError::NotFound(message),
        _ => YoutubeError::Api { status, message },
    }
}
