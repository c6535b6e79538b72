//! The four named tools an agent can call, plus name-based dispatch.
//!
//! Each tool is a stateless async `run` over a [`ToolContext`] returning a
//! typed result that can also `render()` itself as a plain-text report.

pub mod competitors;
pub mod demographics;
pub mod performance;
pub mod text;
pub mod videos;

use std::time::Instant;

use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::telemetry::metrics::{TOOL_INVOCATION_DURATION, TOOL_INVOCATIONS};
use crate::youtube::YoutubeApi;

pub use competitors::{CompetitorReport, CompetitorSearchParams};
pub use demographics::{ChannelDemographics, ChannelDemographicsParams};
pub use performance::{VideoPerformance, VideoPerformanceParams};
pub use videos::{ChannelVideos, SortBy, VideoFetchingParams};

/// Everything a tool needs besides its own arguments.
#[derive(Clone, Copy)]
pub struct ToolContext<'a> {
    pub api: &'a dyn YoutubeApi,
    pub oauth_credentials: Option<&'a str>,
    pub relevance_language: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub arguments: &'static [ToolArgument],
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolArgument {
    pub name: &'static str,
    pub required: bool,
    pub description: &'static str,
}

pub const TOOL_CATALOG: &[ToolSpec] = &[
    ToolSpec {
        name: "ChannelDemographicsTool",
        description: "Fetch channel statistics: subscriber count, total views, video count, \
            country, creation date and custom URL.",
        arguments: &[ToolArgument {
            name: "channel_id",
            required: true,
            description: "YouTube channel ID (or channel URL)",
        }],
    },
    ToolSpec {
        name: "VideoFetchingTool",
        description: "List a channel's uploads with views, likes and comments, sorted by date or views.",
        arguments: &[
            ToolArgument {
                name: "channel_id",
                required: true,
                description: "YouTube channel ID (or channel URL)",
            },
            ToolArgument {
                name: "max_results",
                required: false,
                description: "Number of videos to fetch, 1-500 (default 50)",
            },
            ToolArgument {
                name: "sort_by",
                required: false,
                description: "'date' (newest first, default) or 'views' (most viewed first)",
            },
        ],
    },
    ToolSpec {
        name: "VideoPerformanceAnalyzer",
        description: "Analyze one video: duration, views per day, engagement rate and top comments.",
        arguments: &[
            ToolArgument {
                name: "video_id",
                required: true,
                description: "YouTube video ID (or watch URL)",
            },
            ToolArgument {
                name: "include_comments",
                required: false,
                description: "Include top comment analysis (default true)",
            },
        ],
    },
    ToolSpec {
        name: "CompetitorSearchTool",
        description: "Search channels by topic and rank the relevant ones by subscriber count.",
        arguments: &[
            ToolArgument {
                name: "search_query",
                required: true,
                description: "Keywords or topic, e.g. 'tech reviews'",
            },
            ToolArgument {
                name: "max_results",
                required: false,
                description: "Channels to search, 1-50 (default 10)",
            },
            ToolArgument {
                name: "relevance_threshold",
                required: false,
                description: "Minimum relevance score 0-1 (default 0.5)",
            },
            ToolArgument {
                name: "relevance_language",
                required: false,
                description: "ISO 639-1 language hint for the search (default from config)",
            },
        ],
    },
];

/// A named tool invocation as an agent sends it:
/// `{"tool": "VideoFetchingTool", "arguments": {"channel_id": "UC..."}}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "tool", content = "arguments")]
pub enum ToolCall {
    ChannelDemographicsTool(ChannelDemographicsParams),
    VideoFetchingTool(VideoFetchingParams),
    VideoPerformanceAnalyzer(VideoPerformanceParams),
    CompetitorSearchTool(CompetitorSearchParams),
}

impl ToolCall {
    pub fn name(&self) -> &'static str {
        match self {
            ToolCall::ChannelDemographicsTool(_) => "ChannelDemographicsTool",
            ToolCall::VideoFetchingTool(_) => "VideoFetchingTool",
            ToolCall::VideoPerformanceAnalyzer(_) => "VideoPerformanceAnalyzer",
            ToolCall::CompetitorSearchTool(_) => "CompetitorSearchTool",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Demographics(ChannelDemographics),
    Videos(ChannelVideos),
    Performance(VideoPerformance),
    Competitors(CompetitorReport),
}

impl ToolOutput {
    pub fn render(&self) -> String {
        match self {
            ToolOutput::Demographics(o) => o.render(),
            ToolOutput::Videos(o) => o.render(),
            ToolOutput::Performance(o) => o.render(),
            ToolOutput::Competitors(o) => o.render(),
        }
    }
}

/// Runs a tool by name, recording invocation metrics.
pub async fn invoke(ctx: &ToolContext<'_>, call: &ToolCall) -> AppResult<ToolOutput> {
    let start = Instant::now();
    let tool = call.name();

    let result = match call {
        ToolCall::ChannelDemographicsTool(p) => {
            demographics::run(ctx, p).await.map(ToolOutput::Demographics)
        }
        ToolCall::VideoFetchingTool(p) => videos::run(ctx, p).await.map(ToolOutput::Videos),
        ToolCall::VideoPerformanceAnalyzer(p) => {
            performance::run(ctx, p).await.map(ToolOutput::Performance)
        }
        ToolCall::CompetitorSearchTool(p) => {
            competitors::run(ctx, p).await.map(ToolOutput::Competitors)
        }
    };

    let outcome = match &result {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(tool, error = %e, "tool invocation failed");
            "error"
        }
    };
    let attrs = [
        KeyValue::new("tool.name", tool),
        KeyValue::new("outcome", outcome),
    ];
    TOOL_INVOCATIONS.add(1, &attrs);
    TOOL_INVOCATION_DURATION.record(start.elapsed().as_secs_f64(), &attrs);

    result
}

/// Accepts a bare channel ID or a `youtube.com/channel/{id}` URL.
pub fn channel_id_from(input: &str) -> AppResult<String> {
    let input = input.trim();
    let candidate = match input.split_once("/channel/") {
        Some((_, rest)) => rest.split(['/', '?', '#']).next().unwrap_or(""),
        None => input,
    };
    checked_id(candidate, "channel_id")
}

/// Accepts a bare video ID, a `watch?v=` URL, a `youtu.be/` link or a
/// `/shorts/` URL.
pub fn video_id_from(input: &str) -> AppResult<String> {
    let input = input.trim();
    let candidate = if let Some((_, query)) = input.split_once('?')
        && input.contains("/watch")
    {
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("v="))
            .unwrap_or("")
    } else if let Some((_, rest)) = input
        .split_once("youtu.be/")
        .or_else(|| input.split_once("/shorts/"))
    {
        rest.split(['/', '?', '#', '&']).next().unwrap_or("")
    } else {
        input
    };
    checked_id(candidate, "video_id")
}

fn checked_id(candidate: &str, field: &str) -> AppResult<String> {
    if candidate.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    if !candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(AppError::Validation(format!(
            "{field} '{candidate}' is not a valid YouTube ID"
        )));
    }
    Ok(candidate.to_string())
}
