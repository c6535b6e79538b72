use axum::{
    Json,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::tools::{
    self, ChannelDemographicsParams, CompetitorSearchParams, SortBy, TOOL_CATALOG, ToolCall,
    ToolOutput, ToolSpec, VideoFetchingParams, VideoPerformanceParams,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

#[derive(Debug, Deserialize)]
pub struct FormatQuery {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Deserialize)]
pub struct VideosQuery {
    pub max_results: Option<u32>,
    pub sort_by: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Deserialize)]
pub struct PerformanceQuery {
    pub include_comments: Option<bool>,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Deserialize)]
pub struct CompetitorsQuery {
    pub q: Option<String>,
    pub max_results: Option<u32>,
    pub relevance_threshold: Option<f64>,
    pub relevance_language: Option<String>,
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Serialize)]
pub struct InvokeResponse {
    pub tool: &'static str,
    pub output: ToolOutput,
    pub text: String,
}

fn respond(output: ToolOutput, format: OutputFormat) -> Response {
    match format {
        OutputFormat::Json => Json(output).into_response(),
        OutputFormat::Text => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            output.render(),
        )
            .into_response(),
    }
}

pub async fn list_tools() -> Json<&'static [ToolSpec]> {
    Json(TOOL_CATALOG)
}

pub async fn invoke_tool(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<Json<InvokeResponse>> {
    let call: ToolCall = serde_json::from_value(body).map_err(|e| {
        let names: Vec<&str> = TOOL_CATALOG.iter().map(|t| t.name).collect();
        AppError::Validation(format!(
            "invalid tool call ({e}); expected {{\"tool\": one of {}, \"arguments\": {{...}}}}",
            json!(names)
        ))
    })?;

    let output = tools::invoke(&state.tool_context(), &call).await?;
    let text = output.render();

    Ok(Json(InvokeResponse {
        tool: call.name(),
        output,
        text,
    }))
}

pub async fn channel_demographics(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<FormatQuery>,
) -> AppResult<Response> {
    let call = ToolCall::ChannelDemographicsTool(ChannelDemographicsParams { channel_id });
    let output = tools::invoke(&state.tool_context(), &call).await?;
    Ok(respond(output, query.format))
}

pub async fn channel_videos(
    State(state): State<AppState>,
    Path(channel_id): Path<String>,
    Query(query): Query<VideosQuery>,
) -> AppResult<Response> {
    let sort_by = match query.sort_by.as_deref() {
        Some(raw) => raw.parse::<SortBy>()?,
        None => SortBy::default(),
    };
    let call = ToolCall::VideoFetchingTool(VideoFetchingParams {
        channel_id,
        max_results: query
            .max_results
            .unwrap_or(tools::videos::DEFAULT_MAX_RESULTS),
        sort_by,
    });
    let output = tools::invoke(&state.tool_context(), &call).await?;
    Ok(respond(output, query.format))
}

pub async fn video_performance(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(query): Query<PerformanceQuery>,
) -> AppResult<Response> {
    let call = ToolCall::VideoPerformanceAnalyzer(VideoPerformanceParams {
        video_id,
        include_comments: query.include_comments.unwrap_or(true),
    });
    let output = tools::invoke(&state.tool_context(), &call).await?;
    Ok(respond(output, query.format))
}

pub async fn search_competitors(
    State(state): State<AppState>,
    Query(query): Query<CompetitorsQuery>,
) -> AppResult<Response> {
    let search_query = query
        .q
        .ok_or_else(|| AppError::Validation("query parameter 'q' is required".into()))?;
    let mut params = CompetitorSearchParams::new(search_query);
    if let Some(max_results) = query.max_results {
        params.max_results = max_results;
    }
    if let Some(threshold) = query.relevance_threshold {
        params.relevance_threshold = threshold;
    }
    params.relevance_language = query.relevance_language;

    let call = ToolCall::CompetitorSearchTool(params);
    let output = tools::invoke(&state.tool_context(), &call).await?;
    Ok(respond(output, query.format))
}
