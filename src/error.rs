use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use opentelemetry::trace::TraceContextExt;
use serde_json::json;
use thiserror::Error;
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::youtube::YoutubeError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<YoutubeError> for AppError {
    fn from(err: YoutubeError) -> Self {
        match err {
            YoutubeError::MissingApiKey => {
                AppError::Credentials("YouTube API key is not set".to_string())
            }
            YoutubeError::Unauthorized(msg) => {
                AppError::Credentials(format!("YouTube API rejected the credentials: {msg}"))
            }
            YoutubeError::RateLimited { message, .. } => AppError::RateLimited(message),
            YoutubeError::NotFound(msg) => AppError::NotFound(msg),
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Credentials(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_)
            | AppError::Llm(_)
            | AppError::Pipeline(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::Validation(msg)
            | AppError::NotFound(msg)
            | AppError::Credentials(msg)
            | AppError::RateLimited(msg)
            | AppError::Upstream(msg) => msg.clone(),
            AppError::Database(_)
            | AppError::Llm(_)
            | AppError::Pipeline(_)
            | AppError::Internal(_) => "Internal server error".to_string(),
        }
    }
}

/// Trace id of the current span, if it belongs to a sampled OTel trace.
pub(crate) fn current_trace_id() -> Option<String> {
    let span = Span::current();
    let context = span.context();
    let span_ref = context.span();
    let span_context = span_ref.span_context();

    if span_context.is_valid() {
        Some(span_context.trace_id().to_string())
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            AppError::Credentials(msg) => tracing::error!(error = %msg, "YouTube credentials error"),
            AppError::RateLimited(msg) => tracing::warn!(error = %msg, "YouTube rate limit hit"),
            AppError::Upstream(msg) => tracing::error!(error = %msg, "YouTube API error"),
            AppError::Database(e) => tracing::error!(error = %e, "Database error"),
            AppError::Llm(msg) => tracing::error!(error = %msg, "LLM error"),
            AppError::Pipeline(msg) => tracing::error!(error = %msg, "Pipeline error"),
            AppError::Internal(msg) => tracing::error!(error = %msg, "Internal error"),
            AppError::Validation(_) | AppError::NotFound(_) => {}
        }

        let body = if let Some(trace_id) = current_trace_id() {
            json!({
                "error": self.public_message(),
                "status": status.as_u16(),
                "trace_id": trace_id,
            })
        } else {
            json!({
                "error": self.public_message(),
                "status": status.as_u16(),
            })
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
