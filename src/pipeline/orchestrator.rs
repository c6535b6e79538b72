use opentelemetry::KeyValue;
use serde::Deserialize;
use sqlx::PgPool;

use crate::db::reports::InsertReport;
use crate::error::{AppError, AppResult, current_trace_id};
use crate::llm::LlmClient;
use crate::telemetry::metrics::{
    REPORT_COMPETITORS_FOUND, REPORT_GENERATION_DURATION, REPORT_VIDEOS_ANALYZED,
};
use crate::tools::ToolContext;

use super::format::{self, AnalyticsReport, FormatParams};
use super::{analyze, generate, retrieve};

pub const DEFAULT_MAX_VIDEOS: u32 = 20;
pub const MAX_VIDEOS_LIMIT: u32 = 200;
pub const DEFAULT_TOP_VIDEOS: u32 = 3;
pub const TOP_VIDEOS_LIMIT: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct ReportRequest {
    pub channel_id: String,
    #[serde(default)]
    pub competitor_query: Option<String>,
    #[serde(default = "default_max_videos")]
    pub max_videos: u32,
    #[serde(default = "default_top_videos")]
    pub top_videos: u32,
    #[serde(default = "default_include_comments")]
    pub include_comments: bool,
}

fn default_max_videos() -> u32 {
    DEFAULT_MAX_VIDEOS
}

fn default_top_videos() -> u32 {
    DEFAULT_TOP_VIDEOS
}

fn default_include_comments() -> bool {
    true
}

impl ReportRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.channel_id.trim().is_empty() {
            return Err(AppError::Validation("channel_id must not be empty".into()));
        }
        if !(1..=MAX_VIDEOS_LIMIT).contains(&self.max_videos) {
            return Err(AppError::Validation(format!(
                "max_videos must be between 1 and {MAX_VIDEOS_LIMIT}"
            )));
        }
        if self.top_videos > TOP_VIDEOS_LIMIT {
            return Err(AppError::Validation(format!(
                "top_videos must be between 0 and {TOP_VIDEOS_LIMIT}"
            )));
        }
        Ok(())
    }

    /// The competitor query, if one was given and is not blank.
    pub fn competitor_query(&self) -> Option<&str> {
        self.competitor_query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// Model names for the two LLM stages.
#[derive(Debug, Clone, Copy)]
pub struct Models<'a> {
    pub capable: &'a str,
    pub fast: &'a str,
}

/// Runs retrieve → analyze → generate → format without touching the database.
pub async fn build_report(
    ctx: &ToolContext<'_>,
    llm_client: &LlmClient,
    models: Models<'_>,
    request: &ReportRequest,
) -> AppResult<AnalyticsReport> {
    request.validate()?;
    let start = std::time::Instant::now();

    let trace_id = current_trace_id();

    // Stage 1: Collect tool outputs from the YouTube Data API
    let data = retrieve::retrieve(ctx, request).await?;

    // Stage 2: Aggregate locally, then analyze via LLM (fast model)
    let snapshot = analyze::snapshot(&data);
    let analysis = analyze::analyze(llm_client, models.fast, &data, &snapshot).await?;

    // Stage 3: Generate narrative via LLM (capable model)
    let narrative = generate::generate(
        llm_client,
        models.capable,
        &snapshot,
        request.competitor_query(),
        &analysis,
    )
    .await?;

    // Stage 4: Format final report
    Ok(format::format_report(FormatParams {
        data: &data,
        snapshot,
        analysis: &analysis,
        narrative: &narrative,
        duration: start.elapsed(),
        trace_id,
    }))
}

#[tracing::instrument(
    name = "pipeline report",
    skip(pool, ctx, llm_client, models),
    fields(
        youtube.channel_id = %request.channel_id,
        report.id,
        report.videos_analyzed,
        report.duration_ms,
    )
)]
pub async fn generate_report(
    pool: &PgPool,
    ctx: &ToolContext<'_>,
    llm_client: &LlmClient,
    models: Models<'_>,
    request: &ReportRequest,
) -> AppResult<AnalyticsReport> {
    let report = build_report(ctx, llm_client, models, request).await?;

    let sections_json = serde_json::to_value(&report.sections)
        .map_err(|e| AppError::Pipeline(format!("failed to serialize sections: {e}")))?;
    let snapshot_json = serde_json::to_value(&report.snapshot)
        .map_err(|e| AppError::Pipeline(format!("failed to serialize snapshot: {e}")))?;

    crate::db::reports::insert_report(
        pool,
        &InsertReport {
            id: report.id,
            channel_id: &report.channel_id,
            channel_name: &report.channel_name,
            competitor_query: report.competitor_query.as_deref(),
            title: &report.title,
            executive_summary: &report.executive_summary,
            sections: &sections_json,
            recommendations: &report.recommendations,
            snapshot: &snapshot_json,
            videos_analyzed: report.videos_analyzed as i32,
            competitors_found: report.competitors_found as i32,
            total_tokens: report.total_tokens as i32,
            total_cost_usd: report.total_cost_usd,
            providers_used: &report.providers_used,
            generation_duration_ms: report.generation_duration_ms as i32,
            trace_id: report.trace_id.as_deref(),
        },
    )
    .await?;

    // Record domain metrics
    let attrs = [KeyValue::new(
        "report.has_competitors",
        report.competitor_query.is_some(),
    )];
    REPORT_GENERATION_DURATION.record(report.generation_duration_ms as f64 / 1000.0, &attrs);
    REPORT_VIDEOS_ANALYZED.record(report.videos_analyzed as f64, &attrs);
    REPORT_COMPETITORS_FOUND.record(report.competitors_found as f64, &attrs);

    let span = tracing::Span::current();
    span.record("report.id", report.id.to_string());
    span.record("report.videos_analyzed", report.videos_analyzed);
    span.record("report.duration_ms", report.generation_duration_ms);

    tracing::info!(
        report_id = %report.id,
        channel = %report.channel_name,
        tokens = report.total_tokens,
        cost_usd = report.total_cost_usd,
        "report generated"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::llm::scripted::ScriptedProvider;
    use crate::youtube::fake::{FakeYoutube, channel, comment, video};

    const ANALYSIS: &str = r#"{"trends": [{"metric": "views", "direction": "increasing", "description": "Newer videos pull more views"}], "competitive_position": "no competitor data", "key_findings": ["Traits video leads"]}"#;
    const NARRATIVE: &str = r#"Here you go:
```json
{"title": "Rust Weekly Growth Report", "executive_summary": "Views are concentrated in two videos.", "sections": [{"heading": "Reach", "content": "1,400 views sampled."}], "recommendations": ["Make a traits sequel"]}
```"#;

    fn request(json: &str) -> ReportRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_report_request_defaults() {
        let req = request(r#"{"channel_id": "UCrust"}"#);
        assert_eq!(req.max_videos, 20);
        assert_eq!(req.top_videos, 3);
        assert!(req.include_comments);
        assert_eq!(req.competitor_query(), None);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_report_request_validation() {
        for body in [
            r#"{"channel_id": "  "}"#,
            r#"{"channel_id": "UCrust", "max_videos": 0}"#,
            r#"{"channel_id": "UCrust", "max_videos": 201}"#,
            r#"{"channel_id": "UCrust", "top_videos": 11}"#,
        ] {
            assert!(
                matches!(request(body).validate(), Err(AppError::Validation(_))),
                "{body} should be rejected"
            );
        }
        let req = request(r#"{"channel_id": "UCrust", "competitor_query": "   "}"#);
        assert_eq!(req.competitor_query(), None);
        let req = request(r#"{"channel_id": "UCrust", "competitor_query": " rust "}"#);
        assert_eq!(req.competitor_query(), Some("rust"));
    }

    #[tokio::test]
    async fn test_build_report_runs_every_stage() {
        let api = FakeYoutube::new()
            .with_channel(
                channel("UCrust", "Rust Weekly", Some(12_000), 900_000, 2),
                &["v1", "v2"],
            )
            .with_video(video("v1", "Intro", "2024-01-01T00:00:00Z", 500, 10, 0))
            .with_video(video("v2", "Traits", "2024-01-15T00:00:00Z", 900, 50, 1))
            .with_comments(
                "v2",
                vec![comment("Finally clicked", "ana", 7, "2024-01-16T00:00:00Z")],
            );
        let ctx = ToolContext {
            api: &api,
            oauth_credentials: None,
            relevance_language: "en",
        };
        let provider = Arc::new(ScriptedProvider::new("openai").reply(ANALYSIS).reply(NARRATIVE));
        let llm = LlmClient::new(provider.clone(), "openai").with_retry(1, Duration::from_millis(1));

        let report = build_report(
            &ctx,
            &llm,
            Models {
                capable: "gpt-4.1",
                fast: "gpt-4.1-mini",
            },
            &request(r#"{"channel_id": "UCrust", "top_videos": 1}"#),
        )
        .await
        .unwrap();

        assert_eq!(report.title, "Rust Weekly Growth Report");
        assert_eq!(report.recommendations, vec!["Make a traits sequel"]);
        assert_eq!(report.videos_analyzed, 2);
        assert_eq!(report.snapshot.top_video.unwrap().video_id, "v2");
        assert_eq!(report.providers_used, vec!["openai"]);
        assert_eq!(report.competitors_found, 0);
        // no OTel layer installed, so there is no trace to link
        assert_eq!(report.trace_id, None);

        let sent = provider.requests();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].stage, "analyze");
        assert_eq!(sent[0].model, "gpt-4.1-mini");
        assert!(sent[0].prompt.contains("Finally clicked"));
        assert_eq!(sent[1].stage, "generate");
        assert_eq!(sent[1].model, "gpt-4.1");
        assert!(sent[1].prompt.contains("Traits video leads"));
    }

    #[tokio::test]
    async fn test_build_report_rejects_invalid_request_before_calls() {
        let api = FakeYoutube::new();
        let ctx = ToolContext {
            api: &api,
            oauth_credentials: None,
            relevance_language: "en",
        };
        let llm = LlmClient::new(Arc::new(ScriptedProvider::new("openai")), "openai");

        let err = build_report(
            &ctx,
            &llm,
            Models {
                capable: "gpt-4.1",
                fast: "gpt-4.1-mini",
            },
            &request(r#"{"channel_id": "UCrust", "max_videos": 500}"#),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_build_report_surfaces_llm_failure() {
        let api = FakeYoutube::new()
            .with_channel(channel("UCrust", "Rust Weekly", None, 10, 0), &[]);
        let ctx = ToolContext {
            api: &api,
            oauth_credentials: None,
            relevance_language: "en",
        };
        let llm = LlmClient::new(
            Arc::new(ScriptedProvider::new("openai").fail("503 service unavailable")),
            "openai",
        )
        .with_retry(1, Duration::from_millis(1));

        let err = build_report(
            &ctx,
            &llm,
            Models {
                capable: "gpt-4.1",
                fast: "gpt-4.1-mini",
            },
            &request(r#"{"channel_id": "UCrust"}"#),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Llm(_)));
    }
}
