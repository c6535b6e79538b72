use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::analyze::{AnalysisResult, ChannelSnapshot};
use super::generate::{NarrativeResult, NarrativeSection};
use super::retrieve::ChannelData;

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsReport {
    pub id: Uuid,
    pub channel_id: String,
    pub channel_name: String,
    pub competitor_query: Option<String>,
    pub title: String,
    pub executive_summary: String,
    pub sections: Vec<NarrativeSection>,
    pub recommendations: Vec<String>,
    pub snapshot: ChannelSnapshot,
    pub videos_analyzed: usize,
    pub competitors_found: usize,
    pub total_tokens: u32,
    pub total_cost_usd: f64,
    pub providers_used: Vec<String>,
    pub generation_duration_ms: u64,
    pub trace_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub struct FormatParams<'a> {
    pub data: &'a ChannelData,
    pub snapshot: ChannelSnapshot,
    pub analysis: &'a AnalysisResult,
    pub narrative: &'a NarrativeResult,
    pub duration: Duration,
    pub trace_id: Option<String>,
}

#[tracing::instrument(
    name = "pipeline_stage format",
    skip(params),
    fields(
        pipeline.stage = "format",
        report.title,
        report.sections_count,
    )
)]
pub fn format_report(params: FormatParams<'_>) -> AnalyticsReport {
    let total_tokens = params.analysis.input_tokens
        + params.analysis.output_tokens
        + params.narrative.input_tokens
        + params.narrative.output_tokens;

    let mut providers_used = vec![params.analysis.provider.clone()];
    if params.narrative.provider != params.analysis.provider {
        providers_used.push(params.narrative.provider.clone());
    }

    let span = tracing::Span::current();
    span.record("report.title", &params.narrative.title);
    span.record("report.sections_count", params.narrative.sections.len());

    let competitors = params.data.competitors.as_ref();

    AnalyticsReport {
        id: Uuid::new_v4(),
        channel_id: params.snapshot.channel_id.clone(),
        channel_name: params.snapshot.channel_name.clone(),
        competitor_query: competitors.map(|c| c.search_query.clone()),
        title: params.narrative.title.clone(),
        executive_summary: params.narrative.executive_summary.clone(),
        sections: params.narrative.sections.clone(),
        recommendations: params.narrative.recommendations.clone(),
        videos_analyzed: params.snapshot.videos_sampled,
        competitors_found: competitors.map_or(0, |c| c.competitors.len()),
        snapshot: params.snapshot,
        total_tokens,
        total_cost_usd: params.analysis.cost_usd + params.narrative.cost_usd,
        providers_used,
        generation_duration_ms: params.duration.as_millis() as u64,
        trace_id: params.trace_id,
        created_at: Utc::now(),
    }
}
