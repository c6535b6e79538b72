use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::llm::{GenerateRequest, LlmClient};

use super::analyze::{AnalysisResult, ChannelSnapshot};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrativeResult {
    pub title: String,
    pub executive_summary: String,
    pub sections: Vec<NarrativeSection>,
    pub recommendations: Vec<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeSection {
    pub heading: String,
    pub content: String,
}

#[tracing::instrument(
    name = "pipeline_stage generate",
    skip(llm_client, snapshot, analysis),
    fields(
        pipeline.stage = "generate",
        narrative.title,
        narrative.sections_count,
        narrative.recommendations_count,
    )
)]
pub async fn generate(
    llm_client: &LlmClient,
    model: &str,
    snapshot: &ChannelSnapshot,
    competitor_query: Option<&str>,
    analysis: &AnalysisResult,
) -> Result<NarrativeResult, AppError> {
    let snapshot_json = serde_json::to_string_pretty(snapshot)
        .map_err(|e| AppError::Pipeline(format!("failed to serialize snapshot: {e}")))?;
    let analysis_json = serde_json::to_string_pretty(analysis)
        .map_err(|e| AppError::Pipeline(format!("failed to serialize analysis: {e}")))?;

    let system = "You are a YouTube growth strategist writing reports for channel owners. \
        Write clear, data-driven narrative with specific numbers. \
        Recommendations must be concrete actions the creator can take next month."
        .to_string();

    let prompt = format!(
        "Write a structured analytics report for the YouTube channel \"{}\".\n\n\
        Competitor search: {}\n\n\
        Channel snapshot:\n{}\n\n\
        Analysis:\n{}\n\n\
        Return your report as JSON with this exact structure:\n\
        {{\n  \"title\": \"Report title\",\n  \
        \"executive_summary\": \"2-3 sentence overview\",\n  \
        \"sections\": [\n    {{\"heading\": \"Section title\", \"content\": \"Section content with data references\"}}\n  ],\n  \
        \"recommendations\": [\"actionable recommendation\"]\n}}\n\n\
        Include 3-5 sections (audience and reach, content performance, engagement, \
        competitive landscape when data exists) and 3-5 recommendations.",
        snapshot.channel_name,
        competitor_query.unwrap_or("none"),
        snapshot_json,
        analysis_json
    );

    let resp = llm_client
        .generate(&GenerateRequest {
            model: model.to_string(),
            system,
            prompt,
            temperature: 0.3,
            max_tokens: 4096,
            stage: "generate".to_string(),
        })
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    let narrative = parse_narrative_response(
        &resp.content,
        &snapshot.channel_name,
        resp.input_tokens,
        resp.output_tokens,
        resp.cost_usd,
        &resp.provider,
    );

    let span = tracing::Span::current();
    span.record("narrative.title", &narrative.title);
    span.record("narrative.sections_count", narrative.sections.len());
    span.record(
        "narrative.recommendations_count",
        narrative.recommendations.len(),
    );

    Ok(narrative)
}

fn default_title(channel_name: &str) -> String {
    format!("YouTube Channel Report: {channel_name}")
}

fn parse_narrative_response(
    content: &str,
    channel_name: &str,
    input_tokens: u32,
    output_tokens: u32,
    cost_usd: f64,
    provider: &str,
) -> NarrativeResult {
    let json_str = super::analyze::extract_json(content);

    #[derive(Deserialize)]
    struct RawNarrative {
        title: Option<String>,
        executive_summary: Option<String>,
        sections: Option<Vec<NarrativeSection>>,
        recommendations: Option<Vec<String>>,
    }

    let (title, executive_summary, sections, recommendations) =
        match serde_json::from_str::<RawNarrative>(&json_str) {
            Ok(raw) => (
                raw.title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| default_title(channel_name)),
                raw.executive_summary
                    .unwrap_or_else(|| format!("Performance analysis of {channel_name}.")),
                raw.sections.unwrap_or_default(),
                raw.recommendations.unwrap_or_default(),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "narrative response is not JSON, keeping raw text");
                (
                    default_title(channel_name),
                    content.chars().take(500).collect(),
                    vec![NarrativeSection {
                        heading: "Analysis".to_string(),
                        content: content.to_string(),
                    }],
                    vec![],
                )
            }
        };

    NarrativeResult {
        title,
        executive_summary,
        sections,
        recommendations,
        input_tokens,
        output_tokens,
        cost_usd,
        provider: provider.to_string(),
    }
}
