use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::llm::{GenerateRequest, LlmClient};
use crate::tools::performance::engagement_rate;

use super::retrieve::ChannelData;

const SECONDS_PER_WEEK: f64 = 7.0 * 86_400.0;

/// Aggregate numbers computed locally from the sampled videos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    pub channel_id: String,
    pub channel_name: String,
    pub subscriber_count: Option<u64>,
    pub channel_total_views: u64,
    pub channel_total_videos: u64,
    pub videos_sampled: usize,
    pub total_views: u64,
    pub average_views: f64,
    pub median_views: f64,
    pub average_engagement_rate: f64,
    pub average_views_per_day: f64,
    pub uploads_per_week: f64,
    pub top_video: Option<TopVideo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopVideo {
    pub video_id: String,
    pub title: String,
    pub view_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub trends: Vec<Trend>,
    pub competitive_position: String,
    pub key_findings: Vec<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cost_usd: f64,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trend {
    pub metric: String,
    pub direction: String,
    pub description: String,
}

pub fn snapshot(data: &ChannelData) -> ChannelSnapshot {
    let videos = &data.videos.videos;
    let mut views: Vec<u64> = videos.iter().map(|v| v.view_count).collect();
    views.sort_unstable();

    let total_views: u64 = views.iter().sum();
    let average_views = mean(views.iter().map(|&v| v as f64));
    let median_views = match views.len() {
        0 => 0.0,
        n if n % 2 == 1 => views[n / 2] as f64,
        n => (views[n / 2 - 1] + views[n / 2]) as f64 / 2.0,
    };

    let average_engagement_rate = mean(
        videos
            .iter()
            .map(|v| engagement_rate(v.view_count, v.like_count, v.comment_count)),
    );
    let average_views_per_day = mean(data.performances.iter().map(|p| p.views_per_day));

    let uploads_per_week = match (
        videos.iter().map(|v| v.published_at).min(),
        videos.iter().map(|v| v.published_at).max(),
    ) {
        (Some(oldest), Some(newest)) if videos.len() > 1 => {
            let weeks = ((newest - oldest).num_seconds() as f64 / SECONDS_PER_WEEK).max(1.0);
            videos.len() as f64 / weeks
        }
        _ => 0.0,
    };

    let top_video = videos
        .iter()
        .max_by_key(|v| v.view_count)
        .map(|v| TopVideo {
            video_id: v.video_id.clone(),
            title: v.title.clone(),
            view_count: v.view_count,
        });

    ChannelSnapshot {
        channel_id: data.demographics.channel_id.clone(),
        channel_name: data.demographics.channel_name.clone(),
        subscriber_count: data.demographics.subscriber_count,
        channel_total_views: data.demographics.total_views,
        channel_total_videos: data.demographics.total_videos,
        videos_sampled: videos.len(),
        total_views,
        average_views,
        median_views,
        average_engagement_rate,
        average_views_per_day,
        uploads_per_week,
        top_video,
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Plain-text digest of the collected data handed to the model.
pub(crate) fn data_summary(data: &ChannelData, snapshot: &ChannelSnapshot) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "## Channel: {} ({})\n",
        snapshot.channel_name, snapshot.channel_id
    ));
    out.push_str(&format!(
        "Subscribers: {}, Total views: {}, Total videos: {}\n",
        snapshot
            .subscriber_count
            .map_or_else(|| "hidden".to_string(), |s| s.to_string()),
        snapshot.channel_total_views,
        snapshot.channel_total_videos,
    ));
    out.push_str(&format!(
        "Sampled videos: {}, Avg views: {:.0}, Median views: {:.0}, Avg engagement: {:.2}%, Uploads/week: {:.2}\n",
        snapshot.videos_sampled,
        snapshot.average_views,
        snapshot.median_views,
        snapshot.average_engagement_rate * 100.0,
        snapshot.uploads_per_week,
    ));

    if !data.videos.videos.is_empty() {
        out.push_str("\n## Most viewed videos\n");
        for v in data.videos.videos.iter().take(10) {
            out.push_str(&format!(
                "- {} | {} views | {} likes | {} comments | published {}\n",
                v.title,
                v.view_count,
                v.like_count,
                v.comment_count,
                v.published_at.date_naive()
            ));
        }
    }

    for p in &data.performances {
        out.push_str(&format!(
            "\n## Performance: {}\nDuration: {}s, Views/day: {:.1}, Engagement: {:.2}%, Days live: {}\n",
            p.title,
            p.duration_seconds,
            p.views_per_day,
            p.engagement_rate * 100.0,
            p.days_since_published
        ));
        if let Some(comments) = &p.comments {
            for c in &comments.top_comments {
                out.push_str(&format!("  comment ({} likes): {}\n", c.like_count, c.text));
            }
        } else if let Some(note) = &p.comments_note {
            out.push_str(&format!("  {note}\n"));
        }
    }

    if let Some(report) = &data.competitors {
        out.push_str(&format!(
            "\n## Competitors for \"{}\" ({} found, avg subscribers {:.0})\n",
            report.search_query, report.summary.total_competitors, report.summary.average_subscribers
        ));
        for c in &report.competitors {
            out.push_str(&format!(
                "- {} | {} subscribers | {} videos | {} views | relevance {:.2}\n",
                c.channel_name, c.subscriber_count, c.video_count, c.view_count, c.relevance_score
            ));
        }
    }

    out
}

#[tracing::instrument(
    name = "pipeline_stage analyze",
    skip(llm_client, data, snapshot),
    fields(
        pipeline.stage = "analyze",
        analysis.trends_found,
        analysis.key_findings,
    )
)]
pub async fn analyze(
    llm_client: &LlmClient,
    model: &str,
    data: &ChannelData,
    snapshot: &ChannelSnapshot,
) -> Result<AnalysisResult, AppError> {
    let system = include_str!("../../prompts/analyst-system.txt").to_string();

    let prompt = format!(
        "Analyze the following YouTube channel data. Identify performance trends, \
        the channel's position against its competitors, and the key findings.\n\
        Return your analysis as JSON with this exact structure:\n\
        {{\n  \"trends\": [{{\"metric\": \"views|engagement|upload_cadence|comments\", \"direction\": \"increasing|decreasing|stable|volatile\", \"description\": \"...\"}}],\n  \
        \"competitive_position\": \"one paragraph, or 'no competitor data' if none was given\",\n  \
        \"key_findings\": [\"important insight 1\", \"important insight 2\"]\n}}\n\n\
        DATA:\n{}",
        data_summary(data, snapshot)
    );

    let resp = llm_client
        .generate(&GenerateRequest {
            model: model.to_string(),
            system,
            prompt,
            temperature: 0.3,
            max_tokens: 2048,
            stage: "analyze".to_string(),
        })
        .await
        .map_err(|e| AppError::Llm(e.to_string()))?;

    let analysis = parse_analysis_response(
        &resp.content,
        resp.input_tokens,
        resp.output_tokens,
        resp.cost_usd,
        &resp.provider,
    );

    let span = tracing::Span::current();
    span.record("analysis.trends_found", analysis.trends.len());
    span.record("analysis.key_findings", analysis.key_findings.len());

    Ok(analysis)
}

fn parse_analysis_response(
    content: &str,
    input_tokens: u32,
    output_tokens: u32,
    cost_usd: f64,
    provider: &str,
) -> AnalysisResult {
    let json_str = extract_json(content);

    #[derive(Deserialize)]
    struct RawAnalysis {
        trends: Option<Vec<Trend>>,
        competitive_position: Option<String>,
        key_findings: Option<Vec<String>>,
    }

    let (trends, competitive_position, key_findings) =
        match serde_json::from_str::<RawAnalysis>(&json_str) {
            Ok(raw) => (
                raw.trends.unwrap_or_default(),
                raw.competitive_position.unwrap_or_default(),
                raw.key_findings.unwrap_or_default(),
            ),
            Err(e) => {
                tracing::warn!(error = %e, "analysis response is not JSON, keeping raw text");
                (
                    vec![],
                    String::new(),
                    vec![content.chars().take(500).collect::<String>()],
                )
            }
        };

    AnalysisResult {
        trends,
        competitive_position,
        key_findings,
        input_tokens,
        output_tokens,
        cost_usd,
        provider: provider.to_string(),
    }
}

pub(crate) fn extract_json(content: &str) -> String {
    if let Some(start) = content.find("```json")
        && let Some(end) = content[start + 7..].find("```")
    {
        return content[start + 7..start + 7 + end].trim().to_string();
    }
    if let Some(start) = content.find("```")
        && let Some(end) = content[start + 3..].find("```")
    {
        let inner = content[start + 3..start + 3 + end].trim();
        if inner.starts_with('{') {
            return inner.to_string();
        }
    }
    if let Some(start) = content.find('{')
        && let Some(end) = content.rfind('}')
        && start < end
    {
        return content[start..=end].to_string();
    }
    content.to_string()
}
