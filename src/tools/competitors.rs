use std::collections::HashSet;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ToolContext;
use super::text::{DESCRIPTION_LIMIT, abbreviate, rule, thousands, thousands_f64};
use crate::error::{AppError, AppResult};
use crate::youtube::{Channel, MAX_PAGE_SIZE, parts};

pub const DEFAULT_MAX_RESULTS: u32 = 10;
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.5;
const TOPICS_SHOWN: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct CompetitorSearchParams {
    #[serde(alias = "q")]
    pub search_query: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default = "default_relevance_threshold")]
    pub relevance_threshold: f64,
    #[serde(default)]
    pub relevance_language: Option<String>,
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

fn default_relevance_threshold() -> f64 {
    DEFAULT_RELEVANCE_THRESHOLD
}

impl CompetitorSearchParams {
    pub fn new(search_query: impl Into<String>) -> Self {
        Self {
            search_query: search_query.into(),
            max_results: DEFAULT_MAX_RESULTS,
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            relevance_language: None,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.search_query.trim().is_empty() {
            return Err(AppError::Validation("search_query must not be empty".into()));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.max_results) {
            return Err(AppError::Validation(format!(
                "max_results must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        if !(0.0..=1.0).contains(&self.relevance_threshold) {
            return Err(AppError::Validation(
                "relevance_threshold must be between 0 and 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Competitor {
    pub channel_name: String,
    pub channel_id: String,
    pub description: String,
    pub subscriber_count: u64,
    pub video_count: u64,
    pub view_count: u64,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub topics: Vec<String>,
    pub relevance_score: f64,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompetitorSummary {
    pub average_subscribers: f64,
    pub average_views: f64,
    pub total_competitors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompetitorReport {
    pub search_query: String,
    pub competitors: Vec<Competitor>,
    pub summary: CompetitorSummary,
}

#[tracing::instrument(
    name = "tool CompetitorSearchTool",
    skip(ctx),
    fields(tool.name = "CompetitorSearchTool", competitors.searched, competitors.kept)
)]
pub async fn run(
    ctx: &ToolContext<'_>,
    params: &CompetitorSearchParams,
) -> AppResult<CompetitorReport> {
    params.validate()?;
    let query = params.search_query.trim();
    let language = params
        .relevance_language
        .as_deref()
        .unwrap_or(ctx.relevance_language);

    let search = ctx
        .api
        .search_channels(query, params.max_results, language)
        .await?;

    let mut seen = HashSet::new();
    let channel_ids: Vec<String> = search
        .items
        .into_iter()
        .map(|item| item.snippet.channel_id)
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect();

    let span = tracing::Span::current();
    span.record("competitors.searched", channel_ids.len());

    let channels = ctx
        .api
        .list_channels(
            &channel_ids,
            &[
                parts::SNIPPET,
                parts::STATISTICS,
                parts::BRANDING_SETTINGS,
                parts::TOPIC_DETAILS,
            ],
        )
        .await?;

    let terms = search_terms(query);
    let mut competitors: Vec<Competitor> = channels
        .items
        .into_iter()
        .filter_map(|channel| {
            let score = relevance_score(&terms, &channel);
            (score >= params.relevance_threshold)
                .then(|| to_competitor(channel, score))
                .flatten()
        })
        .collect();

    competitors.sort_by(|a, b| b.subscriber_count.cmp(&a.subscriber_count));
    span.record("competitors.kept", competitors.len());

    let summary = summarize(&competitors);
    Ok(CompetitorReport {
        search_query: query.to_string(),
        competitors,
        summary,
    })
}

fn search_terms(query: &str) -> Vec<String> {
    query.to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// Fraction of query terms found in the channel's keywords or description.
pub fn relevance_score(terms: &[String], channel: &Channel) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let keywords = channel.keywords().to_lowercase();
    let description = channel
        .snippet
        .as_ref()
        .map(|s| s.description.to_lowercase())
        .unwrap_or_default();

    let matched = terms
        .iter()
        .filter(|term| keywords.contains(term.as_str()) || description.contains(term.as_str()))
        .count();
    matched as f64 / terms.len() as f64
}

/// `https://en.wikipedia.org/wiki/Video_game_culture` -> `Video game culture`.
pub fn topic_label(topic_url: &str) -> String {
    topic_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(topic_url)
        .replace('_', " ")
}

fn to_competitor(channel: Channel, relevance_score: f64) -> Option<Competitor> {
    let topics = channel
        .topic_categories()
        .iter()
        .map(|t| topic_label(t))
        .collect();
    let stats = channel.statistics.clone().unwrap_or_default();
    let snippet = channel.snippet?;

    Some(Competitor {
        url: format!("https://www.youtube.com/channel/{}", channel.id),
        channel_id: channel.id,
        channel_name: snippet.title,
        description: abbreviate(&snippet.description, DESCRIPTION_LIMIT),
        subscriber_count: stats.subscriber_count.unwrap_or(0),
        video_count: stats.video_count.unwrap_or(0),
        view_count: stats.view_count.unwrap_or(0),
        country: snippet.country,
        created_at: snippet.published_at,
        topics,
        relevance_score,
    })
}

fn summarize(competitors: &[Competitor]) -> CompetitorSummary {
    if competitors.is_empty() {
        return CompetitorSummary::default();
    }
    let n = competitors.len() as f64;
    CompetitorSummary {
        average_subscribers: competitors.iter().map(|c| c.subscriber_count as f64).sum::<f64>() / n,
        average_views: competitors.iter().map(|c| c.view_count as f64).sum::<f64>() / n,
        total_competitors: competitors.len(),
    }
}

impl CompetitorReport {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Competitor Analysis Report for '{}'", self.search_query);
        out.push_str(&rule('=', 60));
        out.push_str("\n\n");

        if self.competitors.is_empty() {
            out.push_str("No competing channels found.\n");
            return out;
        }

        for (idx, c) in self.competitors.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", idx + 1, c.channel_name);
            let _ = writeln!(out, "   Relevance Score: {:.2}", c.relevance_score);
            let _ = writeln!(out, "   Subscribers: {}", thousands(c.subscriber_count));
            let _ = writeln!(out, "   Total Views: {}", thousands(c.view_count));
            let _ = writeln!(out, "   Videos: {}", c.video_count);
            let _ = writeln!(
                out,
                "   Country: {}",
                c.country.as_deref().unwrap_or("Not specified")
            );
            let _ = writeln!(out, "   Description: {}", c.description);
            if !c.topics.is_empty() {
                let shown: Vec<&str> = c.topics.iter().take(TOPICS_SHOWN).map(String::as_str).collect();
                let _ = writeln!(out, "   Topics: {}", shown.join(", "));
            }
            let _ = writeln!(out, "   URL: {}", c.url);
            out.push_str(&rule('-', 60));
            out.push('\n');
        }

        out.push_str("\nSummary Statistics:\n");
        let _ = writeln!(
            out,
            "Average Subscribers: {}",
            thousands_f64(self.summary.average_subscribers, 0)
        );
        let _ = writeln!(
            out,
            "Average Total Views: {}",
            thousands_f64(self.summary.average_views, 0)
        );
        let _ = writeln!(out, "Total Competitors Found: {}", self.summary.total_competitors);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube::fake::{FakeYoutube, channel, with_branding};

    fn ctx(api: &FakeYoutube) -> ToolContext<'_> {
        ToolContext {
            api,
            oauth_credentials: None,
            relevance_language: "en",
        }
    }

    fn competitor_api() -> FakeYoutube {
        FakeYoutube::new()
            .with_channel(
                with_branding(
                    channel("UCbig", "Big Tech Reviews", Some(2_000_000), 500_000_000, 900),
                    "Honest phone and laptop reviews",
                    "tech reviews gadgets",
                    &[
                        "https://en.wikipedia.org/wiki/Technology",
                        "https://en.wikipedia.org/wiki/Video_game_culture",
                        "https://en.wikipedia.org/wiki/Lifestyle_(sociology)",
                        "https://en.wikipedia.org/wiki/Hobby",
                    ],
                ),
                &[],
            )
            .with_channel(
                with_branding(
                    channel("UCsmall", "Small Tech", Some(40_000), 3_000_000, 120),
                    "Tech tips for everyone",
                    "",
                    &[],
                ),
                &[],
            )
            .with_channel(
                with_branding(
                    channel("UCcook", "Cooking Daily", Some(900_000), 80_000_000, 700),
                    "Recipes every day",
                    "food cooking",
                    &[],
                ),
                &[],
            )
            .with_search("tech reviews", &["UCsmall", "UCbig", "UCcook", "UCbig"])
    }

    #[test]
    fn test_topic_label() {
        assert_eq!(
            topic_label("https://en.wikipedia.org/wiki/Video_game_culture"),
            "Video game culture"
        );
        assert_eq!(topic_label("Music"), "Music");
    }

    #[test]
    fn test_params_defaults_and_validation() {
        let p: CompetitorSearchParams = serde_json::from_str(r#"{"q": "rust"}"#).unwrap();
        assert_eq!(p.search_query, "rust");
        assert_eq!(p.max_results, DEFAULT_MAX_RESULTS);
        assert_eq!(p.relevance_threshold, DEFAULT_RELEVANCE_THRESHOLD);
        assert!(p.validate().is_ok());

        let mut bad = CompetitorSearchParams::new("  ");
        assert!(bad.validate().is_err());
        bad.search_query = "rust".into();
        bad.relevance_threshold = 1.5;
        assert!(bad.validate().is_err());
        bad.relevance_threshold = 0.5;
        bad.max_results = 51;
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_filters_by_relevance_and_sorts_by_subscribers() {
        let api = competitor_api();
        let report = run(&ctx(&api), &CompetitorSearchParams::new("tech reviews"))
            .await
            .unwrap();

        let ids: Vec<&str> = report.competitors.iter().map(|c| c.channel_id.as_str()).collect();
        // UCsmall matches "tech" only (0.5), UCcook matches nothing
        assert_eq!(ids, vec!["UCbig", "UCsmall"]);
        assert_eq!(report.competitors[0].relevance_score, 1.0);
        assert_eq!(report.competitors[1].relevance_score, 0.5);
        assert_eq!(report.competitors[0].topics.len(), 4);
        assert_eq!(report.summary.total_competitors, 2);
        assert_eq!(report.summary.average_subscribers, 1_020_000.0);

        let calls = api.calls();
        assert_eq!(calls[0], "search tech reviews max=10 lang=en");
        assert_eq!(
            calls[1],
            "channels UCsmall,UCbig,UCcook [snippet,statistics,brandingSettings,topicDetails]"
        );
    }

    #[tokio::test]
    async fn test_render() {
        let api = competitor_api();
        let report = run(&ctx(&api), &CompetitorSearchParams::new("tech reviews"))
            .await
            .unwrap();
        let text = report.render();

        assert!(text.starts_with("Competitor Analysis Report for 'tech reviews'\n"));
        assert!(text.contains("1. Big Tech Reviews\n   Relevance Score: 1.00\n   Subscribers: 2,000,000\n"));
        assert!(text.contains("   Topics: Technology, Video game culture, Lifestyle (sociology)\n"));
        assert!(text.contains("   URL: https://www.youtube.com/channel/UCbig\n"));
        assert!(text.contains("Average Subscribers: 1,020,000\n"));
        assert!(text.contains("Total Competitors Found: 2\n"));
    }

    #[tokio::test]
    async fn test_threshold_zero_keeps_everything() {
        let api = competitor_api();
        let mut params = CompetitorSearchParams::new("tech reviews");
        params.relevance_threshold = 0.0;
        params.relevance_language = Some("de".into());
        let report = run(&ctx(&api), &params).await.unwrap();
        assert_eq!(report.competitors.len(), 3);
        assert_eq!(api.calls()[0], "search tech reviews max=10 lang=de");
    }

    #[tokio::test]
    async fn test_no_results() {
        let api = FakeYoutube::new();
        let report = run(&ctx(&api), &CompetitorSearchParams::new("nothing here"))
            .await
            .unwrap();
        assert!(report.competitors.is_empty());
        assert_eq!(report.summary.average_views, 0.0);
        assert!(report.render().contains("No competing channels found."));
    }
}
