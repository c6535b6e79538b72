use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text::{DESCRIPTION_LIMIT, abbreviate, percent, rule, thousands, thousands_f64};
use super::videos::watch_url;
use super::{ToolContext, video_id_from};
use crate::error::{AppError, AppResult};
use crate::youtube::{MAX_COMMENT_PAGE_SIZE, YoutubeError, parts};

pub const TOP_COMMENTS: usize = 5;
pub const RECENT_COMMENT_DAYS: i64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct VideoPerformanceParams {
    pub video_id: String,
    #[serde(default = "default_include_comments")]
    pub include_comments: bool,
}

fn default_include_comments() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoPerformance {
    pub video_id: String,
    pub title: String,
    pub channel_title: String,
    pub published_at: DateTime<Utc>,
    pub duration_seconds: u64,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub days_since_published: i64,
    pub views_per_day: f64,
    /// `(likes + comments) / views`, zero for unviewed videos.
    pub engagement_rate: f64,
    pub comments: Option<CommentAnalysis>,
    pub comments_note: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentAnalysis {
    pub top_comments: Vec<TopComment>,
    pub sample_size: usize,
    pub recent_comments: usize,
    pub average_likes_per_recent_comment: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TopComment {
    pub author: String,
    pub text: String,
    pub like_count: u64,
    pub published_at: DateTime<Utc>,
}

pub async fn run(
    ctx: &ToolContext<'_>,
    params: &VideoPerformanceParams,
) -> AppResult<VideoPerformance> {
    run_at(ctx, params, Utc::now()).await
}

#[tracing::instrument(
    name = "tool VideoPerformanceAnalyzer",
    skip(ctx, now),
    fields(tool.name = "VideoPerformanceAnalyzer", video.engagement_rate, video.comments_sampled)
)]
pub async fn run_at(
    ctx: &ToolContext<'_>,
    params: &VideoPerformanceParams,
    now: DateTime<Utc>,
) -> AppResult<VideoPerformance> {
    let video_id = video_id_from(&params.video_id)?;

    let response = ctx
        .api
        .list_videos(
            std::slice::from_ref(&video_id),
            &[parts::SNIPPET, parts::STATISTICS, parts::CONTENT_DETAILS],
        )
        .await?;

    let video = response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Video not found.".into()))?;

    let stats = video.stats();
    let views = stats.view_count.unwrap_or(0);
    let likes = stats.like_count.unwrap_or(0);
    let comments = stats.comment_count.unwrap_or(0);

    let duration_seconds = video
        .content_details
        .as_ref()
        .and_then(|c| c.duration.as_deref())
        .and_then(parse_iso8601_duration)
        .unwrap_or(0);

    let published_at = video.snippet.published_at;
    let days_since_published = (now - published_at).num_days();
    let views_per_day = views as f64 / days_since_published.max(1) as f64;
    let engagement = engagement_rate(views, likes, comments);

    let (comment_analysis, comments_note) = if params.include_comments && comments > 0 {
        match ctx
            .api
            .list_comment_threads(&video_id, MAX_COMMENT_PAGE_SIZE)
            .await
        {
            Ok(threads) => {
                let sample: Vec<TopComment> = threads
                    .items
                    .iter()
                    .map(|t| {
                        let c = t.comment();
                        TopComment {
                            author: c.author_display_name.clone(),
                            text: c.text_display.clone(),
                            like_count: c.like_count.unwrap_or(0),
                            published_at: c.published_at,
                        }
                    })
                    .collect();
                (analyze_comments(sample, now), None)
            }
            Err(YoutubeError::Forbidden { reason, message }) => {
                tracing::info!(%reason, %message, "comments unavailable, skipping comment analysis");
                (None, Some(format!("Comments unavailable: {message}")))
            }
            Err(e) => return Err(e.into()),
        }
    } else {
        (None, None)
    };

    let span = tracing::Span::current();
    span.record("video.engagement_rate", engagement);
    span.record(
        "video.comments_sampled",
        comment_analysis.as_ref().map(|c| c.sample_size).unwrap_or(0),
    );

    Ok(VideoPerformance {
        url: watch_url(&video.id),
        video_id: video.id,
        title: video.snippet.title,
        channel_title: video.snippet.channel_title,
        published_at,
        duration_seconds,
        view_count: views,
        like_count: likes,
        comment_count: comments,
        days_since_published,
        views_per_day,
        engagement_rate: engagement,
        comments: comment_analysis,
        comments_note,
    })
}

pub fn engagement_rate(views: u64, likes: u64, comments: u64) -> f64 {
    if views == 0 {
        0.0
    } else {
        (likes + comments) as f64 / views as f64
    }
}

/// Ranks comments by likes and computes the recent-comment averages.
/// Returns `None` for an empty sample.
fn analyze_comments(mut sample: Vec<TopComment>, now: DateTime<Utc>) -> Option<CommentAnalysis> {
    if sample.is_empty() {
        return None;
    }

    sample.sort_by(|a, b| b.like_count.cmp(&a.like_count));

    let recent: Vec<&TopComment> = sample
        .iter()
        .filter(|c| (now - c.published_at).num_days() <= RECENT_COMMENT_DAYS)
        .collect();
    let average_likes_per_recent_comment = if recent.is_empty() {
        0.0
    } else {
        recent.iter().map(|c| c.like_count as f64).sum::<f64>() / recent.len() as f64
    };
    let recent_comments = recent.len();
    let sample_size = sample.len();

    sample.truncate(TOP_COMMENTS);

    Some(CommentAnalysis {
        top_comments: sample,
        sample_size,
        recent_comments,
        average_likes_per_recent_comment,
    })
}

/// Parses an ISO-8601 duration such as `PT1H2M3S` or `P1DT30M` into seconds.
/// Weeks and days are folded in; years and months are rejected since video
/// durations never use them.
pub fn parse_iso8601_duration(raw: &str) -> Option<u64> {
    let rest = raw.trim().strip_prefix('P')?;
    let mut total: u64 = 0;
    let mut digits = String::new();
    let mut in_time = false;
    let mut saw_component = false;

    for c in rest.chars() {
        match c {
            'T' if !in_time && digits.is_empty() => in_time = true,
            '0'..='9' => digits.push(c),
            unit => {
                let n: u64 = digits.parse().ok()?;
                digits.clear();
                let scale = match (unit, in_time) {
                    ('W', false) => 7 * 86_400,
                    ('D', false) => 86_400,
                    ('H', true) => 3_600,
                    ('M', true) => 60,
                    ('S', true) => 1,
                    _ => return None,
                };
                total = total.checked_add(n.checked_mul(scale)?)?;
                saw_component = true;
            }
        }
    }

    if !digits.is_empty() || !saw_component {
        return None;
    }
    Some(total)
}

fn split_duration(total: u64) -> (u64, u64, u64) {
    (total / 3_600, (total % 3_600) / 60, total % 60)
}

impl VideoPerformance {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let (hours, minutes, seconds) = split_duration(self.duration_seconds);

        out.push_str("Video Performance Analysis\n");
        out.push_str(&rule('=', 50));
        out.push_str("\n\n");

        out.push_str("Basic Information:\n");
        let _ = writeln!(out, "Title: {}", self.title);
        let _ = writeln!(out, "Channel: {}", self.channel_title);
        let _ = writeln!(out, "Published: {}", self.published_at.format("%Y-%m-%d %H:%M UTC"));
        let _ = writeln!(out, "Duration: {hours}h {minutes}m {seconds}s");
        out.push_str(&rule('-', 50));
        out.push_str("\n\n");

        out.push_str("Performance Metrics:\n");
        let _ = writeln!(out, "Views: {}", thousands(self.view_count));
        let _ = writeln!(out, "Likes: {}", thousands(self.like_count));
        let _ = writeln!(out, "Comments: {}", thousands(self.comment_count));
        let _ = writeln!(out, "Views per Day: {}", thousands_f64(self.views_per_day, 2));
        let _ = writeln!(out, "Engagement Rate: {}", percent(self.engagement_rate));
        out.push_str(&rule('-', 50));
        out.push_str("\n\n");

        if let Some(analysis) = &self.comments {
            out.push_str("Top Comments Analysis:\n");
            for (idx, comment) in analysis.top_comments.iter().enumerate() {
                let _ = writeln!(out, "{}. Likes: {}", idx + 1, thousands(comment.like_count));
                let _ = writeln!(out, "   Author: {}", comment.author);
                let _ = writeln!(out, "   Comment: {}", abbreviate(&comment.text, DESCRIPTION_LIMIT));
                let _ = writeln!(out, "   Posted: {}", comment.published_at.format("%Y-%m-%d"));
                out.push('\n');
            }

            out.push_str("Comment Engagement Metrics:\n");
            let _ = writeln!(
                out,
                "Average Likes per Comment: {:.2}",
                analysis.average_likes_per_recent_comment
            );
            let _ = writeln!(
                out,
                "Recent Comments ({RECENT_COMMENT_DAYS} days): {}",
                analysis.recent_comments
            );
        } else if let Some(note) = &self.comments_note {
            let _ = writeln!(out, "{note}");
        }

        out
    }
}
