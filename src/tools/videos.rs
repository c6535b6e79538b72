use std::fmt::{self, Write};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text::{rule, thousands};
use super::{ToolContext, channel_id_from};
use crate::error::{AppError, AppResult};
use crate::youtube::{MAX_PAGE_SIZE, parts};

pub const DEFAULT_MAX_RESULTS: u32 = 50;
pub const MAX_RESULTS_LIMIT: u32 = 500;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Date,
    Views,
}

impl SortBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortBy::Date => "date",
            SortBy::Views => "views",
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SortBy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "date" => Ok(SortBy::Date),
            "views" => Ok(SortBy::Views),
            other => Err(AppError::Validation(format!(
                "sort_by must be 'date' or 'views', got '{other}'"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for SortBy {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoFetchingParams {
    pub channel_id: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default)]
    pub sort_by: SortBy,
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

impl VideoFetchingParams {
    pub fn validate(&self) -> AppResult<()> {
        if !(1..=MAX_RESULTS_LIMIT).contains(&self.max_results) {
            return Err(AppError::Validation(format!(
                "max_results must be between 1 and {MAX_RESULTS_LIMIT}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub view_count: u64,
    pub like_count: u64,
    pub comment_count: u64,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelVideos {
    pub channel_id: String,
    pub sort_by: SortBy,
    pub videos: Vec<VideoSummary>,
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={video_id}")
}

#[tracing::instrument(
    name = "tool VideoFetchingTool",
    skip(ctx),
    fields(tool.name = "VideoFetchingTool", videos.pages, videos.count)
)]
pub async fn run(ctx: &ToolContext<'_>, params: &VideoFetchingParams) -> AppResult<ChannelVideos> {
    params.validate()?;
    let channel_id = channel_id_from(&params.channel_id)?;
    let limit = params.max_results as usize;

    let channels = ctx
        .api
        .list_channels(std::slice::from_ref(&channel_id), &[parts::CONTENT_DETAILS])
        .await?;

    let uploads = channels
        .items
        .first()
        .ok_or_else(|| {
            AppError::NotFound(format!(
                "Channel not found for ID '{channel_id}'. Please check the channel ID."
            ))
        })?
        .uploads_playlist_id()
        .ok_or_else(|| {
            AppError::NotFound(format!("Channel '{channel_id}' has no uploads playlist"))
        })?
        .to_string();

    let mut videos: Vec<VideoSummary> = Vec::with_capacity(limit.min(MAX_RESULTS_LIMIT as usize));
    let mut page_token: Option<String> = None;
    let mut pages = 0u32;

    while videos.len() < limit {
        let want = (limit - videos.len()).min(MAX_PAGE_SIZE as usize) as u32;
        let page = ctx
            .api
            .list_playlist_items(&uploads, want, page_token.as_deref())
            .await?;
        pages += 1;

        let ids: Vec<String> = page
            .items
            .iter()
            .filter_map(|item| item.video_id().map(str::to_string))
            .collect();
        if ids.is_empty() {
            break;
        }

        let details = ctx
            .api
            .list_videos(&ids, &[parts::STATISTICS, parts::SNIPPET])
            .await?;

        for video in details.items {
            let stats = video.stats();
            videos.push(VideoSummary {
                url: watch_url(&video.id),
                video_id: video.id,
                title: video.snippet.title,
                published_at: video.snippet.published_at,
                view_count: stats.view_count.unwrap_or(0),
                like_count: stats.like_count.unwrap_or(0),
                comment_count: stats.comment_count.unwrap_or(0),
            });
        }

        match page.next_page_token {
            Some(token) => page_token = Some(token),
            None => break,
        }
    }

    videos.truncate(limit);
    sort_videos(&mut videos, params.sort_by);

    let span = tracing::Span::current();
    span.record("videos.pages", pages);
    span.record("videos.count", videos.len());

    Ok(ChannelVideos {
        channel_id,
        sort_by: params.sort_by,
        videos,
    })
}

pub fn sort_videos(videos: &mut [VideoSummary], sort_by: SortBy) {
    match sort_by {
        SortBy::Views => videos.sort_by(|a, b| b.view_count.cmp(&a.view_count)),
        SortBy::Date => videos.sort_by(|a, b| b.published_at.cmp(&a.published_at)),
    }
}

impl ChannelVideos {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Videos from channel (sorted by {}):", self.sort_by);
        out.push_str(&rule('=', 50));
        out.push_str("\n\n");

        if self.videos.is_empty() {
            out.push_str("No videos found in the uploads playlist.\n");
            return out;
        }

        for (idx, video) in self.videos.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", idx + 1, video.title);
            let _ = writeln!(out, "   Published: {}", video.published_at.format("%Y-%m-%d"));
            let _ = writeln!(out, "   Views: {}", thousands(video.view_count));
            let _ = writeln!(out, "   Likes: {}", thousands(video.like_count));
            let _ = writeln!(out, "   Comments: {}", thousands(video.comment_count));
            let _ = writeln!(out, "   URL: {}", video.url);
            out.push_str(&rule('-', 50));
            out.push('\n');
        }
        out
    }
}
