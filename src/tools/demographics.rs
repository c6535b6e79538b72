use std::fmt::Write;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::text::{DESCRIPTION_LIMIT, abbreviate};
use super::{ToolContext, channel_id_from};
use crate::error::{AppError, AppResult};
use crate::youtube::parts;

pub const ADVANCED_NOTE: &str = "Advanced demographics require YouTube Analytics API access";

#[derive(Debug, Clone, Deserialize)]
pub struct ChannelDemographicsParams {
    pub channel_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChannelDemographics {
    pub channel_id: String,
    pub channel_name: String,
    pub description: String,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    /// `None` when the channel hides its subscriber count.
    pub subscriber_count: Option<u64>,
    pub total_views: u64,
    pub total_videos: u64,
    pub custom_url: Option<String>,
    pub uploads_playlist_id: Option<String>,
    pub advanced: Option<AdvancedDemographics>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum AdvancedDemographics {
    Note(String),
    Error(String),
}

/// Fields Google requires in an authorized-user credentials document.
#[derive(Deserialize)]
struct AuthorizedUserInfo {
    client_id: String,
    client_secret: String,
    refresh_token: String,
}

#[tracing::instrument(
    name = "tool ChannelDemographicsTool",
    skip(ctx),
    fields(tool.name = "ChannelDemographicsTool", channel.name)
)]
pub async fn run(
    ctx: &ToolContext<'_>,
    params: &ChannelDemographicsParams,
) -> AppResult<ChannelDemographics> {
    let channel_id = channel_id_from(&params.channel_id)?;

    let response = ctx
        .api
        .list_channels(
            std::slice::from_ref(&channel_id),
            &[parts::STATISTICS, parts::SNIPPET, parts::CONTENT_DETAILS],
        )
        .await?;

    tracing::debug!(items = response.items.len(), "channels.list returned");

    let channel = response
        .items
        .into_iter()
        .next()
        .ok_or_else(|| AppError::NotFound("Channel not found or invalid channel ID.".into()))?;

    let uploads_playlist_id = channel.uploads_playlist_id().map(str::to_string);
    let snippet = channel
        .snippet
        .ok_or_else(|| AppError::Upstream("channels.list response is missing the snippet".into()))?;
    let stats = channel.statistics.unwrap_or_default();

    tracing::Span::current().record("channel.name", snippet.title.as_str());

    Ok(ChannelDemographics {
        channel_id: channel.id,
        channel_name: snippet.title,
        description: abbreviate(&snippet.description, DESCRIPTION_LIMIT),
        country: snippet.country,
        created_at: snippet.published_at,
        subscriber_count: if stats.hidden_subscriber_count {
            None
        } else {
            stats.subscriber_count
        },
        total_views: stats.view_count.unwrap_or(0),
        total_videos: stats.video_count.unwrap_or(0),
        custom_url: snippet.custom_url,
        uploads_playlist_id,
        advanced: ctx.oauth_credentials.map(advanced_demographics),
    })
}

/// Audience breakdowns live in the YouTube Analytics API, which this service
/// does not call; valid OAuth credentials only earn a note saying so.
fn advanced_demographics(credentials: &str) -> AdvancedDemographics {
    match serde_json::from_str::<AuthorizedUserInfo>(credentials) {
        Ok(info)
            if !info.client_id.is_empty()
                && !info.client_secret.is_empty()
                && !info.refresh_token.is_empty() =>
        {
            AdvancedDemographics::Note(ADVANCED_NOTE.to_string())
        }
        Ok(_) => AdvancedDemographics::Error(
            "Could not fetch advanced demographics: credentials contain empty fields".to_string(),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "OAuth credentials could not be parsed");
            AdvancedDemographics::Error(format!("Could not fetch advanced demographics: {e}"))
        }
    }
}

impl ChannelDemographics {
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("Channel Demographics Report\n");
        out.push_str("========================\n\n");
        out.push_str("Basic Statistics:\n");
        out.push_str("----------------\n");

        let subscribers = self
            .subscriber_count
            .map(|n| n.to_string())
            .unwrap_or_else(|| "Hidden".to_string());
        let rows = [
            ("Channel Name", self.channel_name.clone()),
            ("Description", self.description.clone()),
            (
                "Country",
                self.country.clone().unwrap_or_else(|| "Not specified".into()),
            ),
            (
                "Created Date",
                self.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ),
            ("Subscriber Count", subscribers),
            ("Total Views", self.total_views.to_string()),
            ("Total Videos", self.total_videos.to_string()),
            (
                "Custom URL",
                self.custom_url.clone().unwrap_or_else(|| "Not available".into()),
            ),
        ];
        for (key, value) in rows {
            let _ = writeln!(out, "{key}: {value}");
        }

        if let Some(advanced) = &self.advanced {
            out.push_str("\nAdvanced Demographics:\n");
            out.push_str("---------------------\n");
            match advanced {
                AdvancedDemographics::Note(msg) => {
                    let _ = writeln!(out, "Note: {msg}");
                }
                AdvancedDemographics::Error(msg) => {
                    let _ = writeln!(out, "Error: {msg}");
                }
            }
        }

        out
    }
}
