//! In-memory [`YoutubeApi`] used by unit tests across the crate.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use super::types::{
    BrandingChannel, BrandingSettings, Channel, ChannelContentDetails, ChannelSnippet,
    ChannelStatistics, CommentSnippet, CommentThread, CommentThreadSnippet, ListResponse,
    PageInfo, PlaylistItem, PlaylistItemSnippet, RelatedPlaylists, ResourceId, SearchResult,
    SearchSnippet, TopLevelComment, TopicDetails, Video, VideoContentDetails, VideoSnippet,
    VideoStatistics,
};
use super::{YoutubeApi, YoutubeError};

#[derive(Default)]
pub struct FakeYoutube {
    pub channels: HashMap<String, Channel>,
    pub playlists: HashMap<String, Vec<String>>,
    pub videos: HashMap<String, Video>,
    pub search_results: HashMap<String, Vec<String>>,
    pub comments: HashMap<String, Vec<CommentThread>>,
    pub comments_disabled: Vec<String>,
    pub fail_with: Mutex<Option<YoutubeError>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeYoutube {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a channel whose uploads playlist is `UU{id}` and holds `video_ids`
    /// newest first, the way the Data API orders uploads.
    pub fn with_channel(mut self, channel: Channel, video_ids: &[&str]) -> Self {
        let playlist = format!("UU{}", channel.id);
        self.playlists
            .insert(playlist, video_ids.iter().map(|s| s.to_string()).collect());
        self.channels.insert(channel.id.clone(), channel);
        self
    }

    pub fn with_video(mut self, video: Video) -> Self {
        self.videos.insert(video.id.clone(), video);
        self
    }

    pub fn with_search(mut self, query: &str, channel_ids: &[&str]) -> Self {
        self.search_results.insert(
            query.to_string(),
            channel_ids.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    pub fn with_comments(mut self, video_id: &str, comments: Vec<CommentThread>) -> Self {
        self.comments.insert(video_id.to_string(), comments);
        self
    }

    pub fn with_comments_disabled(mut self, video_id: &str) -> Self {
        self.comments_disabled.push(video_id.to_string());
        self
    }

    pub fn fail_next(&self, err: YoutubeError) {
        *self.fail_with.lock().unwrap() = Some(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), YoutubeError> {
        self.calls.lock().unwrap().push(call);
        match self.fail_with.lock().unwrap().take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl YoutubeApi for FakeYoutube {
    async fn list_channels(
        &self,
        ids: &[String],
        parts: &[&str],
    ) -> Result<ListResponse<Channel>, YoutubeError> {
        self.record(format!("channels {} [{}]", ids.join(","), parts.join(",")))?;
        let items: Vec<Channel> = ids
            .iter()
            .filter_map(|id| self.channels.get(id).cloned())
            .collect();
        let total = items.len() as u64;
        Ok(ListResponse {
            items,
            next_page_token: None,
            page_info: Some(PageInfo {
                total_results: Some(total),
                results_per_page: Some(5),
            }),
        })
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ListResponse<PlaylistItem>, YoutubeError> {
        self.record(format!(
            "playlistItems {playlist_id} max={max_results} page={}",
            page_token.unwrap_or("-")
        ))?;
        let ids = self
            .playlists
            .get(playlist_id)
            .ok_or_else(|| YoutubeError::NotFound(format!("playlist {playlist_id} not found")))?;

        let offset: usize = page_token.and_then(|t| t.parse().ok()).unwrap_or(0);
        let end = (offset + max_results as usize).min(ids.len());
        let items = ids[offset.min(end)..end]
            .iter()
            .map(|id| playlist_item(id))
            .collect();
        let next_page_token = (end < ids.len()).then(|| end.to_string());

        Ok(ListResponse {
            items,
            next_page_token,
            page_info: None,
        })
    }

    async fn list_videos(
        &self,
        ids: &[String],
        parts: &[&str],
    ) -> Result<ListResponse<Video>, YoutubeError> {
        self.record(format!("videos {} [{}]", ids.join(","), parts.join(",")))?;
        Ok(ListResponse::new(
            ids.iter()
                .filter_map(|id| self.videos.get(id).cloned())
                .collect(),
        ))
    }

    async fn search_channels(
        &self,
        query: &str,
        max_results: u32,
        relevance_language: &str,
    ) -> Result<ListResponse<SearchResult>, YoutubeError> {
        self.record(format!("search {query} max={max_results} lang={relevance_language}"))?;
        let ids = self.search_results.get(query).cloned().unwrap_or_default();
        Ok(ListResponse::new(
            ids.into_iter()
                .take(max_results as usize)
                .map(|channel_id| SearchResult {
                    snippet: SearchSnippet {
                        channel_id,
                        title: String::new(),
                    },
                })
                .collect(),
        ))
    }

    async fn list_comment_threads(
        &self,
        video_id: &str,
        max_results: u32,
    ) -> Result<ListResponse<CommentThread>, YoutubeError> {
        self.record(format!("commentThreads {video_id} max={max_results}"))?;
        if self.comments_disabled.iter().any(|v| v == video_id) {
            return Err(YoutubeError::Forbidden {
                reason: "commentsDisabled".to_string(),
                message: format!("The video {video_id} has disabled comments."),
            });
        }
        Ok(ListResponse::new(
            self.comments
                .get(video_id)
                .cloned()
                .unwrap_or_default()
                .into_iter()
                .take(max_results as usize)
                .collect(),
        ))
    }
}

pub fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

pub fn channel(id: &str, title: &str, subscribers: Option<u64>, views: u64, videos: u64) -> Channel {
    Channel {
        id: id.to_string(),
        snippet: Some(ChannelSnippet {
            title: title.to_string(),
            description: format!("{title} makes videos"),
            custom_url: Some(format!("@{}", title.to_lowercase().replace(' ', ""))),
            published_at: ts("2015-03-01T12:00:00Z"),
            country: Some("US".to_string()),
        }),
        statistics: Some(ChannelStatistics {
            view_count: Some(views),
            subscriber_count: subscribers,
            hidden_subscriber_count: subscribers.is_none(),
            video_count: Some(videos),
        }),
        content_details: Some(ChannelContentDetails {
            related_playlists: Some(RelatedPlaylists {
                uploads: Some(format!("UU{id}")),
            }),
        }),
        branding_settings: None,
        topic_details: None,
    }
}

pub fn with_branding(mut channel: Channel, description: &str, keywords: &str, topics: &[&str]) -> Channel {
    if let Some(snippet) = channel.snippet.as_mut() {
        snippet.description = description.to_string();
    }
    channel.branding_settings = Some(BrandingSettings {
        channel: Some(BrandingChannel {
            keywords: Some(keywords.to_string()),
        }),
    });
    channel.topic_details = Some(TopicDetails {
        topic_categories: topics.iter().map(|t| t.to_string()).collect(),
    });
    channel
}

pub fn video(id: &str, title: &str, published: &str, views: u64, likes: u64, comments: u64) -> Video {
    Video {
        id: id.to_string(),
        snippet: VideoSnippet {
            title: title.to_string(),
            channel_id: "UCfake".to_string(),
            channel_title: "Fake Channel".to_string(),
            published_at: ts(published),
        },
        statistics: Some(VideoStatistics {
            view_count: Some(views),
            like_count: Some(likes),
            comment_count: Some(comments),
        }),
        content_details: Some(VideoContentDetails {
            duration: Some("PT12M5S".to_string()),
        }),
    }
}

pub fn comment(text: &str, author: &str, likes: u64, published: &str) -> CommentThread {
    CommentThread {
        snippet: CommentThreadSnippet {
            top_level_comment: TopLevelComment {
                snippet: CommentSnippet {
                    text_display: text.to_string(),
                    author_display_name: author.to_string(),
                    like_count: Some(likes),
                    published_at: ts(published),
                },
            },
        },
    }
}

fn playlist_item(video_id: &str) -> PlaylistItem {
    PlaylistItem {
        snippet: Some(PlaylistItemSnippet {
            resource_id: Some(ResourceId {
                video_id: Some(video_id.to_string()),
            }),
        }),
    }
}
