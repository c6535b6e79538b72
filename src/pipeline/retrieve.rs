use crate::error::{AppError, AppResult};
use crate::tools::{
    ChannelDemographics, ChannelDemographicsParams, ChannelVideos, CompetitorReport,
    CompetitorSearchParams, SortBy, ToolContext, VideoFetchingParams, VideoPerformance,
    VideoPerformanceParams, competitors, demographics, performance, videos,
};

use super::ReportRequest;

/// Raw tool outputs collected for one report.
#[derive(Debug, Clone)]
pub struct ChannelData {
    pub demographics: ChannelDemographics,
    pub videos: ChannelVideos,
    pub performances: Vec<VideoPerformance>,
    pub competitors: Option<CompetitorReport>,
}

#[tracing::instrument(
    name = "pipeline_stage retrieve",
    skip(ctx, request),
    fields(
        pipeline.stage = "retrieve",
        youtube.channel_id = %request.channel_id,
        report.videos_sampled,
        report.videos_analyzed,
        report.competitors_found,
    )
)]
pub async fn retrieve(ctx: &ToolContext<'_>, request: &ReportRequest) -> AppResult<ChannelData> {
    // Bad credentials and unknown channels stop the run here.
    let demographics = demographics::run(
        ctx,
        &ChannelDemographicsParams {
            channel_id: request.channel_id.clone(),
        },
    )
    .await?;

    let videos = videos::run(
        ctx,
        &VideoFetchingParams {
            channel_id: demographics.channel_id.clone(),
            max_results: request.max_videos,
            sort_by: SortBy::Views,
        },
    )
    .await?;

    let mut performances = Vec::new();
    for summary in videos.videos.iter().take(request.top_videos as usize) {
        let params = VideoPerformanceParams {
            video_id: summary.video_id.clone(),
            include_comments: request.include_comments,
        };
        match performance::run(ctx, &params).await {
            Ok(p) => performances.push(p),
            // Listed a moment ago but gone now (deleted or made private).
            Err(AppError::NotFound(reason)) => {
                tracing::warn!(video_id = %summary.video_id, %reason, "skipping vanished video");
            }
            Err(e) => return Err(e),
        }
    }

    let competitors = match request.competitor_query() {
        Some(query) => Some(competitors::run(ctx, &CompetitorSearchParams::new(query)).await?),
        None => None,
    };

    let span = tracing::Span::current();
    span.record("report.videos_sampled", videos.videos.len());
    span.record("report.videos_analyzed", performances.len());
    span.record(
        "report.competitors_found",
        competitors.as_ref().map_or(0, |c| c.competitors.len()),
    );

    Ok(ChannelData {
        demographics,
        videos,
        performances,
        competitors,
    })
}
