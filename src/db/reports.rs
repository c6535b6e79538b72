use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ReportRow {
    pub id: Uuid,
    pub channel_id: String,
    pub channel_name: String,
    pub competitor_query: Option<String>,
    pub title: String,
    pub executive_summary: String,
    pub sections: serde_json::Value,
    pub recommendations: Vec<String>,
    pub snapshot: serde_json::Value,
    pub videos_analyzed: i32,
    pub competitors_found: i32,
    pub total_tokens: Option<i32>,
    pub total_cost_usd: Option<f64>,
    pub providers_used: Vec<String>,
    pub generation_duration_ms: Option<i32>,
    pub trace_id: Option<String>,
    pub status: String,
    pub created_at: Option<DateTime<Utc>>,
}

pub struct InsertReport<'a> {
    pub id: Uuid,
    pub channel_id: &'a str,
    pub channel_name: &'a str,
    pub competitor_query: Option<&'a str>,
    pub title: &'a str,
    pub executive_summary: &'a str,
    pub sections: &'a serde_json::Value,
    pub recommendations: &'a [String],
    pub snapshot: &'a serde_json::Value,
    pub videos_analyzed: i32,
    pub competitors_found: i32,
    pub total_tokens: i32,
    pub total_cost_usd: f64,
    pub providers_used: &'a [String],
    pub generation_duration_ms: i32,
    pub trace_id: Option<&'a str>,
}

const SELECT_COLUMNS: &str = "SELECT id, channel_id, channel_name, competitor_query, title, \
     executive_summary, sections, recommendations, snapshot, videos_analyzed, \
     competitors_found, total_tokens, total_cost_usd::float8 as total_cost_usd, \
     providers_used, generation_duration_ms, trace_id, status, created_at \
     FROM analytics_reports";

#[tracing::instrument(name = "db.reports.insert", skip_all, fields(report.id = %params.id))]
pub async fn insert_report(pool: &PgPool, params: &InsertReport<'_>) -> Result<Uuid, sqlx::Error> {
    let row: (Uuid,) = sqlx::query_as(
        "INSERT INTO analytics_reports \
         (id, channel_id, channel_name, competitor_query, title, executive_summary, \
          sections, recommendations, snapshot, videos_analyzed, competitors_found, \
          total_tokens, total_cost_usd, providers_used, generation_duration_ms, trace_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16) \
         RETURNING id",
    )
    .bind(params.id)
    .bind(params.channel_id)
    .bind(params.channel_name)
    .bind(params.competitor_query)
    .bind(params.title)
    .bind(params.executive_summary)
    .bind(params.sections)
    .bind(params.recommendations)
    .bind(params.snapshot)
    .bind(params.videos_analyzed)
    .bind(params.competitors_found)
    .bind(params.total_tokens)
    .bind(params.total_cost_usd)
    .bind(params.providers_used)
    .bind(params.generation_duration_ms)
    .bind(params.trace_id)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}

#[tracing::instrument(name = "db.reports.get", skip(pool))]
pub async fn get_report(pool: &PgPool, id: Uuid) -> Result<Option<ReportRow>, sqlx::Error> {
    let sql = format!("{SELECT_COLUMNS} WHERE id = $1");
    sqlx::query_as::<_, ReportRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Newest first, optionally restricted to one channel.
#[tracing::instrument(name = "db.reports.list", skip(pool))]
pub async fn list_reports(
    pool: &PgPool,
    limit: i64,
    offset: i64,
    channel_id: Option<&str>,
) -> Result<Vec<ReportRow>, sqlx::Error> {
    let sql = format!(
        "{SELECT_COLUMNS} WHERE ($3::text IS NULL OR channel_id = $3) \
         ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    );
    sqlx::query_as::<_, ReportRow>(&sql)
        .bind(limit)
        .bind(offset)
        .bind(channel_id)
        .fetch_all(pool)
        .await
}
