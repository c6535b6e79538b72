use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;
use crate::db::reports::ReportRow;
use crate::error::{AppError, AppResult};
use crate::pipeline::{AnalyticsReport, Models, ReportRequest, generate_report};

pub const DEFAULT_LIST_LIMIT: i64 = 20;
pub const MAX_LIST_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub channel_id: Option<String>,
}

impl ListQuery {
    fn bounds(&self) -> AppResult<(i64, i64)> {
        let limit = self.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let offset = self.offset.unwrap_or(0);
        if !(1..=MAX_LIST_LIMIT).contains(&limit) {
            return Err(AppError::Validation(format!(
                "limit must be between 1 and {MAX_LIST_LIMIT}"
            )));
        }
        if offset < 0 {
            return Err(AppError::Validation("offset must not be negative".into()));
        }
        Ok((limit, offset))
    }
}

pub async fn create_report(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> AppResult<(StatusCode, Json<AnalyticsReport>)> {
    let request: ReportRequest = serde_json::from_value(body)
        .map_err(|e| AppError::Validation(format!("invalid report request: {e}")))?;
    request.validate()?;

    let report = generate_report(
        &state.pool,
        &state.tool_context(),
        &state.llm_client,
        Models {
            capable: &state.config.llm_model_capable,
            fast: &state.config.llm_model_fast,
        },
        &request,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> AppResult<Json<Vec<ReportRow>>> {
    let (limit, offset) = params.bounds()?;
    let channel_id = params
        .channel_id
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let reports = crate::db::reports::list_reports(&state.pool, limit, offset, channel_id).await?;

    Ok(Json(reports))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<ReportRow>> {
    let id = Uuid::parse_str(&id)
        .map_err(|_| AppError::Validation(format!("'{id}' is not a valid report id")))?;

    let report = crate::db::reports::get_report(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Report {id} not found")))?;

    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use super::*;
    use crate::routes::tests::{body_json, test_app};
    use crate::youtube::fake::FakeYoutube;

    #[test]
    fn test_list_query_bounds() {
        let query: ListQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.bounds().unwrap(), (20, 0));

        let query: ListQuery =
            serde_json::from_str(r#"{"limit": 100, "offset": 5, "channel_id": "UCrust"}"#).unwrap();
        assert_eq!(query.bounds().unwrap(), (100, 5));
        assert_eq!(query.channel_id.as_deref(), Some("UCrust"));

        for body in [r#"{"limit": 0}"#, r#"{"limit": 101}"#, r#"{"offset": -1}"#] {
            let query: ListQuery = serde_json::from_str(body).unwrap();
            assert!(query.bounds().is_err(), "{body} should be rejected");
        }
    }

    #[tokio::test]
    async fn test_list_reports_rejects_large_limit() {
        let response = test_app(FakeYoutube::new())
            .oneshot(
                Request::builder()
                    .uri("/api/reports?limit=500")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "limit must be between 1 and 100");
    }

    #[tokio::test]
    async fn test_get_report_rejects_malformed_id() {
        let response = test_app(FakeYoutube::new())
            .oneshot(
                Request::builder()
                    .uri("/api/reports/not-a-uuid")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_report_validates_before_running() {
        for body in [
            r#"{"max_videos": 5}"#,
            r#"{"channel_id": "UCrust", "top_videos": 50}"#,
            r#"{"channel_id": "UCrust", "max_videos": "lots"}"#,
        ] {
            let response = test_app(FakeYoutube::new())
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/reports")
                        .header("content-type", "application/json")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        }
    }
}
