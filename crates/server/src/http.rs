//! HTTP transport: request parsing, routing and status mapping over `CujuApi`.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use cuju_api::{CujuApi, CujuError};
use cuju_core::{Event, RankEntry, Skill, TalentId};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub event_id: String,
    pub talent_id: String,
    pub raw_metric: i64,
    pub skill: String,
    /// Defaults to receipt time when absent.
    #[serde(default)]
    pub ts: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TalentRankResponse {
    pub rank: usize,
    pub talent_id: String,
    pub score: i64,
}

impl From<RankEntry> for TalentRankResponse {
    fn from(e: RankEntry) -> Self {
        Self { rank: e.rank, talent_id: e.talent_id.0, score: e.best_score.score }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LeaderboardResponse {
    pub talents: Vec<TalentRankResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    limit: Option<String>,
}

/// Error half of every handler.
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(error: &'static str, message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, error, message: message.into() }
    }
}

impl From<CujuError> for ApiError {
    fn from(e: CujuError) -> Self {
        match e {
            CujuError::Validation(m) => Self::bad_request("Invalid request", m),
            CujuError::NotFound(m) => Self { status: StatusCode::NOT_FOUND, error: "Not found", message: m },
            CujuError::Internal(m) => {
                warn!(error = %m, "internal error serving request");
                Self { status: StatusCode::INTERNAL_SERVER_ERROR, error: "Internal error", message: m }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.error.to_string(), message: self.message })).into_response()
    }
}

type AppState = Arc<dyn CujuApi>;

pub fn create_router(api: Arc<dyn CujuApi>) -> Router {
    Router::new()
        .route("/events", post(create_event))
        .route("/events/dead", get(dead_letters))
        .route("/leaderboard", get(leaderboard))
        .route("/rank/:talent_id", get(talent_rank))
        .route("/stats", get(stats))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(api)
}

async fn create_event(
    State(api): State<AppState>,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::bad_request("Invalid JSON", e.body_text()))?;
    let skill: Skill = req.skill.parse().map_err(|e: cuju_core::ParseSkillError| ApiError::bad_request("Invalid skill", e.to_string()))?;
    let event = Event {
        event_id: req.event_id,
        talent_id: TalentId(req.talent_id),
        skill,
        metric_value: req.raw_metric,
        timestamp: req.ts.unwrap_or_else(Utc::now),
    };
    let accepted = api.submit_event(event).await?;
    Ok(if accepted { StatusCode::ACCEPTED } else { StatusCode::OK })
}

async fn leaderboard(
    State(api): State<AppState>,
    Query(q): Query<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, ApiError> {
    let limit = match q.limit.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        None => DEFAULT_LEADERBOARD_LIMIT,
        Some(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| ApiError::bad_request("Invalid limit parameter", "limit must be a positive integer"))?,
    };
    let talents = api.top_n(limit).await?.into_iter().map(TalentRankResponse::from).collect();
    Ok(Json(LeaderboardResponse { talents }))
}

async fn talent_rank(
    State(api): State<AppState>,
    Path(talent_id): Path<String>,
) -> Result<Json<TalentRankResponse>, ApiError> {
    if talent_id.trim().is_empty() {
        return Err(ApiError::bad_request("Missing talent_id", "talent_id is required in the URL path"));
    }
    let entry = api.rank_of(&TalentId(talent_id)).await?;
    Ok(Json(entry.into()))
}

async fn dead_letters(State(api): State<AppState>) -> Result<Json<Vec<Event>>, ApiError> {
    Ok(Json(api.dead_letters().await?))
}

async fn stats(State(api): State<AppState>) -> Result<Json<cuju_api::Stats>, ApiError> {
    Ok(Json(api.stats().await?))
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}
