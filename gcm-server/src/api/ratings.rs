//! Rating handlers

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use gcm_common::models::Rating;

use crate::actor::Actor;
use crate::error::{ApiJson, ApiResult};
use crate::services::rating::{self, RateRequest, StatementRatingSummary};
use crate::AppState;

/// GET /api/projects/:id/ratings
///
/// The caller's own ratings.
pub async fn my_ratings(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Rating>>> {
    Ok(Json(rating::my_ratings(&state, &actor, id).await?))
}

/// PUT /api/projects/:id/ratings
pub async fn rate_statement(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<RateRequest>,
) -> ApiResult<Json<Rating>> {
    Ok(Json(rating::rate(&state, &actor, id, request).await?))
}

/// GET /api/projects/:id/ratings/summary
pub async fn rating_summary(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<StatementRatingSummary>>> {
    Ok(Json(rating::summary(&state, id).await?))
}

/// Build rating routes
pub fn rating_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/:id/ratings",
            get(my_ratings).put(rate_statement),
        )
        .route("/api/projects/:id/ratings/summary", get(rating_summary))
}
