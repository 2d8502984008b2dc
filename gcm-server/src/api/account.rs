//! Account and credit handlers

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};

use crate::actor::Actor;
use crate::error::{ApiJson, ApiResult};
use crate::services::account::{self, AccountView, PackageInfo, TopUpRequest};
use crate::AppState;

/// GET /api/account
pub async fn get_account(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<AccountView>> {
    Ok(Json(account::get(&state, &actor).await?))
}

/// POST /api/account/top-up
pub async fn top_up(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(request): ApiJson<TopUpRequest>,
) -> ApiResult<Json<AccountView>> {
    Ok(Json(account::top_up(&state, &actor, request).await?))
}

/// GET /api/credit-packages
pub async fn list_packages(_actor: Actor) -> Json<Vec<PackageInfo>> {
    Json(account::packages())
}

/// Build account routes
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/account", get(get_account))
        .route("/api/account/top-up", post(top_up))
        .route("/api/credit-packages", get(list_packages))
}
