//! Brainstorming handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use gcm_common::models::Statement;

use crate::actor::Actor;
use crate::error::{ApiJson, ApiResult};
use crate::services::brainstorming::{self, GenerateStatementsRequest, GeneratedStatements};
use crate::AppState;

/// POST/PATCH statement body
#[derive(Debug, Deserialize)]
pub struct StatementText {
    pub text: String,
}

/// GET /api/projects/:id/statements
pub async fn list_statements(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<Statement>>> {
    Ok(Json(brainstorming::list(&state, id).await?))
}

/// POST /api/projects/:id/statements
pub async fn add_statement(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<StatementText>,
) -> ApiResult<(StatusCode, Json<Statement>)> {
    let statement = brainstorming::add_manual(&state, &actor, id, &request.text).await?;
    Ok((StatusCode::CREATED, Json(statement)))
}

/// PATCH /api/projects/:id/statements/:sid
pub async fn edit_statement(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, statement_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<StatementText>,
) -> ApiResult<Json<Statement>> {
    Ok(Json(
        brainstorming::edit(&state, &actor, id, statement_id, &request.text).await?,
    ))
}

/// DELETE /api/projects/:id/statements/:sid
pub async fn delete_statement(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, statement_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    brainstorming::delete(&state, &actor, id, statement_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/projects/:id/statements/generate
///
/// Returns 402 when the caller's balance does not cover the request and 409
/// while another generation for the project is running.
pub async fn generate_statements(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<GenerateStatementsRequest>,
) -> ApiResult<(StatusCode, Json<GeneratedStatements>)> {
    let generated = brainstorming::generate(&state, &actor, id, request).await?;
    Ok((StatusCode::CREATED, Json(generated)))
}

/// Build statement routes
pub fn statement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/:id/statements",
            get(list_statements).post(add_statement),
        )
        .route("/api/projects/:id/statements/generate", post(generate_statements))
        .route(
            "/api/projects/:id/statements/:sid",
            patch(edit_statement).delete(delete_statement),
        )
}
