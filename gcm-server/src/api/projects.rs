//! Project and workflow handlers
//!
//! /api/projects, /api/projects/:id, progress and phase transitions

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use gcm_common::models::{NewProject, Phase, Project, ProjectUpdate};
use gcm_common::workflow::PhaseTransition;

use crate::actor::Actor;
use crate::error::{ApiJson, ApiResult};
use crate::services::{self, workflow::ProjectProgress};
use crate::AppState;

/// PUT /api/projects/:id/phase request
#[derive(Debug, Deserialize)]
pub struct SetPhaseRequest {
    pub phase: Phase,
}

/// GET /api/projects
///
/// Projects owned by the caller, most recently updated first.
pub async fn list_projects(State(state): State<AppState>, actor: Actor) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(services::projects::list_owned(&state, &actor).await?))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    actor: Actor,
    ApiJson(request): ApiJson<NewProject>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    let project = services::projects::create(&state, &actor, request).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Project>> {
    Ok(Json(services::projects::get(&state, id).await?))
}

/// PATCH /api/projects/:id
pub async fn update_project(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<ProjectUpdate>,
) -> ApiResult<Json<Project>> {
    Ok(Json(services::projects::update(&state, &actor, id, request).await?))
}

/// DELETE /api/projects/:id
pub async fn delete_project(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    services::projects::delete(&state, &actor, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/projects/:id/progress
pub async fn get_progress(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectProgress>> {
    Ok(Json(services::workflow::progress(&state, &actor, id).await?))
}

/// POST /api/projects/:id/phase/advance
pub async fn advance_phase(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PhaseTransition>> {
    Ok(Json(services::workflow::advance(&state, &actor, id).await?))
}

/// PUT /api/projects/:id/phase
pub async fn set_phase(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<SetPhaseRequest>,
) -> ApiResult<Json<PhaseTransition>> {
    Ok(Json(
        services::workflow::transition_to(&state, &actor, id, request.phase).await?,
    ))
}

/// Build project routes
pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route(
            "/api/projects/:id",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/api/projects/:id/progress", get(get_progress))
        .route("/api/projects/:id/phase", put(set_phase))
        .route("/api/projects/:id/phase/advance", post(advance_phase))
}
