//! Clustering handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post, put},
    Json, Router,
};
use uuid::Uuid;

use gcm_common::models::{Cluster, ClusteringPass};

use crate::actor::Actor;
use crate::error::{ApiJson, ApiResult};
use crate::services::clustering::{
    self, Assignment, AssignmentResult, ClusterListing, ClusterUpdate, GenerateClustersRequest, NewCluster,
    RegeneratedClusters,
};
use crate::AppState;

/// GET /api/projects/:id/clusters
pub async fn list_clusters(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ClusterListing>> {
    Ok(Json(clustering::list(&state, id).await?))
}

/// GET /api/projects/:id/clusters/passes
pub async fn list_passes(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ClusteringPass>>> {
    Ok(Json(clustering::passes(&state, id).await?))
}

/// POST /api/projects/:id/clusters
pub async fn create_cluster(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<NewCluster>,
) -> ApiResult<(StatusCode, Json<Cluster>)> {
    let cluster = clustering::create(&state, &actor, id, request).await?;
    Ok((StatusCode::CREATED, Json(cluster)))
}

/// PATCH /api/projects/:id/clusters/:cid
pub async fn update_cluster(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, cluster_id)): Path<(Uuid, Uuid)>,
    ApiJson(request): ApiJson<ClusterUpdate>,
) -> ApiResult<Json<Cluster>> {
    Ok(Json(
        clustering::update(&state, &actor, id, cluster_id, request).await?,
    ))
}

/// DELETE /api/projects/:id/clusters/:cid
pub async fn delete_cluster(
    State(state): State<AppState>,
    actor: Actor,
    Path((id, cluster_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<StatusCode> {
    clustering::delete(&state, &actor, id, cluster_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/projects/:id/clusters/assignments
pub async fn assign_statement(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<Assignment>,
) -> ApiResult<Json<AssignmentResult>> {
    Ok(Json(clustering::assign(&state, &actor, id, request).await?))
}

/// POST /api/projects/:id/clusters/generate
pub async fn generate_clusters(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<Uuid>,
    ApiJson(request): ApiJson<GenerateClustersRequest>,
) -> ApiResult<(StatusCode, Json<RegeneratedClusters>)> {
    let regenerated = clustering::generate(&state, &actor, id, request).await?;
    Ok((StatusCode::CREATED, Json(regenerated)))
}

/// Build cluster routes
pub fn cluster_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/projects/:id/clusters",
            get(list_clusters).post(create_cluster),
        )
        .route("/api/projects/:id/clusters/assignments", put(assign_statement))
        .route("/api/projects/:id/clusters/generate", post(generate_clusters))
        .route("/api/projects/:id/clusters/passes", get(list_passes))
        .route(
            "/api/projects/:id/clusters/:cid",
            patch(update_cluster).delete(delete_cluster),
        )
}
