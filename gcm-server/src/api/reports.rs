//! Analysis and export handlers

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use gcm_common::export::ExportFormat;

use crate::actor::Actor;
use crate::error::{ApiError, ApiResult};
use crate::services::reports::{self, Analysis};
use crate::AppState;

/// GET /api/projects/:id/export query
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

/// GET /api/projects/:id/analysis
pub async fn get_analysis(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Analysis>> {
    Ok(Json(reports::analysis(&state, id).await?))
}

/// GET /api/projects/:id/export?format=csv|json|text
///
/// Defaults to JSON. The body is sent as an attachment.
pub async fn export_project(
    State(state): State<AppState>,
    _actor: Actor,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let format = match query.format.as_deref() {
        Some(raw) => raw.parse::<ExportFormat>().map_err(ApiError::from)?,
        None => ExportFormat::Json,
    };

    let export = reports::export(&state, id, format).await?;
    let disposition = format!("attachment; filename=\"{}\"", export.file_name);

    Ok((
        [
            (header::CONTENT_TYPE, export.format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export.body,
    )
        .into_response())
}

/// Build analysis and export routes
pub fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:id/analysis", get(get_analysis))
        .route("/api/projects/:id/export", get(export_project))
}
