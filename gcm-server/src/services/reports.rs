//! Priority analysis and exports
//!
//! Both read a snapshot of the active clustering pass and never write.

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use gcm_common::analysis::{priority_matrix, summarize_ratings, PriorityMatrix};
use gcm_common::export::{ExportFormat, ProjectExport};
use gcm_common::models::Phase;
use gcm_common::{Error, Result};

use crate::db;
use crate::AppState;

/// GET /analysis body
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub project_id: Uuid,
    pub phase: Phase,
    pub statement_count: u32,
    pub rated_statement_count: u32,
    pub matrix: PriorityMatrix,
}

/// A rendered export ready to be sent as a download
#[derive(Debug, Clone)]
pub struct RenderedExport {
    pub format: ExportFormat,
    pub file_name: String,
    pub body: String,
}

pub async fn analysis(state: &AppState, project_id: Uuid) -> Result<Analysis> {
    let mut conn = state.db.acquire().await?;
    let project = db::projects::require(&mut *conn, project_id).await?;
    let clusters = db::clusters::list_active(&mut conn, project_id).await?;
    let ratings = db::ratings::list_for_project(&mut *conn, project_id).await?;

    let means = summarize_ratings(&ratings);
    let rated_statement_count = means.values().filter(|m| m.pair().is_some()).count() as u32;

    Ok(Analysis {
        project_id,
        phase: project.phase,
        statement_count: project.statement_count,
        rated_statement_count,
        matrix: priority_matrix(&clusters, &means),
    })
}

/// Render the project in `format`; the owner's plan must include export
pub async fn export(state: &AppState, project_id: Uuid, format: ExportFormat) -> Result<RenderedExport> {
    let mut conn = state.db.acquire().await?;
    let project = db::projects::require(&mut *conn, project_id).await?;

    let owner = db::accounts::get_or_create(&mut conn, project.owner_id).await?;
    if !owner.features().export {
        return Err(Error::PermissionDenied(format!(
            "the {} plan does not include export",
            owner.plan.as_str()
        )));
    }

    let statements = db::statements::list(&mut *conn, project_id).await?;
    let clusters = db::clusters::list_active(&mut conn, project_id).await?;
    let ratings = db::ratings::list_for_project(&mut *conn, project_id).await?;
    drop(conn);

    let body = ProjectExport::build(&project, &statements, &clusters, &ratings).render(format)?;
    info!(%project_id, format = format.extension(), bytes = body.len(), "Project exported");

    Ok(RenderedExport {
        format,
        file_name: format!("project-{}.{}", project_id, format.extension()),
        body,
    })
}
