//! Project lifecycle: create, read, update, delete

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use gcm_common::events::GcmEvent;
use gcm_common::models::{NewProject, Project, ProjectUpdate};
use gcm_common::{Error, Result};

use crate::actor::Actor;
use crate::db;
use crate::AppState;

/// Create a project owned by the actor, within the plan's project limit
pub async fn create(state: &AppState, actor: &Actor, new: NewProject) -> Result<Project> {
    let new = new.validate()?;

    let mut tx = state.db.begin().await?;
    let account = db::accounts::get_or_create(&mut tx, actor.user_id).await?;
    if let Some(max) = account.features().max_projects {
        let owned = db::projects::count_owned(&mut *tx, actor.user_id).await?;
        if owned >= max {
            return Err(Error::PermissionDenied(format!(
                "the {} plan allows at most {} projects",
                account.plan.as_str(),
                max
            )));
        }
    }
    let project = db::projects::insert(&mut *tx, actor.user_id, &new).await?;
    tx.commit().await?;

    info!(project_id = %project.id, owner = %actor.user_id, title = %project.title, "Project created");
    state.event_bus.emit_lossy(GcmEvent::ProjectCreated {
        project_id: project.id,
        project: project.clone(),
        timestamp: Utc::now(),
    });
    Ok(project)
}

pub async fn list_owned(state: &AppState, actor: &Actor) -> Result<Vec<Project>> {
    db::projects::list_owned(&state.db, actor.user_id).await
}

pub async fn get(state: &AppState, project_id: Uuid) -> Result<Project> {
    db::projects::require(&state.db, project_id).await
}

/// Owner-only attribute update; phase is not updatable here
pub async fn update(state: &AppState, actor: &Actor, project_id: Uuid, update: ProjectUpdate) -> Result<Project> {
    let update = update.validate()?;
    if update.is_empty() {
        return Err(Error::validation("body", "no updatable fields supplied"));
    }

    let mut tx = state.db.begin().await?;
    let mut project = db::projects::require(&mut *tx, project_id).await?;
    project.ensure_owner(actor.user_id)?;
    update.apply_to(&mut project);
    db::projects::update_attributes(&mut *tx, &project).await?;
    tx.commit().await?;

    info!(%project_id, status = project.status.as_str(), "Project updated");
    state.event_bus.emit_lossy(GcmEvent::ProjectUpdated {
        project_id,
        project: project.clone(),
        timestamp: Utc::now(),
    });
    Ok(project)
}

/// Owner-only delete, in any phase; child records go by cascade
pub async fn delete(state: &AppState, actor: &Actor, project_id: Uuid) -> Result<()> {
    let mut tx = state.db.begin().await?;
    let project = db::projects::require(&mut *tx, project_id).await?;
    project.ensure_owner(actor.user_id)?;
    db::projects::delete(&mut *tx, project_id).await?;
    tx.commit().await?;

    info!(%project_id, "Project deleted");
    state.event_bus.emit_lossy(GcmEvent::ProjectDeleted {
        project_id,
        timestamp: Utc::now(),
    });
    Ok(())
}
