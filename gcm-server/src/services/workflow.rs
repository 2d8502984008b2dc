//! Phase transitions and progress
//!
//! A transition re-derives the progress snapshot and updates the phase with
//! a compare-and-set inside one transaction, so two concurrent requests
//! cannot both pass a stale precondition check.

use chrono::Utc;
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use gcm_common::events::GcmEvent;
use gcm_common::models::Phase;
use gcm_common::workflow::{check_transition, readiness, PhaseTransition, ProgressSnapshot, Readiness};
use gcm_common::{Error, Result};

use crate::actor::Actor;
use crate::db;
use crate::AppState;

/// Rating progress of one participant
#[derive(Debug, Clone, Serialize)]
pub struct RatingProgress {
    pub total_statements: u32,
    pub rated: u32,
    pub percent: f64,
}

/// GET /api/projects/:id/progress body
#[derive(Debug, Clone, Serialize)]
pub struct ProjectProgress {
    pub project_id: Uuid,
    pub readiness: Readiness,
    pub rating: RatingProgress,
    pub cluster_count: u32,
    pub clusters_with_statements: u32,
}

/// Derive the progress snapshot for `actor_id`
pub async fn snapshot(conn: &mut SqliteConnection, project_id: Uuid, actor_id: Uuid) -> Result<ProgressSnapshot> {
    let total_statements = db::statements::count(&mut *conn, project_id).await?;
    let rated_by_actor = db::ratings::count_fully_rated(&mut *conn, project_id, actor_id).await?;
    let (cluster_count, clusters_with_statements) = db::clusters::active_counts(&mut *conn, project_id).await?;

    Ok(ProgressSnapshot {
        total_statements,
        rated_by_actor,
        cluster_count,
        clusters_with_statements,
    })
}

pub async fn progress(state: &AppState, actor: &Actor, project_id: Uuid) -> Result<ProjectProgress> {
    let mut conn = state.db.acquire().await?;
    let project = db::projects::require(&mut *conn, project_id).await?;
    let snap = snapshot(&mut conn, project_id, actor.user_id).await?;

    Ok(ProjectProgress {
        project_id,
        readiness: readiness(project.phase, &snap, &state.policy),
        rating: RatingProgress {
            total_statements: snap.total_statements,
            rated: snap.rated_by_actor,
            percent: snap.rating_percent(),
        },
        cluster_count: snap.cluster_count,
        clusters_with_statements: snap.clusters_with_statements,
    })
}

/// Move to the next phase
pub async fn advance(state: &AppState, actor: &Actor, project_id: Uuid) -> Result<PhaseTransition> {
    transition(state, actor, project_id, None).await
}

/// Move to an explicit target phase
pub async fn transition_to(state: &AppState, actor: &Actor, project_id: Uuid, target: Phase) -> Result<PhaseTransition> {
    transition(state, actor, project_id, Some(target)).await
}

async fn transition(
    state: &AppState,
    actor: &Actor,
    project_id: Uuid,
    target: Option<Phase>,
) -> Result<PhaseTransition> {
    let mut tx = state.db.begin().await?;

    let project = db::projects::require(&mut *tx, project_id).await?;
    project.ensure_owner(actor.user_id)?;

    let from = project.phase;
    let to = match target {
        Some(phase) => phase,
        None => from
            .next()
            .ok_or_else(|| Error::InvalidTransition(format!("{} is the final phase", from)))?,
    };

    let snap = snapshot(&mut tx, project_id, actor.user_id).await?;
    check_transition(from, to, &snap, &state.policy)?;

    let now = Utc::now();
    if !db::projects::update_phase(&mut *tx, project_id, from, to, now).await? {
        return Err(Error::Conflict(format!(
            "project {} changed phase concurrently; reload and retry",
            project_id
        )));
    }
    tx.commit().await?;

    info!(%project_id, old_phase = %from, new_phase = %to, actor = %actor.user_id, "Phase changed");
    state.event_bus.emit_lossy(GcmEvent::PhaseChanged {
        project_id,
        old_phase: from,
        new_phase: to,
        timestamp: now,
    });

    Ok(PhaseTransition {
        project_id,
        old_phase: from,
        new_phase: to,
        transitioned_at: now,
    })
}
