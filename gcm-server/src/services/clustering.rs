//! Manual cluster editing and AI cluster regeneration
//!
//! All changes apply to the project's active clustering pass. Manual edits
//! open a manual pass on first use; regeneration archives the active pass
//! and starts a new one.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use gcm_common::analysis::summarize_ratings;
use gcm_common::clustering::{ClusterInput, ClusterSettings};
use gcm_common::credits::{clustering_cost, CreditBalance};
use gcm_common::events::GcmEvent;
use gcm_common::models::cluster::{palette_color, validate_name};
use gcm_common::models::{Cluster, ClusterBoard, ClusterMethod, ClusteringPass, Phase, Project};
use gcm_common::{Error, Result};

use crate::actor::Actor;
use crate::db;
use crate::services::in_flight::AiOperation;
use crate::AppState;

const CLUSTER_EDIT_PHASES: &[Phase] = &[Phase::Structuring, Phase::Rating];

#[derive(Debug, Clone, Deserialize)]
pub struct NewCluster {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClusterUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

/// Move a statement into `cluster_id`, or unassign it when `cluster_id` is null
#[derive(Debug, Clone, Deserialize)]
pub struct Assignment {
    pub statement_id: Uuid,
    pub cluster_id: Option<Uuid>,
}

/// POST /clusters/generate body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateClustersRequest {
    #[serde(default)]
    pub settings: ClusterSettings,
    /// Required when the project already has clusters
    #[serde(default)]
    pub replace: bool,
}

/// Active pass and its clusters
#[derive(Debug, Clone, Serialize)]
pub struct ClusterListing {
    pub pass: Option<ClusteringPass>,
    pub clusters: Vec<Cluster>,
    /// Statements in no cluster of the active pass
    pub unassigned: Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegeneratedClusters {
    pub pass: ClusteringPass,
    pub clusters: Vec<Cluster>,
    pub archived_previous: bool,
    pub credits_charged: u32,
    pub credits_remaining: CreditBalance,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssignmentResult {
    pub statement_id: Uuid,
    pub from_cluster: Option<Uuid>,
    pub to_cluster: Option<Uuid>,
}

fn ensure_editable(project: &Project, actor: &Actor, operation: &str) -> Result<()> {
    project.ensure_owner(actor.user_id)?;
    project.ensure_phase(CLUSTER_EDIT_PHASES, operation)
}

fn validate_color(color: Option<String>) -> Result<Option<String>> {
    match color.map(|c| c.trim().to_string()) {
        None => Ok(None),
        Some(c) if c.is_empty() => Ok(None),
        Some(c) if c.len() <= 32 => Ok(Some(c)),
        Some(_) => Err(Error::validation("color", "must be at most 32 characters")),
    }
}

/// Load a cluster of the active pass; archived clusters are read-only
async fn require_active_cluster(conn: &mut SqliteConnection, project_id: Uuid, cluster_id: Uuid) -> Result<Cluster> {
    let cluster = db::clusters::require(&mut *conn, project_id, cluster_id).await?;
    let active = db::clusters::active_pass(&mut *conn, project_id).await?;
    if active.map(|p| p.id) != Some(cluster.pass_id) {
        return Err(Error::NotFound(format!(
            "cluster {} is not in the active clustering pass",
            cluster_id
        )));
    }
    Ok(cluster)
}

pub async fn list(state: &AppState, project_id: Uuid) -> Result<ClusterListing> {
    let mut conn = state.db.acquire().await?;
    db::projects::require(&mut *conn, project_id).await?;
    let pass = db::clusters::active_pass(&mut *conn, project_id).await?;
    let clusters = match &pass {
        Some(p) => db::clusters::list_for_pass(&mut conn, p.id).await?,
        None => Vec::new(),
    };

    let statements = db::statements::list(&mut *conn, project_id).await?;
    let board = ClusterBoard::new(clusters);
    let unassigned = statements
        .iter()
        .filter(|s| board.cluster_of(s.id).is_none())
        .map(|s| s.id)
        .collect();

    Ok(ClusterListing {
        pass,
        clusters: board.into_clusters(),
        unassigned,
    })
}

/// Clustering history of a project, newest first
pub async fn passes(state: &AppState, project_id: Uuid) -> Result<Vec<ClusteringPass>> {
    let mut conn = state.db.acquire().await?;
    db::projects::require(&mut *conn, project_id).await?;
    db::clusters::list_passes(&mut *conn, project_id).await
}

/// Create an empty cluster in the active pass
pub async fn create(state: &AppState, actor: &Actor, project_id: Uuid, new: NewCluster) -> Result<Cluster> {
    let name = validate_name(&new.name)?;
    let color = validate_color(new.color)?;

    let mut tx = state.db.begin().await?;
    let project = db::projects::require(&mut *tx, project_id).await?;
    ensure_editable(&project, actor, "creating clusters")?;

    let pass = db::clusters::ensure_active_pass(&mut tx, project_id).await?;
    let position = db::clusters::count_in_pass(&mut *tx, pass.id).await?;
    let cluster = Cluster {
        id: Uuid::new_v4(),
        project_id,
        pass_id: pass.id,
        name,
        color: color.unwrap_or_else(|| palette_color(position as usize).to_string()),
        statement_ids: Vec::new(),
        confidence: None,
        method: ClusterMethod::Manual,
        created_at: Utc::now(),
    };
    db::clusters::insert_cluster(&mut tx, &cluster, position).await?;
    db::projects::touch(&mut *tx, project_id).await?;
    tx.commit().await?;

    info!(%project_id, cluster_id = %cluster.id, name = %cluster.name, "Cluster created");
    state.event_bus.emit_lossy(GcmEvent::ClusterCreated {
        project_id,
        cluster: cluster.clone(),
        timestamp: Utc::now(),
    });
    Ok(cluster)
}

/// Rename or recolor a cluster
pub async fn update(
    state: &AppState,
    actor: &Actor,
    project_id: Uuid,
    cluster_id: Uuid,
    update: ClusterUpdate,
) -> Result<Cluster> {
    let name = update.name.as_deref().map(validate_name).transpose()?;
    let color = validate_color(update.color)?;
    if name.is_none() && color.is_none() {
        return Err(Error::validation("body", "no updatable fields supplied"));
    }

    let mut tx = state.db.begin().await?;
    let project = db::projects::require(&mut *tx, project_id).await?;
    ensure_editable(&project, actor, "renaming clusters")?;

    let mut cluster = require_active_cluster(&mut tx, project_id, cluster_id).await?;
    if let Some(name) = name {
        cluster.name = name;
    }
    if let Some(color) = color {
        cluster.color = color;
    }
    db::clusters::update_details(&mut *tx, &cluster).await?;
    db::projects::touch(&mut *tx, project_id).await?;
    tx.commit().await?;

    info!(%project_id, %cluster_id, name = %cluster.name, "Cluster updated");
    state.event_bus.emit_lossy(GcmEvent::ClusterUpdated {
        project_id,
        cluster: cluster.clone(),
        timestamp: Utc::now(),
    });
    Ok(cluster)
}

/// Delete a cluster; its statements become unassigned
pub async fn delete(state: &AppState, actor: &Actor, project_id: Uuid, cluster_id: Uuid) -> Result<()> {
    let mut tx = state.db.begin().await?;
    let project = db::projects::require(&mut *tx, project_id).await?;
    ensure_editable(&project, actor, "deleting clusters")?;

    require_active_cluster(&mut tx, project_id, cluster_id).await?;
    db::clusters::delete_cluster(&mut *tx, cluster_id).await?;
    db::projects::touch(&mut *tx, project_id).await?;
    tx.commit().await?;

    info!(%project_id, %cluster_id, "Cluster deleted");
    state.event_bus.emit_lossy(GcmEvent::ClusterDeleted {
        project_id,
        cluster_id,
        timestamp: Utc::now(),
    });
    Ok(())
}

/// Move a statement between clusters of the active pass, or unassign it
///
/// Repeating the same assignment leaves the board unchanged.
pub async fn assign(state: &AppState, actor: &Actor, project_id: Uuid, assignment: Assignment) -> Result<AssignmentResult> {
    let mut tx = state.db.begin().await?;
    let project = db::projects::require(&mut *tx, project_id).await?;
    ensure_editable(&project, actor, "moving statements")?;
    db::statements::require_in_project(&mut *tx, project_id, assignment.statement_id).await?;

    let pass = db::clusters::active_pass(&mut *tx, project_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("project {} has no clusters", project_id)))?;
    let mut board = ClusterBoard::new(db::clusters::list_for_pass(&mut tx, pass.id).await?);

    let statement_id = assignment.statement_id;
    let from_cluster = board.cluster_of(statement_id).map(|c| c.id);
    match assignment.cluster_id {
        Some(target) => board.move_statement(statement_id, target)?,
        None => {
            board.unassign(statement_id);
        }
    }
    let to_cluster = board.cluster_of(statement_id).map(|c| c.id);

    if from_cluster != to_cluster {
        db::clusters::set_membership(&mut tx, pass.id, statement_id, to_cluster).await?;
        db::projects::touch(&mut *tx, project_id).await?;
    }
    tx.commit().await?;

    if from_cluster != to_cluster {
        info!(%project_id, %statement_id, from = ?from_cluster, to = ?to_cluster, "Statement moved");
        state.event_bus.emit_lossy(GcmEvent::StatementMoved {
            project_id,
            statement_id,
            from_cluster,
            to_cluster,
            timestamp: Utc::now(),
        });
    }

    Ok(AssignmentResult {
        statement_id,
        from_cluster,
        to_cluster,
    })
}

/// Regenerate clusters with the assistant
///
/// Existing clusters are only replaced when `replace` is set; the previous
/// pass is archived, not deleted. Credit semantics match statement
/// generation: checked before the call, charged with the insert.
pub async fn generate(
    state: &AppState,
    actor: &Actor,
    project_id: Uuid,
    request: GenerateClustersRequest,
) -> Result<RegeneratedClusters> {
    let project = db::projects::require(&state.db, project_id).await?;
    ensure_editable(&project, actor, "generating clusters")?;

    let (statements, ratings, has_clusters) = {
        let mut conn = state.db.acquire().await?;
        let statements = db::statements::list(&mut *conn, project_id).await?;
        let ratings = db::ratings::list_for_project(&mut *conn, project_id).await?;
        let (cluster_count, _) = db::clusters::active_counts(&mut *conn, project_id).await?;
        (statements, ratings, cluster_count > 0)
    };

    if statements.is_empty() {
        return Err(Error::validation("statements", "project has no statements to cluster"));
    }
    if has_clusters && !request.replace {
        return Err(Error::Conflict(
            "project already has clusters; set replace to true to regenerate".to_string(),
        ));
    }

    let cost = clustering_cost(statements.len() as u32);
    {
        let mut conn = state.db.acquire().await?;
        let account = db::accounts::get_or_create(&mut conn, actor.user_id).await?;
        if !account.features().ai_clustering {
            return Err(Error::PermissionDenied(format!(
                "the {} plan does not include AI clustering",
                account.plan.as_str()
            )));
        }
        account.credits.ensure_covers(cost)?;
    }

    let _guard = state.in_flight.try_acquire(project_id, AiOperation::GenerateClusters)?;

    let settings = request.settings;
    let means = summarize_ratings(&ratings);
    let input = ClusterInput::from_statements(&statements, &means);
    let drafts = state
        .assistant
        .generate_clusters(&input, &settings)
        .await
        .map_err(|e| {
            warn!(%project_id, error = %e, "Cluster generation failed");
            e
        })?;

    let method: ClusterMethod = settings.method.into();
    let now = Utc::now();
    let pass = ClusteringPass {
        id: Uuid::new_v4(),
        project_id,
        method,
        active: true,
        created_at: now,
    };
    let clusters: Vec<Cluster> = drafts
        .into_iter()
        .enumerate()
        .map(|(i, draft)| Cluster {
            id: Uuid::new_v4(),
            project_id,
            pass_id: pass.id,
            name: draft.name,
            color: palette_color(i).to_string(),
            statement_ids: draft.statement_ids,
            confidence: Some(draft.confidence),
            method,
            created_at: now,
        })
        .collect();

    let mut tx = state.db.begin().await?;
    let current = db::projects::require(&mut *tx, project_id).await?;
    ensure_editable(&current, actor, "generating clusters")?;

    // An empty active pass does not count as existing clusters
    let (cluster_count, _) = db::clusters::active_counts(&mut *tx, project_id).await?;
    if cluster_count > 0 && !request.replace {
        return Err(Error::Conflict(
            "project gained clusters during generation; set replace to true to regenerate".to_string(),
        ));
    }
    let remaining = db::accounts::charge(&mut tx, actor.user_id, cost).await?;
    let archived = db::clusters::archive_active(&mut *tx, project_id).await?;
    db::clusters::insert_pass(&mut *tx, &pass).await?;
    for (position, cluster) in clusters.iter().enumerate() {
        db::clusters::insert_cluster(&mut tx, cluster, position as u32).await?;
    }
    db::projects::touch(&mut *tx, project_id).await?;
    tx.commit().await?;

    info!(
        %project_id,
        pass_id = %pass.id,
        clusters = clusters.len(),
        method = method.as_str(),
        credits_charged = cost,
        "Clusters regenerated"
    );
    state.event_bus.emit_lossy(GcmEvent::ClustersRegenerated {
        project_id,
        pass_id: pass.id,
        cluster_count: clusters.len(),
        timestamp: now,
    });

    Ok(RegeneratedClusters {
        pass,
        clusters,
        archived_previous: archived > 0,
        credits_charged: cost,
        credits_remaining: remaining,
    })
}
