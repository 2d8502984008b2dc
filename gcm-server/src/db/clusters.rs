//! Clustering pass, cluster, and membership persistence
//!
//! Each project has at most one active pass. Regeneration archives the
//! active pass (active = 0) and inserts a new one; archived passes are kept.

use chrono::Utc;
use gcm_common::models::{Cluster, ClusterMethod, ClusteringPass};
use gcm_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqliteExecutor};
use std::collections::HashMap;
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

fn pass_from_row(row: &SqliteRow) -> Result<ClusteringPass> {
    let id: String = row.get("id");
    let project_id: String = row.get("project_id");
    let method: String = row.get("method");
    let active: i64 = row.get("active");
    let created_at: String = row.get("created_at");

    Ok(ClusteringPass {
        id: parse_uuid("clustering_passes.id", &id)?,
        project_id: parse_uuid("clustering_passes.project_id", &project_id)?,
        method: method.parse::<ClusterMethod>()?,
        active: active != 0,
        created_at: parse_timestamp("clustering_passes.created_at", &created_at)?,
    })
}

fn cluster_from_row(row: &SqliteRow) -> Result<Cluster> {
    let id: String = row.get("id");
    let project_id: String = row.get("project_id");
    let pass_id: String = row.get("pass_id");
    let method: String = row.get("method");
    let created_at: String = row.get("created_at");

    Ok(Cluster {
        id: parse_uuid("clusters.id", &id)?,
        project_id: parse_uuid("clusters.project_id", &project_id)?,
        pass_id: parse_uuid("clusters.pass_id", &pass_id)?,
        name: row.get("name"),
        color: row.get("color"),
        statement_ids: Vec::new(),
        confidence: row.get("confidence"),
        method: method.parse::<ClusterMethod>()?,
        created_at: parse_timestamp("clusters.created_at", &created_at)?,
    })
}

pub async fn active_pass<'e, E>(executor: E, project_id: Uuid) -> Result<Option<ClusteringPass>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT id, project_id, method, active, created_at FROM clustering_passes \
         WHERE project_id = ? AND active = 1",
    )
    .bind(project_id.to_string())
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(pass_from_row).transpose()
}

/// All passes of a project, newest first
pub async fn list_passes<'e, E>(executor: E, project_id: Uuid) -> Result<Vec<ClusteringPass>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        "SELECT id, project_id, method, active, created_at FROM clustering_passes \
         WHERE project_id = ? ORDER BY created_at DESC, rowid DESC",
    )
    .bind(project_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(pass_from_row).collect()
}

pub async fn insert_pass<'e, E>(executor: E, pass: &ClusteringPass) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO clustering_passes (id, project_id, method, active, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(pass.id.to_string())
    .bind(pass.project_id.to_string())
    .bind(pass.method.as_str())
    .bind(pass.active as i64)
    .bind(pass.created_at.to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}

/// Return the active pass, opening a manual one if the project has none
pub async fn ensure_active_pass(conn: &mut SqliteConnection, project_id: Uuid) -> Result<ClusteringPass> {
    if let Some(pass) = active_pass(&mut *conn, project_id).await? {
        return Ok(pass);
    }

    let pass = ClusteringPass {
        id: Uuid::new_v4(),
        project_id,
        method: ClusterMethod::Manual,
        active: true,
        created_at: Utc::now(),
    };
    insert_pass(&mut *conn, &pass).await?;
    Ok(pass)
}

/// Deactivate the active pass; returns the number archived (0 or 1)
pub async fn archive_active<'e, E>(executor: E, project_id: Uuid) -> Result<u64>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE clustering_passes SET active = 0 WHERE project_id = ? AND active = 1")
        .bind(project_id.to_string())
        .execute(executor)
        .await?;
    Ok(result.rows_affected())
}

/// Clusters of one pass with their members, in board order
pub async fn list_for_pass(conn: &mut SqliteConnection, pass_id: Uuid) -> Result<Vec<Cluster>> {
    let rows = sqlx::query(
        r#"
        SELECT id, project_id, pass_id, name, color, confidence, method, created_at
        FROM clusters
        WHERE pass_id = ?
        ORDER BY position, created_at
        "#,
    )
    .bind(pass_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let mut clusters = rows.iter().map(cluster_from_row).collect::<Result<Vec<_>>>()?;

    let members = sqlx::query(
        "SELECT cluster_id, statement_id FROM cluster_members WHERE pass_id = ? ORDER BY rowid",
    )
    .bind(pass_id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let mut by_cluster: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in &members {
        let cluster_id: String = row.get("cluster_id");
        let statement_id: String = row.get("statement_id");
        by_cluster
            .entry(parse_uuid("cluster_members.cluster_id", &cluster_id)?)
            .or_default()
            .push(parse_uuid("cluster_members.statement_id", &statement_id)?);
    }

    for cluster in &mut clusters {
        cluster.statement_ids = by_cluster.remove(&cluster.id).unwrap_or_default();
    }
    Ok(clusters)
}

/// Clusters of the project's active pass (empty when there is none)
pub async fn list_active(conn: &mut SqliteConnection, project_id: Uuid) -> Result<Vec<Cluster>> {
    match active_pass(&mut *conn, project_id).await? {
        Some(pass) => list_for_pass(conn, pass.id).await,
        None => Ok(Vec::new()),
    }
}

pub async fn count_in_pass<'e, E>(executor: E, pass_id: Uuid) -> Result<u32>
where
    E: SqliteExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clusters WHERE pass_id = ?")
        .bind(pass_id.to_string())
        .fetch_one(executor)
        .await?;
    Ok(count as u32)
}

/// (cluster count, clusters holding at least one statement) for the active pass
pub async fn active_counts<'e, E>(executor: E, project_id: Uuid) -> Result<(u32, u32)>
where
    E: SqliteExecutor<'e>,
{
    let (total, non_empty): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COUNT(CASE WHEN EXISTS (SELECT 1 FROM cluster_members m WHERE m.cluster_id = c.id)
                          THEN 1 END)
        FROM clusters c
        JOIN clustering_passes p ON p.id = c.pass_id
        WHERE p.project_id = ? AND p.active = 1
        "#,
    )
    .bind(project_id.to_string())
    .fetch_one(executor)
    .await?;

    Ok((total as u32, non_empty as u32))
}

/// Insert a cluster and its members
pub async fn insert_cluster(conn: &mut SqliteConnection, cluster: &Cluster, position: u32) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO clusters (id, project_id, pass_id, name, color, confidence, method, position, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cluster.id.to_string())
    .bind(cluster.project_id.to_string())
    .bind(cluster.pass_id.to_string())
    .bind(&cluster.name)
    .bind(&cluster.color)
    .bind(cluster.confidence)
    .bind(cluster.method.as_str())
    .bind(position as i64)
    .bind(cluster.created_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    for statement_id in &cluster.statement_ids {
        set_membership(&mut *conn, cluster.pass_id, *statement_id, Some(cluster.id)).await?;
    }
    Ok(())
}

/// Load one cluster of a project (any pass), with members
pub async fn require(conn: &mut SqliteConnection, project_id: Uuid, cluster_id: Uuid) -> Result<Cluster> {
    let row = sqlx::query(
        r#"
        SELECT id, project_id, pass_id, name, color, confidence, method, created_at
        FROM clusters
        WHERE id = ? AND project_id = ?
        "#,
    )
    .bind(cluster_id.to_string())
    .bind(project_id.to_string())
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| Error::NotFound(format!("cluster {} in project {}", cluster_id, project_id)))?;

    let mut cluster = cluster_from_row(&row)?;
    let members: Vec<String> =
        sqlx::query_scalar("SELECT statement_id FROM cluster_members WHERE cluster_id = ? ORDER BY rowid")
            .bind(cluster_id.to_string())
            .fetch_all(&mut *conn)
            .await?;
    cluster.statement_ids = members
        .iter()
        .map(|m| parse_uuid("cluster_members.statement_id", m))
        .collect::<Result<_>>()?;
    Ok(cluster)
}

pub async fn update_details<'e, E>(executor: E, cluster: &Cluster) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE clusters SET name = ?, color = ? WHERE id = ?")
        .bind(&cluster.name)
        .bind(&cluster.color)
        .bind(cluster.id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

/// Delete a cluster; its members become unassigned by cascade
pub async fn delete_cluster<'e, E>(executor: E, cluster_id: Uuid) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("DELETE FROM clusters WHERE id = ?")
        .bind(cluster_id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

/// Remove the statement from whichever cluster of the pass holds it, then
/// add it to `target` when given
pub async fn set_membership(
    conn: &mut SqliteConnection,
    pass_id: Uuid,
    statement_id: Uuid,
    target: Option<Uuid>,
) -> Result<()> {
    sqlx::query("DELETE FROM cluster_members WHERE pass_id = ? AND statement_id = ?")
        .bind(pass_id.to_string())
        .bind(statement_id.to_string())
        .execute(&mut *conn)
        .await?;

    if let Some(cluster_id) = target {
        sqlx::query("INSERT INTO cluster_members (pass_id, cluster_id, statement_id) VALUES (?, ?, ?)")
            .bind(pass_id.to_string())
            .bind(cluster_id.to_string())
            .bind(statement_id.to_string())
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}
