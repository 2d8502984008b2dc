//! Project persistence
//!
//! `statement_count` and `participant_count` are computed in the SELECT and
//! never stored.

use chrono::{DateTime, Utc};
use gcm_common::models::{NewProject, Phase, Project, ProjectStatus};
use gcm_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

const SELECT_PROJECT: &str = r#"
    SELECT p.id, p.title, p.description, p.focus_question, p.status, p.phase,
           p.owner_id, p.created_at, p.updated_at,
           (SELECT COUNT(*) FROM statements s WHERE s.project_id = p.id) AS statement_count,
           (SELECT COUNT(*) FROM project_participants pp WHERE pp.project_id = p.id) AS participant_count
    FROM projects p
"#;

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    let id: String = row.get("id");
    let owner_id: String = row.get("owner_id");
    let status: String = row.get("status");
    let phase: String = row.get("phase");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");
    let statement_count: i64 = row.get("statement_count");
    let participant_count: i64 = row.get("participant_count");

    Ok(Project {
        id: parse_uuid("projects.id", &id)?,
        title: row.get("title"),
        description: row.get("description"),
        focus_question: row.get("focus_question"),
        status: status.parse::<ProjectStatus>()?,
        phase: phase.parse::<Phase>()?,
        participant_count: participant_count as u32,
        statement_count: statement_count as u32,
        owner_id: parse_uuid("projects.owner_id", &owner_id)?,
        created_at: parse_timestamp("projects.created_at", &created_at)?,
        updated_at: parse_timestamp("projects.updated_at", &updated_at)?,
    })
}

/// Insert a validated new project in the brainstorming phase
pub async fn insert<'e, E>(executor: E, owner_id: Uuid, new: &NewProject) -> Result<Project>
where
    E: SqliteExecutor<'e>,
{
    let now = Utc::now();
    let project = Project {
        id: Uuid::new_v4(),
        title: new.title.clone(),
        description: new.description.clone(),
        focus_question: new.focus_question.clone(),
        status: ProjectStatus::Active,
        phase: Phase::Brainstorming,
        participant_count: 0,
        statement_count: 0,
        owner_id,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO projects (id, title, description, focus_question, status, phase,
                              owner_id, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(project.id.to_string())
    .bind(&project.title)
    .bind(&project.description)
    .bind(&project.focus_question)
    .bind(project.status.as_str())
    .bind(project.phase.as_str())
    .bind(project.owner_id.to_string())
    .bind(project.created_at.to_rfc3339())
    .bind(project.updated_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(project)
}

pub async fn load<'e, E>(executor: E, project_id: Uuid) -> Result<Option<Project>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(&format!("{} WHERE p.id = ?", SELECT_PROJECT))
        .bind(project_id.to_string())
        .fetch_optional(executor)
        .await?;

    row.as_ref().map(project_from_row).transpose()
}

/// Load a project or fail with NotFound
pub async fn require<'e, E>(executor: E, project_id: Uuid) -> Result<Project>
where
    E: SqliteExecutor<'e>,
{
    load(executor, project_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))
}

/// Projects owned by `owner_id`, most recently updated first
pub async fn list_owned<'e, E>(executor: E, owner_id: Uuid) -> Result<Vec<Project>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(&format!(
        "{} WHERE p.owner_id = ? ORDER BY p.updated_at DESC",
        SELECT_PROJECT
    ))
    .bind(owner_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(project_from_row).collect()
}

pub async fn count_owned<'e, E>(executor: E, owner_id: Uuid) -> Result<u32>
where
    E: SqliteExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE owner_id = ?")
        .bind(owner_id.to_string())
        .fetch_one(executor)
        .await?;
    Ok(count as u32)
}

/// Persist title, description, focus question and status
pub async fn update_attributes<'e, E>(executor: E, project: &Project) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        UPDATE projects
        SET title = ?, description = ?, focus_question = ?, status = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&project.title)
    .bind(&project.description)
    .bind(&project.focus_question)
    .bind(project.status.as_str())
    .bind(project.updated_at.to_rfc3339())
    .bind(project.id.to_string())
    .execute(executor)
    .await?;

    Ok(())
}

/// Compare-and-set the phase; returns false when the stored phase is no
/// longer `from`
pub async fn update_phase<'e, E>(
    executor: E,
    project_id: Uuid,
    from: Phase,
    to: Phase,
    at: DateTime<Utc>,
) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("UPDATE projects SET phase = ?, updated_at = ? WHERE id = ? AND phase = ?")
        .bind(to.as_str())
        .bind(at.to_rfc3339())
        .bind(project_id.to_string())
        .bind(from.as_str())
        .execute(executor)
        .await?;

    Ok(result.rows_affected() == 1)
}

/// Bump `updated_at` after a change to a child record
pub async fn touch<'e, E>(executor: E, project_id: Uuid) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE projects SET updated_at = ? WHERE id = ?")
        .bind(Utc::now().to_rfc3339())
        .bind(project_id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

/// Delete a project; statements, clusters and ratings go by cascade
pub async fn delete<'e, E>(executor: E, project_id: Uuid) -> Result<bool>
where
    E: SqliteExecutor<'e>,
{
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id.to_string())
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}
