//! Statement persistence

use gcm_common::models::{Statement, StatementSource};
use gcm_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqliteExecutor};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

fn statement_from_row(row: &SqliteRow) -> Result<Statement> {
    let id: String = row.get("id");
    let project_id: String = row.get("project_id");
    let author_id: Option<String> = row.get("author_id");
    let source: String = row.get("source");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Statement {
        id: parse_uuid("statements.id", &id)?,
        project_id: parse_uuid("statements.project_id", &project_id)?,
        text: row.get("text"),
        author_id: author_id
            .as_deref()
            .map(|a| parse_uuid("statements.author_id", a))
            .transpose()?,
        author_name: row.get("author_name"),
        source: source.parse::<StatementSource>()?,
        confidence: row.get("confidence"),
        created_at: parse_timestamp("statements.created_at", &created_at)?,
        updated_at: parse_timestamp("statements.updated_at", &updated_at)?,
    })
}

pub async fn insert<'e, E>(executor: E, statement: &Statement) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query(
        r#"
        INSERT INTO statements (id, project_id, text, author_id, author_name, source,
                                confidence, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(statement.id.to_string())
    .bind(statement.project_id.to_string())
    .bind(&statement.text)
    .bind(statement.author_id.map(|a| a.to_string()))
    .bind(&statement.author_name)
    .bind(statement.source.as_str())
    .bind(statement.confidence)
    .bind(statement.created_at.to_rfc3339())
    .bind(statement.updated_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(())
}

/// Insert several statements on one connection (callers wrap in a transaction)
pub async fn insert_all(conn: &mut SqliteConnection, statements: &[Statement]) -> Result<()> {
    for statement in statements {
        insert(&mut *conn, statement).await?;
    }
    Ok(())
}

/// Statements of a project in creation order
pub async fn list<'e, E>(executor: E, project_id: Uuid) -> Result<Vec<Statement>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT id, project_id, text, author_id, author_name, source, confidence,
               created_at, updated_at
        FROM statements
        WHERE project_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(statement_from_row).collect()
}

/// Load a statement, requiring it to belong to `project_id`
pub async fn require_in_project<'e, E>(executor: E, project_id: Uuid, statement_id: Uuid) -> Result<Statement>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        r#"
        SELECT id, project_id, text, author_id, author_name, source, confidence,
               created_at, updated_at
        FROM statements
        WHERE id = ? AND project_id = ?
        "#,
    )
    .bind(statement_id.to_string())
    .bind(project_id.to_string())
    .fetch_optional(executor)
    .await?;

    match row {
        Some(row) => statement_from_row(&row),
        None => Err(Error::NotFound(format!(
            "statement {} in project {}",
            statement_id, project_id
        ))),
    }
}

pub async fn count<'e, E>(executor: E, project_id: Uuid) -> Result<u32>
where
    E: SqliteExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM statements WHERE project_id = ?")
        .bind(project_id.to_string())
        .fetch_one(executor)
        .await?;
    Ok(count as u32)
}

pub async fn update_text<'e, E>(executor: E, statement: &Statement) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("UPDATE statements SET text = ?, updated_at = ? WHERE id = ?")
        .bind(&statement.text)
        .bind(statement.updated_at.to_rfc3339())
        .bind(statement.id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}

/// Delete a statement; its memberships and ratings go by cascade
pub async fn delete<'e, E>(executor: E, statement_id: Uuid) -> Result<()>
where
    E: SqliteExecutor<'e>,
{
    sqlx::query("DELETE FROM statements WHERE id = ?")
        .bind(statement_id.to_string())
        .execute(executor)
        .await?;
    Ok(())
}
