//! Rating persistence

use chrono::Utc;
use gcm_common::models::{Rating, RatingDimension, RatingValue};
use gcm_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteExecutor};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

fn rating_from_row(row: &SqliteRow) -> Result<Rating> {
    let statement_id: String = row.get("statement_id");
    let rater_id: String = row.get("rater_id");
    let dimension: String = row.get("dimension");
    let value: i64 = row.get("value");
    let updated_at: String = row.get("updated_at");

    Ok(Rating {
        statement_id: parse_uuid("ratings.statement_id", &statement_id)?,
        rater_id: parse_uuid("ratings.rater_id", &rater_id)?,
        dimension: dimension.parse::<RatingDimension>()?,
        value: RatingValue::new(value)?,
        updated_at: parse_timestamp("ratings.updated_at", &updated_at)?,
    })
}

/// Insert or overwrite the rater's score for one statement and dimension
pub async fn upsert<'e, E>(
    executor: E,
    statement_id: Uuid,
    rater_id: Uuid,
    dimension: RatingDimension,
    value: RatingValue,
) -> Result<Rating>
where
    E: SqliteExecutor<'e>,
{
    let rating = Rating {
        statement_id,
        rater_id,
        dimension,
        value,
        updated_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO ratings (statement_id, rater_id, dimension, value, updated_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(statement_id, rater_id, dimension) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(statement_id.to_string())
    .bind(rater_id.to_string())
    .bind(dimension.as_str())
    .bind(i64::from(value))
    .bind(rating.updated_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(rating)
}

/// All ratings for statements of a project
pub async fn list_for_project<'e, E>(executor: E, project_id: Uuid) -> Result<Vec<Rating>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT r.statement_id, r.rater_id, r.dimension, r.value, r.updated_at
        FROM ratings r
        JOIN statements s ON s.id = r.statement_id
        WHERE s.project_id = ?
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(rating_from_row).collect()
}

/// One rater's ratings within a project
pub async fn list_by_rater<'e, E>(executor: E, project_id: Uuid, rater_id: Uuid) -> Result<Vec<Rating>>
where
    E: SqliteExecutor<'e>,
{
    let rows = sqlx::query(
        r#"
        SELECT r.statement_id, r.rater_id, r.dimension, r.value, r.updated_at
        FROM ratings r
        JOIN statements s ON s.id = r.statement_id
        WHERE s.project_id = ? AND r.rater_id = ?
        "#,
    )
    .bind(project_id.to_string())
    .bind(rater_id.to_string())
    .fetch_all(executor)
    .await?;

    rows.iter().map(rating_from_row).collect()
}

/// Statements the rater has scored on both dimensions
pub async fn count_fully_rated<'e, E>(executor: E, project_id: Uuid, rater_id: Uuid) -> Result<u32>
where
    E: SqliteExecutor<'e>,
{
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM (
            SELECT r.statement_id
            FROM ratings r
            JOIN statements s ON s.id = r.statement_id
            WHERE s.project_id = ? AND r.rater_id = ?
            GROUP BY r.statement_id
            HAVING COUNT(DISTINCT r.dimension) = 2
        )
        "#,
    )
    .bind(project_id.to_string())
    .bind(rater_id.to_string())
    .fetch_one(executor)
    .await?;

    Ok(count as u32)
}
