//! Account and credit persistence

use chrono::Utc;
use gcm_common::credits::CreditBalance;
use gcm_common::models::{Account, PlanTier};
use gcm_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqliteExecutor};
use uuid::Uuid;

use super::{parse_timestamp, parse_uuid};

fn account_from_row(row: &SqliteRow) -> Result<Account> {
    let user_id: String = row.get("user_id");
    let plan: String = row.get("plan");
    let credits: i64 = row.get("credits");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Account {
        user_id: parse_uuid("accounts.user_id", &user_id)?,
        plan: plan.parse::<PlanTier>()?,
        credits: CreditBalance::from_stored(credits)?,
        created_at: parse_timestamp("accounts.created_at", &created_at)?,
        updated_at: parse_timestamp("accounts.updated_at", &updated_at)?,
    })
}

pub async fn load<'e, E>(executor: E, user_id: Uuid) -> Result<Option<Account>>
where
    E: SqliteExecutor<'e>,
{
    let row = sqlx::query(
        "SELECT user_id, plan, credits, created_at, updated_at FROM accounts WHERE user_id = ?",
    )
    .bind(user_id.to_string())
    .fetch_optional(executor)
    .await?;

    row.as_ref().map(account_from_row).transpose()
}

/// Load the account, creating a starter account on first access
pub async fn get_or_create(conn: &mut SqliteConnection, user_id: Uuid) -> Result<Account> {
    let starter = Account::starter(user_id);
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO accounts (user_id, plan, credits, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user_id.to_string())
    .bind(starter.plan.as_str())
    .bind(starter.credits.to_stored())
    .bind(starter.created_at.to_rfc3339())
    .bind(starter.updated_at.to_rfc3339())
    .execute(&mut *conn)
    .await?;

    load(&mut *conn, user_id)
        .await?
        .ok_or_else(|| Error::Internal(format!("account {} vanished after insert", user_id)))
}

/// Deduct `cost` credits, returning the new balance
///
/// Unlimited balances are left untouched. The finite deduction is a guarded
/// UPDATE, so two concurrent charges cannot overdraw the account.
pub async fn charge(conn: &mut SqliteConnection, user_id: Uuid, cost: u32) -> Result<CreditBalance> {
    let account = get_or_create(conn, user_id).await?;
    let remaining = account.credits.charge(cost)?;
    if remaining.is_unlimited() || cost == 0 {
        return Ok(remaining);
    }

    let result = sqlx::query(
        "UPDATE accounts SET credits = credits - ?, updated_at = ? WHERE user_id = ? AND credits >= ?",
    )
    .bind(cost as i64)
    .bind(Utc::now().to_rfc3339())
    .bind(user_id.to_string())
    .bind(cost as i64)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        let current = load(&mut *conn, user_id)
            .await?
            .map(|a| a.credits.to_stored())
            .unwrap_or(0);
        return Err(Error::InsufficientCredits {
            required: cost,
            available: current,
        });
    }

    let account = load(&mut *conn, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("account {}", user_id)))?;
    Ok(account.credits)
}

/// Add `credits` to a finite balance; unlimited stays unlimited
pub async fn top_up(conn: &mut SqliteConnection, user_id: Uuid, credits: u32) -> Result<Account> {
    let account = get_or_create(conn, user_id).await?;
    if account.credits.is_unlimited() {
        return Ok(account);
    }

    sqlx::query("UPDATE accounts SET credits = credits + ?, updated_at = ? WHERE user_id = ? AND credits >= 0")
        .bind(credits as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(user_id.to_string())
        .execute(&mut *conn)
        .await?;

    load(&mut *conn, user_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("account {}", user_id)))
}
