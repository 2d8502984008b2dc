//! Database initialization
//!
//! Opens (or creates) the SQLite file, applies connection pragmas, creates
//! every table with `CREATE TABLE IF NOT EXISTS`, then runs versioned
//! migrations. Safe to call on an existing database.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas set through connect options apply to every pooled connection
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Create all tables (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_accounts_table(pool).await?;
    create_projects_table(pool).await?;
    create_statements_table(pool).await?;
    create_clustering_passes_table(pool).await?;
    create_clusters_table(pool).await?;
    create_cluster_members_table(pool).await?;
    create_ratings_table(pool).await?;
    create_project_participants_view(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_accounts_table(pool: &SqlitePool) -> Result<()> {
    // credits: -1 is the unlimited sentinel
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            user_id TEXT PRIMARY KEY,
            plan TEXT NOT NULL DEFAULT 'starter'
                CHECK (plan IN ('starter', 'professional', 'enterprise')),
            credits INTEGER NOT NULL CHECK (credits >= -1),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL CHECK (length(trim(title)) > 0),
            description TEXT,
            focus_question TEXT NOT NULL CHECK (length(trim(focus_question)) > 0),
            status TEXT NOT NULL DEFAULT 'active'
                CHECK (status IN ('active', 'completed', 'paused')),
            phase TEXT NOT NULL DEFAULT 'brainstorming'
                CHECK (phase IN ('brainstorming', 'structuring', 'rating', 'analysis')),
            owner_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_statements_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS statements (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            text TEXT NOT NULL CHECK (length(trim(text)) > 0),
            author_id TEXT,
            author_name TEXT NOT NULL,
            source TEXT NOT NULL CHECK (source IN ('manual', 'ai_generated')),
            confidence REAL CHECK (confidence IS NULL OR (confidence >= 0.0 AND confidence <= 1.0)),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_clustering_passes_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clustering_passes (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            method TEXT NOT NULL CHECK (method IN ('manual', 'semantic', 'ratings', 'hybrid')),
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_clusters_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS clusters (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            pass_id TEXT NOT NULL REFERENCES clustering_passes(id) ON DELETE CASCADE,
            name TEXT NOT NULL CHECK (length(trim(name)) > 0),
            color TEXT NOT NULL,
            confidence REAL CHECK (confidence IS NULL OR (confidence >= 0.0 AND confidence <= 1.0)),
            method TEXT NOT NULL CHECK (method IN ('manual', 'semantic', 'ratings', 'hybrid')),
            position INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_cluster_members_table(pool: &SqlitePool) -> Result<()> {
    // One membership per (pass, statement) keeps clusters disjoint
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS cluster_members (
            pass_id TEXT NOT NULL REFERENCES clustering_passes(id) ON DELETE CASCADE,
            cluster_id TEXT NOT NULL REFERENCES clusters(id) ON DELETE CASCADE,
            statement_id TEXT NOT NULL REFERENCES statements(id) ON DELETE CASCADE,
            PRIMARY KEY (pass_id, statement_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_ratings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ratings (
            statement_id TEXT NOT NULL REFERENCES statements(id) ON DELETE CASCADE,
            rater_id TEXT NOT NULL,
            dimension TEXT NOT NULL CHECK (dimension IN ('importance', 'feasibility')),
            value INTEGER NOT NULL CHECK (value BETWEEN 1 AND 5),
            updated_at TEXT NOT NULL,
            PRIMARY KEY (statement_id, rater_id, dimension)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_project_participants_view(pool: &SqlitePool) -> Result<()> {
    // Statement authors and raters; UNION removes duplicates
    sqlx::query(
        r#"
        CREATE VIEW IF NOT EXISTS project_participants AS
            SELECT project_id, author_id AS user_id
            FROM statements
            WHERE author_id IS NOT NULL
            UNION
            SELECT s.project_id, r.rater_id AS user_id
            FROM ratings r
            JOIN statements s ON s.id = r.statement_id
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
