//! Importance and feasibility ratings

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use gcm_common::analysis::{summarize_ratings, StatementMeans};
use gcm_common::events::GcmEvent;
use gcm_common::models::{Phase, Rating, RatingDimension, RatingValue};
use gcm_common::Result;

use crate::actor::Actor;
use crate::db;
use crate::AppState;

/// PUT /ratings body
#[derive(Debug, Clone, Deserialize)]
pub struct RateRequest {
    pub statement_id: Uuid,
    pub dimension: RatingDimension,
    /// Checked against the 1-5 scale before storing
    pub value: i64,
}

/// Means for one statement, in statement order
#[derive(Debug, Clone, Serialize)]
pub struct StatementRatingSummary {
    pub statement_id: Uuid,
    pub text: String,
    #[serde(flatten)]
    pub means: StatementMeans,
}

/// Record or overwrite the actor's rating (rating phase only)
pub async fn rate(state: &AppState, actor: &Actor, project_id: Uuid, request: RateRequest) -> Result<Rating> {
    let value = RatingValue::new(request.value)?;

    let mut tx = state.db.begin().await?;
    let project = db::projects::require(&mut *tx, project_id).await?;
    project.ensure_phase(&[Phase::Rating], "rating statements")?;
    db::statements::require_in_project(&mut *tx, project_id, request.statement_id).await?;

    let rating = db::ratings::upsert(&mut *tx, request.statement_id, actor.user_id, request.dimension, value).await?;
    tx.commit().await?;

    debug!(
        %project_id,
        statement_id = %rating.statement_id,
        rater = %actor.user_id,
        dimension = rating.dimension.as_str(),
        value = rating.value.get(),
        "Rating recorded"
    );
    state.event_bus.emit_lossy(GcmEvent::RatingRecorded {
        project_id,
        statement_id: rating.statement_id,
        rater_id: rating.rater_id,
        dimension: rating.dimension,
        value: rating.value.get(),
        timestamp: Utc::now(),
    });
    Ok(rating)
}

/// Ratings the actor has given in this project
pub async fn my_ratings(state: &AppState, actor: &Actor, project_id: Uuid) -> Result<Vec<Rating>> {
    db::projects::require(&state.db, project_id).await?;
    db::ratings::list_by_rater(&state.db, project_id, actor.user_id).await
}

/// Per-statement means over all participants; unrated statements included
pub async fn summary(state: &AppState, project_id: Uuid) -> Result<Vec<StatementRatingSummary>> {
    let mut conn = state.db.acquire().await?;
    db::projects::require(&mut *conn, project_id).await?;
    let statements = db::statements::list(&mut *conn, project_id).await?;
    let ratings = db::ratings::list_for_project(&mut *conn, project_id).await?;

    let means: HashMap<Uuid, StatementMeans> = summarize_ratings(&ratings);
    Ok(statements
        .into_iter()
        .map(|s| StatementRatingSummary {
            statement_id: s.id,
            means: means.get(&s.id).copied().unwrap_or_default(),
            text: s.text,
        })
        .collect())
}
