//! Brainstorming: manual statements and AI statement generation

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use gcm_common::credits::{statement_generation_cost, CreditBalance};
use gcm_common::events::GcmEvent;
use gcm_common::models::{Phase, Project, Statement};
use gcm_common::{Error, Result};

use crate::actor::Actor;
use crate::db;
use crate::services::in_flight::AiOperation;
use crate::AppState;

const BRAINSTORMING: &[Phase] = &[Phase::Brainstorming];

/// POST /statements/generate body
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateStatementsRequest {
    #[serde(default)]
    pub context: Option<String>,
    pub count: u32,
}

/// Statements created by one generation request and the balance after paying
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedStatements {
    pub statements: Vec<Statement>,
    pub credits_charged: u32,
    pub credits_remaining: CreditBalance,
}

pub async fn list(state: &AppState, project_id: Uuid) -> Result<Vec<Statement>> {
    db::projects::require(&state.db, project_id).await?;
    db::statements::list(&state.db, project_id).await
}

/// Add a statement authored by the actor (brainstorming phase only)
pub async fn add_manual(state: &AppState, actor: &Actor, project_id: Uuid, text: &str) -> Result<Statement> {
    let mut tx = state.db.begin().await?;
    let project = db::projects::require(&mut *tx, project_id).await?;
    project.ensure_phase(BRAINSTORMING, "adding statements")?;

    let statement = Statement::manual(project_id, actor.user_id, &actor.display_name, text)?;
    db::statements::insert(&mut *tx, &statement).await?;
    db::projects::touch(&mut *tx, project_id).await?;
    tx.commit().await?;

    info!(%project_id, statement_id = %statement.id, author = %actor.user_id, "Statement added");
    state.event_bus.emit_lossy(GcmEvent::StatementAdded {
        project_id,
        statement: statement.clone(),
        timestamp: Utc::now(),
    });
    Ok(statement)
}

/// Edit statement text (author, or owner for AI statements; brainstorming only)
pub async fn edit(state: &AppState, actor: &Actor, project_id: Uuid, statement_id: Uuid, text: &str) -> Result<Statement> {
    let mut tx = state.db.begin().await?;
    let project = db::projects::require(&mut *tx, project_id).await?;
    let mut statement = db::statements::require_in_project(&mut *tx, project_id, statement_id).await?;
    ensure_editable(&project, &statement, actor)?;

    statement.set_text(text)?;
    db::statements::update_text(&mut *tx, &statement).await?;
    db::projects::touch(&mut *tx, project_id).await?;
    tx.commit().await?;

    info!(%project_id, %statement_id, "Statement edited");
    state.event_bus.emit_lossy(GcmEvent::StatementUpdated {
        project_id,
        statement: statement.clone(),
        timestamp: Utc::now(),
    });
    Ok(statement)
}

/// Delete a statement (same permissions as edit)
pub async fn delete(state: &AppState, actor: &Actor, project_id: Uuid, statement_id: Uuid) -> Result<()> {
    let mut tx = state.db.begin().await?;
    let project = db::projects::require(&mut *tx, project_id).await?;
    let statement = db::statements::require_in_project(&mut *tx, project_id, statement_id).await?;
    ensure_editable(&project, &statement, actor)?;

    db::statements::delete(&mut *tx, statement_id).await?;
    db::projects::touch(&mut *tx, project_id).await?;
    tx.commit().await?;

    info!(%project_id, %statement_id, "Statement deleted");
    state.event_bus.emit_lossy(GcmEvent::StatementDeleted {
        project_id,
        statement_id,
        timestamp: Utc::now(),
    });
    Ok(())
}

fn ensure_editable(project: &Project, statement: &Statement, actor: &Actor) -> Result<()> {
    if !statement.editable_by(actor.user_id, project.owner_id) {
        return Err(Error::PermissionDenied(format!(
            "statement {} can only be changed by its author",
            statement.id
        )));
    }
    project.ensure_phase(BRAINSTORMING, "changing statements")
}

/// Generate statements with the assistant and charge the actor
///
/// Credits are checked before the assistant is called and deducted in the
/// transaction that inserts the results. A failed or cancelled call charges
/// nothing.
pub async fn generate(
    state: &AppState,
    actor: &Actor,
    project_id: Uuid,
    request: GenerateStatementsRequest,
) -> Result<GeneratedStatements> {
    let max = state.max_statements_per_request;
    if request.count == 0 || request.count > max {
        return Err(Error::validation(
            "count",
            format!("must be between 1 and {}, got {}", max, request.count),
        ));
    }
    let cost = statement_generation_cost(request.count);

    let project = db::projects::require(&state.db, project_id).await?;
    project.ensure_phase(BRAINSTORMING, "generating statements")?;

    {
        let mut conn = state.db.acquire().await?;
        let account = db::accounts::get_or_create(&mut conn, actor.user_id).await?;
        if !account.features().ai_statements {
            return Err(Error::PermissionDenied(format!(
                "the {} plan does not include AI statement generation",
                account.plan.as_str()
            )));
        }
        account.credits.ensure_covers(cost)?;
    }

    let _guard = state.in_flight.try_acquire(project_id, AiOperation::GenerateStatements)?;

    let drafts = state
        .assistant
        .generate_statements(&project.focus_question, request.context.as_deref(), request.count)
        .await
        .map_err(|e| {
            warn!(%project_id, error = %e, "Statement generation failed");
            e
        })?;

    let statements = drafts
        .iter()
        .map(|d| Statement::ai_generated(project_id, &d.text, d.confidence))
        .collect::<Result<Vec<_>>>()?;

    let mut tx = state.db.begin().await?;
    // Phase may have moved while the assistant was working
    db::projects::require(&mut *tx, project_id)
        .await?
        .ensure_phase(BRAINSTORMING, "generating statements")?;
    let remaining = db::accounts::charge(&mut tx, actor.user_id, cost).await?;
    db::statements::insert_all(&mut tx, &statements).await?;
    db::projects::touch(&mut *tx, project_id).await?;
    tx.commit().await?;

    info!(
        %project_id,
        count = statements.len(),
        credits_charged = cost,
        credits_remaining = %remaining,
        "AI statements generated"
    );
    for statement in &statements {
        state.event_bus.emit_lossy(GcmEvent::StatementAdded {
            project_id,
            statement: statement.clone(),
            timestamp: Utc::now(),
        });
    }

    Ok(GeneratedStatements {
        statements,
        credits_charged: cost,
        credits_remaining: remaining,
    })
}
