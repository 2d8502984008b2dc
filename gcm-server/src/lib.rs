//! gcm-server library - Group Concept Mapping workshop service
//!
//! HTTP/JSON API over SQLite. Handlers in [`api`] extract the caller and
//! delegate to [`services`], which enforce the workflow rules inside
//! database transactions and publish change events.

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use gcm_common::assistant::{Assistant, LocalAssistant};
use gcm_common::config::TomlConfig;
use gcm_common::workflow::TransitionPolicy;
use gcm_common::EventBus;

pub mod actor;
pub mod api;
pub mod db;
pub mod error;
pub mod services;

use services::in_flight::InFlightRegistry;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Project change notifications
    pub event_bus: EventBus,
    /// AI collaborator for statement and cluster generation
    pub assistant: Arc<dyn Assistant>,
    /// Phase transition rules
    pub policy: TransitionPolicy,
    /// Largest `count` accepted by statement generation
    pub max_statements_per_request: u32,
    /// Busy flags for AI requests
    pub in_flight: InFlightRegistry,
    /// Server start time, reported by /health
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Build state from bootstrap configuration
    pub fn new(db: SqlitePool, config: &TomlConfig) -> Self {
        let assistant = LocalAssistant::new(
            config.ai.clustering_engine.build(),
            Duration::from_millis(config.ai.simulated_latency_ms),
        );

        Self {
            db,
            event_bus: EventBus::new(config.events.capacity),
            assistant: Arc::new(assistant),
            policy: config.workflow.policy(),
            max_statements_per_request: config.ai.max_statements_per_request,
            in_flight: InFlightRegistry::new(),
            startup_time: Utc::now(),
        }
    }

    /// Replace the AI collaborator
    pub fn with_assistant(mut self, assistant: Arc<dyn Assistant>) -> Self {
        self.assistant = assistant;
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::project_routes())
        .merge(api::statement_routes())
        .merge(api::cluster_routes())
        .merge(api::rating_routes())
        .merge(api::report_routes())
        .merge(api::account_routes())
        .merge(api::event_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
