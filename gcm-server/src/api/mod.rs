//! HTTP API handlers for gcm-server
//!
//! Every `/api` route identifies the caller through [`crate::actor::Actor`].
//! Handlers stay thin and delegate to [`crate::services`].

pub mod account;
pub mod clusters;
pub mod health;
pub mod projects;
pub mod ratings;
pub mod reports;
pub mod sse;
pub mod statements;

pub use account::account_routes;
pub use clusters::cluster_routes;
pub use health::health_routes;
pub use projects::project_routes;
pub use ratings::rating_routes;
pub use reports::report_routes;
pub use sse::event_routes;
pub use statements::statement_routes;
