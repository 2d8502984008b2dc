//! Request-level operations shared by the HTTP handlers
//!
//! Each function loads what it needs, enforces permissions and phase rules,
//! writes in one transaction, and emits events after commit.

pub mod account;
pub mod brainstorming;
pub mod clustering;
pub mod in_flight;
pub mod projects;
pub mod rating;
pub mod reports;
pub mod workflow;
