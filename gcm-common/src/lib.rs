//! # GCM Common Library
//!
//! Shared code for Group Concept Mapping services:
//! - Domain models (projects, statements, clusters, ratings, accounts)
//! - Phase workflow rules and credit accounting
//! - Clustering engines and the AI assistant abstraction
//! - Analysis (priority matrix) and export formats
//! - Event types and event bus
//! - Configuration loading and database initialization

pub mod analysis;
pub mod assistant;
pub mod clustering;
pub mod config;
pub mod credits;
pub mod db;
pub mod error;
pub mod events;
pub mod export;
pub mod models;
pub mod workflow;

pub use error::{Error, Result};
pub use events::{EventBus, GcmEvent};
