//! Domain models

pub mod account;
pub mod cluster;
pub mod phase;
pub mod project;
pub mod rating;
pub mod statement;

pub use account::{Account, PlanFeatures, PlanTier};
pub use cluster::{Cluster, ClusterBoard, ClusterMethod, ClusteringPass};
pub use phase::Phase;
pub use project::{NewProject, Project, ProjectStatus, ProjectUpdate};
pub use rating::{Rating, RatingDimension, RatingValue};
pub use statement::{Statement, StatementSource};
