//! Cluster store types
//!
//! Clusters belong to a clustering pass. Within one pass a statement is a
//! member of at most one cluster.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// Presentation palette, assigned by position when no color is supplied
pub const CLUSTER_PALETTE: [&str; 8] = [
    "#3B82F6", "#10B981", "#F59E0B", "#EF4444", "#8B5CF6", "#EC4899", "#14B8A6", "#6B7280",
];

pub fn palette_color(index: usize) -> &'static str {
    CLUSTER_PALETTE[index % CLUSTER_PALETTE.len()]
}

/// How a cluster was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterMethod {
    Manual,
    Semantic,
    Ratings,
    Hybrid,
}

impl ClusterMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ClusterMethod::Manual => "manual",
            ClusterMethod::Semantic => "semantic",
            ClusterMethod::Ratings => "ratings",
            ClusterMethod::Hybrid => "hybrid",
        }
    }
}

impl FromStr for ClusterMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "manual" => Ok(ClusterMethod::Manual),
            "semantic" => Ok(ClusterMethod::Semantic),
            "ratings" => Ok(ClusterMethod::Ratings),
            "hybrid" => Ok(ClusterMethod::Hybrid),
            other => Err(Error::validation("method", format!("unknown method '{}'", other))),
        }
    }
}

/// One clustering session of a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringPass {
    pub id: Uuid,
    pub project_id: Uuid,
    pub method: ClusterMethod,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Named group of statements
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: Uuid,
    pub project_id: Uuid,
    pub pass_id: Uuid,
    pub name: String,
    pub color: String,
    pub statement_ids: Vec<Uuid>,
    /// Present for generated clusters (0.0-1.0)
    pub confidence: Option<f64>,
    pub method: ClusterMethod,
    pub created_at: DateTime<Utc>,
}

/// Trim and reject empty cluster names
pub fn validate_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("name", "cluster name must not be empty"));
    }
    Ok(trimmed.to_string())
}

/// In-memory view of the clusters of one pass
///
/// All membership changes go through `move_statement`/`unassign`, which keep
/// clusters pairwise disjoint.
#[derive(Debug, Clone, Default)]
pub struct ClusterBoard {
    clusters: Vec<Cluster>,
}

impl ClusterBoard {
    pub fn new(clusters: Vec<Cluster>) -> Self {
        let mut board = Self { clusters: Vec::with_capacity(clusters.len()) };
        for mut cluster in clusters {
            let ids = std::mem::take(&mut cluster.statement_ids);
            let target = cluster.id;
            board.clusters.push(cluster);
            for statement_id in ids {
                // Duplicates across clusters collapse to the last holder
                let _ = board.move_statement(statement_id, target);
            }
        }
        board
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn into_clusters(self) -> Vec<Cluster> {
        self.clusters
    }

    /// Cluster currently holding the statement
    pub fn cluster_of(&self, statement_id: Uuid) -> Option<&Cluster> {
        self.clusters
            .iter()
            .find(|c| c.statement_ids.contains(&statement_id))
    }

    /// Remove the statement from whichever cluster holds it, then add it to
    /// `target`. Moving into the cluster that already holds it is a no-op.
    pub fn move_statement(&mut self, statement_id: Uuid, target: Uuid) -> Result<()> {
        if !self.clusters.iter().any(|c| c.id == target) {
            return Err(Error::NotFound(format!("cluster {}", target)));
        }
        self.unassign(statement_id);
        if let Some(cluster) = self.clusters.iter_mut().find(|c| c.id == target) {
            cluster.statement_ids.push(statement_id);
        }
        Ok(())
    }

    /// Remove the statement from every cluster; returns whether it was held
    pub fn unassign(&mut self, statement_id: Uuid) -> bool {
        let mut removed = false;
        for cluster in &mut self.clusters {
            let before = cluster.statement_ids.len();
            cluster.statement_ids.retain(|id| *id != statement_id);
            removed |= cluster.statement_ids.len() != before;
        }
        removed
    }

    /// Clusters holding at least one statement
    pub fn non_empty_count(&self) -> usize {
        self.clusters
            .iter()
            .filter(|c| !c.statement_ids.is_empty())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cluster(name: &str, pass_id: Uuid, members: Vec<Uuid>) -> Cluster {
        Cluster {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            pass_id,
            name: name.to_string(),
            color: palette_color(0).to_string(),
            statement_ids: members,
            confidence: None,
            method: ClusterMethod::Manual,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn move_removes_from_previous_cluster() {
        let pass = Uuid::new_v4();
        let s = Uuid::new_v4();
        let a = cluster("A", pass, vec![s]);
        let b = cluster("B", pass, vec![]);
        let (a_id, b_id) = (a.id, b.id);
        let mut board = ClusterBoard::new(vec![a, b]);

        board.move_statement(s, b_id).unwrap();

        assert_eq!(board.cluster_of(s).map(|c| c.id), Some(b_id));
        let a_after = board.clusters().iter().find(|c| c.id == a_id).unwrap();
        assert!(a_after.statement_ids.is_empty());
    }

    #[test]
    fn repeated_move_is_idempotent() {
        let pass = Uuid::new_v4();
        let s = Uuid::new_v4();
        let target = cluster("Target", pass, vec![]);
        let target_id = target.id;
        let mut board = ClusterBoard::new(vec![target, cluster("Other", pass, vec![])]);

        board.move_statement(s, target_id).unwrap();
        board.move_statement(s, target_id).unwrap();

        let holders: Vec<_> = board
            .clusters()
            .iter()
            .filter(|c| c.statement_ids.contains(&s))
            .collect();
        assert_eq!(holders.len(), 1);
        assert_eq!(holders[0].id, target_id);
        assert_eq!(holders[0].statement_ids.len(), 1);
    }

    #[test]
    fn board_construction_removes_overlap() {
        let pass = Uuid::new_v4();
        let shared = Uuid::new_v4();
        let board = ClusterBoard::new(vec![
            cluster("A", pass, vec![shared, Uuid::new_v4()]),
            cluster("B", pass, vec![shared]),
        ]);

        let mut seen = HashSet::new();
        for c in board.clusters() {
            for id in &c.statement_ids {
                assert!(seen.insert(*id), "statement {} appears twice", id);
            }
        }
    }

    #[test]
    fn move_to_unknown_cluster_fails() {
        let mut board = ClusterBoard::new(vec![]);
        assert!(matches!(
            board.move_statement(Uuid::new_v4(), Uuid::new_v4()),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn non_empty_count_ignores_empty_clusters() {
        let pass = Uuid::new_v4();
        let board = ClusterBoard::new(vec![
            cluster("A", pass, vec![Uuid::new_v4()]),
            cluster("B", pass, vec![]),
        ]);
        assert_eq!(board.non_empty_count(), 1);
    }
}
