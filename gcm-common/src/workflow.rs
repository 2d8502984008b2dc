//! Phase state machine
//!
//! BRAINSTORMING → STRUCTURING → RATING → ANALYSIS
//!
//! Transition preconditions are derived from a [`ProgressSnapshot`] taken
//! from persistence, never from stored flags. The service layer evaluates
//! [`check_transition`] inside the same transaction that writes the new
//! phase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Phase;
use crate::{Error, Result};

/// Configurable transition rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionPolicy {
    /// Permit moving to an earlier phase
    #[serde(default)]
    pub allow_backward: bool,
    /// Statements required before leaving BRAINSTORMING (0 = no guard)
    #[serde(default)]
    pub min_statements_to_structure: u32,
}

impl Default for TransitionPolicy {
    fn default() -> Self {
        Self {
            allow_backward: false,
            min_statements_to_structure: 0,
        }
    }
}

/// Derived project progress, evaluated for one acting user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total_statements: u32,
    /// Statements the actor has rated on both dimensions
    pub rated_by_actor: u32,
    /// Clusters in the active pass
    pub cluster_count: u32,
    /// Clusters in the active pass holding at least one statement
    pub clusters_with_statements: u32,
}

impl ProgressSnapshot {
    pub fn rating_complete(&self) -> bool {
        self.rated_by_actor == self.total_statements
    }

    pub fn clustering_complete(&self) -> bool {
        self.clusters_with_statements > 0
    }

    /// Rating progress as a percentage (100 when there is nothing to rate)
    pub fn rating_percent(&self) -> f64 {
        if self.total_statements == 0 {
            100.0
        } else {
            (self.rated_by_actor as f64 / self.total_statements as f64) * 100.0
        }
    }
}

/// Reason a transition cannot happen yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Blocker {
    NotEnoughStatements { required: u32, actual: u32 },
    RatingIncomplete { rated: u32, total: u32 },
    NoClusters,
    TerminalPhase,
}

impl Blocker {
    pub fn describe(&self) -> String {
        match self {
            Blocker::NotEnoughStatements { required, actual } => {
                format!("at least {} statements required, {} present", required, actual)
            }
            Blocker::RatingIncomplete { rated, total } => {
                format!("rating incomplete: {} of {} statements rated on both dimensions", rated, total)
            }
            Blocker::NoClusters => "clustering incomplete: no cluster holds a statement".to_string(),
            Blocker::TerminalPhase => "analysis is the final phase".to_string(),
        }
    }
}

/// Whether the project can move to its next phase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Readiness {
    pub phase: Phase,
    pub next_phase: Option<Phase>,
    pub can_advance: bool,
    pub blockers: Vec<Blocker>,
}

/// Unmet preconditions for leaving `from` for its successor
fn forward_blockers(from: Phase, snapshot: &ProgressSnapshot, policy: &TransitionPolicy) -> Vec<Blocker> {
    let mut blockers = Vec::new();
    match from {
        Phase::Brainstorming => {
            if snapshot.total_statements < policy.min_statements_to_structure {
                blockers.push(Blocker::NotEnoughStatements {
                    required: policy.min_statements_to_structure,
                    actual: snapshot.total_statements,
                });
            }
        }
        Phase::Structuring => {}
        Phase::Rating => {
            if !snapshot.rating_complete() {
                blockers.push(Blocker::RatingIncomplete {
                    rated: snapshot.rated_by_actor,
                    total: snapshot.total_statements,
                });
            }
            if !snapshot.clustering_complete() {
                blockers.push(Blocker::NoClusters);
            }
        }
        Phase::Analysis => blockers.push(Blocker::TerminalPhase),
    }
    blockers
}

/// Evaluate whether `phase` can advance
pub fn readiness(phase: Phase, snapshot: &ProgressSnapshot, policy: &TransitionPolicy) -> Readiness {
    let blockers = forward_blockers(phase, snapshot, policy);
    Readiness {
        phase,
        next_phase: phase.next(),
        can_advance: blockers.is_empty(),
        blockers,
    }
}

/// Validate a transition from `from` to `to`
///
/// Forward moves are single-step only. Backward moves require
/// `policy.allow_backward` and have no further preconditions.
pub fn check_transition(
    from: Phase,
    to: Phase,
    snapshot: &ProgressSnapshot,
    policy: &TransitionPolicy,
) -> Result<()> {
    if from == to {
        return Err(Error::InvalidTransition(format!("project is already in {}", from)));
    }

    if to < from {
        if policy.allow_backward {
            return Ok(());
        }
        return Err(Error::InvalidTransition(format!(
            "moving back from {} to {} is not permitted",
            from, to
        )));
    }

    if from.next() != Some(to) {
        return Err(Error::InvalidTransition(format!(
            "cannot skip from {} to {}",
            from, to
        )));
    }

    let blockers = forward_blockers(from, snapshot, policy);
    if blockers.is_empty() {
        Ok(())
    } else {
        let reasons: Vec<String> = blockers.iter().map(Blocker::describe).collect();
        Err(Error::InvalidTransition(format!(
            "cannot move from {} to {}: {}",
            from,
            to,
            reasons.join("; ")
        )))
    }
}

/// Record of an applied transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub project_id: Uuid,
    pub old_phase: Phase,
    pub new_phase: Phase,
    pub transitioned_at: DateTime<Utc>,
}
