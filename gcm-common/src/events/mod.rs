//! Event types and event bus for project change notification
//!
//! Every mutation the service commits is published on the [`EventBus`].
//! Subscribers (the SSE endpoint) filter by `project_id`. Delivery is
//! best-effort: a lagging receiver skips ahead, and concurrent edits follow
//! last-writer-wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Cluster, Phase, Project, RatingDimension, Statement};

/// Project change events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum GcmEvent {
    ProjectCreated {
        project_id: Uuid,
        project: Project,
        timestamp: DateTime<Utc>,
    },

    ProjectUpdated {
        project_id: Uuid,
        project: Project,
        timestamp: DateTime<Utc>,
    },

    ProjectDeleted {
        project_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    PhaseChanged {
        project_id: Uuid,
        old_phase: Phase,
        new_phase: Phase,
        timestamp: DateTime<Utc>,
    },

    StatementAdded {
        project_id: Uuid,
        statement: Statement,
        timestamp: DateTime<Utc>,
    },

    StatementUpdated {
        project_id: Uuid,
        statement: Statement,
        timestamp: DateTime<Utc>,
    },

    StatementDeleted {
        project_id: Uuid,
        statement_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    ClusterCreated {
        project_id: Uuid,
        cluster: Cluster,
        timestamp: DateTime<Utc>,
    },

    ClusterUpdated {
        project_id: Uuid,
        cluster: Cluster,
        timestamp: DateTime<Utc>,
    },

    ClusterDeleted {
        project_id: Uuid,
        cluster_id: Uuid,
        timestamp: DateTime<Utc>,
    },

    /// `to_cluster` is `None` when the statement was unassigned
    StatementMoved {
        project_id: Uuid,
        statement_id: Uuid,
        from_cluster: Option<Uuid>,
        to_cluster: Option<Uuid>,
        timestamp: DateTime<Utc>,
    },

    ClustersRegenerated {
        project_id: Uuid,
        pass_id: Uuid,
        cluster_count: usize,
        timestamp: DateTime<Utc>,
    },

    RatingRecorded {
        project_id: Uuid,
        statement_id: Uuid,
        rater_id: Uuid,
        dimension: RatingDimension,
        value: u8,
        timestamp: DateTime<Utc>,
    },
}

impl GcmEvent {
    /// Project the event belongs to
    pub fn project_id(&self) -> Uuid {
        match self {
            GcmEvent::ProjectCreated { project_id, .. }
            | GcmEvent::ProjectUpdated { project_id, .. }
            | GcmEvent::ProjectDeleted { project_id, .. }
            | GcmEvent::PhaseChanged { project_id, .. }
            | GcmEvent::StatementAdded { project_id, .. }
            | GcmEvent::StatementUpdated { project_id, .. }
            | GcmEvent::StatementDeleted { project_id, .. }
            | GcmEvent::ClusterCreated { project_id, .. }
            | GcmEvent::ClusterUpdated { project_id, .. }
            | GcmEvent::ClusterDeleted { project_id, .. }
            | GcmEvent::StatementMoved { project_id, .. }
            | GcmEvent::ClustersRegenerated { project_id, .. }
            | GcmEvent::RatingRecorded { project_id, .. } => *project_id,
        }
    }

    /// Event type name (used as the SSE `event:` field)
    pub fn event_type(&self) -> &'static str {
        match self {
            GcmEvent::ProjectCreated { .. } => "ProjectCreated",
            GcmEvent::ProjectUpdated { .. } => "ProjectUpdated",
            GcmEvent::ProjectDeleted { .. } => "ProjectDeleted",
            GcmEvent::PhaseChanged { .. } => "PhaseChanged",
            GcmEvent::StatementAdded { .. } => "StatementAdded",
            GcmEvent::StatementUpdated { .. } => "StatementUpdated",
            GcmEvent::StatementDeleted { .. } => "StatementDeleted",
            GcmEvent::ClusterCreated { .. } => "ClusterCreated",
            GcmEvent::ClusterUpdated { .. } => "ClusterUpdated",
            GcmEvent::ClusterDeleted { .. } => "ClusterDeleted",
            GcmEvent::StatementMoved { .. } => "StatementMoved",
            GcmEvent::ClustersRegenerated { .. } => "ClustersRegenerated",
            GcmEvent::RatingRecorded { .. } => "RatingRecorded",
        }
    }
}

/// Central event distribution over a tokio broadcast channel
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<GcmEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per receiver
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Receive all events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<GcmEvent> {
        self.tx.subscribe()
    }

    /// Emit an event; `Err` when nobody is listening
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: GcmEvent) -> Result<usize, broadcast::error::SendError<GcmEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the absence of subscribers
    pub fn emit_lossy(&self, event: GcmEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
