//! Busy flags for AI requests
//!
//! At most one AI request per (project, operation) may run at a time. The
//! guard clears the flag when dropped, including when the request future is
//! cancelled before its results are persisted.

use gcm_common::{Error, Result};
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AiOperation {
    GenerateStatements,
    GenerateClusters,
}

impl fmt::Display for AiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AiOperation::GenerateStatements => f.write_str("statement generation"),
            AiOperation::GenerateClusters => f.write_str("cluster generation"),
        }
    }
}

type Key = (Uuid, AiOperation);

/// Shared registry of running AI requests
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    running: Arc<Mutex<HashSet<Key>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the operation as running, or fail with Conflict if it already is
    pub fn try_acquire(&self, project_id: Uuid, operation: AiOperation) -> Result<InFlightGuard> {
        let mut running = self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if !running.insert((project_id, operation)) {
            return Err(Error::Conflict(format!(
                "{} already in progress for project {}",
                operation, project_id
            )));
        }
        debug!(%project_id, %operation, "AI request started");
        Ok(InFlightGuard {
            registry: self.clone(),
            key: (project_id, operation),
        })
    }

    pub fn is_running(&self, project_id: Uuid, operation: AiOperation) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&(project_id, operation))
    }
}

/// Clears the busy flag on drop
#[derive(Debug)]
pub struct InFlightGuard {
    registry: InFlightRegistry,
    key: Key,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut running = self
            .registry
            .running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        running.remove(&self.key);
        debug!(project_id = %self.key.0, operation = %self.key.1, "AI request finished");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_conflicts_until_guard_dropped() {
        let registry = InFlightRegistry::new();
        let project = Uuid::new_v4();

        let guard = registry.try_acquire(project, AiOperation::GenerateStatements).unwrap();
        assert!(matches!(
            registry.try_acquire(project, AiOperation::GenerateStatements),
            Err(Error::Conflict(_))
        ));

        // Different operation on the same project is independent
        let _other = registry.try_acquire(project, AiOperation::GenerateClusters).unwrap();

        drop(guard);
        assert!(!registry.is_running(project, AiOperation::GenerateStatements));
        assert!(registry.try_acquire(project, AiOperation::GenerateStatements).is_ok());
    }
}
