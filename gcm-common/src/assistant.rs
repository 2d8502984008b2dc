//! AI generation collaborator
//!
//! The service talks to AI through [`Assistant`]. [`LocalAssistant`] drafts
//! statements from phrasing templates and delegates clustering to a
//! configured [`Clusterer`], so a remote model can replace either half
//! without touching callers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clustering::{check_drafts, ClusterDraft, ClusterInput, ClusterSettings, Clusterer};
use crate::Result;

/// Generated statement before it is attached to a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementDraft {
    pub text: String,
    pub confidence: f64,
}

#[async_trait]
pub trait Assistant: Send + Sync {
    /// Draft `count` statements answering the focus question
    async fn generate_statements(
        &self,
        focus_question: &str,
        context: Option<&str>,
        count: u32,
    ) -> Result<Vec<StatementDraft>>;

    /// Group statements into named, disjoint clusters
    async fn generate_clusters(
        &self,
        input: &[ClusterInput],
        settings: &ClusterSettings,
    ) -> Result<Vec<ClusterDraft>>;
}

/// Phrasings combined with themes to draft statements
const OPENERS: &[&str] = &[
    "Introduce",
    "Expand",
    "Simplify",
    "Measure",
    "Invest in",
    "Create a dedicated team for",
    "Regularly review",
    "Offer incentives tied to",
];

const THEMES: &[&str] = &[
    "personalised customer follow-up",
    "feedback collection after every interaction",
    "staff training on core processes",
    "self-service digital tools",
    "a loyalty and rewards program",
    "transparent communication of changes",
    "cross-team collaboration rituals",
    "onboarding for new clients",
    "response times for support requests",
    "pricing clarity and value messaging",
    "data-driven prioritisation of initiatives",
    "recognition of team contributions",
];

/// In-process assistant with optional simulated latency
pub struct LocalAssistant {
    clusterer: Arc<dyn Clusterer>,
    latency: Duration,
}

impl LocalAssistant {
    pub fn new(clusterer: Arc<dyn Clusterer>, latency: Duration) -> Self {
        Self { clusterer, latency }
    }

    async fn simulate_round_trip(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    /// Deterministic draft for position `index`, optionally scoped by context
    fn draft(index: usize, context: Option<&str>) -> StatementDraft {
        let opener = OPENERS[index % OPENERS.len()];
        let theme = THEMES[(index % OPENERS.len() + index / OPENERS.len()) % THEMES.len()];
        let text = match context {
            Some(ctx) => format!("{} {} ({})", opener, theme, ctx),
            None => format!("{} {}", opener, theme),
        };
        // Spread confidences over [0.70, 0.95]
        let confidence = 0.70 + ((index * 7) % 26) as f64 / 100.0;
        StatementDraft { text, confidence }
    }
}

#[async_trait]
impl Assistant for LocalAssistant {
    async fn generate_statements(
        &self,
        focus_question: &str,
        context: Option<&str>,
        count: u32,
    ) -> Result<Vec<StatementDraft>> {
        debug!(focus_question, count, "Drafting statements");
        self.simulate_round_trip().await;

        let context = context.map(str::trim).filter(|c| !c.is_empty());
        Ok((0..count as usize).map(|i| Self::draft(i, context)).collect())
    }

    async fn generate_clusters(
        &self,
        input: &[ClusterInput],
        settings: &ClusterSettings,
    ) -> Result<Vec<ClusterDraft>> {
        debug!(
            engine = self.clusterer.name(),
            statements = input.len(),
            "Clustering statements"
        );
        self.simulate_round_trip().await;

        let drafts = self.clusterer.cluster(input, settings)?;
        check_drafts(input, &drafts)?;
        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::{ClusteringEngine, TargetCount};
    use std::collections::HashSet;
    use uuid::Uuid;

    fn assistant() -> LocalAssistant {
        LocalAssistant::new(ClusteringEngine::Keyword.build(), Duration::ZERO)
    }

    #[tokio::test]
    async fn generates_requested_count_with_valid_confidence() {
        let drafts = assistant()
            .generate_statements("How can we improve customer retention?", None, 10)
            .await
            .unwrap();

        assert_eq!(drafts.len(), 10);
        for d in &drafts {
            assert!(!d.text.trim().is_empty());
            assert!((0.70..=0.95).contains(&d.confidence), "confidence {}", d.confidence);
        }
        let unique: HashSet<&str> = drafts.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(unique.len(), 10);
    }

    #[tokio::test]
    async fn context_is_included_in_drafts() {
        let drafts = assistant()
            .generate_statements("Why?", Some("retail stores"), 2)
            .await
            .unwrap();
        assert!(drafts.iter().all(|d| d.text.contains("retail stores")));
    }

    #[tokio::test]
    async fn clusters_are_checked_for_overlap() {
        let input: Vec<ClusterInput> = ["Customer hotline", "Customer survey"]
            .iter()
            .map(|t| ClusterInput {
                statement_id: Uuid::new_v4(),
                text: t.to_string(),
                means: None,
            })
            .collect();
        let settings = ClusterSettings {
            target_cluster_count: TargetCount::Auto,
            ..Default::default()
        };

        let drafts = assistant().generate_clusters(&input, &settings).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].statement_ids.len(), 2);
    }
}
