//! Statement clustering engines
//!
//! Every engine implements [`Clusterer`]: input statements plus settings in,
//! named clusters out. Output clusters are pairwise disjoint subsets of the
//! input, each with a confidence in [0, 1]. Statements may be left
//! unassigned.

mod keyword;
mod similarity;

pub use keyword::{KeywordClusterer, KeywordTemplate, DEFAULT_TEMPLATES};
pub use similarity::SimilarityClusterer;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::analysis::StatementMeans;
use crate::models::{ClusterMethod, Statement};
use crate::{Error, Result};

/// Name given to the bucket of statements no template or group claimed
pub const MISCELLANEOUS: &str = "Miscellaneous";

/// Requested number of clusters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "TargetCountRepr", into = "TargetCountRepr")]
pub enum TargetCount {
    #[default]
    Auto,
    Fixed(u32),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TargetCountRepr {
    Count(u32),
    Word(String),
}

impl TryFrom<TargetCountRepr> for TargetCount {
    type Error = Error;

    fn try_from(repr: TargetCountRepr) -> Result<Self> {
        match repr {
            TargetCountRepr::Count(0) => Err(Error::validation(
                "target_cluster_count",
                "must be 'auto' or a positive integer",
            )),
            TargetCountRepr::Count(n) => Ok(TargetCount::Fixed(n)),
            TargetCountRepr::Word(word) if word == "auto" => Ok(TargetCount::Auto),
            TargetCountRepr::Word(word) => Err(Error::validation(
                "target_cluster_count",
                format!("expected 'auto' or an integer, got '{}'", word),
            )),
        }
    }
}

impl From<TargetCount> for TargetCountRepr {
    fn from(target: TargetCount) -> Self {
        match target {
            TargetCount::Auto => TargetCountRepr::Word("auto".to_string()),
            TargetCount::Fixed(n) => TargetCountRepr::Count(n),
        }
    }
}

/// Clustering method requested for AI-assisted clustering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringMethod {
    #[default]
    Semantic,
    Ratings,
    Hybrid,
}

impl From<ClusteringMethod> for ClusterMethod {
    fn from(method: ClusteringMethod) -> Self {
        match method {
            ClusteringMethod::Semantic => ClusterMethod::Semantic,
            ClusteringMethod::Ratings => ClusterMethod::Ratings,
            ClusteringMethod::Hybrid => ClusterMethod::Hybrid,
        }
    }
}

/// Settings bundle for AI-assisted clustering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSettings {
    #[serde(default)]
    pub target_cluster_count: TargetCount,
    #[serde(default)]
    pub method: ClusteringMethod,
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: u32,
    #[serde(default)]
    pub include_ratings: bool,
}

fn default_min_cluster_size() -> u32 {
    2
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            target_cluster_count: TargetCount::Auto,
            method: ClusteringMethod::Semantic,
            min_cluster_size: default_min_cluster_size(),
            include_ratings: false,
        }
    }
}

impl ClusterSettings {
    /// Minimum size with 0 treated as 1
    pub fn effective_min_size(&self) -> usize {
        self.min_cluster_size.max(1) as usize
    }

    /// Whether rating means should influence grouping
    pub fn uses_ratings(&self) -> bool {
        self.include_ratings
            && matches!(self.method, ClusteringMethod::Ratings | ClusteringMethod::Hybrid)
    }
}

/// One statement as seen by a clustering engine
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterInput {
    pub statement_id: Uuid,
    pub text: String,
    /// (mean importance, mean feasibility) when rated on both dimensions
    pub means: Option<(f64, f64)>,
}

impl ClusterInput {
    /// Build engine input from statements and optional rating summaries
    pub fn from_statements(statements: &[Statement], means: &HashMap<Uuid, StatementMeans>) -> Vec<Self> {
        statements
            .iter()
            .map(|s| ClusterInput {
                statement_id: s.id,
                text: s.text.clone(),
                means: means.get(&s.id).and_then(StatementMeans::pair),
            })
            .collect()
    }
}

/// Engine output for one cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterDraft {
    pub name: String,
    pub statement_ids: Vec<Uuid>,
    pub confidence: f64,
}

/// A clustering engine
pub trait Clusterer: Send + Sync {
    /// Engine name for logging
    fn name(&self) -> &'static str;

    fn cluster(&self, input: &[ClusterInput], settings: &ClusterSettings) -> Result<Vec<ClusterDraft>>;
}

/// Configured engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusteringEngine {
    /// Keyword containment against a fixed template list
    Keyword,
    /// Term-vector similarity with agglomerative grouping
    #[default]
    Similarity,
}

impl ClusteringEngine {
    pub fn build(self) -> Arc<dyn Clusterer> {
        match self {
            ClusteringEngine::Keyword => Arc::new(KeywordClusterer::default()),
            ClusteringEngine::Similarity => Arc::new(SimilarityClusterer::default()),
        }
    }
}

impl FromStr for ClusteringEngine {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keyword" => Ok(ClusteringEngine::Keyword),
            "similarity" => Ok(ClusteringEngine::Similarity),
            other => Err(Error::Config(format!("unknown clustering engine '{}'", other))),
        }
    }
}

impl fmt::Display for ClusteringEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusteringEngine::Keyword => f.write_str("keyword"),
            ClusteringEngine::Similarity => f.write_str("similarity"),
        }
    }
}

/// Verify engine output: known statements only, no statement twice,
/// confidences within [0, 1], non-empty names
pub fn check_drafts(input: &[ClusterInput], drafts: &[ClusterDraft]) -> Result<()> {
    let known: HashSet<Uuid> = input.iter().map(|i| i.statement_id).collect();
    let mut seen = HashSet::new();

    for draft in drafts {
        if draft.name.trim().is_empty() {
            return Err(Error::Internal("clustering produced an unnamed cluster".to_string()));
        }
        if !(0.0..=1.0).contains(&draft.confidence) {
            return Err(Error::Internal(format!(
                "cluster '{}' has confidence {} outside [0, 1]",
                draft.name, draft.confidence
            )));
        }
        for id in &draft.statement_ids {
            if !known.contains(id) {
                return Err(Error::Internal(format!(
                    "cluster '{}' references unknown statement {}",
                    draft.name, id
                )));
            }
            if !seen.insert(*id) {
                return Err(Error::Internal(format!(
                    "statement {} assigned to more than one cluster",
                    id
                )));
            }
        }
    }
    Ok(())
}

/// Bucket leftovers into "Miscellaneous" when there are enough of them
fn miscellaneous(leftovers: Vec<Uuid>, settings: &ClusterSettings, confidence: f64) -> Option<ClusterDraft> {
    (!leftovers.is_empty() && leftovers.len() >= settings.effective_min_size()).then(|| ClusterDraft {
        name: MISCELLANEOUS.to_string(),
        statement_ids: leftovers,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_count_accepts_auto_or_positive_integer() {
        let auto: TargetCount = serde_json::from_str("\"auto\"").unwrap();
        assert_eq!(auto, TargetCount::Auto);
        let fixed: TargetCount = serde_json::from_str("4").unwrap();
        assert_eq!(fixed, TargetCount::Fixed(4));
        assert!(serde_json::from_str::<TargetCount>("0").is_err());
        assert!(serde_json::from_str::<TargetCount>("\"many\"").is_err());
    }

    #[test]
    fn settings_defaults_from_empty_object() {
        let settings: ClusterSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, ClusterSettings::default());
        assert_eq!(settings.min_cluster_size, 2);
    }

    #[test]
    fn check_drafts_rejects_overlap() {
        let id = Uuid::new_v4();
        let input = vec![ClusterInput {
            statement_id: id,
            text: "x".to_string(),
            means: None,
        }];
        let drafts = vec![
            ClusterDraft { name: "A".into(), statement_ids: vec![id], confidence: 0.5 },
            ClusterDraft { name: "B".into(), statement_ids: vec![id], confidence: 0.5 },
        ];
        assert!(check_drafts(&input, &drafts).is_err());
    }

    #[test]
    fn engine_parse() {
        assert_eq!("keyword".parse::<ClusteringEngine>().unwrap(), ClusteringEngine::Keyword);
        assert!("kmeans".parse::<ClusteringEngine>().is_err());
    }
}
