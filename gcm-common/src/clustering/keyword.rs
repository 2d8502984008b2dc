//! Keyword-containment clustering
//!
//! Placeholder engine: each template claims every remaining statement whose
//! lowercase text contains one of its keywords. Templates are visited in
//! order, so the first matching template wins.

use tracing::debug;
use uuid::Uuid;

use super::{miscellaneous, ClusterDraft, ClusterInput, ClusterSettings, Clusterer, TargetCount};
use crate::Result;

/// Cluster name with the keyword fragments that select its members
#[derive(Debug, Clone, Copy)]
pub struct KeywordTemplate {
    pub name: &'static str,
    pub keywords: &'static [&'static str],
}

pub const DEFAULT_TEMPLATES: &[KeywordTemplate] = &[
    KeywordTemplate {
        name: "Customer Experience",
        keywords: &["customer", "client", "service", "support", "experience", "satisf"],
    },
    KeywordTemplate {
        name: "Communication & Feedback",
        keywords: &["communicat", "feedback", "inform", "transparen", "listen", "survey"],
    },
    KeywordTemplate {
        name: "Technology & Tools",
        keywords: &["technolog", "digital", "software", "tool", "automat", "data", "online"],
    },
    KeywordTemplate {
        name: "Training & Development",
        keywords: &["train", "skill", "learn", "develop", "mentor", "coach", "onboard"],
    },
    KeywordTemplate {
        name: "Process & Efficiency",
        keywords: &["process", "efficien", "workflow", "streamlin", "simplif", "faster", "speed"],
    },
    KeywordTemplate {
        name: "Culture & Engagement",
        keywords: &["culture", "team", "engag", "recogni", "collaborat", "morale", "community"],
    },
    KeywordTemplate {
        name: "Pricing & Value",
        keywords: &["price", "pricing", "cost", "value", "discount", "loyal", "reward"],
    },
    KeywordTemplate {
        name: "Leadership & Strategy",
        keywords: &["leader", "strateg", "vision", "goal", "priorit", "manage"],
    },
];

const MISC_CONFIDENCE: f64 = 0.3;

/// Keyword-template engine
#[derive(Debug, Clone)]
pub struct KeywordClusterer {
    templates: Vec<KeywordTemplate>,
}

impl Default for KeywordClusterer {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATES.to_vec())
    }
}

impl KeywordClusterer {
    pub fn new(templates: Vec<KeywordTemplate>) -> Self {
        Self { templates }
    }

    fn matches(template: &KeywordTemplate, text: &str) -> bool {
        template.keywords.iter().any(|k| text.contains(k))
    }

    /// Grows with cluster size, capped below certainty
    fn confidence(members: usize) -> f64 {
        (0.6 + 0.05 * members as f64).min(0.95)
    }
}

impl Clusterer for KeywordClusterer {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn cluster(&self, input: &[ClusterInput], settings: &ClusterSettings) -> Result<Vec<ClusterDraft>> {
        let max_templates = match settings.target_cluster_count {
            TargetCount::Auto => usize::MAX,
            TargetCount::Fixed(n) => n as usize,
        };

        let mut remaining: Vec<(Uuid, String)> = input
            .iter()
            .map(|i| (i.statement_id, i.text.to_lowercase()))
            .collect();
        let mut drafts = Vec::new();

        for template in &self.templates {
            if drafts.len() >= max_templates || remaining.is_empty() {
                break;
            }

            let (claimed, rest): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|(_, text)| Self::matches(template, text));
            remaining = rest;

            if !claimed.is_empty() {
                debug!(template = template.name, members = claimed.len(), "Keyword template matched");
                drafts.push(ClusterDraft {
                    name: template.name.to_string(),
                    confidence: Self::confidence(claimed.len()),
                    statement_ids: claimed.into_iter().map(|(id, _)| id).collect(),
                });
            }
        }

        let leftovers = remaining.into_iter().map(|(id, _)| id).collect();
        drafts.extend(miscellaneous(leftovers, settings, MISC_CONFIDENCE));

        Ok(drafts)
    }
}

#[cfg(test)]
mod tests {
    use super::super::{check_drafts, MISCELLANEOUS};
    use super::*;

    fn input(texts: &[&str]) -> Vec<ClusterInput> {
        texts
            .iter()
            .map(|t| ClusterInput {
                statement_id: Uuid::new_v4(),
                text: t.to_string(),
                means: None,
            })
            .collect()
    }

    #[test]
    fn first_matching_template_wins() {
        // Matches both "Customer Experience" and "Training & Development"
        let statements = input(&["Train customer support staff"]);
        let drafts = KeywordClusterer::default()
            .cluster(&statements, &ClusterSettings::default())
            .unwrap();

        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].name, "Customer Experience");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let statements = input(&["Better DIGITAL tools", "Automate invoicing"]);
        let drafts = KeywordClusterer::default()
            .cluster(&statements, &ClusterSettings::default())
            .unwrap();

        assert_eq!(drafts[0].name, "Technology & Tools");
        assert_eq!(drafts[0].statement_ids.len(), 2);
    }

    #[test]
    fn leftovers_go_to_miscellaneous_when_large_enough() {
        let statements = input(&["Open on weekends", "Bigger parking lot", "Customer hotline"]);
        let drafts = KeywordClusterer::default()
            .cluster(&statements, &ClusterSettings::default())
            .unwrap();

        let misc = drafts.iter().find(|d| d.name == MISCELLANEOUS).unwrap();
        assert_eq!(misc.statement_ids.len(), 2);
        check_drafts(&statements, &drafts).unwrap();
    }

    #[test]
    fn small_leftover_stays_unassigned() {
        let statements = input(&["Open on weekends", "Customer hotline"]);
        let drafts = KeywordClusterer::default()
            .cluster(&statements, &ClusterSettings::default())
            .unwrap();

        assert!(drafts.iter().all(|d| d.name != MISCELLANEOUS));
        let assigned: usize = drafts.iter().map(|d| d.statement_ids.len()).sum();
        assert_eq!(assigned, 1);
    }

    #[test]
    fn fixed_target_caps_template_clusters() {
        let statements = input(&["Customer hotline", "Team lunches", "Lower price"]);
        let settings = ClusterSettings {
            target_cluster_count: TargetCount::Fixed(1),
            min_cluster_size: 1,
            ..Default::default()
        };
        let drafts = KeywordClusterer::default().cluster(&statements, &settings).unwrap();

        assert_eq!(drafts[0].name, "Customer Experience");
        assert_eq!(drafts[1].name, MISCELLANEOUS);
        assert_eq!(drafts[1].statement_ids.len(), 2);
    }

    #[test]
    fn confidences_stay_in_range() {
        let texts: Vec<String> = (0..40).map(|i| format!("customer idea {}", i)).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let statements = input(&refs);
        let drafts = KeywordClusterer::default()
            .cluster(&statements, &ClusterSettings::default())
            .unwrap();
        check_drafts(&statements, &drafts).unwrap();
        assert!(drafts[0].confidence <= 0.95);
    }
}
