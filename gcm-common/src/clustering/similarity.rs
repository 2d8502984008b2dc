//! Similarity-based clustering
//!
//! Statements become TF-IDF term vectors compared by cosine similarity.
//! When ratings are requested (`ratings`/`hybrid` with `include_ratings`),
//! closeness of mean rating vectors is blended in. Groups are formed by
//! average-linkage agglomerative merging.

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;
use uuid::Uuid;

use super::{
    miscellaneous, ClusterDraft, ClusterInput, ClusterSettings, Clusterer, ClusteringMethod,
    TargetCount,
};
use crate::Result;

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "with", "that", "this", "from", "into", "our", "their", "they", "them",
    "are", "was", "were", "have", "has", "had", "more", "most", "less", "can", "could", "should",
    "would", "will", "all", "any", "each", "every", "about", "over", "than", "then", "there",
    "these", "those", "what", "when", "where", "which", "who", "how", "why", "not", "but", "also",
    "make", "better", "improve", "improving", "increase", "use", "using", "new", "get", "its",
];

/// Maximum distance between two (importance, feasibility) points on the 1-5 scale
const MAX_RATING_DISTANCE: f64 = 5.656_854_249_492_381; // sqrt(4² + 4²)

const MISC_CONFIDENCE: f64 = 0.3;

/// Agglomerative term-similarity engine
#[derive(Debug, Clone)]
pub struct SimilarityClusterer {
    /// In auto mode, merging stops once no pair of groups is at least this similar
    pub merge_floor: f64,
}

impl Default for SimilarityClusterer {
    fn default() -> Self {
        Self { merge_floor: 0.1 }
    }
}

fn stem(word: &str) -> &str {
    for suffix in ["ing", "ed", "es", "s"] {
        if word.len() > suffix.len() + 3 {
            if let Some(stripped) = word.strip_suffix(suffix) {
                return stripped;
            }
        }
    }
    word
}

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 3 && !STOPWORDS.contains(w))
        .map(|w| stem(w).to_string())
        .collect()
}

type TermVector = HashMap<String, f64>;

fn tfidf_vectors(input: &[ClusterInput]) -> Vec<TermVector> {
    let docs: Vec<Vec<String>> = input.iter().map(|i| tokenize(&i.text)).collect();

    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
        for term in unique {
            *doc_freq.entry(term).or_default() += 1;
        }
    }

    let n = docs.len() as f64;
    docs.iter()
        .map(|doc| {
            let mut tf: TermVector = HashMap::new();
            for term in doc {
                *tf.entry(term.clone()).or_default() += 1.0;
            }
            for (term, weight) in tf.iter_mut() {
                let df = doc_freq.get(term.as_str()).copied().unwrap_or(0) as f64;
                *weight *= ((n + 1.0) / (df + 1.0)).ln() + 1.0;
            }
            tf
        })
        .collect()
}

fn cosine(a: &TermVector, b: &TermVector) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, wa)| b.get(term).map(|wb| wa * wb))
        .sum();
    let norm = |v: &TermVector| v.values().map(|w| w * w).sum::<f64>().sqrt();
    let denom = norm(a) * norm(b);
    if denom == 0.0 {
        0.0
    } else {
        (dot / denom).clamp(0.0, 1.0)
    }
}

fn rating_similarity(a: (f64, f64), b: (f64, f64)) -> f64 {
    let distance = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt();
    (1.0 - distance / MAX_RATING_DISTANCE).clamp(0.0, 1.0)
}

impl SimilarityClusterer {
    fn similarity_matrix(&self, input: &[ClusterInput], settings: &ClusterSettings) -> Vec<Vec<f64>> {
        let vectors = tfidf_vectors(input);
        let n = input.len();
        let mut matrix = vec![vec![0.0; n]; n];

        for i in 0..n {
            matrix[i][i] = 1.0;
            for j in (i + 1)..n {
                let text = cosine(&vectors[i], &vectors[j]);
                let sim = match (settings.uses_ratings(), input[i].means, input[j].means) {
                    (true, Some(a), Some(b)) => {
                        let ratings = rating_similarity(a, b);
                        match settings.method {
                            ClusteringMethod::Ratings => ratings,
                            _ => 0.5 * text + 0.5 * ratings,
                        }
                    }
                    _ => text,
                };
                matrix[i][j] = sim;
                matrix[j][i] = sim;
            }
        }
        matrix
    }

    fn average_linkage(matrix: &[Vec<f64>], a: &[usize], b: &[usize]) -> f64 {
        let total: f64 = a.iter().flat_map(|&i| b.iter().map(move |&j| matrix[i][j])).sum();
        total / (a.len() * b.len()) as f64
    }

    fn cohesion(matrix: &[Vec<f64>], group: &[usize]) -> f64 {
        if group.len() < 2 {
            return 0.5;
        }
        let mut total = 0.0;
        let mut pairs = 0usize;
        for (k, &i) in group.iter().enumerate() {
            for &j in &group[k + 1..] {
                total += matrix[i][j];
                pairs += 1;
            }
        }
        (total / pairs as f64).clamp(0.0, 1.0)
    }

    /// Title from the two heaviest terms across the group
    fn name_group(input: &[ClusterInput], group: &[usize], fallback: usize) -> String {
        let mut weights: BTreeMap<String, usize> = BTreeMap::new();
        for &i in group {
            for term in tokenize(&input[i].text) {
                *weights.entry(term).or_default() += 1;
            }
        }
        let mut ranked: Vec<(String, usize)> = weights.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let words: Vec<String> = ranked
            .into_iter()
            .take(2)
            .map(|(term, _)| {
                let mut chars = term.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => term,
                }
            })
            .collect();

        if words.is_empty() {
            format!("Group {}", fallback)
        } else {
            words.join(" & ")
        }
    }
}

impl Clusterer for SimilarityClusterer {
    fn name(&self) -> &'static str {
        "similarity"
    }

    fn cluster(&self, input: &[ClusterInput], settings: &ClusterSettings) -> Result<Vec<ClusterDraft>> {
        let n = input.len();
        if n == 0 {
            return Ok(Vec::new());
        }

        let matrix = self.similarity_matrix(input, settings);
        let (target, enforce_floor) = match settings.target_cluster_count {
            TargetCount::Auto => (((n as f64 / 2.0).sqrt().round() as usize).max(1), true),
            TargetCount::Fixed(k) => ((k as usize).max(1), false),
        };

        let mut groups: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
        while groups.len() > target {
            let mut best: Option<(usize, usize, f64)> = None;
            for a in 0..groups.len() {
                for b in (a + 1)..groups.len() {
                    let sim = Self::average_linkage(&matrix, &groups[a], &groups[b]);
                    if best.map_or(true, |(_, _, s)| sim > s) {
                        best = Some((a, b, sim));
                    }
                }
            }
            let Some((a, b, sim)) = best else { break };
            if enforce_floor && sim < self.merge_floor {
                break;
            }
            let merged = groups.swap_remove(b);
            groups[a].extend(merged);
        }

        let min_size = settings.effective_min_size();
        let mut drafts = Vec::new();
        let mut leftovers: Vec<Uuid> = Vec::new();

        groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        for (index, group) in groups.iter().enumerate() {
            if group.len() < min_size {
                leftovers.extend(group.iter().map(|&i| input[i].statement_id));
                continue;
            }
            drafts.push(ClusterDraft {
                name: Self::name_group(input, group, index + 1),
                statement_ids: group.iter().map(|&i| input[i].statement_id).collect(),
                confidence: Self::cohesion(&matrix, group),
            });
        }

        dedupe_names(&mut drafts);
        drafts.extend(miscellaneous(leftovers, settings, MISC_CONFIDENCE));

        debug!(
            statements = n,
            clusters = drafts.len(),
            "Similarity clustering complete"
        );
        Ok(drafts)
    }
}

/// Suffix repeated names with a counter so every cluster is distinguishable
fn dedupe_names(drafts: &mut [ClusterDraft]) {
    let mut seen: HashMap<String, usize> = HashMap::new();
    for draft in drafts.iter_mut() {
        let count = seen.entry(draft.name.clone()).or_default();
        *count += 1;
        if *count > 1 {
            draft.name = format!("{} ({})", draft.name, count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::check_drafts;
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
    fn empty_input_gives_no_clusters() {
        let drafts = SimilarityClusterer::default()
            .cluster(&[], &ClusterSettings::default())
            .unwrap();
        assert!(drafts.is_empty());
    }

    #[test]
    fn related_statements_group_together() {
        let statements = input(&[
            "Loyalty rewards for returning customers",
            "Rewards program for loyal customers",
            "Faster checkout on the mobile app",
            "Mobile app checkout is too slow",
        ]);
        let settings = ClusterSettings {
            target_cluster_count: TargetCount::Fixed(2),
            ..Default::default()
        };

        let drafts = SimilarityClusterer::default().cluster(&statements, &settings).unwrap();
        check_drafts(&statements, &drafts).unwrap();
        assert_eq!(drafts.len(), 2);

        let together = |a: Uuid, b: Uuid| {
            drafts
                .iter()
                .any(|d| d.statement_ids.contains(&a) && d.statement_ids.contains(&b))
        };
        assert!(together(statements[0].statement_id, statements[1].statement_id));
        assert!(together(statements[2].statement_id, statements[3].statement_id));
    }

    #[test]
    fn undersized_groups_fall_into_miscellaneous() {
        let statements = input(&[
            "Weekly team newsletter",
            "Team newsletter every week",
            "Solar panels on the roof",
            "Dog friendly office",
        ]);
        let settings = ClusterSettings {
            target_cluster_count: TargetCount::Fixed(3),
            min_cluster_size: 2,
            ..Default::default()
        };

        let drafts = SimilarityClusterer::default().cluster(&statements, &settings).unwrap();
        check_drafts(&statements, &drafts).unwrap();
        let misc = drafts.iter().find(|d| d.name == super::super::MISCELLANEOUS).unwrap();
        assert_eq!(misc.statement_ids.len(), 2);
    }

    #[test]
    fn ratings_method_uses_rating_proximity() {
        let mut statements = input(&["Alpha", "Beta", "Gamma", "Delta"]);
        statements[0].means = Some((5.0, 5.0));
        statements[1].means = Some((1.0, 1.0));
        statements[2].means = Some((4.8, 4.9));
        statements[3].means = Some((1.2, 1.1));
        let settings = ClusterSettings {
            target_cluster_count: TargetCount::Fixed(2),
            method: ClusteringMethod::Ratings,
            include_ratings: true,
            min_cluster_size: 1,
        };

        let drafts = SimilarityClusterer::default().cluster(&statements, &settings).unwrap();
        let high = drafts
            .iter()
            .find(|d| d.statement_ids.contains(&statements[0].statement_id))
            .unwrap();
        assert!(high.statement_ids.contains(&statements[2].statement_id));
        assert!(!high.statement_ids.contains(&statements[1].statement_id));
    }

    #[test]
    fn stem_strips_common_suffixes() {
        assert_eq!(stem("rewards"), "reward");
        assert_eq!(stem("training"), "train");
        assert_eq!(stem("bus"), "bus");
    }
}
