//! Rating aggregation and the priority matrix
//!
//! Clusters are placed in a 2×2 matrix by mean importance and mean
//! feasibility against a fixed, inclusive threshold of 4.0.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Cluster, Rating, RatingDimension};

/// Boundary between "low" and "high" on both axes (inclusive)
pub const PRIORITY_THRESHOLD: f64 = 4.0;

/// Per-statement aggregate over all raters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementMeans {
    pub mean_importance: Option<f64>,
    pub mean_feasibility: Option<f64>,
    /// Distinct raters who scored the statement on any dimension
    pub rater_count: u32,
}

impl StatementMeans {
    /// Both means, when the statement has been rated on both dimensions
    pub fn pair(&self) -> Option<(f64, f64)> {
        Some((self.mean_importance?, self.mean_feasibility?))
    }
}

/// Mean importance and feasibility per statement
pub fn summarize_ratings(ratings: &[Rating]) -> HashMap<Uuid, StatementMeans> {
    #[derive(Default)]
    struct Acc {
        importance: (u32, u32),
        feasibility: (u32, u32),
        raters: Vec<Uuid>,
    }

    let mut acc: HashMap<Uuid, Acc> = HashMap::new();
    for rating in ratings {
        let entry = acc.entry(rating.statement_id).or_default();
        let slot = match rating.dimension {
            RatingDimension::Importance => &mut entry.importance,
            RatingDimension::Feasibility => &mut entry.feasibility,
        };
        slot.0 += rating.value.get() as u32;
        slot.1 += 1;
        if !entry.raters.contains(&rating.rater_id) {
            entry.raters.push(rating.rater_id);
        }
    }

    let mean = |(sum, n): (u32, u32)| (n > 0).then(|| sum as f64 / n as f64);

    acc.into_iter()
        .map(|(id, a)| {
            (
                id,
                StatementMeans {
                    mean_importance: mean(a.importance),
                    mean_feasibility: mean(a.feasibility),
                    rater_count: a.raters.len() as u32,
                },
            )
        })
        .collect()
}

/// Priority matrix quadrant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quadrant {
    /// High importance, high feasibility
    QuickWins,
    /// High importance, low feasibility
    StrategicProjects,
    /// Low importance, high feasibility
    FillInProjects,
    /// Low importance, low feasibility
    Questionable,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::QuickWins,
        Quadrant::StrategicProjects,
        Quadrant::FillInProjects,
        Quadrant::Questionable,
    ];

    pub fn classify(mean_importance: f64, mean_feasibility: f64) -> Quadrant {
        let important = mean_importance >= PRIORITY_THRESHOLD;
        let feasible = mean_feasibility >= PRIORITY_THRESHOLD;
        match (important, feasible) {
            (true, true) => Quadrant::QuickWins,
            (true, false) => Quadrant::StrategicProjects,
            (false, true) => Quadrant::FillInProjects,
            (false, false) => Quadrant::Questionable,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quadrant::QuickWins => "Quick Wins",
            Quadrant::StrategicProjects => "Strategic Projects",
            Quadrant::FillInProjects => "Fill-in Projects",
            Quadrant::Questionable => "Questionable",
        }
    }
}

/// A cluster's position in the matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterScore {
    pub cluster_id: Uuid,
    pub name: String,
    pub statement_count: u32,
    pub mean_importance: Option<f64>,
    pub mean_feasibility: Option<f64>,
    /// None when no member statement has ratings on both dimensions
    pub quadrant: Option<Quadrant>,
}

/// Clusters grouped by quadrant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityMatrix {
    pub threshold: f64,
    pub quick_wins: Vec<ClusterScore>,
    pub strategic_projects: Vec<ClusterScore>,
    pub fill_in_projects: Vec<ClusterScore>,
    pub questionable: Vec<ClusterScore>,
    /// Clusters without enough ratings to classify
    pub unrated: Vec<ClusterScore>,
}

impl PriorityMatrix {
    pub fn quadrant(&self, quadrant: Quadrant) -> &[ClusterScore] {
        match quadrant {
            Quadrant::QuickWins => &self.quick_wins,
            Quadrant::StrategicProjects => &self.strategic_projects,
            Quadrant::FillInProjects => &self.fill_in_projects,
            Quadrant::Questionable => &self.questionable,
        }
    }
}

/// Score one cluster from its members' statement means
///
/// The cluster mean on each axis is the mean of the member statements that
/// are rated on both axes.
pub fn score_cluster(cluster: &Cluster, means: &HashMap<Uuid, StatementMeans>) -> ClusterScore {
    let pairs: Vec<(f64, f64)> = cluster
        .statement_ids
        .iter()
        .filter_map(|id| means.get(id).and_then(StatementMeans::pair))
        .collect();

    let (mean_importance, mean_feasibility) = if pairs.is_empty() {
        (None, None)
    } else {
        let n = pairs.len() as f64;
        (
            Some(pairs.iter().map(|p| p.0).sum::<f64>() / n),
            Some(pairs.iter().map(|p| p.1).sum::<f64>() / n),
        )
    };

    ClusterScore {
        cluster_id: cluster.id,
        name: cluster.name.clone(),
        statement_count: cluster.statement_ids.len() as u32,
        mean_importance,
        mean_feasibility,
        quadrant: mean_importance
            .zip(mean_feasibility)
            .map(|(imp, feas)| Quadrant::classify(imp, feas)),
    }
}

/// Build the priority matrix for a set of clusters
pub fn priority_matrix(clusters: &[Cluster], means: &HashMap<Uuid, StatementMeans>) -> PriorityMatrix {
    let mut matrix = PriorityMatrix {
        threshold: PRIORITY_THRESHOLD,
        ..Default::default()
    };

    for cluster in clusters {
        let score = score_cluster(cluster, means);
        match score.quadrant {
            Some(Quadrant::QuickWins) => matrix.quick_wins.push(score),
            Some(Quadrant::StrategicProjects) => matrix.strategic_projects.push(score),
            Some(Quadrant::FillInProjects) => matrix.fill_in_projects.push(score),
            Some(Quadrant::Questionable) => matrix.questionable.push(score),
            None => matrix.unrated.push(score),
        }
    }

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClusterMethod, RatingValue};
    use chrono::Utc;

    fn rating(statement: Uuid, rater: Uuid, dimension: RatingDimension, value: i64) -> Rating {
        Rating {
            statement_id: statement,
            rater_id: rater,
            dimension,
            value: RatingValue::new(value).unwrap(),
            updated_at: Utc::now(),
        }
    }

    fn cluster_of(ids: Vec<Uuid>) -> Cluster {
        Cluster {
            id: Uuid::new_v4(),
            project_id: Uuid::nil(),
            pass_id: Uuid::nil(),
            name: "Group".to_string(),
            color: "#3B82F6".to_string(),
            statement_ids: ids,
            confidence: None,
            method: ClusterMethod::Manual,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn boundary_is_inclusive() {
        assert_eq!(Quadrant::classify(4.0, 4.0), Quadrant::QuickWins);
        assert_eq!(Quadrant::classify(4.0, 3.99), Quadrant::StrategicProjects);
        assert_eq!(Quadrant::classify(3.99, 4.0), Quadrant::FillInProjects);
        assert_eq!(Quadrant::classify(1.0, 1.0), Quadrant::Questionable);
    }

    #[test]
    fn summary_averages_across_raters() {
        let s = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let ratings = vec![
            rating(s, a, RatingDimension::Importance, 5),
            rating(s, b, RatingDimension::Importance, 2),
            rating(s, a, RatingDimension::Feasibility, 4),
        ];

        let means = summarize_ratings(&ratings);
        let m = means[&s];
        assert_eq!(m.mean_importance, Some(3.5));
        assert_eq!(m.mean_feasibility, Some(4.0));
        assert_eq!(m.rater_count, 2);
    }

    #[test]
    fn cluster_at_exact_threshold_is_quick_win() {
        let s = Uuid::new_v4();
        let rater = Uuid::new_v4();
        let means = summarize_ratings(&[
            rating(s, rater, RatingDimension::Importance, 4),
            rating(s, rater, RatingDimension::Feasibility, 4),
        ]);

        let matrix = priority_matrix(&[cluster_of(vec![s])], &means);
        assert_eq!(matrix.quick_wins.len(), 1);
        assert_eq!(matrix.quick_wins[0].mean_importance, Some(4.0));
    }

    #[test]
    fn unrated_clusters_are_not_classified() {
        let matrix = priority_matrix(&[cluster_of(vec![Uuid::new_v4()])], &HashMap::new());
        assert_eq!(matrix.unrated.len(), 1);
        for quadrant in Quadrant::ALL {
            assert!(matrix.quadrant(quadrant).is_empty());
        }
    }

    #[test]
    fn cluster_mean_skips_partially_rated_statements() {
        let (s1, s2) = (Uuid::new_v4(), Uuid::new_v4());
        let rater = Uuid::new_v4();
        let means = summarize_ratings(&[
            rating(s1, rater, RatingDimension::Importance, 2),
            rating(s1, rater, RatingDimension::Feasibility, 5),
            rating(s2, rater, RatingDimension::Importance, 5),
        ]);

        let score = score_cluster(&cluster_of(vec![s1, s2]), &means);
        assert_eq!(score.mean_importance, Some(2.0));
        assert_eq!(score.quadrant, Some(Quadrant::FillInProjects));
    }
}
