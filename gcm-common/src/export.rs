//! On-demand project export (CSV, JSON, plain-text report)
//!
//! Exports are built from borrowed snapshots and never modify the source
//! collections.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;
use uuid::Uuid;

use crate::analysis::{priority_matrix, summarize_ratings, PriorityMatrix, Quadrant};
use crate::models::{Cluster, ClusterMethod, Project, Rating, Statement, StatementSource};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Text,
}

impl ExportFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Json => "application/json",
            ExportFormat::Text => "text/plain; charset=utf-8",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
            ExportFormat::Text => "txt",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" => Ok(ExportFormat::Text),
            other => Err(Error::validation("format", format!("unsupported export format '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedStatement {
    pub id: Uuid,
    pub text: String,
    /// Name of the cluster holding the statement in the active pass
    pub cluster: Option<String>,
    pub source: StatementSource,
    pub author: String,
    pub confidence: Option<f64>,
    pub mean_importance: Option<f64>,
    pub mean_feasibility: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedCluster {
    pub id: Uuid,
    pub name: String,
    pub method: ClusterMethod,
    pub confidence: Option<f64>,
    pub statement_ids: Vec<Uuid>,
}

/// Self-contained project snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectExport {
    pub project: Project,
    pub exported_at: DateTime<Utc>,
    pub statements: Vec<ExportedStatement>,
    pub clusters: Vec<ExportedCluster>,
    pub priority_matrix: PriorityMatrix,
}

impl ProjectExport {
    pub fn build(project: &Project, statements: &[Statement], clusters: &[Cluster], ratings: &[Rating]) -> Self {
        let means = summarize_ratings(ratings);
        let cluster_by_statement: HashMap<Uuid, &str> = clusters
            .iter()
            .flat_map(|c| c.statement_ids.iter().map(move |id| (*id, c.name.as_str())))
            .collect();

        let exported = statements
            .iter()
            .map(|s| {
                let m = means.get(&s.id).copied().unwrap_or_default();
                ExportedStatement {
                    id: s.id,
                    text: s.text.clone(),
                    cluster: cluster_by_statement.get(&s.id).map(|n| n.to_string()),
                    source: s.source,
                    author: s.author_name.clone(),
                    confidence: s.confidence,
                    mean_importance: m.mean_importance,
                    mean_feasibility: m.mean_feasibility,
                }
            })
            .collect();

        Self {
            project: project.clone(),
            exported_at: Utc::now(),
            statements: exported,
            clusters: clusters
                .iter()
                .map(|c| ExportedCluster {
                    id: c.id,
                    name: c.name.clone(),
                    method: c.method,
                    confidence: c.confidence,
                    statement_ids: c.statement_ids.clone(),
                })
                .collect(),
            priority_matrix: priority_matrix(clusters, &means),
        }
    }

    pub fn render(&self, format: ExportFormat) -> Result<String> {
        match format {
            ExportFormat::Csv => Ok(self.to_csv()),
            ExportFormat::Json => self.to_json(),
            ExportFormat::Text => Ok(self.to_report()),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_csv(&self) -> String {
        let mut out = String::from(
            "id,text,cluster,source,author,confidence,mean_importance,mean_feasibility\n",
        );
        for s in &self.statements {
            let fields = [
                s.id.to_string(),
                s.text.clone(),
                s.cluster.clone().unwrap_or_default(),
                s.source.as_str().to_string(),
                s.author.clone(),
                fmt_opt(s.confidence),
                fmt_opt(s.mean_importance),
                fmt_opt(s.mean_feasibility),
            ];
            let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }

    pub fn to_report(&self) -> String {
        let p = &self.project;
        let mut out = String::new();

        // write! to a String cannot fail
        let _ = writeln!(out, "{}", p.title);
        let _ = writeln!(out, "{}", "=".repeat(p.title.chars().count().max(1)));
        let _ = writeln!(out, "Focus question: {}", p.focus_question);
        if let Some(description) = &p.description {
            let _ = writeln!(out, "Description: {}", description);
        }
        let _ = writeln!(out, "Phase: {}    Status: {}", p.phase, p.status.as_str());
        let _ = writeln!(
            out,
            "Statements: {}    Participants: {}    Clusters: {}",
            self.statements.len(),
            p.participant_count,
            self.clusters.len()
        );
        let _ = writeln!(out, "Exported: {}", self.exported_at.to_rfc3339());

        let text_by_id: HashMap<Uuid, &ExportedStatement> =
            self.statements.iter().map(|s| (s.id, s)).collect();

        let _ = writeln!(out, "\nClusters\n--------");
        if self.clusters.is_empty() {
            let _ = writeln!(out, "(none)");
        }
        for cluster in &self.clusters {
            let _ = writeln!(out, "{} ({} statements)", cluster.name, cluster.statement_ids.len());
            for id in &cluster.statement_ids {
                if let Some(s) = text_by_id.get(id) {
                    let _ = writeln!(
                        out,
                        "  - {} [importance {}, feasibility {}]",
                        s.text,
                        fmt_mean(s.mean_importance),
                        fmt_mean(s.mean_feasibility)
                    );
                }
            }
        }

        let unclustered: Vec<&ExportedStatement> =
            self.statements.iter().filter(|s| s.cluster.is_none()).collect();
        if !unclustered.is_empty() {
            let _ = writeln!(out, "\nUnclustered statements\n----------------------");
            for s in unclustered {
                let _ = writeln!(out, "  - {}", s.text);
            }
        }

        let _ = writeln!(
            out,
            "\nPriority matrix (threshold {:.1})\n-------------------------------",
            self.priority_matrix.threshold
        );
        for quadrant in Quadrant::ALL {
            let entries = self.priority_matrix.quadrant(quadrant);
            let names: Vec<String> = entries
                .iter()
                .map(|c| {
                    format!(
                        "{} ({}/{})",
                        c.name,
                        fmt_mean(c.mean_importance),
                        fmt_mean(c.mean_feasibility)
                    )
                })
                .collect();
            let _ = writeln!(
                out,
                "{}: {}",
                quadrant.label(),
                if names.is_empty() { "-".to_string() } else { names.join(", ") }
            );
        }
        out
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

fn fmt_mean(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "n/a".to_string())
}

/// Quote a CSV field when it contains a delimiter, quote, or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
