//! Project aggregate
//!
//! A project owns the focus question and tracks its workflow phase.
//! Statement and participant counts are derived from the stores on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::phase::Phase;
use crate::{Error, Result};

/// Lifecycle status, independent of the workflow phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Active,
    Completed,
    Paused,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Paused => "paused",
        }
    }
}

impl FromStr for ProjectStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "completed" => Ok(ProjectStatus::Completed),
            "paused" => Ok(ProjectStatus::Paused),
            other => Err(Error::validation("status", format!("unknown status '{}'", other))),
        }
    }
}

/// Workshop project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub focus_question: String,
    pub status: ProjectStatus,
    pub phase: Phase,
    /// Distinct statement authors and raters
    pub participant_count: u32,
    /// Statements currently attached to the project
    pub statement_count: u32,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }

    /// Fail with PermissionDenied unless `user_id` owns the project
    pub fn ensure_owner(&self, user_id: Uuid) -> Result<()> {
        if self.is_owned_by(user_id) {
            Ok(())
        } else {
            Err(Error::PermissionDenied(format!(
                "only the project owner may modify project {}",
                self.id
            )))
        }
    }

    /// Fail with InvalidPhase unless the project is in one of `allowed`
    pub fn ensure_phase(&self, allowed: &[Phase], operation: &str) -> Result<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            let names: Vec<&str> = allowed.iter().map(|p| p.as_str()).collect();
            Err(Error::InvalidPhase(format!(
                "{} requires phase {} (project is in {})",
                operation,
                names.join(" or "),
                self.phase
            )))
        }
    }
}

/// Request to create a project
#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub focus_question: String,
}

impl NewProject {
    /// Trim fields and reject empty title or focus question
    pub fn validate(self) -> Result<NewProject> {
        Ok(NewProject {
            title: required("title", &self.title)?,
            description: optional(self.description),
            focus_question: required("focus_question", &self.focus_question)?,
        })
    }
}

/// Partial update of project attributes
///
/// Phase is deliberately absent: it only changes through the workflow service.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub focus_question: Option<String>,
    pub status: Option<ProjectStatus>,
}

impl ProjectUpdate {
    pub fn validate(self) -> Result<ProjectUpdate> {
        Ok(ProjectUpdate {
            title: self.title.map(|t| required("title", &t)).transpose()?,
            description: self.description.map(|d| d.trim().to_string()),
            focus_question: self
                .focus_question
                .map(|q| required("focus_question", &q))
                .transpose()?,
            status: self.status,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.focus_question.is_none()
            && self.status.is_none()
    }

    /// Apply to a loaded project, bumping `updated_at`
    pub fn apply_to(self, project: &mut Project) {
        if let Some(title) = self.title {
            project.title = title;
        }
        if let Some(description) = self.description {
            project.description = if description.is_empty() { None } else { Some(description) };
        }
        if let Some(question) = self.focus_question {
            project.focus_question = question;
        }
        if let Some(status) = self.status {
            project.status = status;
        }
        project.updated_at = Utc::now();
    }
}

fn required(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(field, "must not be empty"));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
