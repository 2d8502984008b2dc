//! Statement store types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// Display name recorded for AI-generated statements
pub const AI_AUTHOR_NAME: &str = "AI Assistant";

/// Where a statement came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementSource {
    Manual,
    AiGenerated,
}

impl StatementSource {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementSource::Manual => "manual",
            StatementSource::AiGenerated => "ai_generated",
        }
    }
}

impl FromStr for StatementSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "manual" => Ok(StatementSource::Manual),
            "ai_generated" => Ok(StatementSource::AiGenerated),
            other => Err(Error::validation("source", format!("unknown source '{}'", other))),
        }
    }
}

/// A brainstormed contribution to a project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statement {
    pub id: Uuid,
    pub project_id: Uuid,
    pub text: String,
    /// None for AI-generated statements
    pub author_id: Option<Uuid>,
    pub author_name: String,
    pub source: StatementSource,
    /// Only present for AI-generated statements (0.0-1.0)
    pub confidence: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Statement {
    /// Build a manual statement authored by `author_id`
    pub fn manual(project_id: Uuid, author_id: Uuid, author_name: &str, text: &str) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            project_id,
            text: validate_text(text)?,
            author_id: Some(author_id),
            author_name: author_name.to_string(),
            source: StatementSource::Manual,
            confidence: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Build an AI-generated statement from a draft
    pub fn ai_generated(project_id: Uuid, text: &str, confidence: f64) -> Result<Self> {
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            project_id,
            text: validate_text(text)?,
            author_id: None,
            author_name: AI_AUTHOR_NAME.to_string(),
            source: StatementSource::AiGenerated,
            confidence: Some(confidence.clamp(0.0, 1.0)),
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether `user_id` may edit or delete this statement
    ///
    /// Authors control their own statements; AI statements belong to the
    /// project owner.
    pub fn editable_by(&self, user_id: Uuid, project_owner: Uuid) -> bool {
        match self.author_id {
            Some(author) => author == user_id,
            None => project_owner == user_id,
        }
    }

    pub fn set_text(&mut self, text: &str) -> Result<()> {
        self.text = validate_text(text)?;
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Reject empty or whitespace-only statement text, returning it trimmed
pub fn validate_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("text", "statement text must not be empty"));
    }
    Ok(trimmed.to_string())
}
