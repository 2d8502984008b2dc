//! Workshop phase enumeration
//!
//! A project moves through four ordered phases:
//! BRAINSTORMING → STRUCTURING → RATING → ANALYSIS

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Workflow phase of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Participants contribute statements
    Brainstorming,
    /// Statements are grouped into clusters
    Structuring,
    /// Statements are rated on importance and feasibility
    Rating,
    /// Read-only results (terminal)
    Analysis,
}

impl Phase {
    /// All phases in workflow order
    pub const fn all() -> [Phase; 4] {
        [
            Phase::Brainstorming,
            Phase::Structuring,
            Phase::Rating,
            Phase::Analysis,
        ]
    }

    /// Position in the workflow (0-based)
    pub fn ordinal(self) -> u8 {
        match self {
            Phase::Brainstorming => 0,
            Phase::Structuring => 1,
            Phase::Rating => 2,
            Phase::Analysis => 3,
        }
    }

    /// The phase that follows this one, None for ANALYSIS
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Brainstorming => Some(Phase::Structuring),
            Phase::Structuring => Some(Phase::Rating),
            Phase::Rating => Some(Phase::Analysis),
            Phase::Analysis => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Stable storage/wire name
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Brainstorming => "brainstorming",
            Phase::Structuring => "structuring",
            Phase::Rating => "rating",
            Phase::Analysis => "analysis",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::all()
            .into_iter()
            .find(|phase| phase.as_str() == s)
            .ok_or_else(|| Error::validation("phase", format!("unknown phase '{}'", s)))
    }
}
