//! Rating store types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// The two fixed rating dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RatingDimension {
    Importance,
    Feasibility,
}

impl RatingDimension {
    pub const ALL: [RatingDimension; 2] = [RatingDimension::Importance, RatingDimension::Feasibility];

    pub fn as_str(self) -> &'static str {
        match self {
            RatingDimension::Importance => "importance",
            RatingDimension::Feasibility => "feasibility",
        }
    }
}

impl FromStr for RatingDimension {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "importance" => Ok(RatingDimension::Importance),
            "feasibility" => Ok(RatingDimension::Feasibility),
            other => Err(Error::validation("dimension", format!("unknown dimension '{}'", other))),
        }
    }
}

/// Integer score on the 1-5 scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct RatingValue(u8);

impl RatingValue {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Result<Self> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(Error::validation(
                "value",
                format!("rating must be between {} and {}, got {}", Self::MIN, Self::MAX, value),
            ))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for RatingValue {
    type Error = Error;

    fn try_from(value: i64) -> Result<Self> {
        RatingValue::new(value)
    }
}

impl From<RatingValue> for i64 {
    fn from(value: RatingValue) -> Self {
        value.0 as i64
    }
}

/// One participant's score for one statement on one dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rating {
    pub statement_id: Uuid,
    pub rater_id: Uuid,
    pub dimension: RatingDimension,
    pub value: RatingValue,
    pub updated_at: DateTime<Utc>,
}
