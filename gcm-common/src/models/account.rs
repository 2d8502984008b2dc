//! Account and plan tier types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::credits::CreditBalance;
use crate::{Error, Result};

/// Subscription tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Starter,
    Professional,
    Enterprise,
}

/// Features unlocked by a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanFeatures {
    pub ai_statements: bool,
    pub ai_clustering: bool,
    pub export: bool,
    /// None means unlimited
    pub max_projects: Option<u32>,
}

impl PlanTier {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Starter => "starter",
            PlanTier::Professional => "professional",
            PlanTier::Enterprise => "enterprise",
        }
    }

    /// Credits granted when the plan is applied
    pub fn credit_allotment(self) -> CreditBalance {
        match self {
            PlanTier::Starter => CreditBalance::Finite(10),
            PlanTier::Professional => CreditBalance::Finite(50),
            PlanTier::Enterprise => CreditBalance::Unlimited,
        }
    }

    pub fn features(self) -> PlanFeatures {
        match self {
            PlanTier::Starter => PlanFeatures {
                ai_statements: true,
                ai_clustering: false,
                export: true,
                max_projects: Some(3),
            },
            PlanTier::Professional => PlanFeatures {
                ai_statements: true,
                ai_clustering: true,
                export: true,
                max_projects: Some(25),
            },
            PlanTier::Enterprise => PlanFeatures {
                ai_statements: true,
                ai_clustering: true,
                export: true,
                max_projects: None,
            },
        }
    }
}

impl FromStr for PlanTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "starter" => Ok(PlanTier::Starter),
            "professional" => Ok(PlanTier::Professional),
            "enterprise" => Ok(PlanTier::Enterprise),
            other => Err(Error::validation("plan", format!("unknown plan '{}'", other))),
        }
    }
}

/// Per-user account holding the plan and AI credit balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub user_id: Uuid,
    pub plan: PlanTier,
    pub credits: CreditBalance,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// New account on the starter plan
    pub fn starter(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            plan: PlanTier::Starter,
            credits: PlanTier::Starter.credit_allotment(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn features(&self) -> PlanFeatures {
        self.plan.features()
    }
}
