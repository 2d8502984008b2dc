//! Accounts, plan features and credit top-ups

use serde::{Deserialize, Serialize};
use tracing::info;

use gcm_common::credits::{CreditBalance, CreditPackage};
use gcm_common::models::{Account, PlanFeatures};
use gcm_common::Result;

use crate::actor::Actor;
use crate::db;
use crate::AppState;

/// GET /api/account body
#[derive(Debug, Clone, Serialize)]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    pub features: PlanFeatures,
}

impl From<Account> for AccountView {
    fn from(account: Account) -> Self {
        let features = account.features();
        Self { account, features }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopUpRequest {
    pub package: CreditPackage,
}

/// One entry of GET /api/credit-packages
#[derive(Debug, Clone, Serialize)]
pub struct PackageInfo {
    pub package: CreditPackage,
    pub credits: u32,
    pub price_cents: u32,
}

pub async fn get(state: &AppState, actor: &Actor) -> Result<AccountView> {
    let mut conn = state.db.acquire().await?;
    let account = db::accounts::get_or_create(&mut conn, actor.user_id).await?;
    Ok(account.into())
}

/// Apply a purchased package; payment capture happens outside this service
pub async fn top_up(state: &AppState, actor: &Actor, request: TopUpRequest) -> Result<AccountView> {
    let mut tx = state.db.begin().await?;
    let account = db::accounts::top_up(&mut tx, actor.user_id, request.package.credits()).await?;
    tx.commit().await?;

    let balance: CreditBalance = account.credits;
    info!(
        user = %actor.user_id,
        package = ?request.package,
        credits_added = request.package.credits(),
        balance = %balance,
        "Credits topped up"
    );
    Ok(account.into())
}

pub fn packages() -> Vec<PackageInfo> {
    CreditPackage::ALL
        .iter()
        .map(|&package| PackageInfo {
            package,
            credits: package.credits(),
            price_cents: package.price_cents(),
        })
        .collect()
}
