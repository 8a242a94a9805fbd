use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::user::User;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlanTier {
    None,
    Free,
    Paid,
}

impl PlanTier {
    /// Unrecognised labels resolve to `None` so a bad row never unlocks anything.
    pub fn from_status(status: Option<&str>) -> Self {
        match status.map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "paid" => PlanTier::Paid,
            Some(s) if s == "free" => PlanTier::Free,
            _ => PlanTier::None,
        }
    }
}

/// What the front end needs to decide which screens and actions to offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserState {
    pub user_id: i64,
    pub email: String,
    pub coin: i64,
    pub plan_status: Option<String>,
    pub plan: PlanTier,
    pub is_verified: bool,
    pub can_claim_free_plan: bool,
    pub created_at: DateTime<Utc>,
}

pub fn resolve_user_state(user: &User) -> UserState {
    UserState {
        user_id: user.id,
        email: user.email.clone(),
        coin: user.coin,
        plan_status: user.plan_status.clone(),
        plan: PlanTier::from_status(user.plan_status.as_deref()),
        is_verified: user.is_verified,
        can_claim_free_plan: !user.free_plan_granted,
        created_at: user.created_at,
    }
}
