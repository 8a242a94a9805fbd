use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Bookkeeping row written alongside every successful deduction.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CreditUsageRow {
    pub id: Uuid,
    pub user_id: i64,
    pub amount: i64,
    pub feature: String,
    pub balance_after: i64,
    pub created_at: DateTime<Utc>,
}
