//! Credit store — the only place user balances and plan flags are mutated.
//!
//! Callers never get a raw read/write pair on `coin` or `free_plan_granted`.
//! Each mutation is a single conditional step inside the backend, so two
//! concurrent requests for the same user serialize on the record and the
//! guard is re-checked by whichever runs second.
//!
//! `AppState` holds an `Arc<dyn CreditStore>`, picked at startup from config.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::credit::CreditUsageRow;
use crate::models::user::User;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row came back in a state the schema forbids (e.g. negative balance).
    #[error("inconsistent ledger state: {0}")]
    Corrupt(String),
}

/// Result of an atomic compare-and-decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeductOutcome {
    Deducted { remaining: i64 },
    /// Balance untouched; `remaining` is the balance observed by the failed guard.
    Insufficient { remaining: i64 },
    UnknownUser,
}

/// Result of the one-shot free plan transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    Granted {
        remaining: i64,
        plan_status: String,
    },
    AlreadyGranted,
    UnknownUser,
}

/// Plan label written by a successful free plan claim when the user had none.
pub const FREE_PLAN_STATUS: &str = "free";

#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Subtracts `amount` from the user's balance if and only if the balance covers it.
    /// `amount` must already be validated as strictly positive.
    async fn try_deduct(
        &self,
        user_id: i64,
        amount: i64,
        feature: &str,
    ) -> Result<DeductOutcome, StoreError>;

    /// Flips `free_plan_granted` from false to true and adds `bonus` credits.
    /// At most one call per user ever observes `Granted`.
    async fn try_grant_once(&self, user_id: i64, bonus: i64) -> Result<GrantOutcome, StoreError>;

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError>;

    /// Most recent usage rows first.
    async fn usage_history(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<CreditUsageRow>, StoreError>;

    /// Short name for logs and the health endpoint.
    fn backend_name(&self) -> &'static str;
}
