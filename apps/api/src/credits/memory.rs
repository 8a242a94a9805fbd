use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::credits::store::{CreditStore, DeductOutcome, GrantOutcome, StoreError, FREE_PLAN_STATUS};
use crate::models::credit::CreditUsageRow;
use crate::models::user::User;

struct Account {
    user: User,
    usage: Vec<CreditUsageRow>,
}

/// In-process ledger for development and tests.
///
/// `DashMap::get_mut` holds the shard's write lock for the whole check-and-update,
/// which gives the same per-user exclusion the postgres row lock gives.
/// Only correct within a single process.
#[derive(Clone, Default)]
pub struct MemoryCreditStore {
    accounts: Arc<DashMap<i64, Account>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a user with the given balance and returns it.
    pub fn insert_user(&self, email: &str, coin: i64) -> User {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let now = Utc::now();
        let user = User {
            id,
            email: email.to_string(),
            coin,
            plan_status: None,
            free_plan_granted: false,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        self.accounts.insert(
            id,
            Account {
                user: user.clone(),
                usage: Vec::new(),
            },
        );
        info!("Seeded in-memory user {id} <{email}> with {coin} credits");
        user
    }
}

#[async_trait]
impl CreditStore for MemoryCreditStore {
    async fn try_deduct(
        &self,
        user_id: i64,
        amount: i64,
        feature: &str,
    ) -> Result<DeductOutcome, StoreError> {
        let Some(mut account) = self.accounts.get_mut(&user_id) else {
            return Ok(DeductOutcome::UnknownUser);
        };

        let balance = account.user.coin;
        if amount > balance {
            return Ok(DeductOutcome::Insufficient { remaining: balance });
        }

        let remaining = balance - amount;
        let now = Utc::now();
        account.user.coin = remaining;
        account.user.updated_at = now;
        account.usage.push(CreditUsageRow {
            id: Uuid::new_v4(),
            user_id,
            amount,
            feature: feature.to_string(),
            balance_after: remaining,
            created_at: now,
        });

        debug!("Deducted {amount} credits from user {user_id} for '{feature}', {remaining} left");
        Ok(DeductOutcome::Deducted { remaining })
    }

    async fn try_grant_once(&self, user_id: i64, bonus: i64) -> Result<GrantOutcome, StoreError> {
        let Some(mut account) = self.accounts.get_mut(&user_id) else {
            return Ok(GrantOutcome::UnknownUser);
        };

        if account.user.free_plan_granted {
            return Ok(GrantOutcome::AlreadyGranted);
        }

        let user = &mut account.user;
        let coin = user
            .coin
            .checked_add(bonus)
            .ok_or_else(|| StoreError::Corrupt(format!("user {user_id} balance overflow")))?;
        user.free_plan_granted = true;
        user.coin = coin;
        let plan_status = user
            .plan_status
            .get_or_insert_with(|| FREE_PLAN_STATUS.to_string())
            .clone();
        user.updated_at = Utc::now();

        info!("Granted free plan to user {user_id} (+{bonus} credits)");
        Ok(GrantOutcome::Granted {
            remaining: user.coin,
            plan_status,
        })
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.accounts.get(&user_id).map(|a| a.user.clone()))
    }

    async fn usage_history(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<CreditUsageRow>, StoreError> {
        let limit = usize::try_from(limit).unwrap_or(0);
        Ok(self
            .accounts
            .get(&user_id)
            .map(|a| a.usage.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
