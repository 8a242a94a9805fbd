use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::credits::store::{CreditStore, DeductOutcome, GrantOutcome, StoreError, FREE_PLAN_STATUS};
use crate::models::credit::CreditUsageRow;
use crate::models::user::User;

/// Postgres-backed ledger.
///
/// Both mutations are a single `UPDATE ... WHERE <guard> RETURNING`. Under READ COMMITTED
/// a concurrent writer blocks on the row lock and re-evaluates the guard against the
/// committed row, so the check and the write cannot interleave.
#[derive(Clone)]
pub struct PgCreditStore {
    pool: PgPool,
}

impl PgCreditStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreditStore for PgCreditStore {
    async fn try_deduct(
        &self,
        user_id: i64,
        amount: i64,
        feature: &str,
    ) -> Result<DeductOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET coin = coin - $2, updated_at = NOW()
            WHERE id = $1 AND coin >= $2
            RETURNING coin
            "#,
        )
        .bind(user_id)
        .bind(amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(remaining) = remaining else {
            // Guard failed: either the user is missing or the balance is short.
            let current: Option<i64> = sqlx::query_scalar("SELECT coin FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;
            return Ok(match current {
                Some(coin) => DeductOutcome::Insufficient { remaining: coin },
                None => DeductOutcome::UnknownUser,
            });
        };

        sqlx::query(
            r#"
            INSERT INTO credit_usage (id, user_id, amount, feature, balance_after)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(amount)
        .bind(feature)
        .bind(remaining)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!("Deducted {amount} credits from user {user_id} for '{feature}', {remaining} left");
        Ok(DeductOutcome::Deducted { remaining })
    }

    async fn try_grant_once(&self, user_id: i64, bonus: i64) -> Result<GrantOutcome, StoreError> {
        let granted: Option<(i64, Option<String>)> = sqlx::query_as(
            r#"
            UPDATE users
            SET free_plan_granted = TRUE,
                plan_status = COALESCE(plan_status, $3),
                coin = coin + $2,
                updated_at = NOW()
            WHERE id = $1 AND free_plan_granted = FALSE
            RETURNING coin, plan_status
            "#,
        )
        .bind(user_id)
        .bind(bonus)
        .bind(FREE_PLAN_STATUS)
        .fetch_optional(&self.pool)
        .await?;

        if let Some((remaining, plan_status)) = granted {
            info!("Granted free plan to user {user_id} (+{bonus} credits)");
            return Ok(GrantOutcome::Granted {
                remaining,
                plan_status: plan_status.unwrap_or_else(|| FREE_PLAN_STATUS.to_string()),
            });
        }

        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match exists {
            Some(_) => GrantOutcome::AlreadyGranted,
            None => GrantOutcome::UnknownUser,
        })
    }

    async fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, coin, plan_status, free_plan_granted, is_verified,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn usage_history(
        &self,
        user_id: i64,
        limit: i64,
    ) -> Result<Vec<CreditUsageRow>, StoreError> {
        Ok(sqlx::query_as::<_, CreditUsageRow>(
            r#"
            SELECT id, user_id, amount, feature, balance_after, created_at
            FROM credit_usage
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
