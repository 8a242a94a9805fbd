use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AuthUser;
use crate::credits::store::DeductOutcome;
use crate::credits::validation::ConsumeRequest;
use crate::errors::AppError;
use crate::models::credit::CreditUsageRow;
use crate::state::AppState;

const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeResponse {
    pub ok: bool,
    pub remaining_credits: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub remaining_credits: i64,
    pub plan_status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// POST /api/credits/consume
pub async fn handle_consume(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<ConsumeRequest>, JsonRejection>,
) -> Result<Json<ConsumeResponse>, AppError> {
    let Json(req) = payload.map_err(|e| AppError::Validation(e.body_text()))?;
    let req = req.validate()?;

    match state
        .store
        .try_deduct(auth.user_id, req.amount, &req.feature)
        .await?
    {
        DeductOutcome::Deducted { remaining } => {
            info!(
                "User {} consumed {} credits for '{}'",
                auth.user_id, req.amount, req.feature
            );
            Ok(Json(ConsumeResponse {
                ok: true,
                remaining_credits: remaining,
            }))
        }
        DeductOutcome::Insufficient { remaining } => Err(AppError::InsufficientCredits {
            required: req.amount,
            remaining,
        }),
        DeductOutcome::UnknownUser => {
            Err(AppError::NotFound(format!("User {} not found", auth.user_id)))
        }
    }
}

/// GET /api/credits
pub async fn handle_balance(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, AppError> {
    let user = state
        .store
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id)))?;

    Ok(Json(BalanceResponse {
        remaining_credits: user.coin,
        plan_status: user.plan_status,
    }))
}

/// GET /api/credits/history
pub async fn handle_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<CreditUsageRow>>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {MAX_HISTORY_LIMIT}"
        )));
    }

    let history = state.store.usage_history(auth.user_id, limit).await?;
    Ok(Json(history))
}
