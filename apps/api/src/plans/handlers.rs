use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use crate::auth::AuthUser;
use crate::credits::store::GrantOutcome;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FreePlanResponse {
    pub ok: bool,
    pub plan_status: String,
    pub remaining_credits: i64,
    pub granted_credits: i64,
}

/// POST /api/plan/free
///
/// Exactly one request per user ever gets a 200. Every later or concurrent duplicate
/// gets 409 `ALREADY_GRANTED`. The grant is never retried here.
pub async fn handle_claim_free_plan(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<FreePlanResponse>, AppError> {
    let bonus = state.config.free_plan_credits;

    match state.store.try_grant_once(auth.user_id, bonus).await? {
        GrantOutcome::Granted {
            remaining,
            plan_status,
        } => {
            info!("User {} claimed the free plan", auth.user_id);
            Ok(Json(FreePlanResponse {
                ok: true,
                plan_status,
                remaining_credits: remaining,
                granted_credits: bonus,
            }))
        }
        GrantOutcome::AlreadyGranted => Err(AppError::AlreadyGranted),
        GrantOutcome::UnknownUser => {
            Err(AppError::NotFound(format!("User {} not found", auth.user_id)))
        }
    }
}
