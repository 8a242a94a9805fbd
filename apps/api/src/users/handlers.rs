use axum::{extract::State, Json};

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::state::AppState;
use crate::users::resolver::{resolve_user_state, UserState};

/// GET /api/user/state
pub async fn handle_user_state(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<UserState>, AppError> {
    let user = state
        .store
        .get_user(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", auth.user_id)))?;

    Ok(Json(resolve_user_state(&user)))
}
