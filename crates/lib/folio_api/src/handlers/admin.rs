//! Admin-only request handlers.

use axum::{Extension, Json};
use axum::extract::{Path, State};
use tracing::info;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthenticatedUser;
use crate::models::RevokeSessionsResponse;
use crate::services::auth;

/// `POST /admin/users/{id}/revoke-sessions` — end every session of a user.
pub async fn revoke_user_sessions_handler(
    State(state): State<AppState>,
    Extension(admin): Extension<AuthenticatedUser>,
    Path(user_id): Path<String>,
) -> AppResult<Json<RevokeSessionsResponse>> {
    if state.session.find_user(&user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("user {user_id}")));
    }
    info!(admin_id = %admin.0.sub, user_id = %user_id, "admin revoking user sessions");
    let resp = auth::revoke_all(&state.session, &user_id).await?;
    Ok(Json(resp))
}
