//! Authentication request handlers.

use axum::extract::{Path, State};
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::{AuthenticatedUser, MaybeUser};
use crate::models::{
    AuthUser, ForgotPasswordRequest, LoginRequest, LoginResponse, LogoutRequest, RefreshRequest,
    ResetPasswordRequest, RevokeSessionsResponse, SessionResponse, SuccessResponse,
    TokenPairResponse, VerifyResetTokenResponse,
};
use crate::services::auth;

/// `POST /auth/login` — authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let resp = auth::login(&state.session, &body.email, &body.password).await?;
    Ok(Json(resp))
}

/// `POST /auth/refresh` — exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenPairResponse>> {
    let resp = auth::refresh(&state.session, &body.refresh_token).await?;
    Ok(Json(resp))
}

/// `POST /auth/logout` — revoke a refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let resp = auth::logout(&state.session, body.refresh_token.as_deref()).await?;
    Ok(Json(resp))
}

/// `POST /auth/logout-all` — revoke every session of the caller.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<RevokeSessionsResponse>> {
    let resp = auth::revoke_all(&state.session, &user.0.sub).await?;
    Ok(Json(resp))
}

/// `POST /auth/forgot-password` — always 200, whether or not the email exists.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Json<SuccessResponse> {
    Json(auth::forgot_password(&state.session, &body.email).await)
}

/// `POST /auth/reset-password` — set a new password with a reset token.
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let resp = auth::reset_password(&state.session, &body.token, &body.password).await?;
    Ok(Json(resp))
}

/// `GET /auth/verify-reset-token/{token}` — check a reset link without consuming it.
pub async fn verify_reset_token_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> AppResult<Json<VerifyResetTokenResponse>> {
    let resp = auth::verify_reset_token(&state.session, &token).await?;
    Ok(Json(resp))
}

/// `GET /auth/me` — the authenticated caller's profile.
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<AuthUser>> {
    let resp = auth::current_user(&state.session, &user.0).await?;
    Ok(Json(resp))
}

/// `GET /auth/session` — report whether the caller is authenticated.
pub async fn session_handler(Extension(user): Extension<MaybeUser>) -> Json<SessionResponse> {
    Json(auth::session_status(user.0.as_ref()))
}
