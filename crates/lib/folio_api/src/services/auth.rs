//! Authentication service — session flows delegating to `folio_core::auth`,
//! shaped into API responses.

use std::sync::Arc;

use folio_core::auth::jwt::TokenCodec;
use folio_core::auth::notify::{LogNotifier, ResetNotifier, WebhookNotifier};
use folio_core::auth::session::{SessionService, TokenPair};
use folio_core::auth::store::{CredentialStore, RefreshTokenStore};
use folio_core::models::auth::TokenClaims;

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};
use crate::models::{
    AuthUser, Identity, LoginResponse, RevokeSessionsResponse, SessionResponse, SuccessResponse,
    TokenPairResponse, VerifyResetTokenResponse,
};

/// Wire up a session service from configuration and the given stores.
///
/// Reset links go to the webhook when `reset_webhook_url` is set and are
/// otherwise only logged.
pub fn build_session_service(
    config: &ApiConfig,
    credentials: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
) -> SessionService {
    let notifier: Arc<dyn ResetNotifier> = match &config.reset_webhook_url {
        Some(url) => Arc::new(WebhookNotifier::new(url.clone(), config.reset_url_base.clone())),
        None => Arc::new(LogNotifier::new(config.reset_url_base.clone())),
    };
    SessionService::new(
        credentials,
        refresh_tokens,
        notifier,
        TokenCodec::new(config.jwt_secret.as_bytes()),
        config.session.clone(),
    )
}

fn pair_response(session: &SessionService, pair: TokenPair) -> TokenPairResponse {
    TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: session.config().access_ttl.num_seconds(),
        token_type: "Bearer".to_string(),
    }
}

/// Authenticate with email + password.
pub async fn login(
    session: &SessionService,
    email: &str,
    password: &str,
) -> AppResult<LoginResponse> {
    let outcome = session.login(email, password).await?;
    Ok(LoginResponse {
        tokens: pair_response(session, outcome.tokens),
        user: AuthUser::from(outcome.user),
    })
}

/// Rotate a refresh token into a new pair.
pub async fn refresh(
    session: &SessionService,
    refresh_token: &str,
) -> AppResult<TokenPairResponse> {
    let pair = session.refresh(refresh_token).await?;
    Ok(pair_response(session, pair))
}

/// Logout — revoke a specific refresh token. Always succeeds for unknown tokens.
pub async fn logout(
    session: &SessionService,
    refresh_token: Option<&str>,
) -> AppResult<SuccessResponse> {
    if let Some(token) = refresh_token {
        session.logout(token).await?;
    }
    Ok(SuccessResponse { success: true })
}

/// Revoke every session of a user.
pub async fn revoke_all(
    session: &SessionService,
    user_id: &str,
) -> AppResult<RevokeSessionsResponse> {
    let revoked = session.revoke_all_for_user(user_id).await?;
    Ok(RevokeSessionsResponse {
        success: true,
        revoked,
    })
}

/// Start a password reset. The response never depends on whether the email exists.
pub async fn forgot_password(session: &SessionService, email: &str) -> SuccessResponse {
    session.request_password_reset(email).await;
    SuccessResponse { success: true }
}

pub async fn verify_reset_token(
    session: &SessionService,
    token: &str,
) -> AppResult<VerifyResetTokenResponse> {
    let valid = session.verify_reset_token(token).await?;
    Ok(VerifyResetTokenResponse { valid })
}

pub async fn reset_password(
    session: &SessionService,
    token: &str,
    password: &str,
) -> AppResult<SuccessResponse> {
    session.reset_password(token, password).await?;
    Ok(SuccessResponse { success: true })
}

/// Public record of the authenticated caller.
pub async fn current_user(session: &SessionService, claims: &TokenClaims) -> AppResult<AuthUser> {
    session
        .find_user(&claims.sub)
        .await?
        .map(AuthUser::from)
        .ok_or_else(|| AppError::NotFound("user not found".into()))
}

/// Describe an optional identity.
pub fn session_status(claims: Option<&TokenClaims>) -> SessionResponse {
    SessionResponse {
        authenticated: claims.is_some(),
        user: claims.map(Identity::from),
    }
}
