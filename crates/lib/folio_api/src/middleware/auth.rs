//! Authentication middleware — Bearer token extraction and access-token verification.
//!
//! Three variants:
//! - [`require_auth`]: missing/malformed header → `auth_required`, bad token → `token_invalid`.
//! - [`require_admin`] (via [`require_roles`]): role gate layered inside `require_auth`.
//! - [`optional_auth`]: attaches an identity when one verifies, never rejects.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use folio_core::auth::AuthError;
use folio_core::models::auth::{Role, TokenClaims};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Verified identity stored in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

/// Identity for routes where authentication is optional.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<TokenClaims>);

/// Extract the token from `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AppError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::AuthRequired("Missing authorization header".into()))?;

    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::AuthRequired("Invalid authorization scheme".into()))
}

/// Check an identity against a role allow-list.
pub fn check_role(identity: Option<&TokenClaims>, allowed: &[Role]) -> Result<(), AuthError> {
    match identity {
        None => Err(AuthError::AuthRequired),
        Some(claims) if allowed.contains(&claims.role) => Ok(()),
        Some(_) => Err(AuthError::Forbidden),
    }
}

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the JWT,
/// and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;
    let claims = state.session.verify_access_token(token)?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

/// Role gate over the identity attached by [`require_auth`].
pub async fn require_roles(
    allowed: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|user| &user.0);
    if let Err(e) = check_role(identity, allowed) {
        debug!(path = %request.uri().path(), "role gate rejected request: {e}");
        return Err(e.into());
    }
    Ok(next.run(request).await)
}

/// Admin-only gate.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    require_roles(&[Role::Admin], request, next).await
}

/// Axum middleware: attaches `MaybeUser`, treating any failure as anonymous.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let claims = bearer_token(request.headers())
        .ok()
        .and_then(|token| state.session.verify_access_token(token).ok());

    if let Some(claims) = &claims {
        request
            .extensions_mut()
            .insert(AuthenticatedUser(claims.clone()));
    }
    request.extensions_mut().insert(MaybeUser(claims));

    next.run(request).await
}
