//! Bearer-token authentication.
//!
//! `require` rejects requests without a valid access token; `optional` only attaches
//! the identity when one is present and valid. Both insert an [`AuthenticatedUser`]
//! into the request extensions for the extractors in `crate::extractors`.
//!
//! With authentication disabled (no verifier) both are no-ops.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::{AuthenticatedUser, TokenVerifier};

pub const MSG_HEADER_REQUIRED: &str = "Authorization header required";
pub const MSG_BEARER_REQUIRED: &str = "Bearer token required";
pub const MSG_INVALID_TOKEN: &str = "Invalid or expired token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderRejection {
    Missing,
    NotBearer,
}

impl HeaderRejection {
    fn message(self) -> &'static str {
        match self {
            Self::Missing => MSG_HEADER_REQUIRED,
            Self::NotBearer => MSG_BEARER_REQUIRED,
        }
    }
}

/// `Authorization: Bearer <token>`, exactly two space-separated parts.
fn bearer_token(headers: &HeaderMap) -> Result<&str, HeaderRejection> {
    let value = match headers.get(header::AUTHORIZATION) {
        None => return Err(HeaderRejection::Missing),
        Some(v) if v.is_empty() => return Err(HeaderRejection::Missing),
        Some(v) => v.to_str().map_err(|_| HeaderRejection::NotBearer)?,
    };

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) => Ok(token),
        _ => Err(HeaderRejection::NotBearer),
    }
}

/// Require a valid bearer token on every route of `router`.
pub fn require<S>(router: Router<S>, verifier: Option<Arc<TokenVerifier>>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    match verifier {
        Some(verifier) => {
            router.route_layer(middleware::from_fn_with_state(verifier, require_bearer))
        }
        None => router,
    }
}

/// Attach the caller's identity when a valid bearer token is present; never rejects.
pub fn optional<S>(router: Router<S>, verifier: Option<Arc<TokenVerifier>>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    match verifier {
        Some(verifier) => {
            router.route_layer(middleware::from_fn_with_state(verifier, optional_bearer))
        }
        None => router,
    }
}

async fn require_bearer(
    State(verifier): State<Arc<TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = match bearer_token(req.headers()) {
        Ok(token) => token.to_string(),
        Err(rejection) => {
            tracing::warn!(
                path = %req.uri().path(),
                method = %req.method(),
                reason = rejection.message(),
                "bearer authentication rejected"
            );
            return Err(AppError::unauthorized(rejection.message()));
        }
    };

    let user = verifier.authenticate(&token).await.map_err(|err| {
        tracing::warn!(error = %err, path = %req.uri().path(), "token validation failed");
        AppError::unauthorized(MSG_INVALID_TOKEN)
    })?;

    tracing::debug!(user_id = %user.sub, email = ?user.email, "token validated");
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

async fn optional_bearer(
    State(verifier): State<Arc<TokenVerifier>>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(user) = optional_identity(&verifier, req.headers()).await {
        req.extensions_mut().insert(user);
    }
    next.run(req).await
}

async fn optional_identity(
    verifier: &TokenVerifier,
    headers: &HeaderMap,
) -> Option<AuthenticatedUser> {
    let token = bearer_token(headers).ok()?;
    match verifier.authenticate_with_userinfo(token).await {
        Ok(user) => Some(user),
        Err(err) => {
            tracing::warn!(error = %err, "optional token validation failed, continuing unauthenticated");
            None
        }
    }
}
