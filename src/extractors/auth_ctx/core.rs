use axum::extract::FromRequestParts;
use axum::http::{Extensions, request::Parts};

use crate::error::{AppError, MSG_UNAUTHORIZED};
use crate::services::auth::AuthenticatedUser;

use super::{CurrentUser, MaybeUser};

/// Identity attached by the bearer middleware, if any.
pub fn current_user(extensions: &Extensions) -> Option<&AuthenticatedUser> {
    extensions.get::<AuthenticatedUser>()
}

// A missing identity means the route is not behind `bearer::require`
// (or authentication is disabled).
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(&parts.extensions)
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::unauthorized(MSG_UNAUTHORIZED))
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(current_user(&parts.extensions).cloned()))
    }
}
