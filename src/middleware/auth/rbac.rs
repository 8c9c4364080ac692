//! Role/permission checks driven by identity headers.
//!
//! Trust boundary: `X-User-ID`, `X-User-Roles` and `X-User-Permissions` are taken at
//! face value. They must be set (and stripped from client input) by the gateway in
//! front of the service; never expose a router guarded only by these rules directly.
//!
//! Denials are 403 envelopes (`FORBIDDEN`), including the missing-identity case.

use std::sync::{Arc, LazyLock};

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::{self, Next},
    response::{IntoResponse, Response},
};
use regex::Regex;

use crate::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";
pub const USER_PERMISSIONS_HEADER: &str = "x-user-permissions";

pub const MSG_AUTHENTICATION_REQUIRED: &str = "Authentication required";
pub const MSG_ROLE_NOT_FOUND: &str = "Insufficient permissions: required role not found";
pub const MSG_PERMISSION_NOT_FOUND: &str =
    "Insufficient permissions: required permission not found";
pub const MSG_MISSING_PERMISSIONS: &str = "Insufficient permissions: missing required permissions";

// application:feature:action
static PERMISSION_FORMAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_:]+$").expect("permission format pattern"));

/// What a request must carry to pass.
///
/// Constructors with an empty set degrade to [`AccessRule::Authenticated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessRule {
    Authenticated,
    AnyRole(Vec<String>),
    AnyPermission(Vec<String>),
    AllPermissions(Vec<String>),
}

impl AccessRule {
    pub fn any_role<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::non_empty(roles, Self::AnyRole)
    }

    pub fn any_permission<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::non_empty(permissions, Self::AnyPermission)
    }

    pub fn all_permissions<I, S>(permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::non_empty(permissions, Self::AllPermissions)
    }

    fn non_empty<I, S>(items: I, make: fn(Vec<String>) -> Self) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let items: Vec<String> = items.into_iter().map(Into::into).collect();
        if items.is_empty() {
            Self::Authenticated
        } else {
            make(items)
        }
    }

    /// Evaluate the rule against the identity headers.
    pub fn check(&self, headers: &HeaderMap) -> Result<(), Denial> {
        let user_id = header_str(headers, USER_ID_HEADER).trim();
        if user_id.is_empty() {
            return Err(Denial::Unauthenticated);
        }

        match self {
            Self::Authenticated => Ok(()),
            Self::AnyRole(required) => {
                let user_roles = parse_comma_separated(header_str(headers, USER_ROLES_HEADER));
                if required.iter().any(|role| user_roles.contains(role)) {
                    Ok(())
                } else {
                    Err(Denial::MissingRole {
                        user_id: user_id.to_string(),
                        user_roles,
                        required: required.clone(),
                    })
                }
            }
            Self::AnyPermission(required) => {
                let user_permissions = user_permissions(headers, user_id);
                let required = valid_required_permissions(required);
                if required.iter().any(|p| user_permissions.contains(p)) {
                    Ok(())
                } else {
                    Err(Denial::MissingPermission {
                        user_id: user_id.to_string(),
                        user_permissions,
                        required,
                    })
                }
            }
            Self::AllPermissions(required) => {
                let user_permissions = user_permissions(headers, user_id);
                let required = valid_required_permissions(required);
                let missing: Vec<String> = required
                    .iter()
                    .filter(|p| !user_permissions.contains(p))
                    .cloned()
                    .collect();
                if missing.is_empty() {
                    Ok(())
                } else {
                    Err(Denial::MissingPermissions {
                        user_id: user_id.to_string(),
                        user_permissions,
                        required,
                        missing,
                    })
                }
            }
        }
    }
}

/// Why a request was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    Unauthenticated,
    MissingRole {
        user_id: String,
        user_roles: Vec<String>,
        required: Vec<String>,
    },
    MissingPermission {
        user_id: String,
        user_permissions: Vec<String>,
        required: Vec<String>,
    },
    MissingPermissions {
        user_id: String,
        user_permissions: Vec<String>,
        required: Vec<String>,
        missing: Vec<String>,
    },
}

impl Denial {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Unauthenticated => MSG_AUTHENTICATION_REQUIRED,
            Self::MissingRole { .. } => MSG_ROLE_NOT_FOUND,
            Self::MissingPermission { .. } => MSG_PERMISSION_NOT_FOUND,
            Self::MissingPermissions { .. } => MSG_MISSING_PERMISSIONS,
        }
    }

    fn log(&self, path: &str, method: &Method) {
        match self {
            Self::Unauthenticated => tracing::warn!(
                path,
                %method,
                "Authentication required but X-User-ID header missing"
            ),
            Self::MissingRole {
                user_id,
                user_roles,
                required,
            } => tracing::warn!(
                user_id,
                ?user_roles,
                required_roles = ?required,
                path,
                %method,
                "User does not have required role"
            ),
            Self::MissingPermission {
                user_id,
                user_permissions,
                required,
            } => tracing::warn!(
                user_id,
                ?user_permissions,
                required_permissions = ?required,
                path,
                %method,
                "User does not have required permission"
            ),
            Self::MissingPermissions {
                user_id,
                user_permissions,
                required,
                missing,
            } => tracing::warn!(
                user_id,
                ?user_permissions,
                required_permissions = ?required,
                missing_permissions = ?missing,
                path,
                %method,
                "User does not have all required permissions"
            ),
        }
    }
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        AppError::forbidden(denial.message())
    }
}

/// Guard every route of `router` with `rule`.
///
/// Applied with `route_layer`, so unmatched paths still 404.
pub fn apply<S>(router: Router<S>, rule: AccessRule) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(Arc::new(rule), enforce))
}

async fn enforce(State(rule): State<Arc<AccessRule>>, req: Request, next: Next) -> Response {
    match rule.check(req.headers()) {
        Ok(()) => next.run(req).await,
        Err(denial) => {
            denial.log(req.uri().path(), req.method());
            AppError::from(denial).into_response()
        }
    }
}

/// Split on commas, trim, drop empties.
pub fn parse_comma_separated(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn is_valid_permission(permission: &str) -> bool {
    PERMISSION_FORMAT.is_match(permission)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

fn user_permissions(headers: &HeaderMap, user_id: &str) -> Vec<String> {
    parse_comma_separated(header_str(headers, USER_PERMISSIONS_HEADER))
        .into_iter()
        .filter(|permission| {
            let valid = is_valid_permission(permission);
            if !valid {
                tracing::warn!(
                    user_id,
                    permission = %permission,
                    "Permission has invalid format, filtering out"
                );
            }
            valid
        })
        .collect()
}

fn valid_required_permissions(required: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|permission| {
            let valid = is_valid_permission(permission);
            if !valid {
                tracing::warn!(
                    permission = %permission,
                    "Required permission has invalid format, skipping"
                );
            }
            valid
        })
        .cloned()
        .collect()
}
