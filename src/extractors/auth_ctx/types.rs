use crate::services::auth::AuthenticatedUser;

/// The authenticated caller. Rejects with a 401 envelope when no identity is attached.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub AuthenticatedUser);

/// The caller when authenticated, `None` otherwise. Never rejects.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthenticatedUser>);
