mod auth_ctx;

pub use auth_ctx::{CurrentUser, MaybeUser, current_user};
