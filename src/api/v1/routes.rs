/*
 * Responsibility
 * - v1 の URL 構造
 * - どのルートに bearer token が必要か / どの RBAC ルールで守るか
 *   (sub-router ごとに route_layer で掛けてから merge)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{
    admin::admin_ping,
    greetings::{create_greeting, greeting, list_languages},
    health::health,
    me::me,
};
use crate::middleware::auth::{AccessRule, bearer, rbac};
use crate::state::AppState;

pub const GREETING_CREATE_PERMISSION: &str = "hello:greeting:create";
pub const ADMIN_ROLE: &str = "admin";

pub fn routes(state: &AppState) -> Router<AppState> {
    let public: Router<AppState> = Router::new()
        .route("/health", get(health))
        .route("/greetings/languages", get(list_languages));

    let identified: Router<AppState> = bearer::require(
        Router::new().route("/me", get(me)),
        state.verifier.clone(),
    );

    let personalized: Router<AppState> = bearer::optional(
        Router::new().route("/greeting", get(greeting)),
        state.verifier.clone(),
    );

    let writers: Router<AppState> = rbac::apply(
        Router::new().route("/greetings", post(create_greeting)),
        AccessRule::any_permission([GREETING_CREATE_PERMISSION]),
    );

    let admins: Router<AppState> = rbac::apply(
        Router::new().route("/admin/ping", get(admin_ping)),
        AccessRule::any_role([ADMIN_ROLE]),
    );

    public
        .merge(identified)
        .merge(personalized)
        .merge(writers)
        .merge(admins)
}
