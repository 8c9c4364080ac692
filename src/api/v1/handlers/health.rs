/*
 * Responsibility
 * - GET /health: 生存確認 + DB チェック (envelope は response::health)
 */
use axum::{extract::State, response::Response};
use serde_json::json;

use crate::database;
use crate::response;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Response {
    let database = match &state.db {
        None => "not_configured",
        Some(pool) => match database::health_check(Some(pool)).await {
            Ok(()) => "up",
            Err(err) => {
                tracing::warn!(error = %err, "database health check failed");
                "down"
            }
        },
    };

    let status = if database == "down" { "unhealthy" } else { "healthy" };
    response::health(status, json!({ "database": database }))
}
