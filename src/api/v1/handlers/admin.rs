/*
 * Responsibility
 * - GET /admin/ping ("admin" ロールのルールの内側)
 */
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::json;

use crate::middleware::auth::rbac::USER_ID_HEADER;
use crate::response;

pub async fn admin_ping(headers: HeaderMap) -> Response {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .trim();
    response::success(json!({ "pong": true, "userId": user_id }))
}
