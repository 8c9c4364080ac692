/*
 * Responsibility
 * - GET /me: 呼び出し元の identity を返す (bearer::require の内側)
 */
use axum::response::Response;

use crate::extractors::CurrentUser;
use crate::response;

pub async fn me(CurrentUser(user): CurrentUser) -> Response {
    response::success(user)
}
