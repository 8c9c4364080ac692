//! Request-scoped correlation id.
//!
//! `middleware::http` runs every request inside [`scope`], so code running on
//! behalf of that request (handlers, extractors, `IntoResponse` impls, the
//! request logger) can read the id without threading it through arguments.
//! Outside a request the id is simply empty.

use std::future::Future;

tokio::task_local! {
    static REQUEST_ID: String;
}

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Run `fut` with `request_id` as the current request id.
pub async fn scope<F>(request_id: String, fut: F) -> F::Output
where
    F: Future,
{
    REQUEST_ID.scope(request_id, fut).await
}

/// Current request id, or `""` when called outside a request.
pub fn current_request_id() -> String {
    REQUEST_ID
        .try_with(|id| id.clone())
        .unwrap_or_default()
}
