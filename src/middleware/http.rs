//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id)
//! - Request context: the id is visible to loggers and response envelopes
//! - Access logging ("HTTP request completed")
//! - Body size limits
//! - Global timeouts, answered with a `TIMEOUT` envelope

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::error_handling::HandleErrorLayer;
use axum::extract::Request;
use axum::http::{HeaderMap, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::error::AppError;
use crate::request_context::{self, REQUEST_ID_HEADER};

pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Apply HTTP-level middleware with the default limits.
pub fn apply(router: Router) -> Router {
    apply_with(router, BODY_LIMIT_BYTES, REQUEST_TIMEOUT)
}

pub fn apply_with(router: Router, body_limit: usize, timeout: Duration) -> Router {
    let request_id_header = header::HeaderName::from_static(REQUEST_ID_HEADER);

    let layers = ServiceBuilder::new()
        // Generate a request id if missing, then propagate it to the response.
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        // Access log; the span carries the request fields.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &Request<Body>| {
                    tracing::info_span!(
                        "http_request",
                        request_id = header_str(req.headers(), REQUEST_ID_HEADER),
                        method = %req.method(),
                        path = %req.uri().path(),
                        user_agent = header_str(req.headers(), header::USER_AGENT.as_str()),
                    )
                })
                .on_response(|res: &Response<Body>, latency: Duration, _span: &Span| {
                    tracing::info!(
                        status = res.status().as_u16(),
                        duration_ms = latency.as_millis() as u64,
                        "HTTP request completed"
                    );
                }),
        )
        .layer(middleware::from_fn(request_scope))
        // Make the service error `Infallible` by converting errors into responses.
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                AppError::timeout("request").into_response()
            } else {
                AppError::coerce(err).into_response()
            }
        }))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TimeoutLayer::new(timeout));

    router.layer(layers)
}

/// Run the rest of the stack inside the request context.
async fn request_scope(req: Request, next: Next) -> Response {
    let request_id = header_str(req.headers(), REQUEST_ID_HEADER).to_string();
    request_context::scope(request_id, next.run(req)).await
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
