/*
 * Responsibility
 * - HTTP トラフィック用の Prometheus registry (リクエスト数、レイテンシ、処理中の件数)
 * - テキスト形式の公開エンドポイント (GET /metrics、またはパス指定)
 */
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::{MatchedPath, Request, State};
use axum::http::header;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TEXT_FORMAT, TextEncoder,
};

use crate::error::AppError;

pub const DEFAULT_PATH: &str = "/metrics";

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Per-process HTTP collectors on their own registry.
#[derive(Clone)]
pub struct HttpMetrics {
    registry: Registry,
    requests: IntCounterVec,
    duration: HistogramVec,
    in_flight: IntGauge,
}

impl fmt::Debug for HttpMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpMetrics").finish_non_exhaustive()
    }
}

impl HttpMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["method", "path"],
        )?;
        let in_flight = IntGauge::new(
            "http_requests_in_flight",
            "HTTP requests currently being served",
        )?;

        let registry = Registry::new();
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(in_flight.clone()))?;

        Ok(Self {
            registry,
            requests,
            duration,
            in_flight,
        })
    }

    /// Register application collectors next to the HTTP ones.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

/// Track every route currently in `router` and serve the registry at `path`.
///
/// Unmatched requests (fallback) and the exposition route itself are not tracked.
/// `path` labels are route templates (`/items/{id}`).
pub fn apply(router: Router, metrics: Arc<HttpMetrics>, path: &str) -> Router {
    router
        .route_layer(middleware::from_fn_with_state(metrics.clone(), track))
        .route(path, get(export).with_state(metrics))
}

struct InFlight<'a>(&'a IntGauge);

impl<'a> InFlight<'a> {
    fn enter(gauge: &'a IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

// also runs when the request future is dropped by the timeout layer
impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

async fn track(State(metrics): State<Arc<HttpMetrics>>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    let start = Instant::now();
    let res = {
        let _in_flight = InFlight::enter(&metrics.in_flight);
        next.run(req).await
    };

    metrics
        .requests
        .with_label_values(&[method.as_str(), path.as_str(), res.status().as_str()])
        .inc();
    metrics
        .duration
        .with_label_values(&[method.as_str(), path.as_str()])
        .observe(start.elapsed().as_secs_f64());

    res
}

async fn export(State(metrics): State<Arc<HttpMetrics>>) -> Result<Response, AppError> {
    let body = metrics.export().map_err(AppError::internal)?;
    Ok(([(header::CONTENT_TYPE, TEXT_FORMAT)], body).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::send;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};

    fn app(path: &str) -> (Router, Arc<HttpMetrics>) {
        let metrics = Arc::new(HttpMetrics::new().unwrap());
        let router = Router::new()
            .route("/items/{id}", get(|| async { "item" }))
            .route(
                "/broken",
                get(|| async { AppError::internal(std::io::Error::other("boom")) }),
            );
        (apply(router, metrics.clone(), path), metrics)
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn scrape(router: Router, path: &str) -> (StatusCode, String) {
        let res = send(router, get_req(path)).await;
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn exposition_is_served_at_the_default_path() {
        let (router, _) = app(DEFAULT_PATH);
        let res = send(router.clone(), get_req(DEFAULT_PATH)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()[header::CONTENT_TYPE], TEXT_FORMAT);

        let (_, body) = scrape(router, DEFAULT_PATH).await;
        assert!(body.contains("# HELP"));
        assert!(body.contains("# TYPE http_requests_in_flight gauge"));
    }

    #[tokio::test]
    async fn custom_path_replaces_the_default() {
        let (router, _) = app("/custom/metrics");

        let (status, body) = scrape(router.clone(), "/custom/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("# TYPE"));

        let (status, _) = scrape(router, DEFAULT_PATH).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn requests_are_counted_by_route_template_and_status() {
        let (router, metrics) = app(DEFAULT_PATH);
        send(router.clone(), get_req("/items/1")).await;
        send(router.clone(), get_req("/items/2")).await;
        send(router.clone(), get_req("/broken")).await;

        let ok = metrics
            .requests
            .with_label_values(&["GET", "/items/{id}", "200"])
            .get();
        assert_eq!(ok, 2);
        let failed = metrics
            .requests
            .with_label_values(&["GET", "/broken", "500"])
            .get();
        assert_eq!(failed, 1);
        assert_eq!(metrics.in_flight.get(), 0);

        let (_, body) = scrape(router, DEFAULT_PATH).await;
        assert!(body.contains("http_request_duration_seconds_bucket"));
        assert!(!body.contains(r#"path="/items/1""#));
        assert!(!body.contains(r#"path="/metrics""#));
    }
}
