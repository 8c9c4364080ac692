/*
 * Responsibility
 * - Config読み込み → ログ初期化 → 依存生成 → Router 組み立て
 * - Middleware の適用 (メトリクス/HTTP 共通処理/CORS、認証はルートグループ単位)
 * - axum::serve() で起動
 */
use std::sync::Arc;
use std::{panic, process};

use anyhow::Result;
use axum::Router;

use crate::config::Config;
use crate::error::AppError;
use crate::middleware::metrics::HttpMetrics;
use crate::services::auth::build_token_verifier;
use crate::state::AppState;
use crate::{api, database, logger, middleware, response};

fn init_panic_hook(abort_on_panic: bool) {
    // Keep the default hook as a fallback (prints to stderr with location/payload).
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        // stderr can be hidden depending on how the process is launched
        tracing::error!(%info, "panic");

        // Development: crash the whole process so it gets noticed.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    let config = Config::from_env()?;
    logger::init_tracing(&config.log);
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(env = %config.app_env, addr = %config.addr, "starting service");

    let state = build_state(&config).await?;
    let app = build_router(state, &config);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Process-level services: optional database pool, optional bearer verifier and
/// HTTP metrics when an exposition path is configured.
pub async fn build_state(config: &Config) -> Result<AppState, AppError> {
    let db = match &config.database {
        Some(db) => Some(database::connect(db).await?),
        None => {
            tracing::info!("database not configured (DB_HOST unset)");
            None
        }
    };
    let verifier = build_token_verifier(&config.auth0)?;

    let state = AppState::new(db, verifier);
    if config.metrics_path.is_none() {
        return Ok(state);
    }
    let metrics = HttpMetrics::new().map_err(AppError::internal)?;
    Ok(state.with_metrics(Arc::new(metrics)))
}

pub fn build_router(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .nest("/api/v1", api::v1::routes(&state))
        .fallback(|| async { response::not_found("route") })
        .with_state(state.clone());

    let router = match (state.metrics, config.metrics_path.as_deref()) {
        (Some(metrics), Some(path)) => middleware::metrics::apply(router, metrics, path),
        _ => router,
    };
    let router = middleware::cors::apply(router, config);
    middleware::http::apply(router)
}
