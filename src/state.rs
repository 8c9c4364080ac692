/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - db pool (任意), bearer verifier (任意), validator, sanitizer,
 *     HTTP メトリクス (任意)
 * - Clone 前提で持つ (内部は Arc / pool handle なので cheap)
 */
use std::sync::Arc;

use sqlx::PgPool;

use crate::middleware::metrics::HttpMetrics;
use crate::services::auth::TokenVerifier;
use crate::validation::{Sanitizer, ValidatorService};

#[derive(Clone, Debug)]
pub struct AppState {
    pub db: Option<PgPool>,
    pub verifier: Option<Arc<TokenVerifier>>,
    pub validator: Arc<ValidatorService>,
    pub sanitizer: Arc<Sanitizer>,
    pub metrics: Option<Arc<HttpMetrics>>,
}

impl AppState {
    pub fn new(db: Option<PgPool>, verifier: Option<Arc<TokenVerifier>>) -> Self {
        Self {
            db,
            verifier,
            validator: Arc::new(ValidatorService::new()),
            sanitizer: Arc::new(Sanitizer::new()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<HttpMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }
}
