/*
 * Responsibility
 * - Router 単位の middleware: HTTP 共通処理、CORS、Prometheus メトリクス
 * - ルート単位の認証/認可 (auth::bearer, auth::rbac)
 */
pub mod auth;
pub mod cors;
pub mod http;
pub mod metrics;
