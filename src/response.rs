/*
 * Responsibility
 * - 全エンドポイント共通の JSON envelope:
 *   { success, message?, data?, error?: { code, message, details? }, timestamp, requestId }
 * - success / error / paginated / health を axum の `Response` で返す
 * - requestId はリクエストスコープの context から取る (リクエスト外では "")
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::error::{self, AppError, BoxError, ErrorCode};
use crate::request_context;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
    pub timestamp: String,
    pub request_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    fn from_app_error(err: &AppError) -> Self {
        Self {
            code: err.code().as_str().to_string(),
            message: err.message().to_string(),
            details: err.detail_text().map(str::to_string),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            error: None,
            timestamp: now_rfc3339(),
            request_id: request_context::current_request_id(),
        }
    }
}

impl ApiResponse<()> {
    pub fn failure(error: ApiError) -> Self {
        Self {
            success: false,
            message: None,
            data: None,
            error: Some(error),
            timestamp: now_rfc3339(),
            request_id: request_context::current_request_id(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    /// `total_pages = ceil(total / page_size)`; a zero page size yields zero pages.
    pub fn new(page: u64, page_size: u64, total: u64) -> Self {
        let total_pages = if page_size == 0 {
            0
        } else {
            total.div_ceil(page_size)
        };
        Self {
            page,
            page_size,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: T,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct HealthReport<C> {
    pub status: String,
    pub timestamp: String,
    pub checks: C,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn respond<T: Serialize>(status: StatusCode, body: ApiResponse<T>) -> Response {
    (status, Json(body)).into_response()
}

fn respond_error(status: StatusCode, error: ApiError) -> Response {
    respond(status, ApiResponse::failure(error))
}

pub fn success<T: Serialize>(data: T) -> Response {
    respond(StatusCode::OK, ApiResponse::ok(data))
}

pub fn success_with_message<T: Serialize>(message: impl Into<String>, data: T) -> Response {
    let mut body = ApiResponse::ok(data);
    body.message = Some(message.into());
    respond(StatusCode::OK, body)
}

pub fn created<T: Serialize>(data: T) -> Response {
    respond(StatusCode::CREATED, ApiResponse::ok(data))
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

/// Error envelope for any error; non-taxonomy errors become `INTERNAL_ERROR`.
pub fn error(err: impl Into<AppError>) -> Response {
    let err = err.into();
    respond_error(err.status(), ApiError::from_app_error(&err))
}

pub fn error_with_message(err: impl Into<AppError>, message: impl Into<String>) -> Response {
    let err = err.into();
    let mut body = ApiError::from_app_error(&err);
    body.message = message.into();
    respond_error(err.status(), body)
}

fn shortcut(code: ErrorCode, message: String) -> Response {
    let status = code.http_status();
    respond_error(
        status,
        ApiError {
            code: code.as_str().to_string(),
            message,
            details: None,
        },
    )
}

fn or_base(message: &str, code: &ErrorCode) -> String {
    if message.is_empty() {
        code.base_message().to_string()
    } else {
        message.to_string()
    }
}

pub fn bad_request(message: &str) -> Response {
    shortcut(ErrorCode::InvalidInput, message.to_string())
}

pub fn unauthorized(message: &str) -> Response {
    let code = ErrorCode::Unauthorized;
    let message = or_base(message, &code);
    shortcut(code, message)
}

pub fn forbidden(message: &str) -> Response {
    let code = ErrorCode::Forbidden;
    let message = or_base(message, &code);
    shortcut(code, message)
}

pub fn not_found(resource: &str) -> Response {
    let code = ErrorCode::NotFound;
    let message = error::message_for(&code, Some(resource));
    shortcut(code, message)
}

pub fn conflict(message: &str) -> Response {
    shortcut(ErrorCode::BusinessRule, message.to_string())
}

pub fn internal_server_error(message: &str) -> Response {
    let code = ErrorCode::Internal;
    let message = or_base(message, &code);
    shortcut(code, message)
}

pub fn service_unavailable(message: &str) -> Response {
    let code = ErrorCode::ServiceUnavailable;
    let message = or_base(message, &code);
    shortcut(code, message)
}

/// Always 400. Anything that is not an `AppError` is reported as a generic
/// validation failure.
pub fn validation_error(err: impl Into<BoxError>) -> Response {
    let err = match err.into().downcast::<AppError>() {
        Ok(app) => *app,
        Err(_) => AppError::invalid_input(error::MSG_FAILED_TO_VALIDATE),
    };
    respond_error(StatusCode::BAD_REQUEST, ApiError::from_app_error(&err))
}

pub fn paginated<T: Serialize>(items: T, page: u64, page_size: u64, total: u64) -> Response {
    let data = Page {
        items,
        pagination: Pagination::new(page, page_size, total),
    };
    respond(StatusCode::OK, ApiResponse::ok(data))
}

/// "healthy" and "ok" are 200; every other status is reported as 503.
pub fn health<C: Serialize>(status: &str, checks: C) -> Response {
    let healthy = matches!(status, "healthy" | "ok");
    let data = HealthReport {
        status: status.to_string(),
        timestamp: now_rfc3339(),
        checks,
    };
    let mut body = ApiResponse::ok(data);
    body.success = healthy;

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    respond(code, body)
}
