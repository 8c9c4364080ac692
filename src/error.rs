/*
 * Responsibility
 * - 共通のエラー分類 (ErrorCode) と各レイヤーが返す AppError
 * - ErrorCode → HTTP status / 基本メッセージの対応 (未知のものは INTERNAL_ERROR)
 * - IntoResponse (error envelope) と外部エラーの AppError への変換
 */
use std::borrow::Cow;
use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, Serializer};

use crate::response;

pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub const MSG_INVALID_INPUT: &str = "invalid input provided";
pub const MSG_MISSING_FIELD: &str = "missing required field";
pub const MSG_INVALID_FORMAT: &str = "invalid format";
pub const MSG_VALUE_TOO_LONG: &str = "value exceeds maximum length";
pub const MSG_VALUE_TOO_SHORT: &str = "value is too short";

pub const MSG_INTERNAL: &str = "internal server error";
pub const MSG_SERVICE_UNAVAILABLE: &str = "service temporarily unavailable";
pub const MSG_DATABASE_ERROR: &str = "database operation failed";
pub const MSG_NETWORK_ERROR: &str = "network operation failed";
pub const MSG_TIMEOUT: &str = "operation timed out";

pub const MSG_UNAUTHORIZED: &str = "unauthorized access";
pub const MSG_FORBIDDEN: &str = "access forbidden";
pub const MSG_RATE_LIMIT: &str = "rate limit exceeded";

pub const MSG_EXTERNAL_SERVICE: &str = "external service error";

pub const MSG_BUSINESS_RULE: &str = "business rule violation";
pub const MSG_DUPLICATE_ENTRY: &str = "entry already exists";
pub const MSG_NOT_FOUND: &str = "resource not found";

pub const MSG_FAILED_TO_CONNECT: &str = "failed to connect";
pub const MSG_FAILED_TO_EXECUTE: &str = "failed to execute operation";
pub const MSG_CONFIGURATION_ERROR: &str = "configuration error";
pub const MSG_FAILED_TO_VALIDATE: &str = "validation failed";

/// Error kinds shared by every service.
///
/// `Other` carries application-defined codes; they are serialized verbatim but
/// map to the internal-error status and message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // input validation
    InvalidInput,
    MissingField,
    InvalidFormat,
    ValueTooLong,
    ValueTooShort,
    // business
    BusinessRule,
    DuplicateEntry,
    NotFound,
    // http / api
    Unauthorized,
    Forbidden,
    RateLimitExceeded,
    // system
    Internal,
    DatabaseError,
    NetworkError,
    Timeout,
    ExternalService,
    ServiceUnavailable,

    Other(Cow<'static, str>),
}

impl ErrorCode {
    pub fn as_str(&self) -> &str {
        match self {
            Self::InvalidInput => "INVALID_INPUT",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidFormat => "INVALID_FORMAT",
            Self::ValueTooLong => "VALUE_TOO_LONG",
            Self::ValueTooShort => "VALUE_TOO_SHORT",
            Self::BusinessRule => "BUSINESS_RULE_VIOLATION",
            Self::DuplicateEntry => "DUPLICATE_ENTRY",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::Internal => "INTERNAL_ERROR",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::ExternalService => "EXTERNAL_SERVICE_ERROR",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            Self::Other(code) => code,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidInput
            | Self::MissingField
            | Self::InvalidFormat
            | Self::ValueTooLong
            | Self::ValueTooShort => StatusCode::BAD_REQUEST,
            Self::BusinessRule | Self::DuplicateEntry => StatusCode::CONFLICT,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable | Self::ExternalService => StatusCode::SERVICE_UNAVAILABLE,
            Self::DatabaseError
            | Self::NetworkError
            | Self::Timeout
            | Self::Internal
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn base_message(&self) -> &'static str {
        match self {
            Self::InvalidInput => MSG_INVALID_INPUT,
            Self::MissingField => MSG_MISSING_FIELD,
            Self::InvalidFormat => MSG_INVALID_FORMAT,
            Self::ValueTooLong => MSG_VALUE_TOO_LONG,
            Self::ValueTooShort => MSG_VALUE_TOO_SHORT,
            Self::BusinessRule => MSG_BUSINESS_RULE,
            Self::DuplicateEntry => MSG_DUPLICATE_ENTRY,
            Self::NotFound => MSG_NOT_FOUND,
            Self::Unauthorized => MSG_UNAUTHORIZED,
            Self::Forbidden => MSG_FORBIDDEN,
            Self::RateLimitExceeded => MSG_RATE_LIMIT,
            Self::Internal => MSG_INTERNAL,
            Self::DatabaseError => MSG_DATABASE_ERROR,
            Self::NetworkError => MSG_NETWORK_ERROR,
            Self::Timeout => MSG_TIMEOUT,
            Self::ExternalService => MSG_EXTERNAL_SERVICE,
            Self::ServiceUnavailable => MSG_SERVICE_UNAVAILABLE,
            Self::Other(_) => MSG_INTERNAL,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorCode {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = match s {
            "INVALID_INPUT" => Self::InvalidInput,
            "MISSING_FIELD" => Self::MissingField,
            "INVALID_FORMAT" => Self::InvalidFormat,
            "VALUE_TOO_LONG" => Self::ValueTooLong,
            "VALUE_TOO_SHORT" => Self::ValueTooShort,
            "BUSINESS_RULE_VIOLATION" => Self::BusinessRule,
            "DUPLICATE_ENTRY" => Self::DuplicateEntry,
            "NOT_FOUND" => Self::NotFound,
            "UNAUTHORIZED" => Self::Unauthorized,
            "FORBIDDEN" => Self::Forbidden,
            "RATE_LIMIT_EXCEEDED" => Self::RateLimitExceeded,
            "INTERNAL_ERROR" => Self::Internal,
            "DATABASE_ERROR" => Self::DatabaseError,
            "NETWORK_ERROR" => Self::NetworkError,
            "TIMEOUT" => Self::Timeout,
            "EXTERNAL_SERVICE_ERROR" => Self::ExternalService,
            "SERVICE_UNAVAILABLE" => Self::ServiceUnavailable,
            other => Self::Other(Cow::Owned(other.to_string())),
        };
        Ok(code)
    }
}

impl Serialize for ErrorCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Base message for `code`, optionally suffixed with `": <context>"`.
pub fn message_for(code: &ErrorCode, context: Option<&str>) -> String {
    match context {
        Some(ctx) => format!("{}: {}", code.base_message(), ctx),
        None => code.base_message().to_string(),
    }
}

/// Structured application error.
///
/// The HTTP status is derived from the code at construction time. `source` is
/// only ever logged; it never reaches the client envelope.
#[derive(Debug)]
pub struct AppError {
    code: ErrorCode,
    message: String,
    details: Option<String>,
    status: StatusCode,
    source: Option<BoxError>,
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let status = code.http_status();
        Self {
            code,
            message: message.into(),
            details: None,
            status,
            source: None,
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::new(code, message).details(details)
    }

    pub fn wrap(source: impl Into<BoxError>, code: ErrorCode, message: impl Into<String>) -> Self {
        let mut err = Self::new(code, message);
        err.source = Some(source.into());
        err
    }

    pub fn wrap_with_details(
        source: impl Into<BoxError>,
        code: ErrorCode,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self::wrap(source, code, message).details(details)
    }

    /// Builder-style setter for the free-text details.
    pub fn details(mut self, details: impl Into<String>) -> Self {
        let details = details.into();
        self.details = (!details.is_empty()).then_some(details);
        self
    }

    pub fn code(&self) -> &ErrorCode {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail_text(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    // ---- input validation ----

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        let code = ErrorCode::MissingField;
        let message = message_for(&code, Some(field));
        Self::new(code, message)
    }

    pub fn invalid_format(field: &str, format: &str) -> Self {
        let code = ErrorCode::InvalidFormat;
        let message = message_for(&code, Some(&format!("field '{field}': expected {format}")));
        Self::new(code, message)
    }

    pub fn value_too_long(field: &str, max_length: usize) -> Self {
        let code = ErrorCode::ValueTooLong;
        let message = message_for(
            &code,
            Some(&format!("field '{field}': max {max_length} characters")),
        );
        Self::new(code, message)
    }

    pub fn value_too_short(field: &str, min_length: usize) -> Self {
        let code = ErrorCode::ValueTooShort;
        let message = message_for(
            &code,
            Some(&format!("field '{field}': min {min_length} characters")),
        );
        Self::new(code, message)
    }

    // ---- business ----

    pub fn business_rule(message: &str) -> Self {
        let code = ErrorCode::BusinessRule;
        let message = message_for(&code, Some(message));
        Self::new(code, message)
    }

    pub fn not_found(resource: &str) -> Self {
        let code = ErrorCode::NotFound;
        let message = message_for(&code, Some(resource));
        Self::new(code, message)
    }

    pub fn duplicate_entry(resource: &str) -> Self {
        let code = ErrorCode::DuplicateEntry;
        let message = message_for(&code, Some(resource));
        Self::new(code, message)
    }

    // ---- system ----

    pub fn database(source: impl Into<BoxError>) -> Self {
        Self::wrap(source, ErrorCode::DatabaseError, MSG_FAILED_TO_EXECUTE)
    }

    pub fn service_unavailable(service: &str) -> Self {
        let code = ErrorCode::ServiceUnavailable;
        let message = message_for(&code, Some(service));
        Self::new(code, message)
    }

    pub fn internal(source: impl Into<BoxError>) -> Self {
        Self::wrap(source, ErrorCode::Internal, MSG_INTERNAL)
    }

    pub fn network(source: impl Into<BoxError>) -> Self {
        Self::wrap(source, ErrorCode::NetworkError, MSG_NETWORK_ERROR)
    }

    pub fn timeout(operation: &str) -> Self {
        let code = ErrorCode::Timeout;
        let message = message_for(&code, Some(operation));
        Self::new(code, message)
    }

    // ---- http / api ----

    pub fn unauthorized(message: &str) -> Self {
        Self::new(ErrorCode::Unauthorized, or_default(message, MSG_UNAUTHORIZED))
    }

    pub fn forbidden(message: &str) -> Self {
        Self::new(ErrorCode::Forbidden, or_default(message, MSG_FORBIDDEN))
    }

    pub fn rate_limit_exceeded(message: &str) -> Self {
        Self::new(ErrorCode::RateLimitExceeded, or_default(message, MSG_RATE_LIMIT))
    }

    // ---- external ----

    pub fn external_service(service: &str, source: impl Into<BoxError>) -> Self {
        let code = ErrorCode::ExternalService;
        let message = message_for(&code, Some(service));
        Self::wrap(source, code, message)
    }

    /// Coerce any boxed error into an `AppError`.
    ///
    /// An `AppError` inside the box is returned as-is; everything else becomes
    /// `INTERNAL_ERROR` with the original kept as the source.
    pub fn coerce(err: BoxError) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => *app,
            Err(other) => Self::internal(other),
        }
    }
}

fn or_default(message: &str, default: &str) -> String {
    if message.is_empty() {
        default.to_string()
    } else {
        message.to_string()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}: {} ({})", self.code, self.message, source),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}

impl StdError for AppError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        response::error(self)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        match e.downcast::<AppError>() {
            Ok(app) => app,
            Err(other) => Self::internal(BoxError::from(other)),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        Self::database(e)
    }
}

impl From<BoxError> for AppError {
    fn from(e: BoxError) -> Self {
        Self::coerce(e)
    }
}
