//! Structured, leveled logger with request correlation.
//!
//! `Logger` is a small value type (minimum level, service, request id, flat field map)
//! that renders each record as a `tracing` event. The process-wide subscriber is
//! installed once by [`init_tracing`]; everything else in the crate logs through
//! `tracing` macros directly, and `Logger` is the handle services hand around when
//! they want bound fields.
//!
//! In JSON mode records go through [`FlatJson`], which merges a `Logger`'s field map
//! into the record itself (`"order_id":42`, not a nested string).

use std::error::Error as StdError;
use std::fmt;
use std::io::Write;

use chrono::SecondsFormat;
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::{JsonFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, FormattedFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogConfig, LogFormat};
use crate::request_context;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Case-insensitive; accepts `warning`. Anything unrecognized is `Info`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => Self::Debug,
            "warn" | "warning" => Self::Warn,
            "error" => Self::Error,
            "fatal" => Self::Fatal,
            _ => Self::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    // fatal records are emitted at error severity
    fn filter_directive(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error | Self::Fatal => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the process-wide `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise the configured level applies to this crate
/// and to `tower_http`. Calling it twice is harmless (the second call is ignored).
pub fn init_tracing(config: &LogConfig) {
    let level = config.level.filter_directive();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},tower_http={level}")));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .fmt_fields(JsonFields::new())
                    .event_format(FlatJson),
            )
            .try_init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

// Event field carrying a `Logger`'s merged map as a JSON object string.
const FIELDS_KEY: &str = "fields";

/// One JSON object per line: `timestamp`, `level`, `target`, the event fields with
/// any `Logger` field map merged in at top level, and the current span under `span`.
///
/// Merged fields never replace the event's own keys (`message`, `service`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatJson;

impl<S, N> FormatEvent<S, N> for FlatJson
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut record = Map::new();
        record.insert(
            "timestamp".into(),
            chrono::Utc::now()
                .to_rfc3339_opts(SecondsFormat::Micros, true)
                .into(),
        );
        record.insert("level".into(), meta.level().to_string().into());
        record.insert("target".into(), meta.target().into());

        let mut visitor = RecordVisitor::default();
        event.record(&mut visitor);
        record.extend(visitor.values);
        for (key, value) in visitor.merged {
            record.entry(key).or_insert(value);
        }

        if let Some(span) = ctx.lookup_current() {
            let mut fields = span
                .extensions()
                .get::<FormattedFields<N>>()
                .and_then(|f| serde_json::from_str::<Map<String, Value>>(&f.fields).ok())
                .unwrap_or_default();
            fields.insert("name".into(), span.name().into());
            record.insert("span".into(), Value::Object(fields));
        }

        let line = serde_json::to_string(&record).map_err(|_| fmt::Error)?;
        writeln!(writer, "{line}")
    }
}

#[derive(Default)]
struct RecordVisitor {
    values: Map<String, Value>,
    merged: Map<String, Value>,
}

impl RecordVisitor {
    fn put(&mut self, field: &Field, value: Value) {
        self.values.insert(field.name().to_string(), value);
    }
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == FIELDS_KEY {
            if let Ok(Value::Object(map)) = serde_json::from_str(value) {
                self.merged = map;
                return;
            }
        }
        self.put(field, value.into());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.put(field, value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.put(field, value.into());
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.put(field, value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.put(field, value.into());
    }

    fn record_error(&mut self, field: &Field, value: &(dyn StdError + 'static)) {
        self.put(field, value.to_string().into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.put(field, format!("{value:?}").into());
    }
}

/// Field-carrying logger handle. Cheap to clone; derivations never mutate `self`.
#[derive(Debug, Clone)]
pub struct Logger {
    min_level: LogLevel,
    service: Option<String>,
    request_id: Option<String>,
    fields: Map<String, Value>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogLevel::Info)
    }
}

impl Logger {
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            min_level,
            service: None,
            request_id: None,
            fields: Map::new(),
        }
    }

    /// Minimum level from `LOG_LEVEL` (default info), bound to `service`.
    pub fn from_env(service: &str) -> Self {
        let level = LogLevel::parse(&std::env::var("LOG_LEVEL").unwrap_or_default());
        Self::new(level).with_service(service)
    }

    /// Request-scoped logger: `service` plus the current request id when there is one.
    pub fn for_request(service: &str) -> Self {
        let logger = Self::from_env(service);
        let request_id = request_context::current_request_id();
        if request_id.is_empty() {
            logger
        } else {
            logger.with_request_id(request_id)
        }
    }

    pub fn min_level(&self) -> LogLevel {
        self.min_level
    }

    pub fn with_fields(&self, fields: Value) -> Self {
        let mut next = self.clone();
        merge_into(&mut next.fields, fields);
        next
    }

    pub fn with_request_id(&self, request_id: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.request_id = Some(request_id.into());
        next
    }

    pub fn with_service(&self, service: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.service = Some(service.into());
        next
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub fn debug(&self, msg: &str, fields: Option<Value>) {
        self.emit(LogLevel::Debug, msg, None, fields);
    }

    pub fn info(&self, msg: &str, fields: Option<Value>) {
        self.emit(LogLevel::Info, msg, None, fields);
    }

    pub fn warn(&self, msg: &str, fields: Option<Value>) {
        self.emit(LogLevel::Warn, msg, None, fields);
    }

    pub fn error(&self, msg: &str, err: Option<&dyn StdError>, fields: Option<Value>) {
        self.emit(LogLevel::Error, msg, err, fields);
    }

    /// Log at error severity with `fatal=true`, flush, and exit with status 1.
    pub fn fatal(&self, msg: &str, err: Option<&dyn StdError>, fields: Option<Value>) -> ! {
        self.emit(LogLevel::Fatal, msg, err, fields);
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        std::process::exit(1)
    }

    fn emit(&self, level: LogLevel, msg: &str, err: Option<&dyn StdError>, extra: Option<Value>) {
        // fatal is never filtered out
        if level != LogLevel::Fatal && !self.enabled(level) {
            return;
        }

        let mut fields = self.fields.clone();
        if let Some(extra) = extra {
            merge_into(&mut fields, extra);
        }
        // FlatJson lifts this back into the record
        let fields = (!fields.is_empty()).then(|| Value::Object(fields).to_string());
        let fields = fields.as_deref();
        let service = self.service.as_deref();
        let request_id = self.request_id.as_deref();
        let error = err.map(|e| e.to_string());
        let error = error.as_deref();

        match level {
            LogLevel::Debug => {
                tracing::debug!(service, request_id, fields, error, "{msg}")
            }
            LogLevel::Info => {
                tracing::info!(service, request_id, fields, error, "{msg}")
            }
            LogLevel::Warn => {
                tracing::warn!(service, request_id, fields, error, "{msg}")
            }
            LogLevel::Error => {
                tracing::error!(service, request_id, fields, error, "{msg}")
            }
            LogLevel::Fatal => {
                tracing::error!(service, request_id, fields, error, fatal = true, "{msg}")
            }
        }
    }
}

// Non-object values are kept under a single "value" key.
fn merge_into(target: &mut Map<String, Value>, fields: Value) {
    match fields {
        Value::Object(map) => target.extend(map),
        Value::Null => {}
        other => {
            target.insert("value".to_string(), other);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CapturedLogs;
    use serde_json::json;

    #[test]
    fn level_parsing_is_lenient() {
        assert_eq!(LogLevel::parse("DEBUG"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("WARN"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("error"), LogLevel::Error);
        assert_eq!(LogLevel::parse("verbose"), LogLevel::Info);
        assert_eq!(LogLevel::parse(""), LogLevel::Info);
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Error < LogLevel::Fatal);
    }

    #[test]
    fn records_carry_service_request_id_and_fields() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(logs.subscriber(), || {
            Logger::new(LogLevel::Debug)
                .with_service("orders")
                .with_request_id("req-9")
                .with_fields(json!({"tenant": "acme"}))
                .info("order placed", Some(json!({"order_id": 42})));
        });

        let lines = logs.json_lines();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["message"], "order placed");
        assert_eq!(line["level"], "INFO");
        assert_eq!(line["service"], "orders");
        assert_eq!(line["request_id"], "req-9");

        assert_eq!(line["tenant"], "acme");
        assert_eq!(line["order_id"], 42);
        assert!(line.get("fields").is_none());
    }

    #[test]
    fn merged_fields_keep_their_json_types_and_never_shadow_the_record() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(logs.subscriber(), || {
            Logger::new(LogLevel::Debug).with_service("orders").warn(
                "retrying",
                Some(json!({
                    "attempt": 3,
                    "ok": false,
                    "tags": ["a", "b"],
                    "message": "shadow",
                    "service": "shadow",
                })),
            );
        });

        let line = &logs.json_lines()[0];
        assert_eq!(line["attempt"], 3);
        assert_eq!(line["ok"], false);
        assert_eq!(line["tags"], json!(["a", "b"]));
        assert_eq!(line["message"], "retrying");
        assert_eq!(line["service"], "orders");
    }

    #[test]
    fn records_below_minimum_level_are_dropped() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(logs.subscriber(), || {
            let logger = Logger::new(LogLevel::Warn);
            logger.debug("noise", None);
            logger.info("noise", None);
            logger.warn("kept", None);
        });

        let lines = logs.json_lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "kept");
    }

    #[test]
    fn errors_are_attached_as_their_own_field() {
        let logs = CapturedLogs::default();
        tracing::subscriber::with_default(logs.subscriber(), || {
            let err = std::io::Error::other("disk full");
            Logger::default().error("write failed", Some(&err), None);
        });

        let line = &logs.json_lines()[0];
        assert_eq!(line["level"], "ERROR");
        assert_eq!(line["error"], "disk full");
        assert!(line.get("fields").is_none());
    }

    #[test]
    fn derivation_leaves_the_parent_untouched() {
        let base = Logger::new(LogLevel::Info).with_fields(json!({"a": 1}));
        let child = base.with_fields(json!({"b": 2})).with_service("child");

        assert_eq!(base.fields.len(), 1);
        assert!(base.service.is_none());
        assert_eq!(child.fields.len(), 2);
        assert_eq!(child.service.as_deref(), Some("child"));
    }

    #[tokio::test]
    async fn for_request_picks_up_the_current_request_id() {
        let logger =
            request_context::scope("req-77".into(), async { Logger::for_request("auth") }).await;
        assert_eq!(logger.request_id.as_deref(), Some("req-77"));
        assert_eq!(logger.service.as_deref(), Some("auth"));

        let outside = Logger::for_request("auth");
        assert!(outside.request_id.is_none());
    }
}
