//! Declarative field rules and the built-in custom checks.
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

static NUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?[0-9]+(?:\.[0-9]+)?$").expect("numeric pattern"));
static ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z]+$").expect("alpha pattern"));
static ALPHANUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+$").expect("alphanum pattern"));

/// One validation rule, as written in a tag such as `"required,min=2,max=50"`.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    /// Skip the remaining rules when the value is empty.
    OmitEmpty,
    /// Minimum length for strings/arrays/objects, minimum value for numbers.
    Min(f64),
    Max(f64),
    Len(f64),
    Numeric,
    Alpha,
    Alphanum,
    Email,
    /// A rule looked up by name in the validator's registry.
    Custom(String),
}

impl Rule {
    /// Parse a single rule token. Unrecognized tokens (including malformed
    /// parameters) become `Custom` and are resolved against the registry later.
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        let (name, param) = match token.split_once('=') {
            Some((name, param)) => (name.trim(), Some(param.trim())),
            None => (token, None),
        };
        let number = param.and_then(|p| p.parse::<f64>().ok());

        match (name, param, number) {
            ("required", None, _) => Self::Required,
            ("omitempty", None, _) => Self::OmitEmpty,
            ("min", Some(_), Some(n)) => Self::Min(n),
            ("max", Some(_), Some(n)) => Self::Max(n),
            ("len", Some(_), Some(n)) => Self::Len(n),
            ("numeric", None, _) => Self::Numeric,
            ("alpha", None, _) => Self::Alpha,
            ("alphanum", None, _) => Self::Alphanum,
            ("email", None, _) => Self::Email,
            _ => Self::Custom(token.to_string()),
        }
    }

    /// Parse a comma-separated tag; empty tokens are ignored.
    pub fn parse_tag(tag: &str) -> Vec<Self> {
        tag.split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(Self::parse)
            .collect()
    }

    /// Tag name reported as the violation code.
    pub fn code(&self) -> &str {
        match self {
            Self::Required => "required",
            Self::OmitEmpty => "omitempty",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Len(_) => "len",
            Self::Numeric => "numeric",
            Self::Alpha => "alpha",
            Self::Alphanum => "alphanum",
            Self::Email => "email",
            Self::Custom(name) => name,
        }
    }

    /// Human message for a failure of this rule on `field`.
    pub fn message(&self, field: &str) -> String {
        match self {
            Self::Required => format!("{field} is required"),
            Self::Min(n) => format!("{field} must be at least {n} characters long"),
            Self::Max(n) => format!("{field} must be no more than {n} characters long"),
            Self::Len(n) => format!("{field} must be exactly {n} characters long"),
            Self::Email => format!("{field} must be a valid email address"),
            Self::Numeric => format!("{field} must contain only numbers"),
            Self::Alpha => format!("{field} must contain only letters"),
            Self::Alphanum => format!("{field} must contain only letters and numbers"),
            Self::Custom(name) => match name.as_str() {
                "alphanumspace" => format!("{field} must contain only letters, numbers, and spaces"),
                "companyname" => format!("{field} must be a valid company name"),
                "ssn" => format!("{field} must be a valid SSN (9 digits)"),
                "phone" => format!("{field} must be a valid phone number"),
                _ => format!("{field} is invalid"),
            },
            Self::OmitEmpty => format!("{field} is invalid"),
        }
    }

    /// Evaluate a built-in rule. `None` for `OmitEmpty` and `Custom`, which the
    /// validator handles itself.
    pub(crate) fn check(&self, value: &Value) -> Option<bool> {
        let ok = match self {
            Self::Required => !is_empty(value),
            Self::Min(n) => measure(value).is_some_and(|m| m >= *n),
            Self::Max(n) => measure(value).is_some_and(|m| m <= *n),
            Self::Len(n) => measure(value).is_some_and(|m| m == *n),
            Self::Numeric => match value {
                Value::Number(_) => true,
                Value::String(s) => NUMERIC.is_match(s),
                _ => false,
            },
            Self::Alpha => value.as_str().is_some_and(|s| ALPHA.is_match(s)),
            Self::Alphanum => value.as_str().is_some_and(|s| ALPHANUM.is_match(s)),
            Self::Email => value.as_str().is_some_and(|s| validator::validate_email(s)),
            Self::OmitEmpty | Self::Custom(_) => return None,
        };
        Some(ok)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Min(n) => write!(f, "min={n}"),
            Self::Max(n) => write!(f, "max={n}"),
            Self::Len(n) => write!(f, "len={n}"),
            other => f.write_str(other.code()),
        }
    }
}

/// Zero values: null, `""`, `0`, `false`. Empty arrays/objects are present values.
pub(crate) fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::Bool(b) => !b,
        Value::Array(_) | Value::Object(_) => false,
    }
}

// characters for strings, element count for collections, the value for numbers
fn measure(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Number(n) => n.as_f64(),
        Value::Array(a) => Some(a.len() as f64),
        Value::Object(o) => Some(o.len() as f64),
        Value::Null | Value::Bool(_) => None,
    }
}

/// ASCII letters, digits and spaces only.
pub fn alphanumspace(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.chars().all(|c| c.is_ascii_alphanumeric() || c == ' '))
}

/// Trimmed length 2..=100; letters, digits, space, `-`, `.`, `&`.
pub fn companyname(value: &Value) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    let s = s.trim();
    (2..=100).contains(&s.len())
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '.' | '&'))
}

/// Exactly nine digits once dashes and spaces are removed.
pub fn ssn(value: &Value) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    let digits: String = s.trim().chars().filter(|c| !matches!(c, '-' | ' ')).collect();
    digits.len() == 9 && digits.chars().all(|c| c.is_ascii_digit())
}

/// `+` followed by 9 to 14 digits (after trimming).
pub fn phone(value: &Value) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    let s = s.trim();
    match s.strip_prefix('+') {
        Some(digits) => (9..=14).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}
