//! Declarative validation and input sanitization.
mod result;
pub mod rules;
mod sanitizer;
mod validator_service;

pub use result::{ValidationError, ValidationResult};
pub use rules::Rule;
pub use sanitizer::Sanitizer;
pub use validator_service::{CustomRule, Schema, Validatable, ValidatorService};
