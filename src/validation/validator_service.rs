use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::result::{GENERIC_FIELD, ValidationError, ValidationResult};
use super::rules::{self, Rule};

/// A named custom check over a JSON value.
pub type CustomRule = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Ordered `(field path, rules)` pairs. Dotted paths address nested objects
/// (`"address.city"`); numeric segments index arrays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<(String, Vec<Rule>)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field with a tag such as `"required,min=2,max=50"`.
    pub fn field(self, path: impl Into<String>, tag: &str) -> Self {
        self.rules(path, Rule::parse_tag(tag))
    }

    pub fn rules(mut self, path: impl Into<String>, rules: Vec<Rule>) -> Self {
        self.fields.push((path.into(), rules));
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[Rule])> {
        self.fields.iter().map(|(p, r)| (p.as_str(), r.as_slice()))
    }
}

/// DTOs that describe their own validation rules.
pub trait Validatable: Serialize {
    fn schema() -> Schema;
}

/// Rule evaluator with a registry of named custom rules.
///
/// Immutable once built and safe to share across requests.
#[derive(Clone)]
pub struct ValidatorService {
    custom: HashMap<String, CustomRule>,
}

impl fmt::Debug for ValidatorService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.custom.keys().collect();
        names.sort();
        f.debug_struct("ValidatorService").field("custom", &names).finish()
    }
}

impl Default for ValidatorService {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorService {
    /// Validator with `alphanumspace`, `companyname`, `ssn` and `phone` registered.
    pub fn new() -> Self {
        let mut service = Self {
            custom: HashMap::new(),
        };
        service.register("alphanumspace", rules::alphanumspace);
        service.register("companyname", rules::companyname);
        service.register("ssn", rules::ssn);
        service.register("phone", rules::phone);
        service
    }

    /// Register (or replace) a named custom rule.
    pub fn register<F>(&mut self, name: &str, check: F) -> &mut Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.custom.insert(name.to_string(), Arc::new(check));
        self
    }

    pub fn validate<T: Validatable>(&self, value: &T) -> ValidationResult {
        self.validate_struct(value, &T::schema())
    }

    /// Validate a serializable value against `schema`.
    ///
    /// Anything that does not serialize to a JSON object (including `None`) yields
    /// the single generic violation, as does a rule name nobody registered.
    pub fn validate_struct<T: Serialize + ?Sized>(&self, value: &T, schema: &Schema) -> ValidationResult {
        let root = match serde_json::to_value(value) {
            Ok(v @ Value::Object(_)) => v,
            _ => return ValidationResult::generic(),
        };

        let mut errors = Vec::new();
        for (path, rules) in schema.fields() {
            let value = lookup(&root, path);
            match self.first_failure(value, rules) {
                Ok(None) => {}
                Ok(Some(rule)) => {
                    errors.push(ValidationError::new(path, rule.message(path), rule.code()))
                }
                Err(()) => return ValidationResult::generic(),
            }
        }
        ValidationResult::from_errors(errors)
    }

    /// Validate a single value against a tag; violations are reported on `"field"`.
    pub fn validate_field<T: Serialize + ?Sized>(&self, value: &T, tag: &str) -> ValidationResult {
        let Ok(value) = serde_json::to_value(value) else {
            return ValidationResult::generic();
        };
        match self.first_failure(&value, &Rule::parse_tag(tag)) {
            Ok(None) => ValidationResult::valid(),
            Ok(Some(rule)) => ValidationResult::from_errors(vec![ValidationError::new(
                GENERIC_FIELD,
                rule.message(GENERIC_FIELD),
                rule.code(),
            )]),
            Err(()) => ValidationResult::generic(),
        }
    }

    // First failing rule for the value; Err(()) when a rule is not registered.
    fn first_failure<'r>(&self, value: &Value, rules: &'r [Rule]) -> Result<Option<&'r Rule>, ()> {
        for rule in rules {
            let ok = match rule {
                Rule::OmitEmpty if rules::is_empty(value) => return Ok(None),
                Rule::OmitEmpty => true,
                Rule::Custom(name) => match self.custom.get(name) {
                    Some(check) => check(value),
                    None => {
                        tracing::warn!(rule = %name, "unknown validation rule");
                        return Err(());
                    }
                },
                builtin => builtin.check(value).unwrap_or(true),
            };
            if !ok {
                return Ok(Some(rule));
            }
        }
        Ok(None)
    }
}

fn lookup<'a>(root: &'a Value, path: &str) -> &'a Value {
    let mut current = root;
    for segment in path.split('.') {
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => current = v,
            None => return &Value::Null,
        }
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Serialize)]
    struct Signup {
        name: String,
        email: String,
        phone: Option<String>,
        company: Company,
    }

    #[derive(Serialize)]
    struct Company {
        name: String,
    }

    impl Validatable for Signup {
        fn schema() -> Schema {
            Schema::new()
                .field("name", "required,min=2,max=50,alphanumspace")
                .field("email", "required,email")
                .field("phone", "omitempty,phone")
                .field("company.name", "required,companyname")
        }
    }

    fn signup() -> Signup {
        Signup {
            name: "Ada Lovelace".into(),
            email: "ada@example.com".into(),
            phone: None,
            company: Company {
                name: "Analytical Engines Ltd.".into(),
            },
        }
    }

    #[test]
    fn valid_struct_passes() {
        let result = ValidatorService::new().validate(&signup());
        assert!(result.is_valid, "{result}");
        assert!(result.errors.is_empty());
    }

    #[test]
    fn violations_are_reported_in_schema_order_one_per_field() {
        let mut s = signup();
        s.name = "A".into();
        s.email = "nope".into();
        s.phone = Some("555-1234".into());
        s.company.name = "!".into();

        let result = ValidatorService::new().validate(&s);
        assert!(!result.is_valid);
        let got: Vec<_> = result
            .errors
            .iter()
            .map(|e| (e.field.as_str(), e.code.as_str(), e.message.as_str()))
            .collect();
        assert_eq!(
            got,
            vec![
                ("name", "min", "name must be at least 2 characters long"),
                ("email", "email", "email must be a valid email address"),
                ("phone", "phone", "phone must be a valid phone number"),
                ("company.name", "companyname", "company.name must be a valid company name"),
            ]
        );
    }

    #[test]
    fn missing_required_field() {
        let value = json!({"email": "ada@example.com"});
        let schema = Schema::new().field("name", "required").field("email", "required,email");
        let result = ValidatorService::new().validate_struct(&value, &schema);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].message, "name is required");
        assert_eq!(result.errors[0].code, "required");
    }

    #[test]
    fn non_object_input_yields_generic_violation() {
        let service = ValidatorService::new();
        let schema = Schema::new().field("name", "required");

        let none: Option<Signup> = None;
        assert_eq!(service.validate_struct(&none, &schema), ValidationResult::generic());
        assert_eq!(service.validate_struct("just a string", &schema), ValidationResult::generic());
    }

    #[test]
    fn unknown_rule_yields_generic_violation() {
        let schema = Schema::new().field("name", "required,shouty");
        let result = ValidatorService::new().validate_struct(&json!({"name": "x"}), &schema);
        assert_eq!(result, ValidationResult::generic());
    }

    #[test]
    fn registered_rules_are_used() {
        let mut service = ValidatorService::new();
        service.register("shouty", |v| v.as_str().is_some_and(|s| s == s.to_uppercase()));

        let schema = Schema::new().field("name", "required,shouty");
        assert!(service.validate_struct(&json!({"name": "ADA"}), &schema).is_valid);

        let result = service.validate_struct(&json!({"name": "Ada"}), &schema);
        assert_eq!(result.errors[0].message, "name is invalid");
        assert_eq!(result.errors[0].code, "shouty");
    }

    #[test]
    fn validate_field_uses_generic_field_name() {
        let service = ValidatorService::new();
        assert!(service.validate_field("123-45-6789", "required,ssn").is_valid);

        let result = service.validate_field("", "required,email");
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "field");
        assert_eq!(result.errors[0].message, "field is required");

        let result = service.validate_field(&5, "min=10");
        assert_eq!(result.errors[0].code, "min");
    }

    #[test]
    fn omitempty_skips_empty_values_only() {
        let service = ValidatorService::new();
        assert!(service.validate_field("", "omitempty,email").is_valid);
        assert!(!service.validate_field("x", "omitempty,email").is_valid);
    }

    #[test]
    fn array_paths_are_indexed() {
        let value = json!({"tags": ["ok", ""]});
        let schema = Schema::new().field("tags.0", "required").field("tags.1", "required");
        let result = ValidatorService::new().validate_struct(&value, &schema);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].field, "tags.1");
    }

    #[test]
    fn concurrent_validation_does_not_interfere() {
        let service = Arc::new(ValidatorService::new());
        let schema = Schema::new().field("n", "required,min=3");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let service = service.clone();
                let schema = schema.clone();
                std::thread::spawn(move || {
                    let name = "x".repeat(i);
                    let result = service.validate_struct(&json!({"n": name}), &schema);
                    (i, result.is_valid)
                })
            })
            .collect();

        for handle in handles {
            let (i, valid) = handle.join().unwrap();
            assert_eq!(valid, i >= 3, "length {i}");
        }
    }
}
