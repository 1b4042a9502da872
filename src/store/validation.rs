//! Input validation for keys, values, and option structs.
//!
//! Everything here runs before a backend is touched, so backends never
//! observe a malformed key or value.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;

use super::types::{ExportOptions, ListOptions};
use super::value::{ConfigRecord, ConfigValue};

/// Longest accepted key, in bytes.
pub const MAX_KEY_LEN: usize = 255;

/// Deepest accepted value nesting (arrays and objects).
pub const MAX_VALUE_DEPTH: usize = 64;

static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_-]*(?:\.[a-z0-9][a-z0-9_-]*)*$").expect("valid key regex")
});

// Same alphabet as keys, but a trailing '.' is allowed ("feature.").
static PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_-]*(?:\.[a-z0-9][a-z0-9_-]*)*\.?$").expect("valid prefix regex")
});

/// A single field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

/// One or more validation failures, reported together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            issues: vec![ValidationIssue {
                field: field.into(),
                message: message.into(),
            }],
        }
    }

    /// Wraps issues collected elsewhere (e.g. while parsing a query string).
    #[must_use]
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .issues
            .iter()
            .map(|issue| format!("{}: {}", issue.field, issue.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Accumulates issues so a single call can report every problem at once.
#[derive(Debug, Default)]
struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationIssue {
            field: field.into(),
            message: message.into(),
        });
    }

    fn finish(self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { issues: self.0 })
        }
    }
}

fn check_key(issues: &mut Issues, field: &str, key: &str) {
    if key.is_empty() {
        issues.push(field, "config keys must be at least 1 character long");
    } else if key.len() > MAX_KEY_LEN {
        issues.push(field, format!("config keys must be at most {MAX_KEY_LEN} bytes"));
    } else if !KEY_RE.is_match(key) {
        issues.push(
            field,
            format!("invalid config key format: '{key}' (expected lowercase dot-delimited segments)"),
        );
    }
}

fn check_prefix(issues: &mut Issues, prefix: &str) {
    if prefix.is_empty() {
        issues.push("prefix", "prefix must not be empty");
    } else if prefix.len() > MAX_KEY_LEN {
        issues.push("prefix", format!("prefix must be at most {MAX_KEY_LEN} bytes"));
    } else if !PREFIX_RE.is_match(prefix) {
        issues.push("prefix", format!("invalid config key prefix: '{prefix}'"));
    }
}

fn check_value(issues: &mut Issues, field: &str, value: &ConfigValue) {
    if value.depth() > MAX_VALUE_DEPTH {
        issues.push(
            field,
            format!("value nesting exceeds the maximum depth of {MAX_VALUE_DEPTH}"),
        );
    }
}

/// Validates a config key.
///
/// # Errors
///
/// Returns an error if the key is empty, too long, or not lowercase
/// dot-delimited segments.
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    let mut issues = Issues::default();
    check_key(&mut issues, "key", key);
    issues.finish()
}

/// Validates a value for storage.
///
/// # Errors
///
/// Returns an error if the value nests deeper than [`MAX_VALUE_DEPTH`].
pub fn validate_value(value: &ConfigValue) -> Result<(), ValidationError> {
    let mut issues = Issues::default();
    check_value(&mut issues, "value", value);
    issues.finish()
}

/// Validates a key and value together, reporting both failures at once.
///
/// # Errors
///
/// Returns an error listing every invalid field.
pub fn validate_entry(key: &str, value: &ConfigValue) -> Result<(), ValidationError> {
    let mut issues = Issues::default();
    check_key(&mut issues, "key", key);
    check_value(&mut issues, "value", value);
    issues.finish()
}

/// Validates list options.
///
/// # Errors
///
/// Returns an error for an invalid prefix, a zero limit, or a limit/offset
/// that does not fit a signed 64-bit integer.
pub fn validate_list_options(options: &ListOptions) -> Result<(), ValidationError> {
    let mut issues = Issues::default();
    if let Some(prefix) = &options.prefix {
        check_prefix(&mut issues, prefix);
    }
    if let Some(limit) = options.limit {
        if limit < 1 {
            issues.push("limit", "limit must be at least 1");
        } else if i64::try_from(limit).is_err() {
            issues.push("limit", "limit is too large");
        }
    }
    if let Some(offset) = options.offset
        && i64::try_from(offset).is_err()
    {
        issues.push("offset", "offset is too large");
    }
    issues.finish()
}

/// Validates export options.
///
/// # Errors
///
/// Returns an error for an invalid prefix.
pub fn validate_export_options(options: &ExportOptions) -> Result<(), ValidationError> {
    let mut issues = Issues::default();
    if let Some(prefix) = &options.prefix {
        check_prefix(&mut issues, prefix);
    }
    issues.finish()
}

/// Validates every key and value in an import record.
///
/// # Errors
///
/// Returns an error listing every invalid key and value, each under the
/// field `data.<key>`.
pub fn validate_record(records: &ConfigRecord) -> Result<(), ValidationError> {
    let mut issues = Issues::default();
    for (key, value) in records {
        let field = format!("data.{key}");
        check_key(&mut issues, &field, key);
        check_value(&mut issues, &field, value);
    }
    issues.finish()
}

/// Converts an arbitrary JSON document into an import record.
///
/// The document must be a flat object; arrays and scalars are rejected.
/// Keys and values are validated as with [`validate_record`].
///
/// # Errors
///
/// Returns an error if the document is not an object or holds invalid
/// keys or values.
pub fn record_from_json(document: serde_json::Value) -> Result<ConfigRecord, ValidationError> {
    let serde_json::Value::Object(map) = document else {
        let kind = match document {
            serde_json::Value::Array(_) => "an array",
            serde_json::Value::Null => "null",
            _ => "a scalar",
        };
        return Err(ValidationError::single(
            "data",
            format!("expected an object of key/value pairs, got {kind}"),
        ));
    };
    let records: ConfigRecord = map
        .into_iter()
        .map(|(key, value)| (key, ConfigValue::from(value)))
        .collect();
    validate_record(&records)?;
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_keys() {
        for key in ["app.debug", "sample", "k1", "feature.beta-flag", "db.pool_size", "a.b.c.d"] {
            assert!(validate_key(key).is_ok(), "{key} should be valid");
        }
    }

    #[test]
    fn test_invalid_keys() {
        for key in [
            "",
            "INVALID-KEY",
            "Invalid Key",
            "app..debug",
            ".app",
            "app.",
            "app.Debug",
            "-app",
            "app/debug",
            "app.déjà",
        ] {
            let err = validate_key(key).unwrap_err();
            assert_eq!(err.issues()[0].field, "key", "{key} should be rejected");
        }
    }

    #[test]
    fn test_key_length_limit() {
        let long = "a".repeat(MAX_KEY_LEN + 1);
        assert!(validate_key(&long).is_err());
        assert!(validate_key(&"a".repeat(MAX_KEY_LEN)).is_ok());
    }

    #[test]
    fn test_prefix_allows_trailing_dot() {
        let options = ListOptions::default().with_prefix("feature.");
        assert!(validate_list_options(&options).is_ok());
        let options = ListOptions::default().with_prefix("Feature.");
        assert!(validate_list_options(&options).is_err());
        assert!(validate_export_options(&ExportOptions::with_prefix("app")).is_ok());
        assert!(validate_export_options(&ExportOptions::with_prefix("")).is_err());
    }

    #[test]
    fn test_list_limit_must_be_positive() {
        let err = validate_list_options(&ListOptions::default().with_limit(0)).unwrap_err();
        assert_eq!(err.issues()[0].field, "limit");
        assert!(validate_list_options(&ListOptions::default().with_offset(0)).is_ok());
        assert!(validate_list_options(&ListOptions::default().with_limit(u64::MAX)).is_err());
    }

    #[test]
    fn test_reports_every_issue() {
        let options = ListOptions {
            prefix: Some("BAD".to_string()),
            include_values: None,
            limit: Some(0),
            offset: None,
        };
        let err = validate_list_options(&options).unwrap_err();
        let fields: Vec<_> = err.issues().iter().map(|i| i.field.as_str()).collect();
        assert_eq!(fields, vec!["prefix", "limit"]);
    }

    #[test]
    fn test_value_depth_limit() {
        let mut value = ConfigValue::Null;
        for _ in 0..=MAX_VALUE_DEPTH {
            value = ConfigValue::Array(vec![value]);
        }
        assert!(validate_value(&value).is_err());
        let ConfigValue::Array(mut inner) = value else {
            unreachable!()
        };
        assert!(validate_value(&inner.remove(0)).is_ok());
    }

    #[test]
    fn test_record_from_json_rejects_non_objects() {
        let err = record_from_json(json!([1, 2])).unwrap_err();
        assert_eq!(err.issues()[0].field, "data");
        assert!(record_from_json(json!("text")).is_err());
        assert!(record_from_json(json!(null)).is_err());
    }

    #[test]
    fn test_record_from_json_validates_keys() {
        let err = record_from_json(json!({"app.debug": true, "Bad Key": 1})).unwrap_err();
        assert_eq!(err.issues().len(), 1);
        assert_eq!(err.issues()[0].field, "data.Bad Key");

        let records = record_from_json(json!({"app.debug": true, "feature.alpha": false})).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records["app.debug"], ConfigValue::Bool(true));
    }

    #[test]
    fn test_display_joins_issues() {
        let err = validate_entry("BAD", &ConfigValue::Null).unwrap_err();
        assert!(err.to_string().starts_with("key: invalid config key format"));
    }
}
