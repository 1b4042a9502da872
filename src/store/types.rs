//! Entry and option types for the configuration store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::validation::ValidationError;
use super::value::ConfigValue;

/// A stored key/value pair plus its metadata.
///
/// Serializes to the wire shape `{id, key, value, updatedAt}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEntry {
    /// Backend-assigned id; reused when a key is overwritten.
    pub id: i64,
    pub key: String,
    pub value: ConfigValue,
    pub updated_at: DateTime<Utc>,
}

/// Options for `list`.
///
/// `None` for `limit`/`offset` means "no restriction", not zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub include_values: Option<bool>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl ListOptions {
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn with_values(mut self, include_values: bool) -> Self {
        self.include_values = Some(include_values);
        self
    }
}

/// Bulk import semantics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportMode {
    /// Upsert the given keys, leave every other key untouched.
    #[default]
    Merge,
    /// Leave the store containing exactly the given keys.
    Replace,
}

impl ImportMode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Merge => "merge",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for ImportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "merge" => Ok(Self::Merge),
            "replace" => Ok(Self::Replace),
            other => Err(ValidationError::single(
                "mode",
                format!("expected 'merge' or 'replace', got '{other}'"),
            )),
        }
    }
}

/// Options for `import`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    pub mode: ImportMode,
}

impl ImportOptions {
    #[must_use]
    pub fn merge() -> Self {
        Self {
            mode: ImportMode::Merge,
        }
    }

    #[must_use]
    pub fn replace() -> Self {
        Self {
            mode: ImportMode::Replace,
        }
    }
}

/// Options for `export`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportOptions {
    pub prefix: Option<String>,
}

impl ExportOptions {
    #[must_use]
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }
}
