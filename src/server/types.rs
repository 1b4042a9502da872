//! Request and response types for the HTTP API.

use serde::{Deserialize, Serialize};

use crate::store::{ConfigValue, ValidationIssue};

// ============================================================================
// Config
// ============================================================================

/// Query string for `GET /config`.
///
/// Everything arrives as text so that bad numbers and booleans can be
/// reported as field-level 400s instead of a generic rejection.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub prefix: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub include_values: Option<String>,
}

/// Query string for `GET /config:export`.
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub prefix: Option<String>,
}

/// Body for `PUT /config/{key}`.
#[derive(Debug, Deserialize)]
pub struct SetRequest {
    pub value: ConfigValue,
}

/// Body for `POST /config:import`.
#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    #[serde(default)]
    pub mode: Option<String>,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
}

// ============================================================================
// Errors
// ============================================================================

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<ValidationIssue>,
}
