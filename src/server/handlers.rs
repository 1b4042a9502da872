//! Config route handlers.
//!
//! Each handler turns its query string or body into a [`ConfigService`]
//! call. Validation failures come back as 400 with field-level issues.

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use tracing::debug;

use super::AppError;
use super::types::{ExportQuery, HealthResponse, ImportRequest, ListQuery, SetRequest};
use crate::store::{
    ConfigEntry, ConfigRecord, ConfigService, ExportOptions, ImportMode, ImportOptions,
    ListOptions, ValidationError, ValidationIssue, record_from_json,
};

/// GET /health
pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

/// GET /config - List entries with optional prefix, paging, and values flag.
pub(crate) async fn config_list(
    State(service): State<ConfigService>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<ConfigEntry>>, AppError> {
    let Query(query) = query.map_err(|e| AppError::bad_request(e.body_text()))?;
    let options = list_options(query)?;
    let entries = service.list(options).await?;
    debug!(count = entries.len(), "Listed config entries");
    Ok(Json(entries))
}

/// GET /config/{key} - Get a single entry.
pub(crate) async fn config_get(
    State(service): State<ConfigService>,
    Path(key): Path<String>,
) -> Result<Json<ConfigEntry>, AppError> {
    let entry = service.get(&key).await?.ok_or_else(|| {
        AppError::NotFound(format!("Config key \"{key}\" was not found"))
    })?;
    Ok(Json(entry))
}

/// PUT /config/{key} - Insert or overwrite an entry.
pub(crate) async fn config_set(
    State(service): State<ConfigService>,
    Path(key): Path<String>,
    body: Result<Json<SetRequest>, JsonRejection>,
) -> Result<Json<ConfigEntry>, AppError> {
    let Json(request) = body.map_err(|e| AppError::bad_request(e.body_text()))?;
    let entry = service.set(&key, request.value).await?;
    Ok(Json(entry))
}

/// DELETE /config/{key} - Remove an entry; missing keys still succeed.
pub(crate) async fn config_unset(
    State(service): State<ConfigService>,
    Path(key): Path<String>,
) -> Result<StatusCode, AppError> {
    service.unset(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /config:import - Merge or replace a batch of entries.
pub(crate) async fn config_import(
    State(service): State<ConfigService>,
    body: Result<Json<ImportRequest>, JsonRejection>,
) -> Result<Json<Vec<ConfigEntry>>, AppError> {
    let Json(request) = body.map_err(|e| AppError::bad_request(e.body_text()))?;
    let mode = match request.mode.as_deref() {
        Some(raw) => raw.parse::<ImportMode>()?,
        None => ImportMode::default(),
    };
    let records = record_from_json(request.data.unwrap_or(serde_json::Value::Null))?;
    let entries = service.import(records, ImportOptions { mode }).await?;
    Ok(Json(entries))
}

/// GET /config:export - Key→value map, optionally under a prefix.
pub(crate) async fn config_export(
    State(service): State<ConfigService>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> Result<Json<ConfigRecord>, AppError> {
    let Query(query) = query.map_err(|e| AppError::bad_request(e.body_text()))?;
    // An empty prefix means "everything", unlike on `GET /config`.
    let prefix = query.prefix.filter(|p| !p.is_empty());
    let record = service.export(ExportOptions { prefix }).await?;
    Ok(Json(record))
}

// ============================================================================
// Query parsing
// ============================================================================

fn list_options(query: ListQuery) -> Result<ListOptions, ValidationError> {
    let mut issues = Vec::new();
    let mut field = |name: &str, message: String| {
        issues.push(ValidationIssue {
            field: name.to_string(),
            message,
        });
    };

    let limit = match query.limit.as_deref().map(parse_count) {
        Some(Err(message)) => {
            field("limit", message);
            None
        },
        Some(Ok(limit)) => Some(limit),
        None => None,
    };
    let offset = match query.offset.as_deref().map(parse_count) {
        Some(Err(message)) => {
            field("offset", message);
            None
        },
        Some(Ok(offset)) => Some(offset),
        None => None,
    };
    let include_values = match query.include_values.as_deref().map(parse_flag) {
        Some(Err(message)) => {
            field("includeValues", message);
            None
        },
        Some(Ok(flag)) => Some(flag),
        None => None,
    };

    if !issues.is_empty() {
        return Err(ValidationError::from_issues(issues));
    }
    Ok(ListOptions {
        prefix: query.prefix,
        include_values,
        limit,
        offset,
    })
}

/// Parses a non-negative decimal integer.
pub(crate) fn parse_count(raw: &str) -> Result<u64, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("expected a non-negative integer, got '{raw}'"));
    }
    trimmed
        .parse()
        .map_err(|_| format!("'{raw}' is too large"))
}

/// Parses `true|false|1|0`, case-insensitively.
pub(crate) fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(format!("expected true, false, 1 or 0, got '{raw}'")),
    }
}
