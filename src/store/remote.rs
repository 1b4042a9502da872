//! Remote configuration store.
//!
//! Forwards every repository call as one HTTP request to a peer that serves
//! the `/config` routes (see [`crate::server`]). Responses are checked
//! field by field; anything unexpected becomes a [`ProtocolError`].

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Serialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::error::{ProtocolError, Result};
use super::repository::ConfigRepository;
use super::types::{ConfigEntry, ExportOptions, ImportMode, ImportOptions, ListOptions};
use super::value::{ConfigRecord, ConfigValue};

/// Per-request timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Serialize)]
struct SetBody<'a> {
    value: &'a ConfigValue,
}

#[derive(Serialize)]
struct ImportBody<'a> {
    data: &'a ConfigRecord,
    mode: ImportMode,
}

/// HTTP client for a remote configuration peer.
///
/// The base URL may carry a path prefix (`https://host/v1`); operation
/// paths are appended to it.
#[derive(Clone)]
pub struct RemoteRepository {
    client: Client,
    base_url: Url,
}

impl RemoteRepository {
    /// Creates a client for `base_url` with a per-request `timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse, is not `http(s)`, or the
    /// HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Self::with_client(base_url, client)
    }

    /// Creates a repository around an existing `reqwest` client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not parse or is not `http(s)`.
    pub fn with_client(base_url: &str, client: Client) -> anyhow::Result<Self> {
        let base_url = parse_base_url(base_url)?;
        debug!(base_url = %base_url, "Created remote config client");
        Ok(Self { client, base_url })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // parse_base_url rejects cannot-be-a-base URLs, so this always applies.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn fetch_entry(
        &self,
        key: &str,
    ) -> std::result::Result<Option<ConfigEntry>, ProtocolError> {
        let response = self.client.get(self.endpoint(&["config", key])).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = success_json(response).await?;
        entry_from_json(body).map(Some)
    }

    async fn put_entry(
        &self,
        key: &str,
        value: &ConfigValue,
    ) -> std::result::Result<ConfigEntry, ProtocolError> {
        let response = self
            .client
            .put(self.endpoint(&["config", key]))
            .json(&SetBody { value })
            .send()
            .await?;
        entry_from_json(success_json(response).await?)
    }

    async fn delete_entry(&self, key: &str) -> std::result::Result<(), ProtocolError> {
        let response = self
            .client
            .delete(self.endpoint(&["config", key]))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(%key, "Remote reported key already absent");
            return Ok(());
        }
        ensure_success(response).await?;
        Ok(())
    }

    async fn fetch_list(
        &self,
        options: &ListOptions,
    ) -> std::result::Result<Vec<ConfigEntry>, ProtocolError> {
        let mut url = self.endpoint(&["config"]);
        {
            let mut query = url.query_pairs_mut();
            if let Some(prefix) = &options.prefix {
                query.append_pair("prefix", prefix);
            }
            if let Some(limit) = options.limit {
                query.append_pair("limit", &limit.to_string());
            }
            if let Some(offset) = options.offset {
                query.append_pair("offset", &offset.to_string());
            }
            if options.include_values == Some(true) {
                query.append_pair("includeValues", "true");
            }
        }
        strip_empty_query(&mut url);

        let response = self.client.get(url).send().await?;
        entries_from_json(success_json(response).await?)
    }

    async fn post_import(
        &self,
        records: &ConfigRecord,
        mode: ImportMode,
    ) -> std::result::Result<Vec<ConfigEntry>, ProtocolError> {
        let response = self
            .client
            .post(self.endpoint(&["config:import"]))
            .json(&ImportBody {
                data: records,
                mode,
            })
            .send()
            .await?;
        entries_from_json(success_json(response).await?)
    }

    async fn fetch_export(
        &self,
        options: &ExportOptions,
    ) -> std::result::Result<ConfigRecord, ProtocolError> {
        let mut url = self.endpoint(&["config:export"]);
        if let Some(prefix) = &options.prefix {
            url.query_pairs_mut().append_pair("prefix", prefix);
        }
        let response = self.client.get(url).send().await?;
        record_from_payload(success_json(response).await?)
    }
}

#[async_trait]
impl ConfigRepository for RemoteRepository {
    async fn get(&self, key: &str) -> Result<Option<ConfigEntry>> {
        debug!(%key, "remote get");
        Ok(self.fetch_entry(key).await?)
    }

    async fn set(&self, key: &str, value: ConfigValue) -> Result<ConfigEntry> {
        debug!(%key, "remote set");
        Ok(self.put_entry(key, &value).await?)
    }

    async fn unset(&self, key: &str) -> Result<()> {
        debug!(%key, "remote unset");
        Ok(self.delete_entry(key).await?)
    }

    async fn list(&self, options: ListOptions) -> Result<Vec<ConfigEntry>> {
        Ok(self.fetch_list(&options).await?)
    }

    async fn import(
        &self,
        records: ConfigRecord,
        options: ImportOptions,
    ) -> Result<Vec<ConfigEntry>> {
        debug!(count = records.len(), mode = %options.mode, "remote import");
        Ok(self.post_import(&records, options.mode).await?)
    }

    async fn export(&self, options: ExportOptions) -> Result<ConfigRecord> {
        Ok(self.fetch_export(&options).await?)
    }
}

fn parse_base_url(raw: &str) -> anyhow::Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("Invalid remote URL '{raw}'"))?;
    anyhow::ensure!(
        matches!(url.scheme(), "http" | "https"),
        "Remote URL must use http or https, got '{}'",
        url.scheme()
    );
    anyhow::ensure!(!url.cannot_be_a_base(), "Remote URL '{raw}' cannot carry a path");
    Ok(url)
}

// `query_pairs_mut` leaves a dangling `?` when nothing was appended.
fn strip_empty_query(url: &mut Url) {
    if url.query() == Some("") {
        url.set_query(None);
    }
}

async fn ensure_success(response: Response) -> std::result::Result<Response, ProtocolError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => format!("<unreadable body: {e}>"),
    };
    Err(ProtocolError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn success_json(response: Response) -> std::result::Result<Value, ProtocolError> {
    let response = ensure_success(response).await?;
    let text = response.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| ProtocolError::invalid(format!("response is not JSON: {e}")))
}

fn entry_field<'a>(
    map: &'a Map<String, Value>,
    field: &str,
) -> std::result::Result<&'a Value, ProtocolError> {
    map.get(field)
        .ok_or_else(|| ProtocolError::invalid(format!("entry is missing '{field}'")))
}

/// Checks one `{id, key, value, updatedAt}` object.
pub(crate) fn entry_from_json(payload: Value) -> std::result::Result<ConfigEntry, ProtocolError> {
    let Value::Object(mut map) = payload else {
        return Err(ProtocolError::invalid("entry is not an object"));
    };

    let id = entry_field(&map, "id")?
        .as_i64()
        .ok_or_else(|| ProtocolError::invalid("entry 'id' is not an integer"))?;
    let key = entry_field(&map, "key")?
        .as_str()
        .ok_or_else(|| ProtocolError::invalid("entry 'key' is not a string"))?
        .to_string();
    let raw_updated = entry_field(&map, "updatedAt")?
        .as_str()
        .ok_or_else(|| ProtocolError::invalid("entry 'updatedAt' is not a string"))?;
    let updated_at = DateTime::parse_from_rfc3339(raw_updated)
        .map_err(|e| {
            ProtocolError::invalid(format!("entry 'updatedAt' is not a timestamp: {e}"))
        })?
        .with_timezone(&Utc);
    let value = map
        .remove("value")
        .ok_or_else(|| ProtocolError::invalid("entry is missing 'value'"))?;

    Ok(ConfigEntry {
        id,
        key,
        value: ConfigValue::from(value),
        updated_at,
    })
}

fn entries_from_json(payload: Value) -> std::result::Result<Vec<ConfigEntry>, ProtocolError> {
    let Value::Array(items) = payload else {
        return Err(ProtocolError::invalid("expected an array of entries"));
    };
    items.into_iter().map(entry_from_json).collect()
}

fn record_from_payload(payload: Value) -> std::result::Result<ConfigRecord, ProtocolError> {
    let Value::Object(map) = payload else {
        return Err(ProtocolError::invalid("export payload is not an object"));
    };
    Ok(map
        .into_iter()
        .map(|(key, value)| (key, ConfigValue::from(value)))
        .collect())
}
