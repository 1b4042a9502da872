//! Config store commands.
//!
//! Each command returns a serializable result; [`emit`] prints it either as
//! pretty JSON (`--json`) or as plain text.
//!
//! - `confkv get <key>` - Print a value
//! - `confkv set <key> [value] [--stdin]` - Write a value
//! - `confkv unset <key>` - Remove a key
//! - `confkv list [--prefix] [--limit] [--offset] [--values]` - List keys
//! - `confkv import (--file <path> | --stdin) [--mode]` - Bulk write from a JSON object
//! - `confkv export [--prefix]` - Print the store as a JSON object

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use confkv::store::{
    ConfigEntry, ConfigRecord, ConfigValue, ExportOptions, ImportMode, ImportOptions, ListOptions,
    record_from_json,
};

use super::values::parse_value_input;
use super::{Mode, StoreContext, print_json, read_stdin};

/// Plain-text rendering of a command result.
pub trait Report: Serialize {
    fn print_text(&self);
}

/// Prints `report` as JSON or text.
pub fn emit<R: Report>(report: &R, json: bool) -> Result<()> {
    if json {
        print_json(report)
    } else {
        report.print_text();
        Ok(())
    }
}

fn pretty(value: &ConfigValue) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_json_string())
}

// ============================================================================
// get
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GetResult {
    pub key: String,
    pub found: bool,
    pub value: Option<ConfigValue>,
    pub mode: Mode,
}

impl Report for GetResult {
    fn print_text(&self) {
        match &self.value {
            Some(value) if self.found => println!("{}", pretty(value)),
            _ => eprintln!("Warning: Key \"{}\" was not found.", self.key),
        }
    }
}

pub async fn get(ctx: &StoreContext, key: &str) -> Result<GetResult> {
    let entry = ctx.service.get(key).await?;
    Ok(GetResult {
        key: key.to_string(),
        found: entry.is_some(),
        value: entry.map(|e| e.value),
        mode: ctx.mode,
    })
}

// ============================================================================
// set
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SetResult {
    pub key: String,
    pub value: ConfigValue,
    pub mode: Mode,
}

impl Report for SetResult {
    fn print_text(&self) {
        println!("Updated {} = {}", self.key, pretty(&self.value));
    }
}

/// Writes `raw` (or standard input when `raw` is `None`) to `key`.
pub async fn set(ctx: &StoreContext, key: &str, raw: Option<&str>) -> Result<SetResult> {
    let raw = match raw {
        Some(raw) => raw.to_string(),
        None => read_stdin().await?,
    };
    let value = parse_value_input(&raw);
    let entry = ctx.service.set(key, value).await?;
    Ok(SetResult {
        key: entry.key,
        value: entry.value,
        mode: ctx.mode,
    })
}

// ============================================================================
// unset
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UnsetResult {
    pub key: String,
    pub mode: Mode,
    pub removed: bool,
}

impl Report for UnsetResult {
    fn print_text(&self) {
        if self.removed {
            println!("Removed {}", self.key);
        } else {
            eprintln!("Warning: Key \"{}\" did not exist.", self.key);
        }
    }
}

pub async fn unset(ctx: &StoreContext, key: &str) -> Result<UnsetResult> {
    let existing = ctx.service.get(key).await?;
    ctx.service.unset(key).await?;
    Ok(UnsetResult {
        key: key.to_string(),
        mode: ctx.mode,
        removed: existing.is_some(),
    })
}

// ============================================================================
// list
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ListResult {
    pub entries: Vec<ConfigEntry>,
    pub mode: Mode,
    #[serde(skip)]
    pub show_values: bool,
}

impl Report for ListResult {
    fn print_text(&self) {
        if self.entries.is_empty() {
            println!("No configuration entries found.");
            return;
        }
        for entry in &self.entries {
            if self.show_values {
                println!("{}\t{}", entry.key, entry.value);
            } else {
                println!("{}", entry.key);
            }
        }
    }
}

pub async fn list(ctx: &StoreContext, options: ListOptions) -> Result<ListResult> {
    let show_values = options.include_values.unwrap_or(false);
    let entries = ctx.service.list(options).await?;
    Ok(ListResult {
        entries,
        mode: ctx.mode,
        show_values,
    })
}

// ============================================================================
// import
// ============================================================================

/// Where an import payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSource {
    File,
    Stdin,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub imported: Vec<ConfigEntry>,
    pub mode: ImportMode,
    pub source: ImportSource,
    pub mode_name: Mode,
}

impl Report for ImportResult {
    fn print_text(&self) {
        let count = self.imported.len();
        let noun = if count == 1 { "entry" } else { "entries" };
        println!("Imported {count} {noun} ({})", self.mode);
    }
}

/// Parses an import payload; it must be a JSON object of key/value pairs.
pub fn parse_import_payload(text: &str) -> Result<ConfigRecord> {
    let document: serde_json::Value =
        serde_json::from_str(text).context("Failed to parse JSON")?;
    if !document.is_object() {
        anyhow::bail!("Failed to parse JSON: Expected a JSON object with key/value pairs");
    }
    Ok(record_from_json(document)?)
}

/// Imports from `file`, or standard input when `file` is `None`.
pub async fn import(
    ctx: &StoreContext,
    file: Option<&Path>,
    mode: ImportMode,
) -> Result<ImportResult> {
    let (text, source) = match file {
        Some(path) => {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read import file: {}", path.display()))?;
            (text, ImportSource::File)
        },
        None => (read_stdin().await?, ImportSource::Stdin),
    };
    let records = parse_import_payload(&text)?;
    let imported = ctx.service.import(records, ImportOptions { mode }).await?;
    Ok(ImportResult {
        imported,
        mode,
        source,
        mode_name: ctx.mode,
    })
}

// ============================================================================
// export
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ExportResult {
    pub data: ConfigRecord,
    pub mode: Mode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl Report for ExportResult {
    fn print_text(&self) {
        match serde_json::to_string_pretty(&self.data) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Error: Failed to render export: {e}"),
        }
    }
}

pub async fn export(ctx: &StoreContext, prefix: Option<String>) -> Result<ExportResult> {
    let data = ctx
        .service
        .export(ExportOptions {
            prefix: prefix.clone(),
        })
        .await?;
    Ok(ExportResult {
        data,
        mode: ctx.mode,
        prefix,
    })
}
