//! Path utilities for confkv.
//!
//! # Embedded database
//! - [`resolve_db_path`] - `--db`, then `CONFKV_DB_PATH`, then
//!   `<config dir>/confkv/confkv.db`
//!
//! # Base directories
//! - [`get_confkv_dir`] - `<config dir>/confkv/` (`~/.config/confkv` on Linux)

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the embedded database location.
pub const DB_PATH_ENV: &str = "CONFKV_DB_PATH";

/// File name of the embedded database inside [`get_confkv_dir`].
pub const DB_FILE_NAME: &str = "confkv.db";

// =============================================================================
// Base Directories
// =============================================================================

/// Get the confkv configuration directory: `<config dir>/confkv/`
pub fn get_confkv_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().context("Failed to determine the platform config directory")?;
    Ok(base.join("confkv"))
}

// =============================================================================
// Embedded Database
// =============================================================================

/// Resolve the embedded database path.
///
/// Resolution order:
/// 1. `flag` (the `--db` option), if non-blank
/// 2. `CONFKV_DB_PATH` environment variable, if non-blank
/// 3. `<config dir>/confkv/confkv.db`
pub fn resolve_db_path(flag: Option<&Path>) -> Result<PathBuf> {
    resolve_db_path_with(flag, std::env::var(DB_PATH_ENV).ok().as_deref())
}

fn resolve_db_path_with(flag: Option<&Path>, env_value: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = flag
        && !path.as_os_str().is_empty()
    {
        return Ok(path.to_path_buf());
    }

    if let Some(value) = env_value.map(str::trim)
        && !value.is_empty()
    {
        return Ok(PathBuf::from(value));
    }

    Ok(get_confkv_dir()?.join(DB_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_wins() {
        let path = resolve_db_path_with(Some(Path::new("/tmp/a.db")), Some("/tmp/b.db")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/a.db"));
    }

    #[test]
    fn test_env_used_without_flag() {
        let path = resolve_db_path_with(None, Some(" /tmp/b.db ")).unwrap();
        assert_eq!(path, PathBuf::from("/tmp/b.db"));
    }

    #[test]
    fn test_blank_values_fall_through_to_config_dir() {
        let Ok(dir) = get_confkv_dir() else {
            // No config directory on this platform/user; nothing to compare.
            return;
        };
        let path = resolve_db_path_with(Some(Path::new("")), Some("  ")).unwrap();
        assert_eq!(path, dir.join(DB_FILE_NAME));
        assert!(path.ends_with("confkv/confkv.db"));
    }
}
