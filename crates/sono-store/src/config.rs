//! Data directory resolution and the optional `sono.toml` config file.

use std::path::{Path, PathBuf};
use std::{env, fs};

use sono_core::AnalyzerConfig;

use crate::error::{Result, StoreError};

pub const CONFIG_FILE: &str = "sono.toml";
pub const DATABASE_FILE: &str = "sono.db";
pub const DATA_DIR_ENV: &str = "SONO_DATA_DIR";

/// `$SONO_DATA_DIR`, or `~/.sonotope`.
pub fn default_base_dir() -> PathBuf {
    match env::var_os(DATA_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs_home().join(".sonotope"),
    }
}

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

pub fn database_path(base: &Path) -> PathBuf {
    base.join(DATABASE_FILE)
}

/// Read `<base>/sono.toml`. A missing file yields the defaults; keys that
/// are absent from the file keep their defaults.
pub fn load_config(base: &Path) -> Result<AnalyzerConfig> {
    let path = base.join(CONFIG_FILE);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(AnalyzerConfig::default());
    }
    let content = fs::read_to_string(&path)?;
    let config = parse_config(&content)
        .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}

pub fn parse_config(content: &str) -> std::result::Result<AnalyzerConfig, toml::de::Error> {
    toml::from_str(content)
}

/// Create the data directory if needed and return it.
pub fn ensure_base_dir(base: &Path) -> Result<PathBuf> {
    fs::create_dir_all(base).map_err(|e| {
        StoreError::InvalidData(format!("failed to create {}: {e}", base.display()))
    })?;
    Ok(base.to_path_buf())
}
