//! CLI configuration.
//!
//! Read from `$XDG_CONFIG_HOME/chunkup/config.json` (or `~/.config/...`)
//! unless `--config` points elsewhere. Command-line flags and the
//! `CHUNKUP_SERVER` / `CHUNKUP_TOKEN` variables override the file.

use std::path::{Path, PathBuf};

use chunkup_client::UploadConfig;
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER_URL: &str = "http://localhost:8000/api/v1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Base URL of the store API, without the `/files/chunked` suffix.
    pub server_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    pub upload: UploadConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.into(),
            auth_token: None,
            upload: UploadConfig::default(),
        }
    }
}

impl CliConfig {
    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing file yields defaults; so does an unparsable one, with a
    /// warning.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => default_config_path(),
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<CliConfig>(&content) {
            Ok(config) => Ok(config),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config, using defaults"
                );
                Ok(Self::default())
            }
        }
    }
}

fn default_config_path() -> PathBuf {
    config_base_dir().join("chunkup").join("config.json")
}

fn config_base_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = CliConfig::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(cfg, CliConfig::default());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"server_url":"https://files.example.test/api","upload":{"concurrency":5}}"#,
        )
        .unwrap();

        let cfg = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.server_url, "https://files.example.test/api");
        assert_eq!(cfg.upload.concurrency, 5);
        assert_eq!(cfg.upload.retry_attempts, 3);
        assert!(cfg.auth_token.is_none());
    }

    #[test]
    fn garbage_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cfg = CliConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg, CliConfig::default());
    }
}
