//! Application configuration management.
//!
//! This module handles loading the application configuration:
//! the origin the shell is served from, the cache version tag and the
//! shell manifest.
//!
//! Configuration is stored at `~/.config/rollcall/config.json`. The
//! `ROLLCALL_ORIGIN` and `ROLLCALL_CACHE_VERSION` environment variables
//! override the file.

use std::path::PathBuf;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::lifecycle::LifecycleConfig;

/// Application name used for config/data/cache directory paths
const APP_NAME: &str = "rollcall";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_ORIGIN: &str = "http://localhost:8080/";

/// Tag of the cache generation shipped with this build
pub const DEFAULT_CACHE_VERSION: &str = "attendance-v1";

/// Inline app icon, cached with the shell so it renders offline
const SHELL_ICON: &str = r#"data:image/svg+xml,<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 192 192"><rect fill="%233498db" width="192" height="192"/><text x="50%" y="50%" font-size="120" fill="white" text-anchor="middle" dy=".3em">✓</text></svg>"#;

pub fn default_shell_manifest() -> Vec<String> {
    ["/", "/index.html", "/styles.css", "/app.js", "/manifest.json", SHELL_ICON]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub origin: Option<String>,
    pub cache_version: Option<String>,
    pub shell_manifest: Option<Vec<String>>,
    pub data_dir: Option<PathBuf>,
}

impl Config {
    /// Load from the config file, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_env();
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(origin) = std::env::var("ROLLCALL_ORIGIN") {
            self.origin = Some(origin);
        }
        if let Ok(version) = std::env::var("ROLLCALL_CACHE_VERSION") {
            self.cache_version = Some(version);
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn origin(&self) -> Result<Url> {
        let raw = self.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        Url::parse(raw).with_context(|| format!("Invalid origin URL: {}", raw))
    }

    pub fn cache_version(&self) -> String {
        self.cache_version
            .clone()
            .unwrap_or_else(|| DEFAULT_CACHE_VERSION.to_string())
    }

    pub fn shell_manifest(&self) -> Vec<String> {
        self.shell_manifest
            .clone()
            .unwrap_or_else(default_shell_manifest)
    }

    pub fn lifecycle_config(&self) -> Result<LifecycleConfig> {
        Ok(LifecycleConfig {
            version: self.cache_version(),
            origin: self.origin()?,
            shell_manifest: self.shell_manifest(),
        })
    }

    /// Where the attendance dataset lives
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Root of the asset cache buckets and the log file
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_version(), DEFAULT_CACHE_VERSION);
        assert_eq!(config.origin().unwrap().as_str(), DEFAULT_ORIGIN);

        let manifest = config.shell_manifest();
        assert_eq!(manifest.len(), 6);
        assert_eq!(manifest[0], "/");
        assert!(manifest[5].starts_with("data:image/svg+xml,"));
    }

    #[test]
    fn test_lifecycle_config_uses_overrides() {
        let config = Config {
            origin: Some("https://attendance.example.com/app/".to_string()),
            cache_version: Some("attendance-v7".to_string()),
            shell_manifest: Some(vec!["index.html".to_string()]),
            data_dir: None,
        };
        let lifecycle = config.lifecycle_config().unwrap();
        assert_eq!(lifecycle.version, "attendance-v7");
        assert_eq!(lifecycle.origin.join("index.html").unwrap().as_str(), "https://attendance.example.com/app/index.html");
        assert_eq!(lifecycle.shell_manifest, vec!["index.html".to_string()]);
    }

    #[test]
    fn test_invalid_origin_is_an_error() {
        let config = Config {
            origin: Some("not a url".to_string()),
            ..Config::default()
        };
        assert!(config.lifecycle_config().is_err());
    }

    #[test]
    fn test_parse_partial_config_file() {
        let config: Config = serde_json::from_str(r#"{"cache_version":"attendance-v2"}"#).unwrap();
        assert_eq!(config.cache_version(), "attendance-v2");
        assert!(config.data_dir.is_none());
    }
}
