use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::RallyError;

/// Cache partition name used by the offline proxy. Bump to invalidate.
pub const DEFAULT_CACHE_VERSION: &str = "vb-tracker-v8";

/// Resources required to render the tracker with no network.
pub const APP_SHELL_FILES: &[&str] = &[
    "./",
    "./index.html",
    "./match-setup.html",
    "./volleyball-tracker.html",
    "./analyze-stats.html",
    "./app-mode.js",
    "./config.js",
    "./offline-storage.js",
    "./manifest.json",
];

/// Overrides the `~/.rally` home directory when set.
pub const HOME_ENV: &str = "RALLY_HOME";

/// How the tracker treats the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppMode {
    /// Normal operation: pending matches are pushed to the remote.
    #[default]
    Live,
    /// Read-only showcase. Matches stay local and nothing is written remotely.
    Demo,
}

impl AppMode {
    pub fn is_demo(&self) -> bool {
        *self == AppMode::Demo
    }
}

impl std::fmt::Display for AppMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppMode::Live => write!(f, "live"),
            AppMode::Demo => write!(f, "demo"),
        }
    }
}

impl std::str::FromStr for AppMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(AppMode::Live),
            "demo" => Ok(AppMode::Demo),
            _ => Err(format!("unknown app mode: {s}")),
        }
    }
}

/// Top-level Rally configuration, stored at `~/.rally/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RallyConfig {
    /// `demo` disables every remote write.
    #[serde(default)]
    pub app_mode: AppMode,

    /// Base URL of the remote data API. Unset means offline-only.
    #[serde(default)]
    pub remote_url: Option<Url>,

    /// Keychain entry holding the remote API key.
    #[serde(default = "default_credential_key")]
    pub credential_key: String,

    /// Team name attached to uploaded player stats. Falls back to the match's own team.
    #[serde(default)]
    pub player_team: Option<String>,

    /// Upper bound on any single remote call or proxied fetch.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Origin the app shell is served from.
    #[serde(default = "default_app_origin")]
    pub app_origin: Url,

    /// Requests to this host (or its subdomains) bypass the offline cache.
    #[serde(default = "default_data_api_host")]
    pub data_api_host: String,

    /// Name of the current cache partition.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Paths pre-cached on install, relative to `app_origin`.
    #[serde(default = "default_app_shell")]
    pub app_shell: Vec<String>,
}

fn default_credential_key() -> String {
    "rally:remote".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_app_origin() -> Url {
    Url::parse("http://localhost:8080/").unwrap()
}

fn default_data_api_host() -> String {
    "supabase.co".to_string()
}

fn default_cache_version() -> String {
    DEFAULT_CACHE_VERSION.to_string()
}

fn default_app_shell() -> Vec<String> {
    APP_SHELL_FILES.iter().map(|s| s.to_string()).collect()
}

impl Default for RallyConfig {
    fn default() -> Self {
        Self {
            app_mode: AppMode::Live,
            remote_url: None,
            credential_key: default_credential_key(),
            player_team: None,
            request_timeout_secs: default_request_timeout_secs(),
            app_origin: default_app_origin(),
            data_api_host: default_data_api_host(),
            cache_version: default_cache_version(),
            app_shell: default_app_shell(),
        }
    }
}

impl RallyConfig {
    /// Returns the Rally home directory (`$RALLY_HOME` or `~/.rally/`).
    pub fn home_dir() -> Result<PathBuf, RallyError> {
        if let Some(dir) = std::env::var_os(HOME_ENV) {
            return Ok(PathBuf::from(dir));
        }
        let base = dirs::home_dir().ok_or_else(|| RallyError::Config {
            message: "could not determine home directory".into(),
        })?;
        Ok(base.join(".rally"))
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Result<PathBuf, RallyError> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Returns the path to the database file.
    pub fn db_path() -> Result<PathBuf, RallyError> {
        Ok(Self::home_dir()?.join("rally.db"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Load config from the default location, or return defaults if not found.
    pub fn load() -> Result<Self, RallyError> {
        let path = Self::config_path()?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, RallyError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| RallyError::Serialization(e.to_string()))
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<(), RallyError> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save config to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), RallyError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| RallyError::Serialization(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Initialize the Rally home directory with default config.
    pub fn init() -> Result<PathBuf, RallyError> {
        let home = Self::home_dir()?;
        std::fs::create_dir_all(&home)?;

        let config_path = Self::config_path()?;
        if !config_path.exists() {
            Self::default().save_to(&config_path)?;
            tracing::info!(path = %config_path.display(), "wrote default config");
        }

        Ok(home)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_roundtrip() {
        let config = RallyConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: RallyConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config.cache_version, deserialized.cache_version);
        assert_eq!(config.app_shell, deserialized.app_shell);
        assert_eq!(config.request_timeout_secs, deserialized.request_timeout_secs);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: RallyConfig =
            toml::from_str("remote_url = \"https://example.supabase.co\"\ncache_version = \"v9\"\n")
                .unwrap();
        assert_eq!(config.cache_version, "v9");
        assert_eq!(config.data_api_host, "supabase.co");
        assert_eq!(config.app_shell.len(), APP_SHELL_FILES.len());
        assert!(config.remote_url.is_some());
    }

    #[test]
    fn test_app_mode_defaults_to_live() {
        let config: RallyConfig = toml::from_str("").unwrap();
        assert_eq!(config.app_mode, AppMode::Live);

        let config: RallyConfig = toml::from_str("app_mode = \"demo\"\n").unwrap();
        assert!(config.app_mode.is_demo());
        assert_eq!(config.app_mode.to_string(), "demo");
        assert_eq!("live".parse::<AppMode>().unwrap(), AppMode::Live);
        assert!(toml::from_str::<RallyConfig>("app_mode = \"staging\"\n").is_err());
    }

    #[test]
    fn test_save_and_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = RallyConfig::default();
        config.player_team = Some("Eclipse".into());
        config.save_to(&path).unwrap();

        let loaded = RallyConfig::load_from(&path).unwrap();
        assert_eq!(loaded.player_team.as_deref(), Some("Eclipse"));
    }

    #[test]
    fn test_timeout_is_never_zero() {
        let config = RallyConfig {
            request_timeout_secs: 0,
            ..RallyConfig::default()
        };
        assert_eq!(config.request_timeout(), Duration::from_secs(1));
    }
}
