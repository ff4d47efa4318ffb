//! Persisted settings for gitvault
//!
//! A single TOML file holds everything the sync engine needs: the remote
//! URL, the working copy location, branch, credentials, and the periodic
//! sync interval. The same file carries the single-slot last-sync record,
//! which only the engine writes (and only on a successful run).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default branch to sync when none is configured
pub const DEFAULT_BRANCH: &str = "main";

/// Default periodic sync interval in minutes
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u64 = 60;

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_sync_interval() -> u64 {
    DEFAULT_SYNC_INTERVAL_MINUTES
}

/// The full contents of the settings file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub remote_url: String,
    #[serde(default)]
    pub local_path: PathBuf,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub git_username: String,
    #[serde(default)]
    pub git_password: String,
    /// Minutes between periodic sync runs
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u64,
    /// Epoch milliseconds of the last successful run. Written only by the
    /// sync engine; everything else just reads it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_time: Option<i64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            remote_url: String::new(),
            local_path: PathBuf::new(),
            branch: default_branch(),
            git_username: String::new(),
            git_password: String::new(),
            sync_interval: default_sync_interval(),
            last_sync_time: None,
        }
    }
}

impl Settings {
    /// Build the per-run configuration value handed to the engine
    pub fn sync_configuration(&self) -> SyncConfiguration {
        SyncConfiguration {
            remote_url: self.remote_url.clone(),
            local_path: self.local_path.clone(),
            branch: self.branch.clone(),
            credentials: Credentials {
                username: self.git_username.clone(),
                password: self.git_password.clone(),
            },
        }
    }

    /// The last successful sync as a local-time value, if any
    pub fn last_sync(&self) -> Option<DateTime<Local>> {
        let millis = self.last_sync_time?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(|utc| utc.with_timezone(&Local))
    }

    /// Set a settings key from its string form. Used by `config set`.
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "remote_url" => self.remote_url = value.to_string(),
            "local_path" => self.local_path = PathBuf::from(value),
            "branch" => self.branch = value.to_string(),
            "git_username" => self.git_username = value.to_string(),
            "git_password" => self.git_password = value.to_string(),
            "sync_interval" => {
                self.sync_interval = value.parse().map_err(|_| {
                    Error::Other(format!("invalid sync_interval '{value}': expected minutes"))
                })?
            }
            _ => {
                return Err(Error::UnknownSettingsKey {
                    key: key.to_string(),
                })
            }
        }
        Ok(())
    }
}

/// Immutable per-run input to the sync engine, built from [`Settings`]
/// once per trigger. The engine never reads the settings file directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfiguration {
    pub remote_url: String,
    pub local_path: PathBuf,
    pub branch: String,
    pub credentials: Credentials,
}

/// Username/password pair passed through to the transport layer.
/// Opaque to the engine; empty strings mean anonymous access.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Handle to the settings file on disk
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location.
    ///
    /// Linux   :   $XDG_CONFIG_HOME/gitvault or $HOME/.config/gitvault
    /// macOS   :   $HOME/Library/Application Support/gitvault
    /// Windows :   %AppData%\Roaming\gitvault
    ///
    /// Overridable by setting the GITVAULT_CONFIG_HOME environment variable.
    pub fn default_location() -> Result<Self> {
        Ok(Self::new(Self::config_home()?.join("config.toml")))
    }

    fn config_home() -> Result<PathBuf> {
        // The environment variable lets tests run against an isolated store.
        if let Ok(env_var) = std::env::var("GITVAULT_CONFIG_HOME") {
            if !env_var.is_empty() {
                return Ok(env_var.into());
            }
        }

        dirs::config_dir()
            .map(|dir| dir.join("gitvault"))
            .ok_or_else(|| Error::Other("could not determine the config directory".to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, or defaults if no file exists yet
    pub fn load_or_default(&self) -> Result<Settings> {
        if !self.path.exists() {
            return Ok(Settings::default());
        }
        self.load()
    }

    pub fn load(&self) -> Result<Settings> {
        let contents = fs::read_to_string(&self.path).map_err(|source| Error::SettingsRead {
            path: self.path.clone(),
            source,
        })?;

        toml::from_str(&contents).map_err(|err| Error::SettingsParse {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    /// Serialize and write settings, creating parent directories as needed
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|source| Error::SettingsWrite {
                path: self.path.clone(),
                source,
            })?;
        }

        let contents = toml::to_string(settings).map_err(|err| Error::SettingsParse {
            path: self.path.clone(),
            message: err.to_string(),
        })?;

        fs::write(&self.path, contents).map_err(|source| Error::SettingsWrite {
            path: self.path.clone(),
            source,
        })
    }

    /// Overwrite the single last-sync slot. Engine-only; later successes
    /// replace earlier ones.
    pub fn record_last_sync(&self, timestamp_millis: i64) -> Result<()> {
        let mut settings = self.load_or_default()?;
        settings.last_sync_time = Some(timestamp_millis);
        self.save(&settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("config.toml"))
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let tmp = TempDir::new().unwrap();
        let settings = store_in(&tmp).load_or_default().unwrap();

        assert_eq!(settings.branch, "main");
        assert_eq!(settings.sync_interval, 60);
        assert!(settings.remote_url.is_empty());
        assert!(settings.last_sync_time.is_none());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let mut settings = Settings::default();
        settings.remote_url = "https://example.test/repo.git".to_string();
        settings.local_path = PathBuf::from("/tmp/vault");
        settings.git_username = "alice".to_string();
        store.save(&settings).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_record_last_sync_preserves_other_keys() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let mut settings = Settings::default();
        settings.remote_url = "https://example.test/repo.git".to_string();
        store.save(&settings).unwrap();

        store.record_last_sync(1_700_000_000_000).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.remote_url, "https://example.test/repo.git");
        assert_eq!(loaded.last_sync_time, Some(1_700_000_000_000));
    }

    #[test]
    fn test_record_last_sync_is_overwritten_monotonically() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        store.record_last_sync(1000).unwrap();
        store.record_last_sync(2000).unwrap();

        assert_eq!(store.load().unwrap().last_sync_time, Some(2000));
    }

    #[test]
    fn test_set_key() {
        let mut settings = Settings::default();
        settings.set_key("remote_url", "https://example.test/r.git").unwrap();
        settings.set_key("sync_interval", "15").unwrap();

        assert_eq!(settings.remote_url, "https://example.test/r.git");
        assert_eq!(settings.sync_interval, 15);
        assert!(settings.set_key("no_such_key", "x").is_err());
    }

    #[test]
    fn test_sync_configuration_carries_credentials() {
        let mut settings = Settings::default();
        settings.git_username = "alice".to_string();
        settings.git_password = "secret".to_string();

        let config = settings.sync_configuration();
        assert_eq!(config.credentials.username, "alice");
        assert_eq!(config.credentials.password, "secret");
        assert_eq!(config.branch, "main");
    }

    #[test]
    fn test_parse_error_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "remote_url = [not toml").unwrap();

        let err = SettingsStore::new(&path).load().unwrap_err();
        assert!(matches!(err, Error::SettingsParse { .. }));
    }
}
