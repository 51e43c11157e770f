//! Persistent user configuration at `~/.ollama-dl/config.ini`.
//!
//! A missing file, section or key falls back to the built-in default, so a
//! fresh install works without ever running `config set`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::download::{
    FetchConfig, DEFAULT_MAX_CONCURRENT, DEFAULT_REQUEST_TIMEOUT, DEFAULT_STAGING_SUFFIX,
};
use crate::registry::DEFAULT_REGISTRY;

/// Name of the per-user configuration directory under `$HOME`.
pub const CONFIG_DIR_NAME: &str = ".ollama-dl";

/// Name of the configuration file.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Default number of attempts per blob.
pub const DEFAULT_RETRIES: u32 = 10;

/// Errors reading, writing or editing the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to write config file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("unknown configuration key '{0}'")]
    UnknownKey(String),

    #[error("invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// `[registry]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    pub url: String,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_REGISTRY.to_string(),
        }
    }
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub parallel: usize,
    pub retries: u32,
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub staging_suffix: String,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            parallel: DEFAULT_MAX_CONCURRENT,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_REQUEST_TIMEOUT.as_secs(),
            staging_suffix: DEFAULT_STAGING_SUFFIX.to_string(),
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: config_directory().join("logs"),
        }
    }
}

/// Contents of `config.ini`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub registry: RegistrySettings,
    pub download: DownloadSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Load from the default location. A missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for key in ConfigKey::all() {
            let value = ini
                .section(Some(key.section()))
                .and_then(|s| s.get(key.key_name()))
                .map(str::trim);
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                key.set(&mut config, value)?;
            }
        }
        Ok(config)
    }

    /// Save to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| ConfigError::Write {
                path: path.to_path_buf(),
                source: e,
            })
    }

    fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            ini.with_section(Some(key.section()))
                .set(key.key_name(), key.get(self));
        }
        ini
    }

    /// Engine settings derived from the `[download]` section.
    pub fn to_fetch_config(&self) -> FetchConfig {
        FetchConfig::new()
            .with_max_attempts(self.download.retries)
            .with_request_timeout(Duration::from_secs(self.download.timeout))
            .with_max_concurrent(self.download.parallel)
            .with_staging_suffix(self.download.staging_suffix.clone())
    }
}

/// Every settable key, addressed as `section.key`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKey {
    RegistryUrl,
    DownloadParallel,
    DownloadRetries,
    DownloadTimeout,
    DownloadStagingSuffix,
    LoggingDirectory,
}

impl ConfigKey {
    /// All keys in file order.
    pub fn all() -> &'static [ConfigKey] {
        &[
            ConfigKey::RegistryUrl,
            ConfigKey::DownloadParallel,
            ConfigKey::DownloadRetries,
            ConfigKey::DownloadTimeout,
            ConfigKey::DownloadStagingSuffix,
            ConfigKey::LoggingDirectory,
        ]
    }

    /// Full `section.key` name.
    pub fn name(&self) -> &'static str {
        match self {
            ConfigKey::RegistryUrl => "registry.url",
            ConfigKey::DownloadParallel => "download.parallel",
            ConfigKey::DownloadRetries => "download.retries",
            ConfigKey::DownloadTimeout => "download.timeout",
            ConfigKey::DownloadStagingSuffix => "download.staging_suffix",
            ConfigKey::LoggingDirectory => "logging.directory",
        }
    }

    pub fn section(&self) -> &'static str {
        self.name().split_once('.').map(|(s, _)| s).unwrap_or("")
    }

    pub fn key_name(&self) -> &'static str {
        self.name().split_once('.').map(|(_, k)| k).unwrap_or("")
    }

    /// Current value as a string.
    pub fn get(&self, config: &ConfigFile) -> String {
        match self {
            ConfigKey::RegistryUrl => config.registry.url.clone(),
            ConfigKey::DownloadParallel => config.download.parallel.to_string(),
            ConfigKey::DownloadRetries => config.download.retries.to_string(),
            ConfigKey::DownloadTimeout => config.download.timeout.to_string(),
            ConfigKey::DownloadStagingSuffix => config.download.staging_suffix.clone(),
            ConfigKey::LoggingDirectory => config.logging.directory.display().to_string(),
        }
    }

    /// Validate and store `value`.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> Result<(), ConfigError> {
        match self {
            ConfigKey::RegistryUrl => {
                if !(value.starts_with("http://") || value.starts_with("https://")) {
                    return Err(self.invalid(value, "expected an http:// or https:// URL"));
                }
                config.registry.url = value.to_string();
            }
            ConfigKey::DownloadParallel => {
                config.download.parallel = self.parse_positive(value)? as usize;
            }
            ConfigKey::DownloadRetries => {
                config.download.retries = self.parse_positive(value)? as u32;
            }
            ConfigKey::DownloadTimeout => {
                config.download.timeout = self.parse_positive(value)?;
            }
            ConfigKey::DownloadStagingSuffix => {
                if value.is_empty() || value.contains(['/', '\\']) {
                    return Err(self.invalid(value, "expected a non-empty file name suffix"));
                }
                config.download.staging_suffix = value.to_string();
            }
            ConfigKey::LoggingDirectory => {
                config.logging.directory = expand_tilde(value);
            }
        }
        Ok(())
    }

    fn parse_positive(&self, value: &str) -> Result<u64, ConfigError> {
        match value.parse::<u64>() {
            Ok(n) if n > 0 && n <= u64::from(u32::MAX) => Ok(n),
            Ok(_) => Err(self.invalid(value, "must be a positive number")),
            Err(e) => Err(self.invalid(value, &e.to_string())),
        }
    }

    fn invalid(&self, value: &str, reason: &str) -> ConfigError {
        ConfigError::InvalidValue {
            key: self.name().to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ConfigKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConfigKey::all()
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

/// `~/.ollama-dl`, or `./.ollama-dl` when no home directory is known.
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// `~/.ollama-dl/config.ini`.
pub fn config_file_path() -> PathBuf {
    config_directory().join(CONFIG_FILE_NAME)
}

fn expand_tilde(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(value)),
        None => PathBuf::from(value),
    }
}

/// Human-readable byte size, e.g. `"4.66 GB"`.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&dir.path().join("config.ini")).unwrap();
        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.registry.url, "https://registry.ollama.ai/");
        assert_eq!(config.download.parallel, 4);
        assert_eq!(config.download.retries, 10);
        assert_eq!(config.download.timeout, 30);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = ConfigFile::parse("[download]\nparallel = 8\n").unwrap();
        assert_eq!(config.download.parallel, 8);
        assert_eq!(config.download.retries, 10);
        assert_eq!(config.registry, RegistrySettings::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        ConfigKey::RegistryUrl
            .set(&mut config, "http://localhost:5000/")
            .unwrap();
        ConfigKey::DownloadRetries.set(&mut config, "3").unwrap();
        ConfigKey::DownloadStagingSuffix.set(&mut config, ".part").unwrap();
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = ConfigFile::default();
        assert!(ConfigKey::DownloadParallel.set(&mut config, "0").is_err());
        assert!(ConfigKey::DownloadTimeout.set(&mut config, "soon").is_err());
        assert!(ConfigKey::RegistryUrl.set(&mut config, "ftp://x").is_err());
        assert!(ConfigKey::DownloadStagingSuffix.set(&mut config, "").is_err());
        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn test_invalid_file_value_is_an_error() {
        let err = ConfigFile::parse("[download]\nretries = many\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_key_parsing() {
        assert_eq!(
            "download.parallel".parse::<ConfigKey>().unwrap(),
            ConfigKey::DownloadParallel
        );
        assert_eq!(ConfigKey::LoggingDirectory.section(), "logging");
        assert_eq!(ConfigKey::LoggingDirectory.key_name(), "directory");
        assert!("download.speed".parse::<ConfigKey>().is_err());
    }

    #[test]
    fn test_to_fetch_config() {
        let mut config = ConfigFile::default();
        ConfigKey::DownloadParallel.set(&mut config, "2").unwrap();
        ConfigKey::DownloadRetries.set(&mut config, "5").unwrap();
        ConfigKey::DownloadTimeout.set(&mut config, "12").unwrap();

        let fetch = config.to_fetch_config();
        assert_eq!(fetch.max_concurrent, 2);
        assert_eq!(fetch.retry.max_attempts(), 5);
        assert_eq!(fetch.request_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 bytes");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }
}
