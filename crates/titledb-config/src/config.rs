use std::{
    fs,
    path::{Path, PathBuf},
    sync::{LazyLock, PoisonError, RwLock},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use titledb_utils::{
    path::{resolve_path, xdg_config_home, xdg_data_home},
    time::parse_duration,
};
use tracing::debug;

use crate::error::{ConfigError, Result};

/// Application's configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Root directory of the offline store. The packs live in `<data_dir>/offline_db`.
    /// Default: $XDG_DATA_HOME/titledb. `TITLEDB_ROOT` takes precedence when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// URL of the remote manifest describing the current packs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest_url: Option<String>,

    /// User agent sent with every request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Proxy URL, e.g. `socks5://127.0.0.1:1080`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    /// Global request timeout, e.g. `30s` or `2m`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Extra request headers written as `Name: value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<String>>,
}

pub static CONFIG: LazyLock<RwLock<Option<Config>>> = LazyLock::new(|| RwLock::new(None));

pub static CONFIG_PATH: LazyLock<RwLock<PathBuf>> = LazyLock::new(|| {
    RwLock::new(match std::env::var("TITLEDB_CONFIG") {
        Ok(path_str) => PathBuf::from(path_str),
        Err(_) => xdg_config_home().join("titledb").join("config.toml"),
    })
});

/// Loads the configuration from [`CONFIG_PATH`] into the global slot.
pub fn init() -> Result<()> {
    let config = Config::new()?;
    *CONFIG.write().unwrap_or_else(PoisonError::into_inner) = Some(config);
    Ok(())
}

/// Returns the global configuration, or defaults if [`init`] was never called.
pub fn get_config() -> Config {
    CONFIG
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .unwrap_or_default()
}

/// Overrides the location [`init`] reads from.
pub fn set_config_path(path: PathBuf) {
    *CONFIG_PATH.write().unwrap_or_else(PoisonError::into_inner) = path;
}

impl Config {
    /// Loads the configuration file at [`CONFIG_PATH`].
    /// If the configuration file is not found, the default configuration is used.
    pub fn new() -> Result<Self> {
        let config_path = CONFIG_PATH
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_path_buf();
        Self::load_from(&config_path)
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no config at {}, using defaults", path.display());
                Self::default()
            }
            Err(err) => return Err(ConfigError::IoError(err)),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.get_timeout()?;
        self.get_headers()?;
        Ok(())
    }

    /// Root of the store: `TITLEDB_ROOT`, then `data_dir`, then the XDG default.
    pub fn get_data_dir(&self) -> Result<PathBuf> {
        let root = std::env::var("TITLEDB_ROOT")
            .ok()
            .filter(|root| !root.trim().is_empty());
        match root.as_deref().or(self.data_dir.as_deref()) {
            Some(dir) => Ok(resolve_path(dir)?),
            None => Ok(xdg_data_home().join("titledb")),
        }
    }

    /// Manifest URL, preferring `override_url` when given.
    pub fn get_manifest_url<'a>(&'a self, override_url: Option<&'a str>) -> Result<&'a str> {
        override_url
            .or(self.manifest_url.as_deref())
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingManifestUrl)
    }

    pub fn get_timeout(&self) -> Result<Option<Duration>> {
        self.timeout
            .as_deref()
            .map(|value| {
                parse_duration(value)
                    .and_then(|ms| u64::try_from(ms).ok())
                    .map(Duration::from_millis)
                    .ok_or_else(|| ConfigError::InvalidDuration(value.to_string()))
            })
            .transpose()
    }

    /// Extra headers split into `(name, value)` pairs.
    pub fn get_headers(&self) -> Result<Vec<(String, String)>> {
        self.headers
            .iter()
            .flatten()
            .map(|header| {
                header
                    .split_once(':')
                    .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                    .filter(|(name, _)| !name.is_empty())
                    .ok_or_else(|| ConfigError::InvalidHeader(header.clone()))
            })
            .collect()
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
