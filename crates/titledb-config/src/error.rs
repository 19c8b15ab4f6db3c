use miette::Diagnostic;
use thiserror::Error;
use titledb_utils::error::{PathError, UtilsError};

#[derive(Error, Diagnostic, Debug)]
pub enum ConfigError {
    #[error("TOML serialization error: {0}")]
    #[diagnostic(
        code(titledb_config::toml_serialize),
        help("Check your configuration structure for invalid values")
    )]
    TomlSerError(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    #[diagnostic(
        code(titledb_config::toml_deserialize),
        help("Check your config.toml syntax and structure")
    )]
    TomlDeError(#[from] toml::de::Error),

    #[error("Invalid duration: {0}")]
    #[diagnostic(
        code(titledb_config::invalid_duration),
        help("Use a duration such as `30s`, `2m` or `1m30s`")
    )]
    InvalidDuration(String),

    #[error("Invalid header: {0}")]
    #[diagnostic(
        code(titledb_config::invalid_header),
        help("Headers must be written as `Name: value`")
    )]
    InvalidHeader(String),

    #[error("Manifest URL is not configured")]
    #[diagnostic(
        code(titledb_config::missing_manifest_url),
        help("Set `manifest_url` in config.toml or pass --url")
    )]
    MissingManifestUrl,

    #[error("IO error: {0}")]
    #[diagnostic(code(titledb_config::io))]
    IoError(#[from] std::io::Error),

    #[error(transparent)]
    #[diagnostic(code(titledb_config::utils))]
    Utils(#[from] UtilsError),
}

impl From<PathError> for ConfigError {
    fn from(err: PathError) -> Self {
        Self::Utils(UtilsError::Path(err))
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
