//! Error types for the registry crate.

use miette::Diagnostic;
use thiserror::Error;

/// Errors that can occur while fetching or reading a manifest.
#[derive(Error, Diagnostic, Debug)]
pub enum RegistryError {
    #[error("Error while {action}: {source}")]
    #[diagnostic(code(titledb_registry::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Failed to fetch manifest from {url}")]
    #[diagnostic(
        code(titledb_registry::fetch),
        help("Check your network connection and the manifest URL")
    )]
    Fetch {
        url: String,
        #[source]
        source: titledb_dl::DownloadError,
    },

    #[error("Manifest at {url} is empty")]
    #[diagnostic(
        code(titledb_registry::empty_manifest),
        help("The server returned an empty body")
    )]
    EmptyManifest { url: String },

    #[error(transparent)]
    #[diagnostic(
        code(titledb_registry::json),
        help("The manifest may be corrupted or in an invalid format")
    )]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid manifest: {0}")]
    #[diagnostic(
        code(titledb_registry::invalid_manifest),
        help("The manifest needs a version and both `titles` and `icons` file entries")
    )]
    InvalidManifest(String),

    #[error("Invalid URL `{reference}`: {source}")]
    #[diagnostic(
        code(titledb_registry::invalid_url),
        help("Ensure the URL is valid and properly formatted")
    )]
    InvalidUrl {
        reference: String,
        source: url::ParseError,
    },
}

impl RegistryError {
    /// Whether the manifest could not be obtained at all, as opposed to
    /// being obtained and failing validation.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Fetch { .. } | Self::EmptyManifest { .. })
    }
}

/// A specialized Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
    /// Adds context to an error, describing what action was being performed.
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String;
}

impl<T> ErrorContext<T> for std::io::Result<T> {
    fn with_context<C>(self, context: C) -> Result<T>
    where
        C: FnOnce() -> String,
    {
        self.map_err(|err| {
            RegistryError::IoError {
                action: context(),
                source: err,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::EmptyManifest {
            url: "https://example.com/manifest.json".into(),
        };
        assert_eq!(
            err.to_string(),
            "Manifest at https://example.com/manifest.json is empty"
        );

        let err = RegistryError::InvalidManifest("missing version".into());
        assert_eq!(err.to_string(), "Invalid manifest: missing version");
    }

    #[test]
    fn test_is_unreachable() {
        assert!(RegistryError::EmptyManifest { url: String::new() }.is_unreachable());
        assert!(!RegistryError::InvalidManifest(String::new()).is_unreachable());
    }

    #[test]
    fn test_with_context() {
        let result: std::io::Result<()> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result
            .with_context(|| "reading manifest.json".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "Error while reading manifest.json: denied");
    }
}
