use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;
use titledb_dl::DownloadError;
use titledb_registry::RegistryError;
use titledb_utils::error::FileSystemError;

/// Why an update check or update attempt failed.
#[derive(Error, Diagnostic, Debug)]
pub enum UpdateError {
    #[error("Manifest unreachable: {url}")]
    #[diagnostic(
        code(titledb_operations::manifest_unreachable),
        help("Check your network connection and the manifest URL")
    )]
    ManifestUnreachable {
        url: String,
        #[source]
        source: RegistryError,
    },

    #[error("Manifest malformed: {url}")]
    #[diagnostic(
        code(titledb_operations::manifest_malformed),
        help("The published manifest is invalid; try again once it is fixed")
    )]
    ManifestMalformed {
        url: String,
        #[source]
        source: RegistryError,
    },

    #[error("Failed to download {file}")]
    #[diagnostic(
        code(titledb_operations::download_failed),
        help("Check your network connection or try again later")
    )]
    DownloadFailed {
        file: String,
        #[source]
        source: DownloadError,
    },

    #[error("Size mismatch for {file}: expected {expected} bytes, got {actual}")]
    #[diagnostic(code(titledb_operations::size_mismatch))]
    SizeMismatch {
        file: String,
        expected: u64,
        actual: u64,
    },

    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    #[diagnostic(
        code(titledb_operations::hash_mismatch),
        help("The download may be corrupted or the mirror out of date")
    )]
    HashMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("Failed to create {}", path.display())]
    #[diagnostic(code(titledb_operations::directory_create_failed))]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: FileSystemError,
    },

    #[error("Failed to commit {file}")]
    #[diagnostic(
        code(titledb_operations::commit_failed),
        help("The previous files were restored")
    )]
    CommitFailed {
        file: String,
        #[source]
        source: FileSystemError,
    },

    #[error("Failed to write {}", path.display())]
    #[diagnostic(code(titledb_operations::write_failed))]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl UpdateError {
    /// Classifies a manifest client failure.
    pub fn from_registry(url: &str, source: RegistryError) -> Self {
        let url = url.to_string();
        if source.is_unreachable() {
            Self::ManifestUnreachable { url, source }
        } else {
            Self::ManifestMalformed { url, source }
        }
    }
}

pub type Result<T> = std::result::Result<T, UpdateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_registry() {
        let err = UpdateError::from_registry(
            "https://a.example/m.json",
            RegistryError::EmptyManifest {
                url: "https://a.example/m.json".into(),
            },
        );
        assert!(matches!(err, UpdateError::ManifestUnreachable { .. }));

        let err = UpdateError::from_registry(
            "https://a.example/m.json",
            RegistryError::InvalidManifest("missing version".into()),
        );
        assert!(matches!(err, UpdateError::ManifestMalformed { .. }));
        assert_eq!(err.to_string(), "Manifest malformed: https://a.example/m.json");
    }

    #[test]
    fn test_mismatch_display() {
        let err = UpdateError::SizeMismatch {
            file: "icons.pack".into(),
            expected: 10,
            actual: 9,
        };
        assert_eq!(
            err.to_string(),
            "Size mismatch for icons.pack: expected 10 bytes, got 9"
        );
    }
}
