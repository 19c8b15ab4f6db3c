//! Error types for the store crate.
//!
//! Load-time failures never leave a store; they are logged and the next
//! candidate file is tried. [`StoreError`] surfaces from the pure parsing
//! functions, the pack writers and title id parsing.

use miette::Diagnostic;
use thiserror::Error;
use titledb_utils::error::FileSystemError;

#[derive(Error, Diagnostic, Debug)]
pub enum StoreError {
    #[error("Error while {action}: {source}")]
    #[diagnostic(code(titledb_store::io))]
    IoError {
        action: String,
        source: std::io::Error,
    },

    #[error("Invalid pack: {0}")]
    #[diagnostic(
        code(titledb_store::invalid_pack),
        help("The pack file is truncated or was not produced by a compatible writer")
    )]
    InvalidPack(String),

    #[error(transparent)]
    #[diagnostic(
        code(titledb_store::json),
        help("The title document is not valid JSON")
    )]
    JsonError(#[from] serde_json::Error),

    #[error("Unrecognized title document: {0}")]
    #[diagnostic(
        code(titledb_store::unrecognized_json),
        help("Expected a `rows` object, an array of rows or an object keyed by title id")
    )]
    UnrecognizedJson(String),

    #[error("Invalid title id `{0}`")]
    #[diagnostic(
        code(titledb_store::invalid_title_id),
        help("Title ids are 1 to 16 hex digits, optionally prefixed with 0x")
    )]
    InvalidTitleId(String),

    #[error("Invalid icon for {title_id}: {reason}")]
    #[diagnostic(code(titledb_store::invalid_icon))]
    InvalidIcon { title_id: String, reason: String },

    #[error("Pack has no entries")]
    #[diagnostic(
        code(titledb_store::empty_pack),
        help("Add at least one entry before writing")
    )]
    EmptyPack,

    #[error(transparent)]
    #[diagnostic(code(titledb_store::filesystem))]
    FileSystem(#[from] FileSystemError),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError {
            action: "reading pack data".into(),
            source: err,
        }
    }
}

/// Extension trait for adding context to I/O errors.
pub trait ErrorContext<T> {
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
            StoreError::IoError {
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
        assert_eq!(
            StoreError::InvalidPack("bad magic".into()).to_string(),
            "Invalid pack: bad magic"
        );
        assert_eq!(
            StoreError::InvalidTitleId("xyz".into()).to_string(),
            "Invalid title id `xyz`"
        );
        assert_eq!(StoreError::EmptyPack.to_string(), "Pack has no entries");
    }

    #[test]
    fn test_with_context() {
        let result: std::io::Result<()> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = result
            .with_context(|| "opening icons.pack".to_string())
            .unwrap_err();
        assert_eq!(err.to_string(), "Error while opening icons.pack: gone");
    }
}
