use std::{io, path::PathBuf};

use miette::Diagnostic;
use thiserror::Error;

/// Failure to digest a file.
#[derive(Error, Diagnostic, Debug)]
pub enum HashError {
    #[error("Cannot hash `{}`: {source}", path.display())]
    #[diagnostic(code(titledb_utils::hash_read))]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure to expand a user supplied path.
#[derive(Error, Diagnostic, Debug)]
pub enum PathError {
    #[error("Path is empty")]
    #[diagnostic(code(titledb_utils::empty_path))]
    Empty,

    #[error("Cannot resolve a relative path: {source}")]
    #[diagnostic(code(titledb_utils::current_dir))]
    CurrentDir {
        #[source]
        source: io::Error,
    },

    #[error("`${var}` in `{input}` is not set")]
    #[diagnostic(
        code(titledb_utils::missing_env_var),
        help("Export the variable or write the path out in full")
    )]
    MissingEnvVar { var: String, input: String },

    #[error("`${{` is never closed in `{input}`")]
    #[diagnostic(code(titledb_utils::unclosed_variable))]
    UnclosedVariable { input: String },
}

/// Failure of a filesystem step of an install.
#[derive(Error, Diagnostic, Debug)]
pub enum FileSystemError {
    #[error("Cannot {action} `{}`: {source}", path.display())]
    #[diagnostic(code(titledb_utils::file))]
    File {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Cannot {action} directory `{}`: {source}", path.display())]
    #[diagnostic(
        code(titledb_utils::directory),
        help("Check that the data directory is writable")
    )]
    Directory {
        path: PathBuf,
        action: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Cannot move `{}` to `{}`: {source}", from.display(), to.display())]
    #[diagnostic(code(titledb_utils::rename))]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{}` exists and is not a directory", path.display())]
    #[diagnostic(code(titledb_utils::not_a_directory))]
    NotADirectory { path: PathBuf },
}

#[derive(Error, Diagnostic, Debug)]
pub enum UtilsError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Hash(#[from] HashError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Path(#[from] PathError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    FileSystem(#[from] FileSystemError),
}

pub type FileSystemResult<T> = std::result::Result<T, FileSystemError>;
pub type HashResult<T> = std::result::Result<T, HashError>;
pub type PathResult<T> = std::result::Result<T, PathError>;
