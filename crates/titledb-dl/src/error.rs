use std::io;

use miette::Diagnostic;
use thiserror::Error;

/// Why a fetch did not produce the requested bytes.
#[derive(Error, Diagnostic, Debug)]
pub enum DownloadError {
    #[error("`{url}` is not a valid URL")]
    #[diagnostic(code(titledb_dl::invalid_url))]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Request failed: {0}")]
    #[diagnostic(
        code(titledb_dl::network),
        help("Check the connection, proxy and timeout settings")
    )]
    Network(Box<ureq::Error>),

    #[error("Server answered {status} for {url}")]
    #[diagnostic(code(titledb_dl::http_status))]
    HttpError { status: u16, url: String },

    #[error("Cannot store the response: {0}")]
    #[diagnostic(code(titledb_dl::io))]
    Io(#[from] io::Error),
}

impl DownloadError {
    /// Splits a ureq failure for `url` into a status error or a network error.
    pub(crate) fn from_request(url: &str, err: ureq::Error) -> Self {
        if let ureq::Error::StatusCode(status) = err {
            return Self::HttpError {
                status,
                url: url.to_string(),
            };
        }
        Self::Network(Box::new(err))
    }
}
