use std::{
    fs::File,
    io::{BufWriter, Read as _, Write as _},
    path::Path,
};

use tracing::debug;
use ureq::{
    http::{header::CONTENT_LENGTH, Response},
    Body,
};
use url::Url;

use crate::{error::DownloadError, http::Http, types::Progress};

/// Byte-moving capability the update pipeline depends on.
///
/// Timeouts and retries are the implementation's concern.
pub trait Fetcher: Send + Sync {
    /// Streams `url` into `path`, truncating any existing file.
    fn fetch_to_file(
        &self,
        url: &str,
        path: &Path,
        on_progress: Option<&dyn Fn(Progress)>,
    ) -> Result<(), DownloadError>;

    /// Reads the whole body of `url` into memory.
    fn fetch_to_buffer(&self, url: &str) -> Result<Vec<u8>, DownloadError>;
}

/// [`Fetcher`] over HTTP(S) using the shared agent from [`crate::http_client`].
#[derive(Clone, Debug, Default)]
pub struct HttpFetcher;

impl HttpFetcher {
    pub fn new() -> Self {
        Self
    }

    fn validate(url: &str) -> Result<(), DownloadError> {
        Url::parse(url)
            .map(|_| ())
            .map_err(|source| DownloadError::InvalidUrl {
                url: url.to_string(),
                source,
            })
    }

    /// Total body length announced by the server, or 0.
    fn parse_content_length(resp: &Response<Body>) -> u64 {
        resp.headers()
            .get(CONTENT_LENGTH)
            .and_then(|h| h.to_str().ok())
            .and_then(|len| len.parse::<u64>().ok())
            .unwrap_or(0)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_to_file(
        &self,
        url: &str,
        path: &Path,
        on_progress: Option<&dyn Fn(Progress)>,
    ) -> Result<(), DownloadError> {
        Self::validate(url)?;
        debug!("downloading {} -> {}", url, path.display());

        let resp = Http::fetch(url)?;
        let total = Self::parse_content_length(&resp);

        if let Some(cb) = on_progress {
            cb(Progress::Starting {
                total,
            });
        }

        let mut writer = BufWriter::new(File::create(path)?);
        let mut reader = resp.into_body().into_reader();
        let mut buffer = [0u8; 8192];
        let mut downloaded = 0u64;

        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }

            writer.write_all(&buffer[..n])?;
            downloaded += n as u64;

            if let Some(cb) = on_progress {
                cb(Progress::Chunk {
                    current: downloaded,
                    total,
                });
            }
        }

        writer.flush()?;
        writer.get_ref().sync_all()?;

        if let Some(cb) = on_progress {
            cb(Progress::Complete {
                total: downloaded,
            });
        }

        Ok(())
    }

    fn fetch_to_buffer(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        Self::validate(url)?;
        debug!("fetching {}", url);

        let resp = Http::fetch(url)?;
        let mut body = Vec::new();
        resp.into_body().into_reader().read_to_end(&mut body)?;
        Ok(body)
    }
}
