use ureq::{http::Response, Body};

use crate::{error::DownloadError, http_client};

pub struct Http;

impl Http {
    /// Issues an uncached GET through the shared agent.
    ///
    /// Non-2xx responses are returned as [`DownloadError::HttpError`].
    pub fn fetch(url: &str) -> Result<Response<Body>, DownloadError> {
        http_client::get(url)
            .header("Cache-Control", "no-cache")
            .call()
            .map_err(|err| DownloadError::from_request(url, err))
    }
}
