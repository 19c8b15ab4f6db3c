//! Download transport for titledb.
//!
//! The store and update pipeline only need two capabilities from the network:
//! "fetch a URL into a local file, reporting progress" and "fetch a URL into
//! memory". Both are expressed by the [`Fetcher`] trait; [`HttpFetcher`] is the
//! production implementation backed by a shared [`ureq`] agent.

pub mod error;
pub mod fetcher;
pub mod http;
pub mod http_client;
pub mod types;

pub use error::DownloadError;
pub use fetcher::{Fetcher, HttpFetcher};
pub use types::Progress;
