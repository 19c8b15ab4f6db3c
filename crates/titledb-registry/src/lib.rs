//! Remote manifest handling for the titledb offline store.
//!
//! A manifest is a small JSON document published next to the pack files. It
//! names the catalog version and describes the title pack and icon pack
//! (location, size and SHA-256 digest). This crate fetches and validates it,
//! resolves the file locations against the manifest's own URL and reads the
//! locally installed copy.
//!
//! # Example
//!
//! ```no_run
//! use titledb_dl::HttpFetcher;
//! use titledb_registry::fetch_manifest;
//!
//! fn remote_version() -> titledb_registry::Result<String> {
//!     let (manifest, _raw) =
//!         fetch_manifest(&HttpFetcher::new(), "https://cdn.example.com/titledb/manifest.json")?;
//!     Ok(manifest.version)
//! }
//! ```

pub mod error;
pub mod manifest;

pub use error::{ErrorContext, RegistryError, Result};
pub use manifest::{
    fetch_manifest, installed_version, parse_manifest, resolve_url, FileRef, Manifest,
};
