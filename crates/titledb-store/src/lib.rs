//! Offline title metadata and icon store.
//!
//! Title metadata is served from a dense binary title pack (falling back to
//! JSON documents) and icons from a random-access icon pack (falling back to
//! a directory of per-title image files). [`MetadataService`] is the
//! consumer-facing entry point; the update pipeline calls
//! [`MetadataService::invalidate`] after installing new packs.
//!
//! # Example
//!
//! ```no_run
//! use titledb_store::{MetadataService, StoreLayout};
//!
//! let service = MetadataService::new(StoreLayout::new("/var/lib/titledb"));
//! if let Some(meta) = service.try_get_metadata(0x0100_0000_0001_0000) {
//!     println!("{}", meta.name.unwrap_or_default());
//! }
//! ```

pub mod error;
pub mod format;
pub mod icons;
mod io;
pub mod json;
pub mod layout;
pub mod metadata;
pub mod service;
pub mod titles;
pub mod writer;

pub use error::{ErrorContext, Result, StoreError};
pub use icons::IconPackStore;
pub use layout::StoreLayout;
pub use metadata::{format_title_id, parse_title_id, TitleMetadata};
pub use service::MetadataService;
pub use titles::TitlePackStore;
pub use writer::{IconPackWriter, TitlePackWriter};
