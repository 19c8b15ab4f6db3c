use std::{
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use titledb_registry::installed_version;
use tracing::{debug, warn};

use crate::{icons::IconPackStore, layout::StoreLayout, metadata::TitleMetadata, titles::TitlePackStore};

#[derive(Debug)]
struct Stores {
    titles: TitlePackStore,
    icons: IconPackStore,
}

impl Stores {
    fn new(layout: &StoreLayout) -> Self {
        Self {
            titles: TitlePackStore::new(layout.title_packs.clone(), layout.title_json.clone()),
            icons: IconPackStore::new(layout.icon_packs.clone(), layout.icon_dirs.clone()),
        }
    }
}

/// Read API over the installed title and icon data.
///
/// Everything loads lazily on first use and stays cached until
/// [`MetadataService::invalidate`], which swaps in a fresh, unloaded pair of
/// stores. A caller mid-lookup keeps reading the generation it started with.
#[derive(Debug)]
pub struct MetadataService {
    layout: StoreLayout,
    stores: RwLock<Arc<Stores>>,
}

impl MetadataService {
    pub fn new(layout: StoreLayout) -> Self {
        let stores = Stores::new(&layout);
        Self {
            layout,
            stores: RwLock::new(Arc::new(stores)),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    fn current(&self) -> Arc<Stores> {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Version recorded in the local manifest, or an empty string.
    pub fn get_installed_version(&self) -> String {
        let path = self.layout.manifest();
        match installed_version(&path) {
            Ok(version) => version.unwrap_or_default(),
            Err(err) => {
                warn!("ignoring unreadable {}: {}", path.display(), err);
                String::new()
            }
        }
    }

    /// Whether both packs are installed in the update destination.
    pub fn has_installed_packs(&self) -> bool {
        self.layout.titles_pack().is_file() && self.layout.icons_pack().is_file()
    }

    pub fn try_get_metadata(&self, title_id: u64) -> Option<TitleMetadata> {
        self.current().titles.try_get_metadata(title_id)
    }

    pub fn has_icon(&self, title_id: u64) -> bool {
        self.current().icons.has_icon(title_id)
    }

    pub fn try_get_icon_data(&self, title_id: u64) -> Option<Vec<u8>> {
        self.current().icons.try_get_icon_data(title_id)
    }

    /// Extension of the icon served for `title_id`.
    pub fn icon_extension(&self, title_id: u64) -> Option<String> {
        self.current().icons.icon_extension(title_id)
    }

    /// Legacy icon file for `title_id`; packed icons have no path.
    pub fn try_get_icon_path(&self, title_id: u64) -> Option<PathBuf> {
        self.current().icons.try_get_icon_path(title_id)
    }

    pub fn title_count(&self) -> usize {
        self.current().titles.len()
    }

    pub fn icon_count(&self) -> usize {
        self.current().icons.len()
    }

    pub fn title_source(&self) -> Option<PathBuf> {
        self.current().titles.source()
    }

    pub fn icon_source(&self) -> Option<PathBuf> {
        self.current().icons.source()
    }

    /// Drops every cache. The next lookup reloads from disk.
    pub fn invalidate(&self) {
        let fresh = Arc::new(Stores::new(&self.layout));
        *self.stores.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        debug!("metadata caches invalidated");
    }
}

#[cfg(test)]
mod tests {
    use std::{fs, sync::Barrier, thread};

    use tempfile::tempdir;

    use super::*;
    use crate::{
        metadata::format_title_id,
        writer::{IconPackWriter, TitlePackWriter},
    };

    fn install(layout: &StoreLayout, name: &str, icon: &[u8]) {
        let mut titles = TitlePackWriter::new();
        titles.add(
            1,
            TitleMetadata {
                name: Some(name.into()),
                ..Default::default()
            },
        );
        titles.write(layout.titles_pack()).unwrap();

        let mut icons = IconPackWriter::new();
        icons.add(1, "png", icon.to_vec()).unwrap();
        icons.write(layout.icons_pack()).unwrap();
    }

    #[test]
    fn test_empty_store() {
        let dir = tempdir().unwrap();
        let service = MetadataService::new(StoreLayout::new(dir.path()));

        assert_eq!(service.get_installed_version(), "");
        assert!(!service.has_installed_packs());
        assert_eq!(service.try_get_metadata(1), None);
        assert!(!service.has_icon(1));
        assert_eq!(service.try_get_icon_data(1), None);
        assert_eq!(service.title_count(), 0);
    }

    #[test]
    fn test_reads_installed_packs() {
        let dir = tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        install(&layout, "Installed", b"icon-v1");
        fs::write(layout.manifest(), r#"{"version": "4"}"#).unwrap();

        let service = MetadataService::new(layout);
        assert!(service.has_installed_packs());
        assert_eq!(service.get_installed_version(), "4");
        assert_eq!(
            service.try_get_metadata(1).unwrap().name.as_deref(),
            Some("Installed")
        );
        assert_eq!(service.try_get_icon_data(1).as_deref(), Some(&b"icon-v1"[..]));
        assert_eq!(service.icon_extension(1).as_deref(), Some("png"));
        assert_eq!(service.try_get_icon_path(1), None);
    }

    #[test]
    fn test_legacy_icon_path() {
        let dir = tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        fs::create_dir_all(&layout.icon_dirs[0]).unwrap();
        let icon = layout.icon_dirs[0].join(format!("{}.bmp", format_title_id(2)));
        fs::write(&icon, b"bmp").unwrap();

        let service = MetadataService::new(layout);
        assert!(service.has_icon(2));
        assert_eq!(service.try_get_icon_path(2), Some(icon));
        assert_eq!(service.try_get_icon_data(2).as_deref(), Some(&b"bmp"[..]));
    }

    #[test]
    fn test_pinned_until_invalidate() {
        let dir = tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        install(&layout, "Old", b"old-icon");

        let service = MetadataService::new(layout.clone());
        assert_eq!(service.try_get_metadata(1).unwrap().name.as_deref(), Some("Old"));

        install(&layout, "New", b"new-icon!");
        assert_eq!(service.try_get_metadata(1).unwrap().name.as_deref(), Some("Old"));

        service.invalidate();
        assert_eq!(service.try_get_metadata(1).unwrap().name.as_deref(), Some("New"));
        assert_eq!(service.try_get_icon_data(1).as_deref(), Some(&b"new-icon!"[..]));
    }

    #[test]
    fn test_concurrent_readers_during_invalidate() {
        let dir = tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        install(&layout, "Stable", b"icon");

        let service = Arc::new(MetadataService::new(layout));
        let barrier = Arc::new(Barrier::new(5));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    for _ in 0..200 {
                        let meta = service.try_get_metadata(1).unwrap();
                        assert_eq!(meta.name.as_deref(), Some("Stable"));
                        assert!(service.has_icon(1));
                    }
                })
            })
            .collect();

        barrier.wait();
        for _ in 0..50 {
            service.invalidate();
        }
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
