use std::path::{Path, PathBuf};

/// Directory holding the installed packs, relative to the data directory.
pub const OFFLINE_DIR: &str = "offline_db";
pub const TITLES_PACK: &str = "titles.pack";
pub const ICONS_PACK: &str = "icons.pack";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Legacy icon extensions, in probe order.
pub const LEGACY_EXTENSIONS: [&str; 7] = ["webp", "png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Where the store looks for its files.
///
/// Every candidate list is ordered; the first usable file wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub data_dir: PathBuf,
    pub title_packs: Vec<PathBuf>,
    pub title_json: Vec<PathBuf>,
    pub icon_packs: Vec<PathBuf>,
    pub icon_dirs: Vec<PathBuf>,
}

impl StoreLayout {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        let data_dir = data_dir.as_ref().to_path_buf();
        let offline = data_dir.join(OFFLINE_DIR);

        Self {
            title_packs: vec![offline.join(TITLES_PACK), data_dir.join(TITLES_PACK)],
            title_json: vec![
                offline.join("titles.json"),
                offline.join("titledb.json"),
                data_dir.join("titles.json"),
            ],
            icon_packs: vec![offline.join(ICONS_PACK), data_dir.join(ICONS_PACK)],
            icon_dirs: vec![offline.join("icons"), data_dir.join("icons")],
            data_dir,
        }
    }

    /// Destination directory of the update pipeline.
    pub fn offline_dir(&self) -> PathBuf {
        self.data_dir.join(OFFLINE_DIR)
    }

    pub fn titles_pack(&self) -> PathBuf {
        self.offline_dir().join(TITLES_PACK)
    }

    pub fn icons_pack(&self) -> PathBuf {
        self.offline_dir().join(ICONS_PACK)
    }

    /// Local copy of the manifest the installed packs came from.
    pub fn manifest(&self) -> PathBuf {
        self.offline_dir().join(MANIFEST_FILE)
    }
}
