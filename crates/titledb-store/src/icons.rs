use std::{
    collections::HashMap,
    fs::{self, File},
    io::{BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError, RwLock},
};

use tracing::{debug, trace, warn};

use crate::{
    error::{ErrorContext, Result, StoreError},
    format::{
        normalize_extension, IconRecord, PackHeader, ICON_ENTRY_SIZE, ICON_MAGIC,
    },
    layout::LEGACY_EXTENSIONS,
    metadata::format_title_id,
};

/// Location of one icon inside the data blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconEntry {
    /// Offset relative to the data blob.
    pub offset: u64,
    pub size: u32,
    pub extension: String,
}

#[derive(Debug, Default)]
struct IconState {
    attempted: bool,
    pack: Option<PathBuf>,
    data_offset: u64,
    entries: HashMap<u64, IconEntry>,
}

/// Random-access icon index with a legacy per-title directory fallback.
///
/// Unlike title packs, individual bad records are skipped rather than
/// rejecting the file; only header problems move on to the next candidate.
#[derive(Debug)]
pub struct IconPackStore {
    packs: Vec<PathBuf>,
    legacy_dirs: Vec<PathBuf>,
    state: RwLock<IconState>,
    // positive hits only; a file added later is still found
    legacy: Mutex<HashMap<u64, PathBuf>>,
}

impl IconPackStore {
    pub fn new(packs: Vec<PathBuf>, legacy_dirs: Vec<PathBuf>) -> Self {
        Self {
            packs,
            legacy_dirs,
            state: RwLock::new(IconState::default()),
            legacy: Mutex::new(HashMap::new()),
        }
    }

    /// Loads the packed index on first use. Returns whether a pack was indexed.
    pub fn ensure_loaded(&self) -> bool {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.attempted {
                return state.pack.is_some();
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.attempted {
            state.attempted = true;
            for path in &self.packs {
                if !path.is_file() {
                    continue;
                }
                match read_index(path) {
                    Ok((data_offset, entries)) => {
                        debug!("indexed {} icons from {}", entries.len(), path.display());
                        state.pack = Some(path.clone());
                        state.data_offset = data_offset;
                        state.entries = entries;
                        break;
                    }
                    Err(err) => warn!("rejecting {}: {}", path.display(), err),
                }
            }
        }
        state.pack.is_some()
    }

    fn packed(&self, title_id: u64) -> Option<(PathBuf, u64, IconEntry)> {
        if !self.ensure_loaded() {
            return None;
        }
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let entry = state.entries.get(&title_id)?.clone();
        let pack = state.pack.clone()?;
        Some((pack, state.data_offset, entry))
    }

    pub fn has_icon(&self, title_id: u64) -> bool {
        self.packed(title_id).is_some() || self.try_get_icon_path(title_id).is_some()
    }

    /// Extension of the icon for `title_id`, packed or legacy.
    pub fn icon_extension(&self, title_id: u64) -> Option<String> {
        if let Some((_, _, entry)) = self.packed(title_id) {
            return Some(entry.extension);
        }
        self.try_get_icon_path(title_id)
            .and_then(|path| path.extension().map(|e| e.to_string_lossy().into_owned()))
    }

    /// Reads the icon bytes for `title_id`.
    ///
    /// The pack is opened for every call. A packed entry that cannot be read
    /// falls back to the legacy directories.
    pub fn try_get_icon_data(&self, title_id: u64) -> Option<Vec<u8>> {
        if let Some((pack, data_offset, entry)) = self.packed(title_id) {
            match read_icon(&pack, data_offset, &entry) {
                Ok(data) => return Some(data),
                Err(err) => {
                    warn!(
                        "failed to read icon {} from {}: {}",
                        format_title_id(title_id),
                        pack.display(),
                        err
                    )
                }
            }
        }

        let path = self.try_get_icon_path(title_id)?;
        match fs::read(&path) {
            Ok(data) if !data.is_empty() => Some(data),
            Ok(_) => None,
            Err(err) => {
                warn!("failed to read {}: {}", path.display(), err);
                None
            }
        }
    }

    /// Path of a legacy icon file. Packed icons have no path.
    pub fn try_get_icon_path(&self, title_id: u64) -> Option<PathBuf> {
        let mut legacy = self.legacy.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = legacy.get(&title_id) {
            return Some(path.clone());
        }

        let path = probe_legacy(&self.legacy_dirs, title_id)?;
        legacy.insert(title_id, path.clone());
        Some(path)
    }

    /// Number of packed icons, loading if needed.
    pub fn len(&self) -> usize {
        self.ensure_loaded();
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn source(&self) -> Option<PathBuf> {
        self.ensure_loaded();
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .pack
            .clone()
    }

    /// Drops the packed index and the legacy cache.
    pub fn invalidate(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let mut legacy = self.legacy.lock().unwrap_or_else(PoisonError::into_inner);
        *state = IconState::default();
        legacy.clear();
    }
}

fn probe_legacy(dirs: &[PathBuf], title_id: u64) -> Option<PathBuf> {
    let stem = format_title_id(title_id);
    let stem = stem.as_str();
    dirs.iter()
        .flat_map(|dir| {
            LEGACY_EXTENSIONS
                .iter()
                .map(move |ext| dir.join(format!("{stem}.{ext}")))
        })
        .find(|path| {
            trace!("probing {}", path.display());
            path.is_file()
        })
}

/// Reads the header and entry table, skipping records that cannot be served.
fn read_index(path: &Path) -> Result<(u64, HashMap<u64, IconEntry>)> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let file_len = file
        .metadata()
        .with_context(|| format!("reading metadata of {}", path.display()))?
        .len();
    let mut reader = BufReader::new(file);

    let header = PackHeader::read(&mut reader)
        .map_err(|_| StoreError::InvalidPack("truncated header".into()))?;
    header.validate(ICON_MAGIC, ICON_ENTRY_SIZE, file_len)?;

    let mut entries = HashMap::with_capacity(header.count as usize);
    for _ in 0..header.count {
        let record = IconRecord::read(&mut reader)?;
        let extension = normalize_extension(&record.ext);

        if extension.is_empty() || record.absolute_range(header.blob_offset, file_len).is_none() {
            trace!("skipping icon record for {}", format_title_id(record.title_id));
            continue;
        }

        entries.insert(
            record.title_id,
            IconEntry {
                offset: record.offset,
                size: record.size,
                extension,
            },
        );
    }

    Ok((header.blob_offset, entries))
}

fn read_icon(pack: &Path, data_offset: u64, entry: &IconEntry) -> Result<Vec<u8>> {
    let mut file = File::open(pack).with_context(|| format!("opening {}", pack.display()))?;
    let start = data_offset
        .checked_add(entry.offset)
        .ok_or_else(|| StoreError::InvalidPack("icon offset overflows".into()))?;
    file.seek(SeekFrom::Start(start))
        .with_context(|| format!("seeking in {}", pack.display()))?;

    let mut data = vec![0u8; entry.size as usize];
    file.read_exact(&mut data)
        .with_context(|| format!("reading icon from {}", pack.display()))?;
    Ok(data)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::{
        format::{encode_extension, FORMAT_VERSION, HEADER_SIZE},
        writer::IconPackWriter,
    };

    const PNG: &[u8] = b"\x89PNG fake";
    const JPG: &[u8] = b"\xff\xd8 fake jpeg";

    fn write_raw_pack(path: &Path, records: &[IconRecord], data: &[u8]) {
        let data_offset = HEADER_SIZE + records.len() as u64 * u64::from(ICON_ENTRY_SIZE);
        let mut buf = Vec::new();
        PackHeader {
            magic: ICON_MAGIC,
            version: FORMAT_VERSION,
            entry_size: ICON_ENTRY_SIZE,
            count: records.len() as u32,
            flags: 0,
            blob_offset: data_offset,
        }
        .write(&mut buf)
        .unwrap();
        for record in records {
            record.write(&mut buf).unwrap();
        }
        buf.extend_from_slice(data);
        fs::write(path, buf).unwrap();
    }

    #[test]
    fn test_pack_round_trip() {
        let dir = tempdir().unwrap();
        let pack = dir.path().join("icons.pack");

        let mut writer = IconPackWriter::new();
        writer.add(1, "png", PNG.to_vec()).unwrap();
        writer.add(2, "JPG", JPG.to_vec()).unwrap();
        writer.write(&pack).unwrap();

        let store = IconPackStore::new(vec![pack.clone()], vec![]);
        assert!(store.ensure_loaded());
        assert_eq!(store.len(), 2);
        assert_eq!(store.try_get_icon_data(1).as_deref(), Some(PNG));
        assert_eq!(store.try_get_icon_data(2).as_deref(), Some(JPG));
        assert_eq!(store.icon_extension(2).as_deref(), Some("jpg"));
        assert!(store.has_icon(1));
        assert!(!store.has_icon(3));
        assert_eq!(store.try_get_icon_path(1), None);
        assert_eq!(store.source(), Some(pack));
    }

    #[test]
    fn test_out_of_bounds_records_skipped() {
        let dir = tempdir().unwrap();
        let pack = dir.path().join("icons.pack");
        let ext = encode_extension("png").unwrap();

        let records = [
            IconRecord {
                title_id: 1,
                offset: 0,
                size: PNG.len() as u32,
                ext,
                reserved: 0,
            },
            IconRecord {
                title_id: 2,
                offset: 4,
                size: 1000,
                ext,
                reserved: 0,
            },
            IconRecord {
                title_id: 3,
                offset: 0,
                size: 4,
                ext: [0; 8],
                reserved: 0,
            },
            IconRecord {
                title_id: 4,
                offset: 0,
                size: 0,
                ext,
                reserved: 0,
            },
        ];
        write_raw_pack(&pack, &records, PNG);

        let store = IconPackStore::new(vec![pack], vec![]);
        assert!(store.ensure_loaded());
        assert_eq!(store.len(), 1);
        assert_eq!(store.try_get_icon_data(1).as_deref(), Some(PNG));
        for id in 2..=4 {
            assert!(!store.has_icon(id), "{id}");
            assert_eq!(store.try_get_icon_data(id), None);
        }
    }

    #[test]
    fn test_bad_header_moves_to_next_candidate() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.pack");
        let good = dir.path().join("good.pack");

        let mut writer = IconPackWriter::new();
        writer.add(9, "webp", PNG.to_vec()).unwrap();
        writer.write(&good).unwrap();

        let mut bytes = fs::read(&good).unwrap();
        bytes[12..16].copy_from_slice(&48u32.to_le_bytes());
        fs::write(&broken, bytes).unwrap();

        let store = IconPackStore::new(vec![broken.clone()], vec![]);
        assert!(!store.ensure_loaded());

        let store = IconPackStore::new(vec![broken, good.clone()], vec![]);
        assert!(store.ensure_loaded());
        assert_eq!(store.source(), Some(good));
    }

    #[test]
    fn test_legacy_probe_order() {
        let dir = tempdir().unwrap();
        let first = dir.path().join("offline_db/icons");
        let second = dir.path().join("icons");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();

        let stem = format_title_id(0xABC);
        fs::write(first.join(format!("{stem}.png")), PNG).unwrap();
        fs::write(first.join(format!("{stem}.jpg")), JPG).unwrap();
        fs::write(second.join(format!("{stem}.webp")), b"second dir").unwrap();

        let store = IconPackStore::new(vec![], vec![first.clone(), second]);
        assert!(!store.ensure_loaded());
        assert!(store.has_icon(0xABC));
        assert_eq!(
            store.try_get_icon_path(0xABC),
            Some(first.join(format!("{stem}.png")))
        );
        assert_eq!(store.try_get_icon_data(0xABC).as_deref(), Some(PNG));
        assert_eq!(store.icon_extension(0xABC).as_deref(), Some("png"));
    }

    #[test]
    fn test_probe_legacy_falls_through_dirs() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty");
        let icons = dir.path().join("icons");
        fs::create_dir_all(&empty).unwrap();
        fs::create_dir_all(&icons).unwrap();
        let stem = format_title_id(0x42);
        fs::write(icons.join(format!("{stem}.bmp")), b"bmp").unwrap();

        let dirs = [empty, icons.clone()];
        assert_eq!(
            probe_legacy(&dirs, 0x42),
            Some(icons.join(format!("{stem}.bmp")))
        );
        assert_eq!(probe_legacy(&dirs, 0x43), None);
    }

    #[test]
    fn test_legacy_cache_until_invalidate() {
        let dir = tempdir().unwrap();
        let icons = dir.path().join("icons");
        fs::create_dir_all(&icons).unwrap();
        let stem = format_title_id(5);

        let store = IconPackStore::new(vec![], vec![icons.clone()]);
        assert_eq!(store.try_get_icon_path(5), None);

        fs::write(icons.join(format!("{stem}.jpg")), JPG).unwrap();
        let jpg = store.try_get_icon_path(5).unwrap();
        assert!(jpg.ends_with(format!("{stem}.jpg")));

        fs::write(icons.join(format!("{stem}.webp")), b"newer").unwrap();
        assert_eq!(store.try_get_icon_path(5), Some(jpg));

        store.invalidate();
        assert!(store
            .try_get_icon_path(5)
            .unwrap()
            .ends_with(format!("{stem}.webp")));
    }

    #[test]
    fn test_packed_index_pinned_until_invalidate() {
        let dir = tempdir().unwrap();
        let pack = dir.path().join("icons.pack");

        let mut writer = IconPackWriter::new();
        writer.add(1, "png", PNG.to_vec()).unwrap();
        writer.write(&pack).unwrap();

        let store = IconPackStore::new(vec![pack.clone()], vec![]);
        assert!(store.has_icon(1));

        let mut writer = IconPackWriter::new();
        writer.add(2, "png", PNG.to_vec()).unwrap();
        writer.write(&pack).unwrap();
        assert!(store.has_icon(1));
        assert!(!store.has_icon(2));

        store.invalidate();
        assert!(!store.has_icon(1));
        assert!(store.has_icon(2));
    }
}
