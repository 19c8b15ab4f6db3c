use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use tracing::{debug, warn};

use crate::{
    error::{ErrorContext, Result},
    format::parse_title_pack,
    json::parse_title_json,
    metadata::TitleMetadata,
};

#[derive(Debug, Default)]
struct TitleState {
    attempted: bool,
    entries: HashMap<u64, TitleMetadata>,
    source: Option<PathBuf>,
}

/// Title id to metadata index, loaded from the first usable candidate.
///
/// Binary packs are tried first, then JSON documents. A candidate counts only
/// if it parses and yields at least one entry. Duplicate ids keep the last
/// entry in file order.
#[derive(Debug)]
pub struct TitlePackStore {
    packs: Vec<PathBuf>,
    documents: Vec<PathBuf>,
    state: RwLock<TitleState>,
}

impl TitlePackStore {
    pub fn new(packs: Vec<PathBuf>, documents: Vec<PathBuf>) -> Self {
        Self {
            packs,
            documents,
            state: RwLock::new(TitleState::default()),
        }
    }

    /// Loads the index on first use. Returns whether any entry is available.
    pub fn ensure_loaded(&self) -> bool {
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.attempted {
                return !state.entries.is_empty();
            }
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.attempted {
            state.attempted = true;
            if let Some((source, entries)) = self.load() {
                state.entries = entries.into_iter().collect();
                debug!(
                    "indexed {} titles from {}",
                    state.entries.len(),
                    source.display()
                );
                state.source = Some(source);
            }
        }
        !state.entries.is_empty()
    }

    fn load(&self) -> Option<(PathBuf, Vec<(u64, TitleMetadata)>)> {
        let binary = self
            .packs
            .iter()
            .map(|path| (path, read_pack(path)));
        let documents = self
            .documents
            .iter()
            .map(|path| (path, read_document(path)));

        for (path, result) in binary.chain(documents) {
            match result {
                Ok(Some(entries)) if !entries.is_empty() => {
                    return Some((path.clone(), entries));
                }
                Ok(Some(_)) => debug!("{} has no usable titles", path.display()),
                Ok(None) => {}
                Err(err) => warn!("rejecting {}: {}", path.display(), err),
            }
        }
        debug!("no title metadata source found");
        None
    }

    pub fn try_get_metadata(&self, title_id: u64) -> Option<TitleMetadata> {
        if !self.ensure_loaded() {
            return None;
        }
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(&title_id)
            .cloned()
    }

    /// Number of indexed titles, loading if needed.
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

    /// File the index was loaded from.
    pub fn source(&self) -> Option<PathBuf> {
        self.ensure_loaded();
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .source
            .clone()
    }

    /// Drops the index; the next lookup reloads from disk.
    pub fn invalidate(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = TitleState::default();
    }
}

/// `Ok(None)` when the candidate does not exist.
fn read_pack(path: &Path) -> Result<Option<Vec<(u64, TitleMetadata)>>> {
    if !path.is_file() {
        return Ok(None);
    }
    debug!("probing title pack {}", path.display());
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    parse_title_pack(&bytes).map(Some)
}

fn read_document(path: &Path) -> Result<Option<Vec<(u64, TitleMetadata)>>> {
    if !path.is_file() {
        return Ok(None);
    }
    debug!("probing title document {}", path.display());
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_title_json(&text).map(Some)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::writer::TitlePackWriter;

    fn titled(name: &str) -> TitleMetadata {
        TitleMetadata {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_nothing_installed() {
        let dir = tempdir().unwrap();
        let store = TitlePackStore::new(
            vec![dir.path().join("titles.pack")],
            vec![dir.path().join("titles.json")],
        );

        assert!(!store.ensure_loaded());
        assert_eq!(store.try_get_metadata(1), None);
        assert_eq!(store.source(), None);
    }

    #[test]
    fn test_loads_binary_pack() {
        let dir = tempdir().unwrap();
        let pack = dir.path().join("titles.pack");

        let mut writer = TitlePackWriter::new();
        writer.add(0x10, titled("Ten"));
        writer.add(
            0x20,
            TitleMetadata {
                name: Some("Twenty".into()),
                size: Some(5),
                ..Default::default()
            },
        );
        writer.write(&pack).unwrap();

        let store = TitlePackStore::new(vec![pack.clone()], vec![]);
        assert!(store.ensure_loaded());
        assert_eq!(store.len(), 2);
        assert_eq!(store.try_get_metadata(0x10), Some(titled("Ten")));
        assert_eq!(store.try_get_metadata(0x20).unwrap().size, Some(5));
        assert_eq!(store.source(), Some(pack));
    }

    #[test]
    fn test_rejected_pack_falls_through() {
        let dir = tempdir().unwrap();
        let broken = dir.path().join("broken.pack");
        let good = dir.path().join("good.pack");
        let json = dir.path().join("titles.json");

        let mut writer = TitlePackWriter::new();
        writer.add(1, titled("From Pack"));
        writer.write(&good).unwrap();

        let mut bytes = fs::read(&good).unwrap();
        bytes[12..16].copy_from_slice(&40u32.to_le_bytes());
        fs::write(&broken, bytes).unwrap();
        fs::write(&json, r#"[["1", "From Json"]]"#).unwrap();

        let store = TitlePackStore::new(vec![broken.clone(), good.clone()], vec![json.clone()]);
        assert_eq!(store.try_get_metadata(1), Some(titled("From Pack")));
        assert_eq!(store.source(), Some(good));

        let store = TitlePackStore::new(vec![broken], vec![json.clone()]);
        assert_eq!(store.try_get_metadata(1), Some(titled("From Json")));
        assert_eq!(store.source(), Some(json));
    }

    #[test]
    fn test_duplicate_ids_last_wins() {
        let dir = tempdir().unwrap();
        let pack = dir.path().join("titles.pack");

        let mut writer = TitlePackWriter::new();
        writer.add(7, titled("First"));
        writer.add(7, titled("Second"));
        writer.write(&pack).unwrap();

        let store = TitlePackStore::new(vec![pack], vec![]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.try_get_metadata(7), Some(titled("Second")));
    }

    #[test]
    fn test_cache_pinned_until_invalidate() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("titles.json");
        fs::write(&json, r#"[["1", "Old"]]"#).unwrap();

        let store = TitlePackStore::new(vec![], vec![json.clone()]);
        assert_eq!(store.try_get_metadata(1), Some(titled("Old")));

        fs::write(&json, r#"[["1", "New"]]"#).unwrap();
        assert_eq!(store.try_get_metadata(1), Some(titled("Old")));

        store.invalidate();
        assert_eq!(store.try_get_metadata(1), Some(titled("New")));
    }

    #[test]
    fn test_failed_load_is_not_retried() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("titles.json");

        let store = TitlePackStore::new(vec![], vec![json.clone()]);
        assert!(!store.ensure_loaded());

        fs::write(&json, r#"[["1", "Late"]]"#).unwrap();
        assert!(!store.ensure_loaded());

        store.invalidate();
        assert!(store.ensure_loaded());
    }
}
