//! Pack builders.
//!
//! Both writers serialize to `<path>.tmp` and install the result with an
//! atomic commit, so readers never observe a partially written pack.

use std::{
    collections::{BTreeMap, HashMap},
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use titledb_utils::{
    atomic,
    fs::{ensure_dir_exists, safe_remove, with_suffix},
};
use tracing::{debug, trace};

use crate::{
    error::{ErrorContext, Result, StoreError},
    format::{
        demo_to_raw, encode_extension, IconRecord, PackHeader, TitleRecord, FLAG_DESCRIPTION,
        FLAG_INTRO, FLAG_IS_DEMO, FLAG_NAME, FLAG_PUBLISHER, FLAG_RELEASE_DATE, FLAG_SIZE,
        FLAG_VERSION, FORMAT_VERSION, HEADER_SIZE, ICON_ENTRY_SIZE, ICON_EXT_LEN, ICON_MAGIC,
        MAX_ICON_SIZE, TITLE_ENTRY_SIZE, TITLE_MAGIC,
    },
    layout::LEGACY_EXTENSIONS,
    metadata::{format_title_id, parse_title_id, TitleMetadata},
};

/// Writes `bytes` next to `path` and atomically moves them into place.
fn install(path: &Path, write: impl FnOnce(&mut dyn Write) -> Result<()>) -> Result<()> {
    let temp = with_suffix(path, ".tmp");
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir_exists(parent)?;
    }

    let written = File::create(&temp)
        .with_context(|| format!("creating {}", temp.display()))
        .and_then(|file| {
            let mut writer = BufWriter::new(file);
            write(&mut writer)?;
            writer
                .flush()
                .with_context(|| format!("writing {}", temp.display()))?;
            writer
                .get_ref()
                .sync_all()
                .with_context(|| format!("syncing {}", temp.display()))
        });

    if let Err(err) = written {
        if let Err(remove_err) = safe_remove(&temp) {
            debug!("{remove_err}");
        }
        return Err(err);
    }

    atomic::commit(&temp, path)?.cleanup()?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Deduplicating strings blob. Offset 0 is the leading NUL and means "absent".
#[derive(Debug)]
struct StringTable {
    blob: Vec<u8>,
    offsets: HashMap<String, u32>,
}

impl StringTable {
    fn new() -> Self {
        Self {
            blob: vec![0],
            offsets: HashMap::new(),
        }
    }

    fn intern(&mut self, value: Option<&str>) -> Result<u32> {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return Ok(0);
        };
        if let Some(&offset) = self.offsets.get(value) {
            return Ok(offset);
        }

        let offset = u32::try_from(self.blob.len())
            .map_err(|_| StoreError::InvalidPack("strings blob exceeds 4 GiB".into()))?;
        // interior NULs would truncate the string on read
        self.blob
            .extend(value.bytes().map(|b| if b == 0 { b' ' } else { b }));
        self.blob.push(0);
        self.offsets.insert(value.to_string(), offset);
        Ok(offset)
    }
}

/// Builds a title pack.
#[derive(Debug, Default)]
pub struct TitlePackWriter {
    entries: Vec<(u64, TitleMetadata)>,
}

impl TitlePackWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an entry. Entries without any field are ignored.
    pub fn add(&mut self, title_id: u64, metadata: TitleMetadata) {
        let metadata = metadata.normalized();
        if !metadata.is_empty() {
            self.entries.push((title_id, metadata));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let count = u32::try_from(self.entries.len())
            .map_err(|_| StoreError::InvalidPack("too many entries".into()))?;
        if count == 0 {
            return Err(StoreError::EmptyPack);
        }

        let mut strings = StringTable::new();
        let mut records = Vec::with_capacity(self.entries.len());

        for (title_id, meta) in &self.entries {
            let mut flags = 0;
            let mut text = |value: &Option<String>, flag: u32| -> Result<u32> {
                let offset = strings.intern(value.as_deref())?;
                if offset != 0 {
                    flags |= flag;
                }
                Ok(offset)
            };

            let name = text(&meta.name, FLAG_NAME)?;
            let publisher = text(&meta.publisher, FLAG_PUBLISHER)?;
            let intro = text(&meta.intro, FLAG_INTRO)?;
            let description = text(&meta.description, FLAG_DESCRIPTION)?;

            for (present, flag) in [
                (meta.has_size(), FLAG_SIZE),
                (meta.has_version(), FLAG_VERSION),
                (meta.has_release_date(), FLAG_RELEASE_DATE),
                (meta.has_is_demo(), FLAG_IS_DEMO),
            ] {
                if present {
                    flags |= flag;
                }
            }

            records.push(TitleRecord {
                title_id: *title_id,
                name,
                publisher,
                intro,
                description,
                size: meta.size.unwrap_or_default(),
                version: meta.version.unwrap_or_default(),
                release_date: meta.release_date.unwrap_or_default(),
                is_demo: demo_to_raw(meta.is_demo),
                flags,
            });
        }

        let strings_offset = HEADER_SIZE + u64::from(count) * u64::from(TITLE_ENTRY_SIZE);
        let mut out = Vec::with_capacity(strings_offset as usize + strings.blob.len());
        PackHeader {
            magic: TITLE_MAGIC,
            version: FORMAT_VERSION,
            entry_size: TITLE_ENTRY_SIZE,
            count,
            flags: 0,
            blob_offset: strings_offset,
        }
        .write(&mut out)?;
        for record in &records {
            record.write(&mut out)?;
        }
        out.extend_from_slice(&strings.blob);
        Ok(out)
    }

    /// Serializes the queued entries and installs them at `path`.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.encode()?;
        install(path.as_ref(), |w| {
            w.write_all(&bytes)?;
            Ok(())
        })
    }
}

#[derive(Debug)]
struct PendingIcon {
    title_id: u64,
    ext: [u8; ICON_EXT_LEN],
    data: Vec<u8>,
}

/// Builds an icon pack.
#[derive(Debug, Default)]
pub struct IconPackWriter {
    icons: Vec<PendingIcon>,
}

impl IconPackWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, title_id: u64, extension: &str, data: Vec<u8>) -> Result<()> {
        let invalid = |reason: String| {
            StoreError::InvalidIcon {
                title_id: format_title_id(title_id),
                reason,
            }
        };

        let ext = encode_extension(extension)
            .ok_or_else(|| invalid(format!("unsupported extension `{extension}`")))?;
        if data.is_empty() {
            return Err(invalid("empty image".into()));
        }
        if data.len() > MAX_ICON_SIZE as usize {
            return Err(invalid(format!("{} bytes exceeds the icon limit", data.len())));
        }

        self.icons.push(PendingIcon {
            title_id,
            ext,
            data,
        });
        Ok(())
    }

    /// Adds every `<title id>.<ext>` image found directly in `dir`.
    ///
    /// When a title has several images the extension order of the legacy
    /// lookup decides. Returns the number of icons added.
    pub fn add_directory<P: AsRef<Path>>(&mut self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        let mut chosen: BTreeMap<u64, (usize, PathBuf)> = BTreeMap::new();

        for entry in fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))? {
            let path = entry
                .with_context(|| format!("reading {}", dir.display()))?
                .path();
            if !path.is_file() {
                continue;
            }

            let (Some(stem), Some(ext)) = (
                path.file_stem().and_then(|s| s.to_str()),
                path.extension().and_then(|s| s.to_str()),
            ) else {
                continue;
            };
            let ext = ext.to_ascii_lowercase();
            let (Ok(title_id), Some(rank)) = (
                parse_title_id(stem),
                LEGACY_EXTENSIONS.iter().position(|e| *e == ext),
            ) else {
                trace!("ignoring {}", path.display());
                continue;
            };

            match chosen.get(&title_id) {
                Some((best, _)) if *best <= rank => {}
                _ => {
                    chosen.insert(title_id, (rank, path));
                }
            }
        }

        let added = chosen.len();
        for (title_id, (rank, path)) in chosen {
            let data = fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            self.add(title_id, LEGACY_EXTENSIONS[rank], data)?;
        }
        Ok(added)
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    /// Serializes the queued icons and installs them at `path`.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let count = u32::try_from(self.icons.len())
            .map_err(|_| StoreError::InvalidPack("too many icons".into()))?;
        if count == 0 {
            return Err(StoreError::EmptyPack);
        }

        let data_offset = HEADER_SIZE + u64::from(count) * u64::from(ICON_ENTRY_SIZE);
        let mut records = Vec::with_capacity(self.icons.len());
        let mut offset = 0u64;
        for icon in &self.icons {
            let size = icon.data.len() as u32;
            records.push(IconRecord {
                title_id: icon.title_id,
                offset,
                size,
                ext: icon.ext,
                reserved: 0,
            });
            offset += u64::from(size);
        }

        install(path.as_ref(), |w| {
            PackHeader {
                magic: ICON_MAGIC,
                version: FORMAT_VERSION,
                entry_size: ICON_ENTRY_SIZE,
                count,
                flags: 0,
                blob_offset: data_offset,
            }
            .write(w)?;
            for record in &records {
                record.write(w)?;
            }
            for icon in &self.icons {
                w.write_all(&icon.data)?;
            }
            Ok(())
        })
    }
}
