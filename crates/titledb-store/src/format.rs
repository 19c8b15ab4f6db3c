//! Binary layouts of the title pack and icon pack.
//!
//! Both files start with the same 32 byte header:
//!
//! | offset | type      | field                          |
//! |--------|-----------|--------------------------------|
//! | 0      | `[u8; 8]` | magic                          |
//! | 8      | `u32`     | format version                 |
//! | 12     | `u32`     | entry record size              |
//! | 16     | `u32`     | entry count                    |
//! | 20     | `u32`     | flags (reserved)               |
//! | 24     | `u64`     | blob offset (strings or data)  |
//!
//! The entry table follows the header and must end at or before the blob
//! offset. All integers are little-endian.

use std::io::{Cursor, Read, Write};

use crate::{
    error::{Result, StoreError},
    io::{read_exact, read_i32, read_u32, read_u64, write_i32, write_u32, write_u64},
    metadata::TitleMetadata,
};

pub const HEADER_SIZE: u64 = 32;
pub const FORMAT_VERSION: u32 = 1;

pub const TITLE_MAGIC: [u8; 8] = *b"TDBTITLE";
pub const TITLE_ENTRY_SIZE: u32 = 48;

pub const ICON_MAGIC: [u8; 8] = *b"TDBICONS";
pub const ICON_ENTRY_SIZE: u32 = 32;
/// Largest icon accepted from a pack.
pub const MAX_ICON_SIZE: u32 = 16 * 1024 * 1024;
pub const ICON_EXT_LEN: usize = 8;

pub const FLAG_NAME: u32 = 1 << 0;
pub const FLAG_PUBLISHER: u32 = 1 << 1;
pub const FLAG_INTRO: u32 = 1 << 2;
pub const FLAG_DESCRIPTION: u32 = 1 << 3;
pub const FLAG_SIZE: u32 = 1 << 4;
pub const FLAG_VERSION: u32 = 1 << 5;
pub const FLAG_RELEASE_DATE: u32 = 1 << 6;
pub const FLAG_IS_DEMO: u32 = 1 << 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackHeader {
    pub magic: [u8; 8],
    pub version: u32,
    pub entry_size: u32,
    pub count: u32,
    pub flags: u32,
    pub blob_offset: u64,
}

impl PackHeader {
    pub fn read(r: &mut dyn Read) -> Result<Self> {
        Ok(Self {
            magic: read_exact::<8>(r)?,
            version: read_u32(r)?,
            entry_size: read_u32(r)?,
            count: read_u32(r)?,
            flags: read_u32(r)?,
            blob_offset: read_u64(r)?,
        })
    }

    pub fn write(&self, w: &mut dyn Write) -> Result<()> {
        w.write_all(&self.magic)?;
        write_u32(w, self.version)?;
        write_u32(w, self.entry_size)?;
        write_u32(w, self.count)?;
        write_u32(w, self.flags)?;
        write_u64(w, self.blob_offset)
    }

    /// Checks the header against the expected magic and record size for a
    /// file of `file_len` bytes.
    pub fn validate(&self, magic: [u8; 8], entry_size: u32, file_len: u64) -> Result<()> {
        if self.magic != magic {
            return Err(StoreError::InvalidPack("bad magic".into()));
        }
        if self.version != FORMAT_VERSION {
            return Err(StoreError::InvalidPack(format!(
                "unsupported version {}",
                self.version
            )));
        }
        if self.entry_size != entry_size {
            return Err(StoreError::InvalidPack(format!(
                "entry size {} (expected {entry_size})",
                self.entry_size
            )));
        }
        if self.count == 0 {
            return Err(StoreError::InvalidPack("no entries".into()));
        }

        let table_end = u64::from(self.count)
            .checked_mul(u64::from(entry_size))
            .and_then(|len| len.checked_add(HEADER_SIZE))
            .ok_or_else(|| StoreError::InvalidPack("entry table overflows".into()))?;

        if table_end > self.blob_offset || self.blob_offset > file_len {
            return Err(StoreError::InvalidPack(format!(
                "blob offset {} outside [{table_end}, {file_len}]",
                self.blob_offset
            )));
        }

        Ok(())
    }
}

/// A raw 48 byte title entry record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TitleRecord {
    pub title_id: u64,
    pub name: u32,
    pub publisher: u32,
    pub intro: u32,
    pub description: u32,
    pub size: u64,
    pub version: u32,
    pub release_date: u32,
    pub is_demo: i32,
    pub flags: u32,
}

impl TitleRecord {
    pub fn read(r: &mut dyn Read) -> Result<Self> {
        Ok(Self {
            title_id: read_u64(r)?,
            name: read_u32(r)?,
            publisher: read_u32(r)?,
            intro: read_u32(r)?,
            description: read_u32(r)?,
            size: read_u64(r)?,
            version: read_u32(r)?,
            release_date: read_u32(r)?,
            is_demo: read_i32(r)?,
            flags: read_u32(r)?,
        })
    }

    pub fn write(&self, w: &mut dyn Write) -> Result<()> {
        write_u64(w, self.title_id)?;
        write_u32(w, self.name)?;
        write_u32(w, self.publisher)?;
        write_u32(w, self.intro)?;
        write_u32(w, self.description)?;
        write_u64(w, self.size)?;
        write_u32(w, self.version)?;
        write_u32(w, self.release_date)?;
        write_i32(w, self.is_demo)?;
        write_u32(w, self.flags)
    }

    fn has(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Resolves the record against the strings blob.
    pub fn to_metadata(&self, strings: &[u8]) -> TitleMetadata {
        let text = |flag, offset| self.has(flag).then(|| read_string(strings, offset)).flatten();

        TitleMetadata {
            name: text(FLAG_NAME, self.name),
            publisher: text(FLAG_PUBLISHER, self.publisher),
            intro: text(FLAG_INTRO, self.intro),
            description: text(FLAG_DESCRIPTION, self.description),
            size: self.has(FLAG_SIZE).then_some(self.size),
            version: self.has(FLAG_VERSION).then_some(self.version),
            release_date: self.has(FLAG_RELEASE_DATE).then_some(self.release_date),
            is_demo: self
                .has(FLAG_IS_DEMO)
                .then(|| demo_from_raw(self.is_demo))
                .flatten(),
        }
        .normalized()
    }
}

/// Tri-state demo marker: negative means unknown.
pub fn demo_from_raw(raw: i32) -> Option<bool> {
    match raw {
        n if n < 0 => None,
        0 => Some(false),
        _ => Some(true),
    }
}

pub fn demo_to_raw(value: Option<bool>) -> i32 {
    match value {
        None => -1,
        Some(false) => 0,
        Some(true) => 1,
    }
}

/// Reads the NUL terminated string at `offset` in the strings blob.
///
/// Offset 0, an offset past the blob, a missing terminator or invalid UTF-8
/// all yield `None`.
pub fn read_string(strings: &[u8], offset: u32) -> Option<String> {
    let start = usize::try_from(offset).ok().filter(|&o| o != 0)?;
    let tail = strings.get(start..)?;
    let end = tail.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&tail[..end]).ok().map(str::to_owned)
}

/// Parses a complete title pack.
///
/// Any structural problem rejects the whole file. Entries with no usable
/// field are dropped; duplicates are returned in file order.
pub fn parse_title_pack(bytes: &[u8]) -> Result<Vec<(u64, TitleMetadata)>> {
    let mut cur = Cursor::new(bytes);
    let header = PackHeader::read(&mut cur)
        .map_err(|_| StoreError::InvalidPack("truncated header".into()))?;
    header.validate(TITLE_MAGIC, TITLE_ENTRY_SIZE, bytes.len() as u64)?;

    let strings_start = usize::try_from(header.blob_offset)
        .map_err(|_| StoreError::InvalidPack("strings offset out of range".into()))?;
    let strings = &bytes[strings_start..];

    let mut entries = Vec::with_capacity(header.count as usize);
    for _ in 0..header.count {
        let record = TitleRecord::read(&mut cur)?;
        let metadata = record.to_metadata(strings);
        if !metadata.is_empty() {
            entries.push((record.title_id, metadata));
        }
    }

    Ok(entries)
}

/// A raw 32 byte icon entry record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IconRecord {
    pub title_id: u64,
    pub offset: u64,
    pub size: u32,
    pub ext: [u8; ICON_EXT_LEN],
    pub reserved: u32,
}

impl IconRecord {
    pub fn read(r: &mut dyn Read) -> Result<Self> {
        Ok(Self {
            title_id: read_u64(r)?,
            offset: read_u64(r)?,
            size: read_u32(r)?,
            ext: read_exact::<ICON_EXT_LEN>(r)?,
            reserved: read_u32(r)?,
        })
    }

    pub fn write(&self, w: &mut dyn Write) -> Result<()> {
        write_u64(w, self.title_id)?;
        write_u64(w, self.offset)?;
        write_u32(w, self.size)?;
        w.write_all(&self.ext)?;
        write_u32(w, self.reserved)
    }

    /// Absolute byte range of the icon inside a file of `file_len` bytes,
    /// or `None` if the record cannot be served.
    pub fn absolute_range(&self, data_offset: u64, file_len: u64) -> Option<(u64, u32)> {
        if self.size == 0 || self.size > MAX_ICON_SIZE {
            return None;
        }
        let start = data_offset.checked_add(self.offset)?;
        let end = start.checked_add(u64::from(self.size))?;
        (end <= file_len).then_some((start, self.size))
    }
}

/// Keeps ASCII alphanumerics up to the first NUL, lowercased.
pub fn normalize_extension(raw: &[u8]) -> String {
    raw.iter()
        .take_while(|&&b| b != 0)
        .filter(|b| b.is_ascii_alphanumeric())
        .map(|b| char::from(b.to_ascii_lowercase()))
        .collect()
}

/// Encodes an extension for an icon record.
pub fn encode_extension(ext: &str) -> Option<[u8; ICON_EXT_LEN]> {
    let normalized = normalize_extension(ext.trim_start_matches('.').as_bytes());
    if normalized.is_empty() || normalized.len() > ICON_EXT_LEN {
        return None;
    }
    let mut out = [0u8; ICON_EXT_LEN];
    out[..normalized.len()].copy_from_slice(normalized.as_bytes());
    Some(out)
}
