use serde::Serialize;

use crate::error::{Result, StoreError};

/// Catalog information for a single title. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TitleMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Install size in bytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// Release date as `YYYYMMDD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_date: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_demo: Option<bool>,
}

impl TitleMetadata {
    pub fn has_name(&self) -> bool {
        self.name.is_some()
    }

    pub fn has_publisher(&self) -> bool {
        self.publisher.is_some()
    }

    pub fn has_intro(&self) -> bool {
        self.intro.is_some()
    }

    pub fn has_description(&self) -> bool {
        self.description.is_some()
    }

    pub fn has_size(&self) -> bool {
        self.size.is_some()
    }

    pub fn has_version(&self) -> bool {
        self.version.is_some()
    }

    pub fn has_release_date(&self) -> bool {
        self.release_date.is_some()
    }

    pub fn has_is_demo(&self) -> bool {
        self.is_demo.is_some()
    }

    /// True when no field carries a value. Such entries are never indexed.
    pub fn is_empty(&self) -> bool {
        !(self.has_name()
            || self.has_publisher()
            || self.has_intro()
            || self.has_description()
            || self.has_size()
            || self.has_version()
            || self.has_release_date()
            || self.has_is_demo())
    }

    /// Drops empty strings so that "present" always means "has content".
    pub(crate) fn normalized(mut self) -> Self {
        for field in [
            &mut self.name,
            &mut self.publisher,
            &mut self.intro,
            &mut self.description,
        ] {
            if field.as_deref().is_some_and(|s| s.trim().is_empty()) {
                *field = None;
            }
        }
        self
    }
}

/// Formats a title id as 16 lowercase hex digits.
///
/// ```
/// use titledb_store::format_title_id;
///
/// assert_eq!(format_title_id(0x0100_0000_0001_0000), "0100000000010000");
/// ```
pub fn format_title_id(title_id: u64) -> String {
    format!("{title_id:016x}")
}

/// Parses 1 to 16 hex digits, with an optional `0x` prefix.
pub fn parse_title_id(input: &str) -> Result<u64> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.is_empty() || digits.len() > 16 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(StoreError::InvalidTitleId(input.to_string()));
    }

    u64::from_str_radix(digits, 16).map_err(|_| StoreError::InvalidTitleId(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_empty() {
        assert!(TitleMetadata::default().is_empty());

        let meta = TitleMetadata {
            is_demo: Some(false),
            ..Default::default()
        };
        assert!(!meta.is_empty());
        assert!(meta.has_is_demo());
    }

    #[test]
    fn test_normalized_drops_blank_strings() {
        let meta = TitleMetadata {
            name: Some("  ".into()),
            publisher: Some("Nintendo".into()),
            ..Default::default()
        }
        .normalized();

        assert!(!meta.has_name());
        assert_eq!(meta.publisher.as_deref(), Some("Nintendo"));
    }

    #[test]
    fn test_title_id_round_trip() {
        let id = 0x0100_F2C0_115B_6000;
        assert_eq!(format_title_id(id), "0100f2c0115b6000");
        assert_eq!(parse_title_id("0100F2C0115B6000").unwrap(), id);
        assert_eq!(parse_title_id("0x0100f2c0115b6000").unwrap(), id);
        assert_eq!(parse_title_id("1f").unwrap(), 0x1f);
    }

    #[test]
    fn test_title_id_rejects_bad_input() {
        for input in ["", "0x", "01000000000100001", "0100zz", "-1", "+1f"] {
            assert!(parse_title_id(input).is_err(), "{input}");
        }
    }
}
