//! Manifest parsing, validation and URL resolution.

use std::{fmt, fs, io, path::Path};

use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer,
};
use titledb_dl::Fetcher;
use titledb_utils::hash::is_sha256_hex;
use tracing::debug;
use url::Url;

use crate::error::{ErrorContext, RegistryError, Result};

/// Location and expected content of one pack file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Absolute URL, already resolved against the manifest URL.
    pub url: String,
    /// Exact byte length, always greater than zero.
    pub size: u64,
    /// SHA-256 digest, 64 lowercase hex characters.
    pub sha256: String,
}

/// A validated remote manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub version: String,
    pub titles: FileRef,
    pub icons: FileRef,
}

#[derive(Deserialize)]
struct RawManifest {
    #[serde(default, deserialize_with = "flexible_version")]
    version: Option<String>,
    #[serde(default)]
    files: Option<RawFiles>,
}

#[derive(Deserialize)]
struct RawFiles {
    #[serde(default, alias = "titles_pack", alias = "titlesPack", alias = "titles.pack")]
    titles: Option<RawFileRef>,
    #[serde(default, alias = "icons_pack", alias = "iconsPack", alias = "icons.pack")]
    icons: Option<RawFileRef>,
}

#[derive(Deserialize)]
struct RawFileRef {
    #[serde(default)]
    url: Option<String>,
    #[serde(default, deserialize_with = "flexible_size")]
    size: Option<u64>,
    #[serde(default, alias = "hash")]
    sha256: Option<String>,
}

fn flexible_version<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(serde_json::Value::Null) | None => Ok(None),
        Some(other) => {
            Err(de::Error::invalid_type(
                de::Unexpected::Other(&other.to_string()),
                &"a version string or number",
            ))
        }
    }
}

fn flexible_size<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct SizeVisitor;

    impl<'de> Visitor<'de> for SizeVisitor {
        type Value = Option<u64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a byte count as integer or string")
        }

        fn visit_none<E>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_u64<E>(self, v: u64) -> std::result::Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E>(self, v: i64) -> std::result::Result<Self::Value, E> {
            Ok(u64::try_from(v).ok())
        }

        fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E> {
            Ok(v.trim().parse::<u64>().ok())
        }
    }

    deserializer.deserialize_any(SizeVisitor)
}

/// Resolves `reference` against `base`.
///
/// Absolute references are returned as is; scheme-relative (`//host/x`),
/// root-relative (`/x`) and plain relative references follow the usual URL
/// joining rules.
pub fn resolve_url(base: &str, reference: &str) -> Result<String> {
    let reference = reference.trim();
    let invalid = |source| {
        RegistryError::InvalidUrl {
            reference: reference.to_string(),
            source,
        }
    };

    match Url::parse(reference) {
        Ok(url) => Ok(url.into()),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(base).map_err(invalid)?;
            base.join(reference).map(Into::into).map_err(invalid)
        }
        Err(err) => Err(invalid(err)),
    }
}

impl RawFileRef {
    fn validate(self, name: &str, manifest_url: &str) -> Result<FileRef> {
        let url = self
            .url
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| RegistryError::InvalidManifest(format!("`{name}` has no url")))?;

        let size = self
            .size
            .filter(|&size| size > 0)
            .ok_or_else(|| RegistryError::InvalidManifest(format!("`{name}` has no size")))?;

        let sha256 = self
            .sha256
            .map(|hash| hash.trim().to_ascii_lowercase())
            .filter(|hash| is_sha256_hex(hash))
            .ok_or_else(|| {
                RegistryError::InvalidManifest(format!("`{name}` has no valid sha256"))
            })?;

        Ok(FileRef {
            url: resolve_url(manifest_url, &url)?,
            size,
            sha256,
        })
    }
}

/// Parses and validates manifest `text` fetched from `manifest_url`.
pub fn parse_manifest(manifest_url: &str, text: &str) -> Result<Manifest> {
    let raw: RawManifest = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;

    let version = raw
        .version
        .filter(|v| !v.is_empty())
        .ok_or_else(|| RegistryError::InvalidManifest("missing version".into()))?;

    let files = raw
        .files
        .ok_or_else(|| RegistryError::InvalidManifest("missing `files`".into()))?;

    let titles = files
        .titles
        .ok_or_else(|| RegistryError::InvalidManifest("missing titles file entry".into()))?
        .validate("titles", manifest_url)?;

    let icons = files
        .icons
        .ok_or_else(|| RegistryError::InvalidManifest("missing icons file entry".into()))?
        .validate("icons", manifest_url)?;

    Ok(Manifest {
        version,
        titles,
        icons,
    })
}

/// Fetches the manifest at `manifest_url`.
///
/// Returns the validated manifest together with the raw text, which is
/// persisted verbatim as the local manifest record.
pub fn fetch_manifest(fetcher: &dyn Fetcher, manifest_url: &str) -> Result<(Manifest, String)> {
    debug!("fetching manifest from {}", manifest_url);

    let body = fetcher
        .fetch_to_buffer(manifest_url)
        .map_err(|source| {
            RegistryError::Fetch {
                url: manifest_url.to_string(),
                source,
            }
        })?;

    let text = String::from_utf8(body)
        .map_err(|_| RegistryError::InvalidManifest("manifest is not valid UTF-8".into()))?;

    if text.trim().is_empty() {
        return Err(RegistryError::EmptyManifest {
            url: manifest_url.to_string(),
        });
    }

    let manifest = parse_manifest(manifest_url, &text)?;
    debug!("remote manifest version {}", manifest.version);
    Ok((manifest, text))
}

/// Reads the `version` field of a locally installed manifest record.
///
/// Returns `Ok(None)` if the file does not exist or carries no version.
pub fn installed_version<P: AsRef<Path>>(path: P) -> Result<Option<String>> {
    let path = path.as_ref();
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("reading {}", path.display())),
    };

    #[derive(Deserialize)]
    struct Record {
        #[serde(default, deserialize_with = "flexible_version")]
        version: Option<String>,
    }

    let record: Record = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
    Ok(record.version.filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use titledb_dl::{DownloadError, Progress};

    use super::*;

    const HASH_A: &str = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";
    const HASH_B: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const BASE: &str = "https://cdn.example.com/titledb/manifest.json";

    fn manifest_json(titles_key: &str, titles_url: &str) -> String {
        format!(
            r#"{{
                "version": "5",
                "files": {{
                    "{titles_key}": {{ "url": "{titles_url}", "size": 1024, "sha256": "{HASH_A}" }},
                    "icons": {{ "url": "icons.pack", "size": "2048", "hash": "{}" }}
                }}
            }}"#,
            HASH_B.to_uppercase()
        )
    }

    struct BufferFetcher {
        body: std::result::Result<Vec<u8>, u16>,
        requested: Mutex<Vec<String>>,
    }

    impl Fetcher for BufferFetcher {
        fn fetch_to_file(
            &self,
            _url: &str,
            _path: &Path,
            _on_progress: Option<&dyn Fn(Progress)>,
        ) -> std::result::Result<(), DownloadError> {
            unreachable!("manifests are only fetched into memory")
        }

        fn fetch_to_buffer(&self, url: &str) -> std::result::Result<Vec<u8>, DownloadError> {
            self.requested.lock().unwrap().push(url.to_string());
            self.body.clone().map_err(|status| {
                DownloadError::HttpError {
                    status,
                    url: url.to_string(),
                }
            })
        }
    }

    #[test]
    fn test_parse_manifest() {
        let manifest = parse_manifest(BASE, &manifest_json("titles", "titles.pack")).unwrap();

        assert_eq!(manifest.version, "5");
        assert_eq!(
            manifest.titles,
            FileRef {
                url: "https://cdn.example.com/titledb/titles.pack".into(),
                size: 1024,
                sha256: HASH_A.into(),
            }
        );
        assert_eq!(manifest.icons.url, "https://cdn.example.com/titledb/icons.pack");
        assert_eq!(manifest.icons.size, 2048);
        assert_eq!(manifest.icons.sha256, HASH_B);
    }

    #[test]
    fn test_alternate_file_keys() {
        for key in ["titles_pack", "titlesPack", "titles.pack"] {
            let manifest = parse_manifest(BASE, &manifest_json(key, "titles.pack")).unwrap();
            assert_eq!(manifest.titles.size, 1024, "key {key}");
        }
    }

    #[test]
    fn test_numeric_version() {
        let text = manifest_json("titles", "t.pack").replace("\"5\"", "20240131");
        assert_eq!(parse_manifest(BASE, &text).unwrap().version, "20240131");
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url(BASE, "https://mirror.example.org/t.pack").unwrap(),
            "https://mirror.example.org/t.pack"
        );
        assert_eq!(
            resolve_url(BASE, "//mirror.example.org/t.pack").unwrap(),
            "https://mirror.example.org/t.pack"
        );
        assert_eq!(
            resolve_url(BASE, "/packs/t.pack").unwrap(),
            "https://cdn.example.com/packs/t.pack"
        );
        assert_eq!(
            resolve_url(BASE, "../packs/t.pack").unwrap(),
            "https://cdn.example.com/packs/t.pack"
        );
        assert!(resolve_url("not a url", "t.pack").is_err());
    }

    #[test]
    fn test_invalid_descriptors_reject_manifest() {
        let cases = [
            manifest_json("titles", "t.pack").replace("\"size\": 1024", "\"size\": 0"),
            manifest_json("titles", "t.pack").replace(HASH_A, "abc"),
            manifest_json("titles", ""),
            manifest_json("unrelated", "t.pack"),
            manifest_json("titles", "t.pack").replace("\"5\"", "\"  \""),
            r#"{"version": "5"}"#.to_string(),
        ];

        for text in cases {
            let err = parse_manifest(BASE, &text).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidManifest(_)),
                "unexpected {err:?} for {text}"
            );
        }
    }

    #[test]
    fn test_syntax_error_is_malformed() {
        let err = parse_manifest(BASE, "{ version: ").unwrap_err();
        assert!(matches!(err, RegistryError::JsonError(_)));
        assert!(!err.is_unreachable());
    }

    #[test]
    fn test_fetch_manifest_returns_raw_text() {
        let text = manifest_json("titles", "titles.pack");
        let fetcher = BufferFetcher {
            body: Ok(text.clone().into_bytes()),
            requested: Mutex::new(Vec::new()),
        };

        let (manifest, raw) = fetch_manifest(&fetcher, BASE).unwrap();
        assert_eq!(raw, text);
        assert_eq!(manifest.version, "5");
        assert_eq!(*fetcher.requested.lock().unwrap(), vec![BASE.to_string()]);
    }

    #[test]
    fn test_fetch_manifest_unreachable() {
        let fetcher = BufferFetcher {
            body: Err(404),
            requested: Mutex::new(Vec::new()),
        };
        assert!(fetch_manifest(&fetcher, BASE).unwrap_err().is_unreachable());

        let fetcher = BufferFetcher {
            body: Ok(b"  \n".to_vec()),
            requested: Mutex::new(Vec::new()),
        };
        let err = fetch_manifest(&fetcher, BASE).unwrap_err();
        assert!(matches!(err, RegistryError::EmptyManifest { .. }));
        assert!(err.is_unreachable());
    }

    #[test]
    fn test_installed_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");

        assert_eq!(installed_version(&path).unwrap(), None);

        fs::write(&path, manifest_json("titles", "titles.pack")).unwrap();
        assert_eq!(installed_version(&path).unwrap().as_deref(), Some("5"));

        fs::write(&path, r#"{"files": {}}"#).unwrap();
        assert_eq!(installed_version(&path).unwrap(), None);

        fs::write(&path, "garbage").unwrap();
        assert!(installed_version(&path).is_err());
    }
}
