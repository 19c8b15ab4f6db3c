//! JSON title documents, used when no binary title pack is installed.
//!
//! Three shapes are accepted:
//!
//! - an object with a `rows` (or `data`, `titles`) array of rows
//! - a top-level array of rows
//! - an object keyed by hex title id whose values carry named fields
//!
//! A row is `[titleId, name, publisher, intro, sizeBytes, version,
//! releaseDate, isDemo]`, where `isDemo` is `-1`, `0` or `1`. Short rows leave
//! the remaining fields absent. Individual rows or objects that cannot be
//! understood are skipped.

use std::fmt;

use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer,
};
use serde_json::{Map, Value};
use tracing::trace;

use crate::{
    error::{Result, StoreError},
    metadata::{parse_title_id, TitleMetadata},
};

const ROW_KEYS: [&str; 3] = ["rows", "data", "titles"];

/// Internal enum for deserializing booleans that may be strings or numbers.
#[derive(Deserialize)]
#[serde(untagged)]
enum FlexiBool {
    Bool(bool),
    Int(i64),
    String(String),
}

fn empty_is_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    Ok(s.filter(|s| !s.trim().is_empty()))
}

fn optional_number<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OptU64Visitor;

    impl<'de> Visitor<'de> for OptU64Visitor {
        type Value = Option<u64>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a positive integer, string, or null")
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

        fn visit_f64<E>(self, v: f64) -> std::result::Result<Self::Value, E> {
            Ok((v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64).then_some(v as u64))
        }

        fn visit_str<E>(self, v: &str) -> std::result::Result<Self::Value, E> {
            Ok(v.trim().parse::<u64>().ok())
        }
    }

    deserializer.deserialize_any(OptU64Visitor)
}

fn optional_u32<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_number(deserializer)?.and_then(|n| u32::try_from(n).ok()))
}

fn flexible_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<FlexiBool>::deserialize(deserializer)? {
        Some(FlexiBool::Bool(b)) => Ok(Some(b)),
        Some(FlexiBool::Int(n)) => Ok(crate::format::demo_from_raw(n.clamp(-1, 1) as i32)),
        Some(FlexiBool::String(s)) => {
            match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(Some(true)),
                "false" | "no" | "0" => Ok(Some(false)),
                "" | "-1" => Ok(None),
                _ => {
                    Err(de::Error::invalid_value(
                        de::Unexpected::Str(&s),
                        &"a valid boolean (true/false, yes/no, 1/0)",
                    ))
                }
            }
        }
        None => Ok(None),
    }
}

/// Named-field form of a title.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct JsonTitle {
    #[serde(deserialize_with = "empty_is_none")]
    name: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    publisher: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    intro: Option<String>,
    #[serde(deserialize_with = "empty_is_none")]
    description: Option<String>,
    #[serde(
        alias = "sizeBytes",
        alias = "size_bytes",
        deserialize_with = "optional_number"
    )]
    size: Option<u64>,
    #[serde(deserialize_with = "optional_u32")]
    version: Option<u32>,
    #[serde(
        rename = "releaseDate",
        alias = "release_date",
        deserialize_with = "optional_u32"
    )]
    release_date: Option<u32>,
    #[serde(
        rename = "isDemo",
        alias = "is_demo",
        alias = "demo",
        deserialize_with = "flexible_bool"
    )]
    is_demo: Option<bool>,
}

impl From<JsonTitle> for TitleMetadata {
    fn from(value: JsonTitle) -> Self {
        TitleMetadata {
            name: value.name,
            publisher: value.publisher,
            intro: value.intro,
            description: value.description,
            size: value.size,
            version: value.version,
            release_date: value.release_date,
            is_demo: value.is_demo,
        }
        .normalized()
    }
}

/// Row cells are converted through the same deserializers as named fields.
fn cell<T, F>(row: &[Value], index: usize, convert: F) -> Option<T>
where
    F: FnOnce(&Value) -> std::result::Result<Option<T>, serde_json::Error>,
{
    row.get(index).and_then(|value| convert(value).ok().flatten())
}

fn title_id_of(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => parse_title_id(s).ok(),
        Value::Number(n) => n.as_u64(),
        _ => None,
    }
}

fn parse_row(value: &Value) -> Option<(u64, TitleMetadata)> {
    let row = value.as_array()?;
    let title_id = title_id_of(row.first()?)?;

    let metadata = TitleMetadata {
        name: cell(row, 1, |v| empty_is_none(v)),
        publisher: cell(row, 2, |v| empty_is_none(v)),
        intro: cell(row, 3, |v| empty_is_none(v)),
        description: None,
        size: cell(row, 4, |v| optional_number(v)),
        version: cell(row, 5, |v| optional_u32(v)),
        release_date: cell(row, 6, |v| optional_u32(v)),
        is_demo: cell(row, 7, |v| flexible_bool(v)),
    }
    .normalized();

    Some((title_id, metadata))
}

fn parse_rows(rows: &[Value]) -> Vec<(u64, TitleMetadata)> {
    rows.iter()
        .filter_map(|row| {
            let parsed = parse_row(row);
            if parsed.is_none() {
                trace!("skipping unreadable row {}", row);
            }
            parsed
        })
        .collect()
}

fn parse_keyed(map: Map<String, Value>) -> Vec<(u64, TitleMetadata)> {
    map.into_iter()
        .filter_map(|(key, value)| {
            let title_id = parse_title_id(&key).ok()?;
            if !value.is_object() {
                return None;
            }
            match serde_json::from_value::<JsonTitle>(value) {
                Ok(title) => Some((title_id, TitleMetadata::from(title))),
                Err(err) => {
                    trace!("skipping title {}: {}", key, err);
                    None
                }
            }
        })
        .collect()
}

/// Parses a JSON title document. Entries with no usable field are dropped.
pub fn parse_title_json(text: &str) -> Result<Vec<(u64, TitleMetadata)>> {
    let document: Value = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;

    let entries = match document {
        Value::Array(rows) => parse_rows(&rows),
        Value::Object(map) => {
            match ROW_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_array))
            {
                Some(rows) => parse_rows(rows),
                None => parse_keyed(map),
            }
        }
        other => {
            return Err(StoreError::UnrecognizedJson(format!(
                "top-level {}",
                json_kind(&other)
            )))
        }
    };

    Ok(entries
        .into_iter()
        .filter(|(_, metadata)| !metadata.is_empty())
        .collect())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
