//! Typed records for the two collections.
//!
//! Observation keys are the visible composite string `tech|date|code`;
//! history identifiers belong to the store and are only ever read back.
//! Fields this crate does not model ride along in `extra` and round-trip
//! verbatim through storage and dumps.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Separator between the parts of an observation key.
pub const KEY_SEPARATOR: char = '|';

/// Build the composite key for an observation: `tech|date|code`.
pub fn composite_key(tech: &str, date: &str, code: &str) -> String {
    format!("{tech}{KEY_SEPARATOR}{date}{KEY_SEPARATOR}{code}")
}

/// A single observation record, uniquely keyed by `tech|date|code`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub key: String,
    pub tech: String,
    pub date: String,
    pub code: String,
    /// Caller-defined fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Observation {
    /// Build an observation with its key derived from the parts.
    pub fn new(
        tech: impl Into<String>,
        date: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        let (tech, date, code) = (tech.into(), date.into(), code.into());
        Self {
            key: composite_key(&tech, &date, &code),
            tech,
            date,
            code,
            extra: Map::new(),
        }
    }

    /// Attach a caller-defined field.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }

    /// Whether `key` agrees with the `tech|date|code` parts.
    pub fn key_is_consistent(&self) -> bool {
        self.key == composite_key(&self.tech, &self.date, &self.code)
    }
}

/// An append-only history entry.
///
/// `id` is assigned by the store on insert; any caller-supplied value is
/// ignored there and stripped on import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub tech: String,
    pub date: String,
    /// Milliseconds since the epoch. Entries recorded without a timestamp
    /// carry 0 and sort last on read.
    #[serde(default)]
    pub ts: i64,
    /// Caller-defined fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HistoryEntry {
    pub fn new(tech: impl Into<String>, date: impl Into<String>, ts: i64) -> Self {
        Self {
            id: None,
            tech: tech.into(),
            date: date.into(),
            ts,
            extra: Map::new(),
        }
    }

    /// Attach a caller-defined field.
    pub fn with_field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.extra.insert(name.into(), value);
        self
    }
}

/// Full snapshot of both collections, as produced by `export_all` and
/// consumed by `import_all`. Either collection may be absent or `null` in a
/// dump; both count as empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dump {
    #[serde(default, deserialize_with = "empty_if_null")]
    pub ot: Vec<Observation>,
    #[serde(default, deserialize_with = "empty_if_null")]
    pub history: Vec<HistoryEntry>,
}

// Hand-edited dumps sometimes carry an explicit null where a collection
// was removed.
fn empty_if_null<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    let opt = Option::<Vec<T>>::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}
