//! Taxonomy-governed metadata maps.
//!
//! # Responsibility
//! - Represent `key -> string | set of strings` metadata for every entity.
//! - Canonicalize list values so reordered input compares equal.
//!
//! # Invariants
//! - A `Metadata` built through `Metadata::canonical` or decoded from JSON has
//!   sorted, deduplicated list values.
//! - Key order is always sorted (`BTreeMap`), so serialized form is stable.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// One metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Text(String),
    List(Vec<String>),
}

impl MetadataValue {
    /// Returns the individual string values regardless of shape.
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::Text(value) => vec![value.as_str()],
            Self::List(values) => values.iter().map(String::as_str).collect(),
        }
    }

    /// Empty list, or only whitespace strings.
    pub fn is_blank(&self) -> bool {
        self.values().iter().all(|value| value.trim().is_empty())
    }

    fn canonicalize(&mut self) {
        if let Self::List(values) = self {
            values.sort();
            values.dedup();
        }
    }
}

/// Metadata map keyed by taxonomy field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, MetadataValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds canonical metadata from arbitrary entries.
    pub fn canonical(entries: BTreeMap<String, MetadataValue>) -> Self {
        let mut metadata = Self(entries);
        for value in metadata.0.values_mut() {
            value.canonicalize();
        }
        metadata
    }

    /// Inserts one list value, canonicalizing it.
    pub fn insert_list<I, S>(&mut self, key: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut value = MetadataValue::List(values.into_iter().map(Into::into).collect());
        value.canonicalize();
        self.0.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&MetadataValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &MetadataValue)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Overlays `other` on top of `self`; keys in `other` win.
    pub fn merged_with(&self, other: &Metadata) -> Metadata {
        let mut merged = self.0.clone();
        for (key, value) in &other.0 {
            merged.insert(key.clone(), value.clone());
        }
        Self(merged)
    }

    /// Serializes to the JSON text stored in SQLite.
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Parses stored JSON text, canonicalizing on the way in.
    pub fn from_json(value: &str) -> Result<Self, serde_json::Error> {
        let entries: BTreeMap<String, MetadataValue> = serde_json::from_str(value)?;
        Ok(Self::canonical(entries))
    }
}

impl<'de> Deserialize<'de> for Metadata {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = BTreeMap::<String, MetadataValue>::deserialize(deserializer)?;
        Ok(Self::canonical(entries))
    }
}
