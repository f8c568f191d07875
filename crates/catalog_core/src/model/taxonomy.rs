//! Corpus taxonomy contract.
//!
//! # Responsibility
//! - Decode the per-corpus taxonomy document into per-kind metadata schemas.
//! - Check entity metadata against a schema, aggregating every violation.
//!
//! # Invariants
//! - Family keys live at the top level; `_collection`, `_document` and
//!   `_event` hold the schemas for the other kinds.
//! - A key is required unless its entry sets `allow_blanks`.
//! - Conformance reports all missing, extra and invalid keys at once.

use crate::model::entity::EntityKind;
use crate::model::metadata::Metadata;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

const COLLECTION_SECTION: &str = "_collection";
const DOCUMENT_SECTION: &str = "_document";
const EVENT_SECTION: &str = "_event";

/// Event taxonomy key carrying the permitted event types.
pub const EVENT_TYPE_KEY: &str = "event_type";
/// Event taxonomy key naming the event that dates a family.
pub const DATETIME_EVENT_NAME_KEY: &str = "datetime_event_name";

/// Rules for a single metadata key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaxonomyEntry {
    #[serde(default)]
    pub allow_any: bool,
    #[serde(default)]
    pub allowed_values: Vec<String>,
    #[serde(default)]
    pub allow_blanks: bool,
    /// Value used when core derives this key itself.
    #[serde(default)]
    pub default: Option<String>,
}

impl TaxonomyEntry {
    /// `default`, falling back to the first allowed value.
    pub fn default_value(&self) -> Option<&str> {
        self.default
            .as_deref()
            .or_else(|| self.allowed_values.first().map(String::as_str))
    }
}

/// Metadata schema for one entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct MetadataSchema(BTreeMap<String, TaxonomyEntry>);

/// Aggregated metadata violations for one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataViolations {
    pub missing: Vec<String>,
    pub extra: Vec<String>,
    pub invalid: Vec<String>,
}

impl MetadataViolations {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.invalid.is_empty()
    }
}

impl Display for MetadataViolations {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing keys [{}]", self.missing.join(", ")));
        }
        if !self.extra.is_empty() {
            parts.push(format!("unexpected keys [{}]", self.extra.join(", ")));
        }
        if !self.invalid.is_empty() {
            parts.push(format!("invalid values [{}]", self.invalid.join("; ")));
        }
        f.write_str(&parts.join(", "))
    }
}

impl MetadataSchema {
    pub fn entry(&self, key: &str) -> Option<&TaxonomyEntry> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Checks one metadata map, collecting every violation.
    pub fn check(&self, metadata: &Metadata) -> Result<(), MetadataViolations> {
        let mut violations = MetadataViolations::default();

        for (key, entry) in &self.0 {
            if !metadata.contains_key(key) && !entry.allow_blanks {
                violations.missing.push(key.clone());
            }
        }

        for (key, value) in metadata.iter() {
            let Some(entry) = self.0.get(key) else {
                violations.extra.push(key.to_string());
                continue;
            };

            if value.is_blank() {
                if !entry.allow_blanks {
                    violations.invalid.push(format!("`{key}` must not be blank"));
                }
                continue;
            }

            if entry.allow_any {
                continue;
            }

            let rejected: Vec<&str> = value
                .values()
                .into_iter()
                .filter(|candidate| {
                    !candidate.trim().is_empty()
                        && !entry.allowed_values.iter().any(|allowed| allowed == candidate)
                })
                .collect();
            if !rejected.is_empty() {
                violations.invalid.push(format!(
                    "`{key}` does not allow {}",
                    rejected
                        .iter()
                        .map(|value| format!("`{value}`"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

/// Raised when a stored taxonomy document has an unexpected shape.
#[derive(Debug)]
pub struct TaxonomyFormatError(pub String);

impl Display for TaxonomyFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid taxonomy: {}", self.0)
    }
}

impl Error for TaxonomyFormatError {}

/// Full corpus taxonomy split by entity kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Taxonomy {
    family: MetadataSchema,
    collection: MetadataSchema,
    document: MetadataSchema,
    event: MetadataSchema,
}

impl Taxonomy {
    /// Decodes the stored taxonomy JSON document.
    pub fn from_value(value: &Value) -> Result<Self, TaxonomyFormatError> {
        let Value::Object(entries) = value else {
            return Err(TaxonomyFormatError(
                "taxonomy must be a JSON object".to_string(),
            ));
        };

        let mut taxonomy = Self::default();
        let mut family = serde_json::Map::new();
        for (key, entry) in entries {
            let target = match key.as_str() {
                COLLECTION_SECTION => &mut taxonomy.collection,
                DOCUMENT_SECTION => &mut taxonomy.document,
                EVENT_SECTION => &mut taxonomy.event,
                other if other.starts_with('_') => continue,
                _ => {
                    family.insert(key.clone(), entry.clone());
                    continue;
                }
            };
            *target = serde_json::from_value(entry.clone())
                .map_err(|err| TaxonomyFormatError(format!("section `{key}`: {err}")))?;
        }
        taxonomy.family = serde_json::from_value(Value::Object(family))
            .map_err(|err| TaxonomyFormatError(format!("family section: {err}")))?;
        Ok(taxonomy)
    }

    pub fn from_json(text: &str) -> Result<Self, TaxonomyFormatError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| TaxonomyFormatError(err.to_string()))?;
        Self::from_value(&value)
    }

    pub fn schema_for(&self, kind: EntityKind) -> &MetadataSchema {
        match kind {
            EntityKind::Collection => &self.collection,
            EntityKind::Family => &self.family,
            EntityKind::Document => &self.document,
            EntityKind::Event => &self.event,
        }
    }

    /// Event types this corpus accepts.
    pub fn event_types(&self) -> &[String] {
        self.event
            .entry(EVENT_TYPE_KEY)
            .map(|entry| entry.allowed_values.as_slice())
            .unwrap_or_default()
    }

    /// Corpus-specific name of the event that dates a family.
    pub fn datetime_event_name(&self) -> Option<&str> {
        self.event
            .entry(DATETIME_EVENT_NAME_KEY)
            .and_then(TaxonomyEntry::default_value)
    }
}
