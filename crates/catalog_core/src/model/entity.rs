//! Typed bulk-import payloads.
//!
//! # Responsibility
//! - Decode the raw JSON batch once into per-kind typed records.
//! - Define the closed value sets (family category, document variant).
//!
//! # Invariants
//! - Every id field is an `ImportId`, so grammar is enforced at decode.
//! - Metadata is canonical from the moment it is decoded.
//! - Unknown top-level or record fields are rejected, not dropped.

use crate::model::import_id::ImportId;
use crate::model::metadata::Metadata;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

/// The four importable entity kinds, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Collection,
    Family,
    Document,
    Event,
}

impl EntityKind {
    /// Synchronization order: each kind may only reference earlier kinds.
    pub const ORDERED: [EntityKind; 4] = [
        EntityKind::Collection,
        EntityKind::Family,
        EntityKind::Document,
        EntityKind::Event,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Collection => "collection",
            Self::Family => "family",
            Self::Document => "document",
            Self::Event => "event",
        }
    }

    /// Key of this kind in batch and result maps.
    pub fn plural(self) -> &'static str {
        match self {
            Self::Collection => "collections",
            Self::Family => "families",
            Self::Document => "documents",
            Self::Event => "events",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of family categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FamilyCategory {
    Executive,
    Legislative,
    #[serde(rename = "UNFCCC")]
    Unfccc,
    #[serde(rename = "MCF")]
    Mcf,
    Reports,
    Litigation,
}

impl FamilyCategory {
    pub const ALL: [FamilyCategory; 6] = [
        FamilyCategory::Executive,
        FamilyCategory::Legislative,
        FamilyCategory::Unfccc,
        FamilyCategory::Mcf,
        FamilyCategory::Reports,
        FamilyCategory::Litigation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Executive => "Executive",
            Self::Legislative => "Legislative",
            Self::Unfccc => "UNFCCC",
            Self::Mcf => "MCF",
            Self::Reports => "Reports",
            Self::Litigation => "Litigation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
    }
}

/// Closed set of document variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentVariant {
    OriginalLanguage,
    Translation,
}

impl DocumentVariant {
    pub const ALL: [DocumentVariant; 2] =
        [DocumentVariant::OriginalLanguage, DocumentVariant::Translation];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OriginalLanguage => "Original Language",
            Self::Translation => "Translation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|variant| variant.as_str() == value)
    }
}

/// Concept tag attached to a family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Concept {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub relation: String,
    pub preferred_label: String,
    #[serde(default)]
    pub subconcept_of_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CollectionInput {
    pub import_id: ImportId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FamilyInput {
    pub import_id: ImportId,
    pub title: String,
    pub summary: String,
    /// Human-readable geography names, resolved to ids before persistence.
    pub geographies: Vec<String>,
    /// Checked against `FamilyCategory` by the family validator.
    pub category: String,
    pub metadata: Metadata,
    /// `None` keeps the stored collection links.
    #[serde(default)]
    pub collections: Option<Vec<ImportId>>,
    #[serde(default)]
    pub concepts: Option<Vec<Concept>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocumentInput {
    pub import_id: ImportId,
    pub family_import_id: ImportId,
    pub title: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub variant_name: Option<String>,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub user_language_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventInput {
    pub import_id: ImportId,
    pub family_import_id: ImportId,
    #[serde(default)]
    pub family_document_import_id: Option<ImportId>,
    pub event_title: String,
    pub event_type_value: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// One decoded bulk-import batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportBatch {
    #[serde(default)]
    pub collections: Vec<CollectionInput>,
    #[serde(default)]
    pub families: Vec<FamilyInput>,
    #[serde(default)]
    pub documents: Vec<DocumentInput>,
    #[serde(default)]
    pub events: Vec<EventInput>,
}

impl ImportBatch {
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Collection => self.collections.len(),
            EntityKind::Family => self.families.len(),
            EntityKind::Document => self.documents.len(),
            EntityKind::Event => self.events.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        EntityKind::ORDERED.iter().all(|kind| self.len(*kind) == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::{DocumentVariant, EntityKind, FamilyCategory, ImportBatch};
    use serde_json::json;

    #[test]
    fn closed_sets_round_trip_their_labels() {
        assert_eq!(FamilyCategory::parse("UNFCCC"), Some(FamilyCategory::Unfccc));
        assert_eq!(FamilyCategory::parse("unfccc"), None);
        assert_eq!(
            DocumentVariant::parse("Original Language"),
            Some(DocumentVariant::OriginalLanguage)
        );
        assert_eq!(DocumentVariant::parse("Draft"), None);
    }

    #[test]
    fn missing_sections_decode_as_empty() {
        let batch = ImportBatch::from_value(&json!({
            "collections": [{
                "import_id": "TEST.collection.1.0",
                "title": "c",
                "description": "d"
            }]
        }))
        .unwrap();
        assert_eq!(batch.len(EntityKind::Collection), 1);
        assert_eq!(batch.len(EntityKind::Event), 0);
        assert!(!batch.is_empty());
    }

    #[test]
    fn unknown_sections_and_bad_ids_are_rejected() {
        assert!(ImportBatch::from_value(&json!({"familes": []})).is_err());
        assert!(ImportBatch::from_value(&json!({
            "collections": [{"import_id": "bad", "title": "c", "description": "d"}]
        }))
        .is_err());
    }
}
