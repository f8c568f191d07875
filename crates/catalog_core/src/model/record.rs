//! Persisted read models and repository write shapes.
//!
//! # Responsibility
//! - Describe what the store returns for each entity kind.
//! - Describe the create/update shapes handed to repositories.
//!
//! # Invariants
//! - Read models carry canonical metadata and sorted relation lists.
//! - `None` in an update shape means "leave the stored value alone".

use crate::model::entity::{Concept, FamilyCategory};
use crate::model::import_id::ImportId;
use crate::model::metadata::Metadata;
use crate::model::taxonomy::Taxonomy;
use chrono::NaiveDate;

/// Internal geography row id.
pub type GeographyId = i64;
/// Internal language row id.
pub type LanguageId = i64;
/// Internal organisation row id.
pub type OrganisationId = i64;

/// Corpus plus the taxonomy governing its batches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusRecord {
    pub import_id: String,
    pub title: String,
    pub organisation_id: OrganisationId,
    pub organisation_name: String,
    pub taxonomy: Taxonomy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRecord {
    pub import_id: ImportId,
    pub title: String,
    pub description: String,
    pub metadata: Metadata,
    pub organisation_id: OrganisationId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyRecord {
    pub import_id: ImportId,
    pub corpus_import_id: String,
    pub title: String,
    pub summary: String,
    pub category: String,
    pub metadata: Metadata,
    /// Sorted ascending.
    pub geography_ids: Vec<GeographyId>,
    /// Sorted ascending.
    pub collections: Vec<ImportId>,
    pub concepts: Vec<Concept>,
    /// Most recently minted slug.
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRecord {
    pub import_id: ImportId,
    pub family_import_id: ImportId,
    pub title: String,
    pub variant_name: Option<String>,
    pub source_url: Option<String>,
    pub language: Option<String>,
    pub metadata: Metadata,
    pub slug: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub import_id: ImportId,
    pub family_import_id: ImportId,
    pub family_document_import_id: Option<ImportId>,
    pub title: String,
    pub event_type_value: String,
    pub date: NaiveDate,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionWrite {
    pub import_id: ImportId,
    pub title: String,
    pub description: String,
    pub metadata: Option<Metadata>,
    pub organisation_id: OrganisationId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyWrite {
    pub import_id: ImportId,
    pub corpus_import_id: String,
    pub title: String,
    pub summary: String,
    pub category: FamilyCategory,
    pub metadata: Metadata,
    pub geography_ids: Vec<GeographyId>,
    pub collections: Option<Vec<ImportId>>,
    pub concepts: Option<Vec<Concept>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentWrite {
    pub import_id: ImportId,
    pub family_import_id: ImportId,
    pub title: String,
    pub variant_name: Option<String>,
    pub source_url: Option<String>,
    pub language_id: Option<LanguageId>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWrite {
    pub import_id: ImportId,
    pub family_import_id: ImportId,
    pub family_document_import_id: Option<ImportId>,
    pub title: String,
    pub event_type_value: String,
    pub date: NaiveDate,
    pub metadata: Metadata,
}
