//! Batch validation ahead of synchronization.
//!
//! # Responsibility
//! - Reject duplicate ids, dangling references, closed-set violations and
//!   taxonomy violations, kind by kind in dependency order.
//!
//! # Invariants
//! - Each kind is validated right before its own synchronizer runs, so
//!   earlier kinds of the same batch are already visible in the transaction.
//! - Checks run per kind in a fixed order and stop at the first failure.
//! - A batch only touches entities of its own corpus: families it owns, the
//!   documents and events hanging off them, and its organisation's collections.

use crate::import::error::{ImportError, ValidationError};
use crate::import::sync::derive_event_metadata;
use crate::model::entity::{
    CollectionInput, DocumentInput, DocumentVariant, EntityKind, EventInput, FamilyCategory,
    FamilyInput,
};
use crate::model::import_id::ImportId;
use crate::model::metadata::Metadata;
use crate::model::record::CorpusRecord;
use crate::repo::CatalogRepository;
use std::collections::HashSet;

/// Validates batch records against the store and the corpus taxonomy.
pub struct BatchValidator<'a, R: CatalogRepository + ?Sized> {
    repo: &'a R,
    corpus: &'a CorpusRecord,
}

impl<'a, R: CatalogRepository + ?Sized> BatchValidator<'a, R> {
    pub fn new(repo: &'a R, corpus: &'a CorpusRecord) -> Self {
        Self { repo, corpus }
    }

    pub fn collections(&self, items: &[CollectionInput]) -> Result<(), ImportError> {
        reject_duplicates(EntityKind::Collection, items.iter().map(|c| &c.import_id))?;
        for collection in items {
            let Some(existing) = self.repo.get_collection(&collection.import_id)? else {
                continue;
            };
            if existing.organisation_id != self.corpus.organisation_id {
                return Err(ValidationError::OrganisationMismatch {
                    import_id: collection.import_id.clone(),
                    expected: self.corpus.organisation_id,
                    actual: existing.organisation_id,
                }
                .into());
            }
        }
        for collection in items {
            if let Some(metadata) = &collection.metadata {
                self.check_metadata(EntityKind::Collection, &collection.import_id, metadata)?;
            }
        }
        Ok(())
    }

    pub fn families(&self, items: &[FamilyInput]) -> Result<(), ImportError> {
        reject_duplicates(EntityKind::Family, items.iter().map(|f| &f.import_id))?;

        for family in items {
            if let Some(existing) = self.repo.get_family(&family.import_id)? {
                self.owned_by_corpus(
                    EntityKind::Family,
                    &family.import_id,
                    &existing.corpus_import_id,
                )?;
            }
            for collection in family.collections.iter().flatten() {
                if self.repo.get_collection(collection)?.is_none() {
                    return Err(missing(
                        EntityKind::Family,
                        &family.import_id,
                        "collections",
                        collection.as_str(),
                    ));
                }
            }
            for geography in &family.geographies {
                if self.repo.resolve_geography(geography)?.is_none() {
                    return Err(missing(
                        EntityKind::Family,
                        &family.import_id,
                        "geographies",
                        geography,
                    ));
                }
            }
        }

        for family in items {
            if FamilyCategory::parse(&family.category).is_none() {
                return Err(ValidationError::InvalidValue {
                    kind: EntityKind::Family,
                    import_id: family.import_id.clone(),
                    field: "category",
                    value: family.category.clone(),
                    allowed: FamilyCategory::ALL
                        .iter()
                        .map(|category| category.as_str().to_string())
                        .collect(),
                }
                .into());
            }
        }

        for family in items {
            self.check_metadata(EntityKind::Family, &family.import_id, &family.metadata)?;
        }
        Ok(())
    }

    pub fn documents(&self, items: &[DocumentInput]) -> Result<(), ImportError> {
        reject_duplicates(EntityKind::Document, items.iter().map(|d| &d.import_id))?;

        for document in items {
            let Some(family) = self.repo.get_family(&document.family_import_id)? else {
                return Err(missing(
                    EntityKind::Document,
                    &document.import_id,
                    "family_import_id",
                    document.family_import_id.as_str(),
                ));
            };
            self.owned_by_corpus(
                EntityKind::Document,
                &document.import_id,
                &family.corpus_import_id,
            )?;
            if let Some(existing) = self.repo.get_document(&document.import_id)? {
                self.current_family_owned(
                    EntityKind::Document,
                    &document.import_id,
                    &existing.family_import_id,
                    &document.family_import_id,
                )?;
            }
            if let Some(language) = &document.user_language_name {
                if self.repo.resolve_language(language)?.is_none() {
                    return Err(missing(
                        EntityKind::Document,
                        &document.import_id,
                        "user_language_name",
                        language,
                    ));
                }
            }
        }

        for document in items {
            let Some(variant) = &document.variant_name else {
                continue;
            };
            if DocumentVariant::parse(variant).is_none() {
                return Err(ValidationError::InvalidValue {
                    kind: EntityKind::Document,
                    import_id: document.import_id.clone(),
                    field: "variant_name",
                    value: variant.clone(),
                    allowed: DocumentVariant::ALL
                        .iter()
                        .map(|variant| variant.as_str().to_string())
                        .collect(),
                }
                .into());
            }
        }

        for document in items {
            self.check_metadata(EntityKind::Document, &document.import_id, &document.metadata)?;
        }
        Ok(())
    }

    pub fn events(&self, items: &[EventInput]) -> Result<(), ImportError> {
        reject_duplicates(EntityKind::Event, items.iter().map(|e| &e.import_id))?;

        for event in items {
            let Some(family) = self.repo.get_family(&event.family_import_id)? else {
                return Err(missing(
                    EntityKind::Event,
                    &event.import_id,
                    "family_import_id",
                    event.family_import_id.as_str(),
                ));
            };
            self.owned_by_corpus(EntityKind::Event, &event.import_id, &family.corpus_import_id)?;
            if let Some(existing) = self.repo.get_event(&event.import_id)? {
                self.current_family_owned(
                    EntityKind::Event,
                    &event.import_id,
                    &existing.family_import_id,
                    &event.family_import_id,
                )?;
            }
            let Some(document) = &event.family_document_import_id else {
                continue;
            };
            let owner = self
                .repo
                .get_document(document)?
                .map(|record| record.family_import_id);
            match owner {
                None => {
                    return Err(missing(
                        EntityKind::Event,
                        &event.import_id,
                        "family_document_import_id",
                        document.as_str(),
                    ))
                }
                Some(family) if family != event.family_import_id => {
                    return Err(ValidationError::DocumentFamilyMismatch {
                        import_id: event.import_id.clone(),
                        document: document.clone(),
                        family: event.family_import_id.clone(),
                    }
                    .into())
                }
                Some(_) => {}
            }
        }

        let event_types = self.corpus.taxonomy.event_types();
        for event in items {
            if !event_types.contains(&event.event_type_value) {
                return Err(ValidationError::InvalidValue {
                    kind: EntityKind::Event,
                    import_id: event.import_id.clone(),
                    field: "event_type_value",
                    value: event.event_type_value.clone(),
                    allowed: event_types.to_vec(),
                }
                .into());
            }
        }

        for event in items {
            let metadata = derive_event_metadata(event, &self.corpus.taxonomy);
            self.check_metadata(EntityKind::Event, &event.import_id, &metadata)?;
        }
        Ok(())
    }

    fn owned_by_corpus(
        &self,
        kind: EntityKind,
        import_id: &ImportId,
        owner: &str,
    ) -> Result<(), ImportError> {
        if owner == self.corpus.import_id {
            return Ok(());
        }
        Err(ValidationError::CorpusMismatch {
            kind,
            import_id: import_id.clone(),
            expected: self.corpus.import_id.clone(),
            actual: owner.to_string(),
        }
        .into())
    }

    /// An existing entity moving to another family must not leave a foreign corpus.
    fn current_family_owned(
        &self,
        kind: EntityKind,
        import_id: &ImportId,
        stored_family: &ImportId,
        incoming_family: &ImportId,
    ) -> Result<(), ImportError> {
        if stored_family == incoming_family {
            return Ok(());
        }
        match self.repo.get_family(stored_family)? {
            Some(family) => self.owned_by_corpus(kind, import_id, &family.corpus_import_id),
            None => Ok(()),
        }
    }

    fn check_metadata(
        &self,
        kind: EntityKind,
        import_id: &ImportId,
        metadata: &Metadata,
    ) -> Result<(), ImportError> {
        self.corpus
            .taxonomy
            .schema_for(kind)
            .check(metadata)
            .map_err(|violations| {
                ValidationError::InvalidMetadata {
                    kind,
                    import_id: import_id.clone(),
                    violations,
                }
                .into()
            })
    }
}

fn reject_duplicates<'i>(
    kind: EntityKind,
    ids: impl Iterator<Item = &'i ImportId>,
) -> Result<(), ImportError> {
    let mut seen = HashSet::new();
    for import_id in ids {
        if !seen.insert(import_id) {
            return Err(ValidationError::DuplicateImportId {
                kind,
                import_id: import_id.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn missing(kind: EntityKind, import_id: &ImportId, field: &'static str, reference: &str) -> ImportError {
    ValidationError::MissingReference {
        kind,
        import_id: import_id.clone(),
        field,
        reference: reference.to_string(),
    }
    .into()
}
