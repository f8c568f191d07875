//! Per-kind synchronizer stages.
//!
//! # Responsibility
//! - Create absent entities and update materially changed ones.
//! - Leave unchanged entities untouched: no repository write, nothing reported.
//!
//! # Invariants
//! - Returned ids are exactly the entities created or updated by the stage.
//! - Incoming and persisted comparison records share one field set per kind.

use crate::import::diff::{diff, ComparisonRecord, DiffReport};
use crate::import::error::{ImportError, ValidationError};
use crate::import::pipeline::{DocumentUpdatePolicy, PipelineOptions};
use crate::import::slug::SlugReservations;
use crate::model::entity::{
    CollectionInput, DocumentInput, EntityKind, EventInput, FamilyCategory, FamilyInput,
};
use crate::model::import_id::ImportId;
use crate::model::metadata::Metadata;
use crate::model::record::{
    CollectionRecord, CollectionWrite, CorpusRecord, DocumentRecord, DocumentWrite, EventRecord,
    EventWrite, FamilyRecord, FamilyWrite,
};
use crate::model::taxonomy::{Taxonomy, DATETIME_EVENT_NAME_KEY, EVENT_TYPE_KEY};
use crate::repo::store::{RepoError, RepoResult};
use crate::repo::CatalogRepository;
use log::{debug, info, warn};
use std::borrow::Cow;
use std::collections::HashSet;

const CONCEPT_KEY: &[&str] = &["relation", "id"];

/// Shared state handed to every stage of one batch.
pub(crate) struct StageContext<'a, R: CatalogRepository + ?Sized> {
    pub repo: &'a R,
    pub corpus: &'a CorpusRecord,
    pub options: &'a PipelineOptions,
    pub slugs: &'a mut SlugReservations,
    /// New documents left out by `document_limit`.
    pub held_back: &'a mut HashSet<ImportId>,
}

/// Event metadata with `event_type` and `datetime_event_name` filled in.
pub fn derive_event_metadata(event: &EventInput, taxonomy: &Taxonomy) -> Metadata {
    let mut derived = Metadata::new();
    derived.insert_list(EVENT_TYPE_KEY, [event.event_type_value.as_str()]);
    if let Some(name) = taxonomy.datetime_event_name() {
        derived.insert_list(DATETIME_EVENT_NAME_KEY, [name]);
    }
    event
        .metadata
        .clone()
        .unwrap_or_default()
        .merged_with(&derived)
}

pub(crate) fn save_collections<R: CatalogRepository + ?Sized>(
    ctx: &mut StageContext<'_, R>,
    items: &[CollectionInput],
) -> Result<Vec<ImportId>, ImportError> {
    let mut touched = Vec::new();
    for input in items {
        let write = CollectionWrite {
            import_id: input.import_id.clone(),
            title: input.title.clone(),
            description: input.description.clone(),
            metadata: input.metadata.clone(),
            organisation_id: ctx.corpus.organisation_id,
        };
        match ctx.repo.get_collection(&input.import_id)? {
            None => {
                touched.push(ctx.repo.create_collection(&write)?);
            }
            Some(existing) => {
                let Some(report) = diff(&collection_view(&write), &persisted_collection(&existing))?
                else {
                    continue;
                };
                log_change(EntityKind::Collection, &input.import_id, &report);
                ctx.repo.update_collection(&write)?;
                touched.push(write.import_id);
            }
        }
    }
    Ok(touched)
}

pub(crate) fn save_families<R: CatalogRepository + ?Sized>(
    ctx: &mut StageContext<'_, R>,
    items: &[FamilyInput],
) -> Result<Vec<ImportId>, ImportError> {
    let mut touched = Vec::new();
    for input in items {
        let write = family_write(ctx, input)?;
        match ctx.repo.get_family(&input.import_id)? {
            None => {
                let id = with_fresh_slug(ctx, &write.title, |repo, slug| {
                    repo.create_family(&write, slug)
                })?;
                touched.push(id);
            }
            Some(existing) => {
                let Some(report) = diff(&family_view(&write), &persisted_family(&existing))? else {
                    continue;
                };
                log_change(EntityKind::Family, &input.import_id, &report);
                if existing.title != write.title {
                    with_fresh_slug(ctx, &write.title, |repo, slug| {
                        repo.update_family(&write, Some(slug))
                    })?;
                } else {
                    ctx.repo.update_family(&write, None)?;
                }
                touched.push(write.import_id);
            }
        }
    }
    Ok(touched)
}

pub(crate) fn save_documents<R: CatalogRepository + ?Sized>(
    ctx: &mut StageContext<'_, R>,
    items: &[DocumentInput],
) -> Result<Vec<ImportId>, ImportError> {
    let mut touched = Vec::new();
    let mut created = 0usize;
    let mut skipped = 0usize;
    for input in items {
        let write = document_write(ctx, input)?;
        match ctx.repo.get_document(&input.import_id)? {
            None => {
                if ctx
                    .options
                    .document_limit
                    .is_some_and(|limit| created >= limit)
                {
                    skipped += 1;
                    ctx.held_back.insert(input.import_id.clone());
                    continue;
                }
                let id = with_fresh_slug(ctx, &write.title, |repo, slug| {
                    repo.create_document(&write, slug)
                })?;
                created += 1;
                touched.push(id);
            }
            Some(existing) => {
                if ctx.options.document_update_policy == DocumentUpdatePolicy::SkipUnchanged {
                    let incoming = document_view(&write, input.user_language_name.as_deref());
                    let Some(report) = diff(&incoming, &persisted_document(&existing))? else {
                        continue;
                    };
                    log_change(EntityKind::Document, &input.import_id, &report);
                }
                ctx.repo.update_document(&write)?;
                touched.push(write.import_id);
            }
        }
    }

    if skipped > 0 {
        info!(
            "event=document_limit_reached module=import status=skip kind=document limit={} skipped={skipped}",
            ctx.options.document_limit.unwrap_or_default()
        );
    }
    Ok(touched)
}

/// Drops events pointing at documents the limit held back in this batch.
pub(crate) fn without_held_back<'e>(
    items: &'e [EventInput],
    held_back: &HashSet<ImportId>,
) -> Cow<'e, [EventInput]> {
    let held = |event: &EventInput| {
        event
            .family_document_import_id
            .as_ref()
            .is_some_and(|document| held_back.contains(document))
    };
    if !items.iter().any(held) {
        return Cow::Borrowed(items);
    }
    let kept: Vec<EventInput> = items.iter().filter(|&event| !held(event)).cloned().collect();
    info!(
        "event=document_limit_reached module=import status=skip kind=event skipped={}",
        items.len() - kept.len()
    );
    Cow::Owned(kept)
}

pub(crate) fn save_events<R: CatalogRepository + ?Sized>(
    ctx: &mut StageContext<'_, R>,
    items: &[EventInput],
) -> Result<Vec<ImportId>, ImportError> {
    let mut touched = Vec::new();
    for input in items {
        let write = EventWrite {
            import_id: input.import_id.clone(),
            family_import_id: input.family_import_id.clone(),
            family_document_import_id: input.family_document_import_id.clone(),
            title: input.event_title.clone(),
            event_type_value: input.event_type_value.clone(),
            date: input.date,
            metadata: derive_event_metadata(input, &ctx.corpus.taxonomy),
        };
        match ctx.repo.get_event(&input.import_id)? {
            None => {
                touched.push(ctx.repo.create_event(&write)?);
            }
            Some(existing) => {
                let Some(report) = diff(&event_view(&write), &persisted_event(&existing))? else {
                    continue;
                };
                log_change(EntityKind::Event, &input.import_id, &report);
                ctx.repo.update_event(&write)?;
                touched.push(write.import_id);
            }
        }
    }
    Ok(touched)
}

/// Runs `write` with freshly minted slugs until storage accepts one; lookups
/// and storage conflicts draw from one attempt budget per title.
fn with_fresh_slug<R, T>(
    ctx: &mut StageContext<'_, R>,
    title: &str,
    mut write: impl FnMut(&R, &str) -> RepoResult<T>,
) -> Result<T, ImportError>
where
    R: CatalogRepository + ?Sized,
{
    let generator = ctx.options.slugs;
    let mut budget = generator.budget();
    loop {
        let slug = generator.generate_within(title, ctx.repo, &mut *ctx.slugs, &mut budget)?;
        match write(ctx.repo, &slug) {
            Err(RepoError::SlugConflict(name)) => {
                warn!(
                    "event=slug_conflict module=import status=retry slug={name} remaining={}",
                    budget.remaining()
                );
                if budget.is_spent() {
                    return Err(generator.exhausted(title));
                }
            }
            other => return other.map_err(ImportError::from),
        }
    }
}

fn family_write<R: CatalogRepository + ?Sized>(
    ctx: &StageContext<'_, R>,
    input: &FamilyInput,
) -> Result<FamilyWrite, ImportError> {
    let category =
        FamilyCategory::parse(&input.category).ok_or_else(|| ValidationError::InvalidValue {
            kind: EntityKind::Family,
            import_id: input.import_id.clone(),
            field: "category",
            value: input.category.clone(),
            allowed: FamilyCategory::ALL
                .iter()
                .map(|category| category.as_str().to_string())
                .collect(),
        })?;

    let mut geography_ids = Vec::with_capacity(input.geographies.len());
    for name in &input.geographies {
        let id = ctx
            .repo
            .resolve_geography(name)?
            .ok_or_else(|| ValidationError::MissingReference {
                kind: EntityKind::Family,
                import_id: input.import_id.clone(),
                field: "geographies",
                reference: name.clone(),
            })?;
        geography_ids.push(id);
    }
    geography_ids.sort_unstable();
    geography_ids.dedup();

    let collections = input.collections.clone().map(|mut collections| {
        collections.sort();
        collections.dedup();
        collections
    });

    Ok(FamilyWrite {
        import_id: input.import_id.clone(),
        corpus_import_id: ctx.corpus.import_id.clone(),
        title: input.title.clone(),
        summary: input.summary.clone(),
        category,
        metadata: input.metadata.clone(),
        geography_ids,
        collections,
        concepts: input.concepts.clone(),
    })
}

fn document_write<R: CatalogRepository + ?Sized>(
    ctx: &StageContext<'_, R>,
    input: &DocumentInput,
) -> Result<DocumentWrite, ImportError> {
    let language_id = match &input.user_language_name {
        Some(name) => Some(ctx.repo.resolve_language(name)?.ok_or_else(|| {
            ValidationError::MissingReference {
                kind: EntityKind::Document,
                import_id: input.import_id.clone(),
                field: "user_language_name",
                reference: name.clone(),
            }
        })?),
        None => None,
    };

    Ok(DocumentWrite {
        import_id: input.import_id.clone(),
        family_import_id: input.family_import_id.clone(),
        title: input.title.clone(),
        variant_name: input.variant_name.clone(),
        source_url: input.source_url.clone(),
        language_id,
        metadata: input.metadata.clone(),
    })
}

fn collection_view(write: &CollectionWrite) -> ComparisonRecord {
    ComparisonRecord::new()
        .scalar("title", &write.title)
        .scalar("description", &write.description)
        .optional("metadata", write.metadata.as_ref())
}

fn persisted_collection(record: &CollectionRecord) -> ComparisonRecord {
    ComparisonRecord::new()
        .scalar("title", &record.title)
        .scalar("description", &record.description)
        .optional("metadata", Some(&record.metadata))
}

fn family_view(write: &FamilyWrite) -> ComparisonRecord {
    ComparisonRecord::new()
        .scalar("title", &write.title)
        .scalar("summary", &write.summary)
        .scalar("category", write.category.as_str())
        .scalar("metadata", &write.metadata)
        .set("geographies", &write.geography_ids)
        .optional_set("collections", write.collections.as_deref())
        .set_by("concepts", write.concepts.as_deref(), CONCEPT_KEY)
}

fn persisted_family(record: &FamilyRecord) -> ComparisonRecord {
    ComparisonRecord::new()
        .scalar("title", &record.title)
        .scalar("summary", &record.summary)
        .scalar("category", &record.category)
        .scalar("metadata", &record.metadata)
        .set("geographies", &record.geography_ids)
        .optional_set("collections", Some(record.collections.as_slice()))
        .set_by("concepts", Some(record.concepts.as_slice()), CONCEPT_KEY)
}

fn document_view(write: &DocumentWrite, language: Option<&str>) -> ComparisonRecord {
    ComparisonRecord::new()
        .scalar("family_import_id", &write.family_import_id)
        .scalar("title", &write.title)
        .optional("variant_name", write.variant_name.as_ref())
        .optional("source_url", write.source_url.as_ref())
        .optional("language", language.as_ref())
        .scalar("metadata", &write.metadata)
}

fn persisted_document(record: &DocumentRecord) -> ComparisonRecord {
    ComparisonRecord::new()
        .scalar("family_import_id", &record.family_import_id)
        .scalar("title", &record.title)
        .optional("variant_name", record.variant_name.as_ref())
        .optional("source_url", record.source_url.as_ref())
        .optional("language", record.language.as_ref())
        .scalar("metadata", &record.metadata)
}

fn event_view(write: &EventWrite) -> ComparisonRecord {
    ComparisonRecord::new()
        .scalar("family_import_id", &write.family_import_id)
        .optional(
            "family_document_import_id",
            write.family_document_import_id.as_ref(),
        )
        .scalar("title", &write.title)
        .scalar("event_type_value", &write.event_type_value)
        .scalar("date", &write.date)
        .scalar("metadata", &write.metadata)
}

fn persisted_event(record: &EventRecord) -> ComparisonRecord {
    ComparisonRecord::new()
        .scalar("family_import_id", &record.family_import_id)
        .optional(
            "family_document_import_id",
            record.family_document_import_id.as_ref(),
        )
        .scalar("title", &record.title)
        .scalar("event_type_value", &record.event_type_value)
        .scalar("date", &record.date)
        .scalar("metadata", &record.metadata)
}

fn log_change(kind: EntityKind, import_id: &ImportId, report: &DiffReport) {
    debug!(
        "event=entity_changed module=import kind={kind} import_id={import_id} changes={report}"
    );
}

#[cfg(test)]
mod tests {
    use super::{derive_event_metadata, without_held_back};
    use crate::model::entity::EventInput;
    use crate::model::import_id::ImportId;
    use crate::model::metadata::MetadataValue;
    use crate::model::taxonomy::Taxonomy;
    use serde_json::json;
    use std::borrow::Cow;
    use std::collections::HashSet;

    fn event(metadata: Option<serde_json::Value>) -> EventInput {
        serde_json::from_value(json!({
            "import_id": "CCLW.event.1.0",
            "family_import_id": "CCLW.family.1.0",
            "event_title": "Passed",
            "event_type_value": "Passed/Approved",
            "date": "2020-01-01",
            "metadata": metadata,
        }))
        .unwrap()
    }

    #[test]
    fn derived_metadata_adds_event_type_and_datetime_name() {
        let taxonomy = Taxonomy::from_value(&json!({
            "_event": {
                "event_type": {"allowed_values": ["Passed/Approved"]},
                "datetime_event_name": {"allowed_values": ["Passed/Approved"], "default": "Passed/Approved"}
            }
        }))
        .unwrap();

        let metadata = derive_event_metadata(&event(None), &taxonomy);
        assert_eq!(
            metadata.get("event_type"),
            Some(&MetadataValue::List(vec!["Passed/Approved".to_string()]))
        );
        assert_eq!(
            metadata.get("datetime_event_name"),
            Some(&MetadataValue::List(vec!["Passed/Approved".to_string()]))
        );
    }

    #[test]
    fn derived_metadata_overrides_incoming_event_type() {
        let taxonomy = Taxonomy::default();
        let metadata =
            derive_event_metadata(&event(Some(json!({"event_type": ["Other"]}))), &taxonomy);
        assert_eq!(
            metadata.get("event_type"),
            Some(&MetadataValue::List(vec!["Passed/Approved".to_string()]))
        );
        assert!(!metadata.contains_key("datetime_event_name"));
    }

    #[test]
    fn events_of_held_back_documents_are_dropped() {
        let mut attached = event(None);
        attached.family_document_import_id = Some(ImportId::parse("CCLW.document.1.0").unwrap());
        let mut standalone = event(None);
        standalone.import_id = ImportId::parse("CCLW.event.2.0").unwrap();
        let events = vec![attached, standalone];

        let nothing_held = HashSet::new();
        assert!(matches!(
            without_held_back(&events, &nothing_held),
            Cow::Borrowed(_)
        ));

        let held: HashSet<ImportId> = [ImportId::parse("CCLW.document.1.0").unwrap()].into();
        let kept = without_held_back(&events, &held);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].import_id.as_str(), "CCLW.event.2.0");
    }
}
