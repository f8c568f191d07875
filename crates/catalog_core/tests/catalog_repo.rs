mod common;

use catalog_core::model::entity::{Concept, FamilyCategory};
use catalog_core::model::metadata::Metadata;
use catalog_core::model::record::{CollectionWrite, DocumentWrite, FamilyWrite};
use catalog_core::repo::collection_repo::CollectionRepository;
use catalog_core::repo::corpus_repo::CorpusRepository;
use catalog_core::repo::document_repo::DocumentRepository;
use catalog_core::repo::family_repo::FamilyRepository;
use catalog_core::repo::slug_repo::SlugRepository;
use catalog_core::{RepoError, SqliteCatalogRepository};
use common::{count_rows, id, ids, seeded_db, CORPUS};
use rusqlite::Connection;
use serde_json::json;

fn topic(values: &[&str]) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert_list("topic", values.iter().copied());
    metadata
}

fn family_write(repo: &SqliteCatalogRepository<'_>, import_id: &str, title: &str) -> FamilyWrite {
    FamilyWrite {
        import_id: id(import_id),
        corpus_import_id: CORPUS.to_string(),
        title: title.to_string(),
        summary: "Summary".to_string(),
        category: FamilyCategory::Legislative,
        metadata: topic(&["Mitigation"]),
        geography_ids: vec![repo.resolve_geography("GBR").unwrap().unwrap()],
        collections: None,
        concepts: None,
    }
}

#[test]
fn unmigrated_connection_is_rejected() {
    let conn = Connection::open_in_memory().unwrap();

    let err = SqliteCatalogRepository::try_new(&conn).unwrap_err();
    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn family_round_trip_returns_sorted_links() {
    let conn = seeded_db();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let organisation_id = repo.get_corpus(CORPUS).unwrap().unwrap().organisation_id;
    for import_id in ["CCLW.collection.2.0", "CCLW.collection.1.0"] {
        repo.create_collection(&CollectionWrite {
            import_id: id(import_id),
            title: "Collection".to_string(),
            description: "Grouping".to_string(),
            metadata: None,
            organisation_id,
        })
        .unwrap();
    }

    let france = repo.resolve_geography("FRA").unwrap().unwrap();
    let britain = repo.resolve_geography("GBR").unwrap().unwrap();
    let mut write = family_write(&repo, "CCLW.family.1.0", "Net Zero Strategy");
    write.geography_ids = vec![france, britain];
    write.collections = Some(ids(&["CCLW.collection.2.0", "CCLW.collection.1.0"]));
    write.concepts = Some(vec![Concept {
        id: "sector/energy".to_string(),
        kind: "sector".to_string(),
        relation: "sector".to_string(),
        preferred_label: "Energy".to_string(),
        subconcept_of_labels: Vec::new(),
    }]);
    repo.create_family(&write, "net-zero-strategy_1a2b").unwrap();

    let family = repo.get_family(&id("CCLW.family.1.0")).unwrap().unwrap();
    let mut expected_geographies = vec![france, britain];
    expected_geographies.sort();
    assert_eq!(family.geography_ids, expected_geographies);
    assert_eq!(
        family.collections,
        ids(&["CCLW.collection.1.0", "CCLW.collection.2.0"])
    );
    assert_eq!(family.concepts.len(), 1);
    assert_eq!(family.metadata, topic(&["Mitigation"]));
    assert_eq!(family.slug.as_deref(), Some("net-zero-strategy_1a2b"));

    write.concepts = None;
    write.collections = None;
    repo.update_family(&write, None).unwrap();
    let family = repo.get_family(&id("CCLW.family.1.0")).unwrap().unwrap();
    assert_eq!(family.concepts.len(), 1);
    assert_eq!(family.collections.len(), 2);

    write.collections = Some(Vec::new());
    repo.update_family(&write, None).unwrap();
    let family = repo.get_family(&id("CCLW.family.1.0")).unwrap().unwrap();
    assert!(family.collections.is_empty());
}

#[test]
fn duplicate_slug_is_a_conflict_and_leaves_no_entity() {
    let conn = seeded_db();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    repo.create_family(
        &family_write(&repo, "CCLW.family.1.0", "Act"),
        "act_0000",
    )
    .unwrap();

    let err = repo
        .create_family(&family_write(&repo, "CCLW.family.2.0", "Act"), "act_0000")
        .unwrap_err();

    assert!(matches!(err, RepoError::SlugConflict(ref slug) if slug == "act_0000"));
    assert!(repo.get_family(&id("CCLW.family.2.0")).unwrap().is_none());
    assert_eq!(count_rows(&conn, "family_geographies"), 1);
    assert_eq!(count_rows(&conn, "slugs"), 1);
}

#[test]
fn updating_missing_family_is_not_found() {
    let conn = seeded_db();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();

    let err = repo
        .update_family(&family_write(&repo, "CCLW.family.9.0", "Ghost"), Some("ghost_0000"))
        .unwrap_err();

    assert!(matches!(err, RepoError::NotFound { .. }));
    assert!(!repo.slug_exists("ghost_0000").unwrap());
}

#[test]
fn geography_resolves_by_value_or_display_name() {
    let conn = seeded_db();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();

    let by_value = repo.resolve_geography("BRA").unwrap();
    let by_display = repo.resolve_geography("Brazil").unwrap();
    assert!(by_value.is_some());
    assert_eq!(by_value, by_display);
    assert!(repo.resolve_geography("Atlantis").unwrap().is_none());
}

#[test]
fn register_corpus_rejects_malformed_taxonomy() {
    let conn = seeded_db();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();

    let err = repo
        .register_corpus("OEP.corpus.i00000001.n0000", "OEP", "OEP", &json!(["topic"]))
        .unwrap_err();

    assert!(matches!(err, RepoError::InvalidData(_)));
    assert!(repo
        .get_corpus("OEP.corpus.i00000001.n0000")
        .unwrap()
        .is_none());
}

#[test]
fn document_read_model_joins_language_name() {
    let conn = seeded_db();
    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    repo.create_family(&family_write(&repo, "CCLW.family.1.0", "Act"), "act_0001")
        .unwrap();
    let mut metadata = Metadata::new();
    metadata.insert_list("role", ["MAIN"]);

    repo.create_document(
        &DocumentWrite {
            import_id: id("CCLW.document.1.0"),
            family_import_id: id("CCLW.family.1.0"),
            title: "Act text".to_string(),
            variant_name: Some("Translation".to_string()),
            source_url: None,
            language_id: repo.resolve_language("French").unwrap(),
            metadata,
        },
        "act-text_0001",
    )
    .unwrap();

    let document = repo.get_document(&id("CCLW.document.1.0")).unwrap().unwrap();
    assert_eq!(document.language.as_deref(), Some("French"));
    assert_eq!(document.variant_name.as_deref(), Some("Translation"));
    assert_eq!(document.slug.as_deref(), Some("act-text_0001"));
}
