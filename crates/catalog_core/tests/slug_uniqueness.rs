mod common;

use catalog_core::repo::document_repo::DocumentRepository;
use catalog_core::repo::family_repo::FamilyRepository;
use catalog_core::{ImportConfig, SqliteCatalogRepository};
use common::{count_rows, harness, id, seeded_db, CORPUS};
use serde_json::{json, Value};
use std::collections::HashSet;

const DOCUMENT_COUNT: usize = 1000;

fn same_title_batch() -> Value {
    let documents: Vec<Value> = (1..=DOCUMENT_COUNT)
        .map(|n| {
            json!({
                "import_id": format!("CCLW.document.{n}.0"),
                "family_import_id": "CCLW.family.1.0",
                "title": "Annual Report",
                "metadata": {"role": ["MAIN"]}
            })
        })
        .collect();

    json!({
        "families": [{
            "import_id": "CCLW.family.1.0",
            "title": "Annual Report",
            "summary": "Yearly progress reports.",
            "geographies": ["GBR"],
            "category": "Reports",
            "metadata": {"topic": ["Mitigation"]}
        }],
        "documents": documents
    })
}

#[test]
fn same_title_documents_get_distinct_slugs() {
    let mut conn = seeded_db();
    let h = harness(ImportConfig::default());

    let result = h
        .service
        .import(&mut conn, &same_title_batch(), CORPUS, None)
        .outcome
        .unwrap();
    assert_eq!(result.documents.len(), DOCUMENT_COUNT);

    let repo = SqliteCatalogRepository::try_new(&conn).unwrap();
    let family_slug = repo
        .get_family(&id("CCLW.family.1.0"))
        .unwrap()
        .unwrap()
        .slug
        .unwrap();

    let mut slugs = HashSet::new();
    slugs.insert(family_slug);
    for n in 1..=DOCUMENT_COUNT {
        let document = repo
            .get_document(&id(&format!("CCLW.document.{n}.0")))
            .unwrap()
            .unwrap();
        let slug = document.slug.unwrap();
        assert!(slug.starts_with("annual-report_"), "unexpected slug {slug}");
        slugs.insert(slug);
    }

    assert_eq!(slugs.len(), DOCUMENT_COUNT + 1);
    assert_eq!(count_rows(&conn, "slugs"), (DOCUMENT_COUNT + 1) as i64);
}
