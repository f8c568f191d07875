#![allow(dead_code)]

use catalog_core::model::import_id::ImportId;
use catalog_core::model::record::{
    CollectionRecord, CollectionWrite, CorpusRecord, DocumentRecord, DocumentWrite, EventRecord,
    EventWrite, FamilyRecord, FamilyWrite, GeographyId, LanguageId,
};
use catalog_core::repo::collection_repo::CollectionRepository;
use catalog_core::repo::corpus_repo::CorpusRepository;
use catalog_core::repo::document_repo::DocumentRepository;
use catalog_core::repo::event_repo::EventRepository;
use catalog_core::repo::family_repo::FamilyRepository;
use catalog_core::repo::slug_repo::SlugRepository;
use catalog_core::{
    open_db_in_memory, AuditStore, ImportConfig, ImportService, MemoryAuditStore, MemoryNotifier,
    Notifier, RepoResult, SqliteCatalogRepository,
};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::cell::Cell;
use std::sync::Arc;

pub const CORPUS: &str = "CCLW.corpus.i00000001.n0000";
pub const OTHER_CORPUS: &str = "UNFCCC.corpus.i00000001.n0000";

pub fn taxonomy() -> Value {
    json!({
        "topic": {"allowed_values": ["Adaptation", "Mitigation"]},
        "sector": {"allow_any": true, "allow_blanks": true},
        "_document": {
            "role": {"allowed_values": ["MAIN", "AMENDMENT"]}
        },
        "_event": {
            "event_type": {"allowed_values": ["Passed/Approved", "Amended"]},
            "datetime_event_name": {"allowed_values": ["Passed/Approved"], "default": "Passed/Approved"}
        }
    })
}

/// Seeds corpora, geographies and languages on a migrated connection.
pub fn seed(conn: &Connection) {
    let repo = SqliteCatalogRepository::try_new(conn).unwrap();
    repo.register_corpus(CORPUS, "CCLW national policies", "CCLW", &taxonomy())
        .unwrap();
    repo.register_corpus(OTHER_CORPUS, "UNFCCC submissions", "UNFCCC", &taxonomy())
        .unwrap();
    repo.add_geography("GBR", "United Kingdom").unwrap();
    repo.add_geography("FRA", "France").unwrap();
    repo.add_geography("BRA", "Brazil").unwrap();
    repo.add_language("English", Some("en")).unwrap();
    repo.add_language("French", Some("fr")).unwrap();
}

pub fn seeded_db() -> Connection {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    conn
}

pub fn id(value: &str) -> ImportId {
    ImportId::parse(value).unwrap()
}

pub fn ids(values: &[&str]) -> Vec<ImportId> {
    values.iter().map(|value| id(value)).collect()
}

/// One collection, two families, two documents, two events.
pub fn scenario_batch() -> Value {
    json!({
        "collections": [
            {
                "import_id": "CCLW.collection.1.0",
                "title": "Energy framework",
                "description": "Laws forming the national energy framework"
            }
        ],
        "families": [
            {
                "import_id": "CCLW.family.1.0",
                "title": "Climate Change Act 2008",
                "summary": "Sets a legally binding emissions target.",
                "geographies": ["GBR"],
                "category": "Legislative",
                "metadata": {"topic": ["Mitigation", "Adaptation"], "sector": ["Energy", "Transport"]},
                "collections": ["CCLW.collection.1.0"],
                "concepts": [
                    {"id": "sector/energy", "type": "sector", "relation": "sector", "preferred_label": "Energy"},
                    {"id": "author/parliament", "type": "author", "relation": "author", "preferred_label": "Parliament"}
                ]
            },
            {
                "import_id": "CCLW.family.2.0",
                "title": "Energy Transition Law",
                "summary": "Frames the national energy transition.",
                "geographies": ["France"],
                "category": "Executive",
                "metadata": {"topic": ["Mitigation"]}
            }
        ],
        "documents": [
            {
                "import_id": "CCLW.document.1.0",
                "family_import_id": "CCLW.family.1.0",
                "title": "Climate Change Act 2008",
                "metadata": {"role": ["MAIN"]},
                "variant_name": "Original Language",
                "source_url": "https://example.org/cca-2008.pdf",
                "user_language_name": "English"
            },
            {
                "import_id": "CCLW.document.2.0",
                "family_import_id": "CCLW.family.2.0",
                "title": "Loi relative a la transition energetique",
                "metadata": {"role": ["MAIN"]},
                "user_language_name": "French"
            }
        ],
        "events": [
            {
                "import_id": "CCLW.event.1.0",
                "family_import_id": "CCLW.family.1.0",
                "family_document_import_id": "CCLW.document.1.0",
                "event_title": "Royal assent",
                "event_type_value": "Passed/Approved",
                "date": "2008-11-26"
            },
            {
                "import_id": "CCLW.event.2.0",
                "family_import_id": "CCLW.family.2.0",
                "event_title": "Amended by decree",
                "event_type_value": "Amended",
                "date": "2019-11-08"
            }
        ]
    })
}

pub struct Harness {
    pub service: ImportService,
    pub audit: Arc<MemoryAuditStore>,
    pub notifier: Arc<MemoryNotifier>,
}

pub fn harness(config: ImportConfig) -> Harness {
    let audit = Arc::new(MemoryAuditStore::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let service = ImportService::new(
        config,
        Arc::clone(&audit) as Arc<dyn AuditStore>,
        Arc::clone(&notifier) as Arc<dyn Notifier>,
    );
    Harness {
        service,
        audit,
        notifier,
    }
}

pub fn count_rows(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

/// Wraps a repository and counts create/update calls.
pub struct CountingRepository<R> {
    inner: R,
    creates: Cell<usize>,
    updates: Cell<usize>,
}

impl<R> CountingRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            creates: Cell::new(0),
            updates: Cell::new(0),
        }
    }

    pub fn creates(&self) -> usize {
        self.creates.get()
    }

    pub fn updates(&self) -> usize {
        self.updates.get()
    }

    pub fn writes(&self) -> usize {
        self.creates() + self.updates()
    }

    fn created(&self) {
        self.creates.set(self.creates.get() + 1);
    }

    fn updated(&self) {
        self.updates.set(self.updates.get() + 1);
    }
}

impl<R: CorpusRepository> CorpusRepository for CountingRepository<R> {
    fn get_corpus(&self, import_id: &str) -> RepoResult<Option<CorpusRecord>> {
        self.inner.get_corpus(import_id)
    }

    fn resolve_geography(&self, name: &str) -> RepoResult<Option<GeographyId>> {
        self.inner.resolve_geography(name)
    }

    fn resolve_language(&self, name: &str) -> RepoResult<Option<LanguageId>> {
        self.inner.resolve_language(name)
    }
}

impl<R: CollectionRepository> CollectionRepository for CountingRepository<R> {
    fn get_collection(&self, import_id: &ImportId) -> RepoResult<Option<CollectionRecord>> {
        self.inner.get_collection(import_id)
    }

    fn create_collection(&self, collection: &CollectionWrite) -> RepoResult<ImportId> {
        self.created();
        self.inner.create_collection(collection)
    }

    fn update_collection(&self, collection: &CollectionWrite) -> RepoResult<()> {
        self.updated();
        self.inner.update_collection(collection)
    }
}

impl<R: FamilyRepository> FamilyRepository for CountingRepository<R> {
    fn get_family(&self, import_id: &ImportId) -> RepoResult<Option<FamilyRecord>> {
        self.inner.get_family(import_id)
    }

    fn create_family(&self, family: &FamilyWrite, slug: &str) -> RepoResult<ImportId> {
        self.created();
        self.inner.create_family(family, slug)
    }

    fn update_family(&self, family: &FamilyWrite, new_slug: Option<&str>) -> RepoResult<()> {
        self.updated();
        self.inner.update_family(family, new_slug)
    }
}

impl<R: DocumentRepository> DocumentRepository for CountingRepository<R> {
    fn get_document(&self, import_id: &ImportId) -> RepoResult<Option<DocumentRecord>> {
        self.inner.get_document(import_id)
    }

    fn create_document(&self, document: &DocumentWrite, slug: &str) -> RepoResult<ImportId> {
        self.created();
        self.inner.create_document(document, slug)
    }

    fn update_document(&self, document: &DocumentWrite) -> RepoResult<()> {
        self.updated();
        self.inner.update_document(document)
    }
}

impl<R: EventRepository> EventRepository for CountingRepository<R> {
    fn get_event(&self, import_id: &ImportId) -> RepoResult<Option<EventRecord>> {
        self.inner.get_event(import_id)
    }

    fn create_event(&self, event: &EventWrite) -> RepoResult<ImportId> {
        self.created();
        self.inner.create_event(event)
    }

    fn update_event(&self, event: &EventWrite) -> RepoResult<()> {
        self.updated();
        self.inner.update_event(event)
    }
}

impl<R: SlugRepository> SlugRepository for CountingRepository<R> {
    fn slug_exists(&self, name: &str) -> RepoResult<bool> {
        self.inner.slug_exists(name)
    }
}
