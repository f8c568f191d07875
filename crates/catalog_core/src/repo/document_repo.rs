//! Document repository contract and SQLite implementation.
//!
//! # Invariants
//! - Every created document gets exactly one slug row at creation.
//! - `None` optional fields on update keep the stored value.

use crate::model::entity::EntityKind;
use crate::model::import_id::ImportId;
use crate::model::record::{DocumentRecord, DocumentWrite};
use crate::repo::slug_repo::{current_slug, insert_slug, SlugOwner};
use crate::repo::store::{
    parse_import_id, parse_metadata, within_savepoint, RepoError, RepoResult,
    SqliteCatalogRepository,
};
use rusqlite::params;

pub trait DocumentRepository {
    fn get_document(&self, import_id: &ImportId) -> RepoResult<Option<DocumentRecord>>;
    /// Creates one document under `slug`.
    fn create_document(&self, document: &DocumentWrite, slug: &str) -> RepoResult<ImportId>;
    fn update_document(&self, document: &DocumentWrite) -> RepoResult<()>;
}

impl DocumentRepository for SqliteCatalogRepository<'_> {
    fn get_document(&self, import_id: &ImportId) -> RepoResult<Option<DocumentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                d.import_id AS import_id,
                d.family_import_id AS family_import_id,
                d.title AS title,
                d.variant_name AS variant_name,
                d.source_url AS source_url,
                l.name AS language,
                d.metadata AS metadata
             FROM documents d
             LEFT JOIN languages l ON l.id = d.language_id
             WHERE d.import_id = ?1;",
        )?;
        let mut rows = stmt.query([import_id.as_str()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let metadata: String = row.get("metadata")?;
        let import_id = parse_import_id(row.get("import_id")?, "documents.import_id")?;
        Ok(Some(DocumentRecord {
            family_import_id: parse_import_id(
                row.get("family_import_id")?,
                "documents.family_import_id",
            )?,
            title: row.get("title")?,
            variant_name: row.get("variant_name")?,
            source_url: row.get("source_url")?,
            language: row.get("language")?,
            metadata: parse_metadata(&metadata, "documents.metadata")?,
            slug: current_slug(self.conn, SlugOwner::Document(&import_id))?,
            import_id,
        }))
    }

    fn create_document(&self, document: &DocumentWrite, slug: &str) -> RepoResult<ImportId> {
        within_savepoint(self.conn, "create_document", || {
            insert_slug(self.conn, slug, SlugOwner::Document(&document.import_id))?;
            self.conn.execute(
                "INSERT INTO documents (
                    import_id,
                    family_import_id,
                    title,
                    variant_name,
                    source_url,
                    language_id,
                    metadata
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    document.import_id.as_str(),
                    document.family_import_id.as_str(),
                    document.title,
                    document.variant_name,
                    document.source_url,
                    document.language_id,
                    document.metadata.to_json(),
                ],
            )?;
            Ok(document.import_id.clone())
        })
    }

    fn update_document(&self, document: &DocumentWrite) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE documents
             SET
                family_import_id = ?2,
                title = ?3,
                variant_name = COALESCE(?4, variant_name),
                source_url = COALESCE(?5, source_url),
                language_id = COALESCE(?6, language_id),
                metadata = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE import_id = ?1;",
            params![
                document.import_id.as_str(),
                document.family_import_id.as_str(),
                document.title,
                document.variant_name,
                document.source_url,
                document.language_id,
                document.metadata.to_json(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Document,
                import_id: document.import_id.clone(),
            });
        }
        Ok(())
    }
}
