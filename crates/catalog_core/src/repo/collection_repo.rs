//! Collection repository contract and SQLite implementation.

use crate::model::entity::EntityKind;
use crate::model::import_id::ImportId;
use crate::model::metadata::Metadata;
use crate::model::record::{CollectionRecord, CollectionWrite};
use crate::repo::store::{
    parse_import_id, parse_metadata, RepoError, RepoResult, SqliteCatalogRepository,
};
use rusqlite::{params, Row};

pub trait CollectionRepository {
    fn get_collection(&self, import_id: &ImportId) -> RepoResult<Option<CollectionRecord>>;
    fn create_collection(&self, collection: &CollectionWrite) -> RepoResult<ImportId>;
    fn update_collection(&self, collection: &CollectionWrite) -> RepoResult<()>;
}

impl CollectionRepository for SqliteCatalogRepository<'_> {
    fn get_collection(&self, import_id: &ImportId) -> RepoResult<Option<CollectionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT import_id, title, description, metadata, organisation_id
             FROM collections
             WHERE import_id = ?1;",
        )?;
        let mut rows = stmt.query([import_id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_collection_row(row)?));
        }
        Ok(None)
    }

    fn create_collection(&self, collection: &CollectionWrite) -> RepoResult<ImportId> {
        let metadata = collection.metadata.clone().unwrap_or_default();
        self.conn.execute(
            "INSERT INTO collections (import_id, title, description, metadata, organisation_id)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                collection.import_id.as_str(),
                collection.title,
                collection.description,
                metadata.to_json(),
                collection.organisation_id,
            ],
        )?;
        Ok(collection.import_id.clone())
    }

    fn update_collection(&self, collection: &CollectionWrite) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE collections
             SET
                title = ?2,
                description = ?3,
                metadata = COALESCE(?4, metadata),
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE import_id = ?1;",
            params![
                collection.import_id.as_str(),
                collection.title,
                collection.description,
                collection.metadata.as_ref().map(Metadata::to_json),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Collection,
                import_id: collection.import_id.clone(),
            });
        }
        Ok(())
    }
}

fn parse_collection_row(row: &Row<'_>) -> RepoResult<CollectionRecord> {
    let metadata: String = row.get("metadata")?;
    Ok(CollectionRecord {
        import_id: parse_import_id(row.get("import_id")?, "collections.import_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        metadata: parse_metadata(&metadata, "collections.metadata")?,
        organisation_id: row.get("organisation_id")?,
    })
}
