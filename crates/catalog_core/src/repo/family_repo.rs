//! Family repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist families with their geography, collection and concept links.
//! - Mint slug rows on create and on title-driven slug regeneration.
//!
//! # Invariants
//! - Geography links are replaced as a whole set on update; collection links
//!   likewise, unless the write leaves them out.
//! - Read models return links sorted, so callers can compare them directly.
//! - `concepts = None` and `collections = None` on update keep stored values.

use crate::model::entity::{Concept, EntityKind};
use crate::model::import_id::ImportId;
use crate::model::record::{FamilyRecord, FamilyWrite, GeographyId};
use crate::repo::slug_repo::{current_slug, insert_slug, SlugOwner};
use crate::repo::store::{
    parse_import_id, parse_metadata, within_savepoint, RepoError, RepoResult,
    SqliteCatalogRepository,
};
use rusqlite::{params, Connection};

pub trait FamilyRepository {
    fn get_family(&self, import_id: &ImportId) -> RepoResult<Option<FamilyRecord>>;
    /// Creates one family and records `slug` as its first slug.
    fn create_family(&self, family: &FamilyWrite, slug: &str) -> RepoResult<ImportId>;
    /// Updates one family; `new_slug` is appended to its slug history.
    fn update_family(&self, family: &FamilyWrite, new_slug: Option<&str>) -> RepoResult<()>;
}

impl FamilyRepository for SqliteCatalogRepository<'_> {
    fn get_family(&self, import_id: &ImportId) -> RepoResult<Option<FamilyRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT import_id, corpus_import_id, title, summary, category, metadata, concepts
             FROM families
             WHERE import_id = ?1;",
        )?;
        let mut rows = stmt.query([import_id.as_str()])?;
        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let metadata: String = row.get("metadata")?;
        let concepts: String = row.get("concepts")?;
        let concepts: Vec<Concept> = serde_json::from_str(&concepts).map_err(|err| {
            RepoError::InvalidData(format!("invalid concepts in families.concepts: {err}"))
        })?;
        let import_id = parse_import_id(row.get("import_id")?, "families.import_id")?;

        Ok(Some(FamilyRecord {
            geography_ids: load_geography_ids(self.conn, &import_id)?,
            collections: load_collection_ids(self.conn, &import_id)?,
            slug: current_slug(self.conn, SlugOwner::Family(&import_id))?,
            corpus_import_id: row.get("corpus_import_id")?,
            title: row.get("title")?,
            summary: row.get("summary")?,
            category: row.get("category")?,
            metadata: parse_metadata(&metadata, "families.metadata")?,
            concepts,
            import_id,
        }))
    }

    fn create_family(&self, family: &FamilyWrite, slug: &str) -> RepoResult<ImportId> {
        let concepts = concepts_json(family.concepts.as_deref().unwrap_or_default())?;
        within_savepoint(self.conn, "create_family", || {
            insert_slug(self.conn, slug, SlugOwner::Family(&family.import_id))?;
            self.conn.execute(
                "INSERT INTO families (
                    import_id,
                    corpus_import_id,
                    title,
                    summary,
                    category,
                    metadata,
                    concepts
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    family.import_id.as_str(),
                    family.corpus_import_id,
                    family.title,
                    family.summary,
                    family.category.as_str(),
                    family.metadata.to_json(),
                    concepts,
                ],
            )?;
            replace_links(self.conn, family)?;
            Ok(family.import_id.clone())
        })
    }

    fn update_family(&self, family: &FamilyWrite, new_slug: Option<&str>) -> RepoResult<()> {
        let concepts = family
            .concepts
            .as_deref()
            .map(concepts_json)
            .transpose()?;
        within_savepoint(self.conn, "update_family", || {
            let changed = self.conn.execute(
                "UPDATE families
                 SET
                    title = ?2,
                    summary = ?3,
                    category = ?4,
                    metadata = ?5,
                    concepts = COALESCE(?6, concepts),
                    updated_at = (strftime('%s', 'now') * 1000)
                 WHERE import_id = ?1;",
                params![
                    family.import_id.as_str(),
                    family.title,
                    family.summary,
                    family.category.as_str(),
                    family.metadata.to_json(),
                    concepts,
                ],
            )?;
            if changed == 0 {
                return Err(RepoError::NotFound {
                    kind: EntityKind::Family,
                    import_id: family.import_id.clone(),
                });
            }

            replace_links(self.conn, family)?;
            if let Some(slug) = new_slug {
                insert_slug(self.conn, slug, SlugOwner::Family(&family.import_id))?;
            }
            Ok(())
        })
    }
}

fn replace_links(conn: &Connection, family: &FamilyWrite) -> RepoResult<()> {
    let family_id = family.import_id.as_str();
    conn.execute(
        "DELETE FROM family_geographies WHERE family_import_id = ?1;",
        [family_id],
    )?;
    for geography_id in &family.geography_ids {
        conn.execute(
            "INSERT OR IGNORE INTO family_geographies (family_import_id, geography_id)
             VALUES (?1, ?2);",
            params![family_id, geography_id],
        )?;
    }

    let Some(collections) = &family.collections else {
        return Ok(());
    };
    conn.execute(
        "DELETE FROM collection_families WHERE family_import_id = ?1;",
        [family_id],
    )?;
    for collection in collections {
        conn.execute(
            "INSERT OR IGNORE INTO collection_families (collection_import_id, family_import_id)
             VALUES (?1, ?2);",
            params![collection.as_str(), family_id],
        )?;
    }
    Ok(())
}

fn load_geography_ids(conn: &Connection, family: &ImportId) -> RepoResult<Vec<GeographyId>> {
    let mut stmt = conn.prepare(
        "SELECT geography_id
         FROM family_geographies
         WHERE family_import_id = ?1
         ORDER BY geography_id ASC;",
    )?;
    let mut rows = stmt.query([family.as_str()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(row.get(0)?);
    }
    Ok(ids)
}

fn load_collection_ids(conn: &Connection, family: &ImportId) -> RepoResult<Vec<ImportId>> {
    let mut stmt = conn.prepare(
        "SELECT collection_import_id
         FROM collection_families
         WHERE family_import_id = ?1
         ORDER BY collection_import_id ASC;",
    )?;
    let mut rows = stmt.query([family.as_str()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        ids.push(parse_import_id(
            row.get(0)?,
            "collection_families.collection_import_id",
        )?);
    }
    Ok(ids)
}

fn concepts_json(concepts: &[Concept]) -> RepoResult<String> {
    serde_json::to_string(concepts)
        .map_err(|err| RepoError::InvalidData(format!("unserializable concepts: {err}")))
}
