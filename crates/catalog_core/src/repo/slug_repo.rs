//! Slug persistence.
//!
//! # Invariants
//! - `slugs.name` is the storage-level uniqueness guarantee.
//! - Slugs are append-only; an entity's current slug is its latest row.

use crate::model::import_id::ImportId;
use crate::repo::store::{is_unique_violation, RepoError, RepoResult, SqliteCatalogRepository};
use rusqlite::{params, Connection, OptionalExtension};

/// Entity a slug row points at.
#[derive(Debug, Clone, Copy)]
pub(crate) enum SlugOwner<'a> {
    Family(&'a ImportId),
    Document(&'a ImportId),
}

/// Repository interface for slug lookups.
pub trait SlugRepository {
    /// Returns whether `name` is already persisted.
    fn slug_exists(&self, name: &str) -> RepoResult<bool>;
}

impl SlugRepository for SqliteCatalogRepository<'_> {
    fn slug_exists(&self, name: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM slugs WHERE name = ?1);",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }
}

/// Inserts one slug row, mapping a key collision to `SlugConflict`.
pub(crate) fn insert_slug(conn: &Connection, name: &str, owner: SlugOwner<'_>) -> RepoResult<()> {
    let (family, document) = match owner {
        SlugOwner::Family(id) => (Some(id.as_str()), None),
        SlugOwner::Document(id) => (None, Some(id.as_str())),
    };
    match conn.execute(
        "INSERT INTO slugs (name, family_import_id, document_import_id)
         VALUES (?1, ?2, ?3);",
        params![name, family, document],
    ) {
        Ok(_) => Ok(()),
        Err(err) if is_unique_violation(&err) => Err(RepoError::SlugConflict(name.to_string())),
        Err(err) => Err(err.into()),
    }
}

/// Latest slug minted for one entity.
pub(crate) fn current_slug(conn: &Connection, owner: SlugOwner<'_>) -> RepoResult<Option<String>> {
    let sql = match owner {
        SlugOwner::Family(_) => {
            "SELECT name FROM slugs WHERE family_import_id = ?1 ORDER BY rowid DESC LIMIT 1;"
        }
        SlugOwner::Document(_) => {
            "SELECT name FROM slugs WHERE document_import_id = ?1 ORDER BY rowid DESC LIMIT 1;"
        }
    };
    let id = match owner {
        SlugOwner::Family(id) | SlugOwner::Document(id) => id.as_str(),
    };
    let slug = conn
        .query_row(sql, [id], |row| row.get::<_, String>(0))
        .optional()?;
    Ok(slug)
}
