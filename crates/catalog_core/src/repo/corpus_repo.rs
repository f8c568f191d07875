//! Corpus, taxonomy and reference-data lookups.
//!
//! # Responsibility
//! - Resolve a corpus and its taxonomy for a batch.
//! - Resolve human-readable geography and language names to row ids.
//! - Provide small administration writes used to seed reference data.
//!
//! # Invariants
//! - A stored taxonomy always decodes; registration rejects bad documents.
//! - Geography lookup prefers an exact `value` match over `display_value`.

use crate::model::record::{CorpusRecord, GeographyId, LanguageId, OrganisationId};
use crate::model::taxonomy::Taxonomy;
use crate::repo::store::{RepoError, RepoResult, SqliteCatalogRepository};
use log::info;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;

/// Read-side contract for corpus and reference lookups.
pub trait CorpusRepository {
    /// Loads one corpus with its decoded taxonomy.
    fn get_corpus(&self, import_id: &str) -> RepoResult<Option<CorpusRecord>>;
    /// Resolves a geography by ISO value or display name.
    fn resolve_geography(&self, name: &str) -> RepoResult<Option<GeographyId>>;
    /// Resolves a language by name.
    fn resolve_language(&self, name: &str) -> RepoResult<Option<LanguageId>>;
}

impl CorpusRepository for SqliteCatalogRepository<'_> {
    fn get_corpus(&self, import_id: &str) -> RepoResult<Option<CorpusRecord>> {
        let row = self
            .conn
            .query_row(
                "SELECT c.import_id, c.title, c.organisation_id, o.name, c.taxonomy
                 FROM corpora c
                 INNER JOIN organisations o ON o.id = c.organisation_id
                 WHERE c.import_id = ?1;",
                [import_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, OrganisationId>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((import_id, title, organisation_id, organisation_name, taxonomy)) = row else {
            return Ok(None);
        };
        let taxonomy = Taxonomy::from_json(&taxonomy).map_err(|err| {
            RepoError::InvalidData(format!("{err} in corpora.taxonomy for `{import_id}`"))
        })?;

        Ok(Some(CorpusRecord {
            import_id,
            title,
            organisation_id,
            organisation_name,
            taxonomy,
        }))
    }

    fn resolve_geography(&self, name: &str) -> RepoResult<Option<GeographyId>> {
        let id = self
            .conn
            .query_row(
                "SELECT id
                 FROM geographies
                 WHERE value = ?1 OR display_value = ?1
                 ORDER BY (value = ?1) DESC, id ASC
                 LIMIT 1;",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn resolve_language(&self, name: &str) -> RepoResult<Option<LanguageId>> {
        let id = self
            .conn
            .query_row(
                "SELECT id FROM languages WHERE name = ?1;",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }
}

impl SqliteCatalogRepository<'_> {
    /// Returns the organisation id for `name`, creating it when missing.
    pub fn ensure_organisation(&self, name: &str) -> RepoResult<OrganisationId> {
        self.conn.execute(
            "INSERT OR IGNORE INTO organisations (name) VALUES (?1);",
            [name],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM organisations WHERE name = ?1;",
            [name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Creates or replaces one corpus and its taxonomy.
    pub fn register_corpus(
        &self,
        import_id: &str,
        title: &str,
        organisation: &str,
        taxonomy: &Value,
    ) -> RepoResult<()> {
        Taxonomy::from_value(taxonomy)
            .map_err(|err| RepoError::InvalidData(format!("{err} for corpus `{import_id}`")))?;
        let organisation_id = self.ensure_organisation(organisation)?;
        self.conn.execute(
            "INSERT INTO corpora (import_id, title, organisation_id, taxonomy)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(import_id) DO UPDATE SET
                title = excluded.title,
                organisation_id = excluded.organisation_id,
                taxonomy = excluded.taxonomy;",
            params![import_id, title, organisation_id, taxonomy.to_string()],
        )?;
        info!("event=corpus_register module=repo status=ok corpus={import_id}");
        Ok(())
    }

    /// Adds a geography, or refreshes its display name when it exists.
    pub fn add_geography(&self, value: &str, display_value: &str) -> RepoResult<GeographyId> {
        self.conn.execute(
            "INSERT INTO geographies (value, display_value)
             VALUES (?1, ?2)
             ON CONFLICT(value) DO UPDATE SET display_value = excluded.display_value;",
            params![value, display_value],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM geographies WHERE value = ?1;",
            [value],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Adds a language when missing and returns its id.
    pub fn add_language(&self, name: &str, language_code: Option<&str>) -> RepoResult<LanguageId> {
        self.conn.execute(
            "INSERT OR IGNORE INTO languages (name, language_code) VALUES (?1, ?2);",
            params![name, language_code],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM languages WHERE name = ?1;",
            [name],
            |row| row.get(0),
        )?;
        Ok(id)
    }
}
