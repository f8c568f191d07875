//! Event repository contract and SQLite implementation.

use crate::model::entity::EntityKind;
use crate::model::import_id::ImportId;
use crate::model::record::{EventRecord, EventWrite};
use crate::repo::store::{
    parse_import_id, parse_metadata, RepoError, RepoResult, SqliteCatalogRepository,
};
use chrono::NaiveDate;
use rusqlite::{params, Row};

const DATE_FORMAT: &str = "%Y-%m-%d";

pub trait EventRepository {
    fn get_event(&self, import_id: &ImportId) -> RepoResult<Option<EventRecord>>;
    fn create_event(&self, event: &EventWrite) -> RepoResult<ImportId>;
    fn update_event(&self, event: &EventWrite) -> RepoResult<()>;
}

impl EventRepository for SqliteCatalogRepository<'_> {
    fn get_event(&self, import_id: &ImportId) -> RepoResult<Option<EventRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT
                import_id,
                family_import_id,
                family_document_import_id,
                title,
                event_type_value,
                date,
                metadata
             FROM events
             WHERE import_id = ?1;",
        )?;
        let mut rows = stmt.query([import_id.as_str()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_event_row(row)?));
        }
        Ok(None)
    }

    fn create_event(&self, event: &EventWrite) -> RepoResult<ImportId> {
        self.conn.execute(
            "INSERT INTO events (
                import_id,
                family_import_id,
                family_document_import_id,
                title,
                event_type_value,
                date,
                metadata
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                event.import_id.as_str(),
                event.family_import_id.as_str(),
                event.family_document_import_id.as_ref().map(ImportId::as_str),
                event.title,
                event.event_type_value,
                event.date.format(DATE_FORMAT).to_string(),
                event.metadata.to_json(),
            ],
        )?;
        Ok(event.import_id.clone())
    }

    fn update_event(&self, event: &EventWrite) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE events
             SET
                family_import_id = ?2,
                family_document_import_id = COALESCE(?3, family_document_import_id),
                title = ?4,
                event_type_value = ?5,
                date = ?6,
                metadata = ?7,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE import_id = ?1;",
            params![
                event.import_id.as_str(),
                event.family_import_id.as_str(),
                event.family_document_import_id.as_ref().map(ImportId::as_str),
                event.title,
                event.event_type_value,
                event.date.format(DATE_FORMAT).to_string(),
                event.metadata.to_json(),
            ],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                kind: EntityKind::Event,
                import_id: event.import_id.clone(),
            });
        }
        Ok(())
    }
}

fn parse_event_row(row: &Row<'_>) -> RepoResult<EventRecord> {
    let date_text: String = row.get("date")?;
    let date = NaiveDate::parse_from_str(&date_text, DATE_FORMAT).map_err(|_| {
        RepoError::InvalidData(format!("invalid date `{date_text}` in events.date"))
    })?;
    let metadata: String = row.get("metadata")?;

    Ok(EventRecord {
        import_id: parse_import_id(row.get("import_id")?, "events.import_id")?,
        family_import_id: parse_import_id(row.get("family_import_id")?, "events.family_import_id")?,
        family_document_import_id: row
            .get::<_, Option<String>>("family_document_import_id")?
            .map(|value| parse_import_id(value, "events.family_document_import_id"))
            .transpose()?,
        title: row.get("title")?,
        event_type_value: row.get("event_type_value")?,
        date,
        metadata: parse_metadata(&metadata, "events.metadata")?,
    })
}
