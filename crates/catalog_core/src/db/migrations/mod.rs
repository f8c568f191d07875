//! Catalog schema migrations.
//!
//! Versions are mirrored to `PRAGMA user_version`; all pending steps run in
//! one transaction so a failed step leaves the previous schema in place.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::{Connection, Transaction};
use std::time::Instant;

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

impl Migration {
    fn apply(&self, tx: &Transaction<'_>) -> DbResult<()> {
        let started_at = Instant::now();
        tx.execute_batch(self.sql)?;
        tx.pragma_update(None, "user_version", self.version)?;
        info!(
            "event=db_migrate module=db status=ok version={} name={} duration_ms={}",
            self.version,
            self.name,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

/// Reference data, catalog entities, then the slug history table.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "reference",
        sql: include_str!("0001_reference.sql"),
    },
    Migration {
        version: 2,
        name: "catalog",
        sql: include_str!("0002_catalog.sql"),
    },
    Migration {
        version: 3,
        name: "slugs",
        sql: include_str!("0003_slugs.sql"),
    },
];

/// Schema version this binary migrates to.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Names of migrations not yet applied at `version`.
pub fn pending(version: u32) -> Vec<&'static str> {
    MIGRATIONS
        .iter()
        .filter(|migration| migration.version > version)
        .map(|migration| migration.name)
        .collect()
}

/// Brings the catalog schema on `conn` up to [`latest_version`].
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = current_user_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let steps: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from)
        .collect();
    if steps.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in steps {
        migration.apply(&tx)?;
    }
    tx.commit()?;
    Ok(())
}

pub fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::{pending, MIGRATIONS};

    #[test]
    fn versions_start_at_one_and_increase_by_one() {
        for (index, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version as usize, index + 1, "{}", migration.name);
            assert!(!migration.sql.trim().is_empty());
        }
    }

    #[test]
    fn pending_lists_only_newer_migrations() {
        assert_eq!(pending(0), vec!["reference", "catalog", "slugs"]);
        assert_eq!(pending(2), vec!["slugs"]);
        assert!(pending(3).is_empty());
    }
}
